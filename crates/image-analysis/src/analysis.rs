//! Derivation of picture attributes from an annotation payload.
//!
//! These functions are pure: they turn the service's labels, dominant colors
//! and safe-search categories into the values stored for a picture.

use std::{fmt, str::FromStr};

use vision_client::{Color, ColorInfo, EntityAnnotation, Likelihood, SafeSearchAnnotation};

/// Label descriptions ordered by descending score. Equal scores keep the
/// order the service sent them in.
pub fn sorted_labels(labels: &[EntityAnnotation]) -> Vec<String> {
    let mut ranked: Vec<&EntityAnnotation> = labels.iter().collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked
        .into_iter()
        .map(|label| label.description.clone())
        .collect()
}

/// The highest-scoring color. The first entry wins a tie.
pub fn dominant_color(colors: &[ColorInfo]) -> Option<Color> {
    let mut best: Option<&ColorInfo> = None;
    for candidate in colors {
        match best {
            Some(current) if candidate.score <= current.score => {}
            _ => best = Some(candidate),
        }
    }
    best.map(|info| info.color)
}

/// Lowercase `#rrggbb` form of a color.
pub fn hex_color(color: &Color) -> String {
    let (red, green, blue) = color.channels();
    format!("#{red:02x}{green:02x}{blue:02x}")
}

pub fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..]
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

/// Rule deciding whether a picture is unsafe to publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SafetyPolicy {
    /// Unsafe only when the reported category values, taken together, are
    /// exactly one `LIKELY` and one `VERY_LIKELY`. Any other combination,
    /// including every category at `VERY_LIKELY`, counts as safe.
    #[default]
    ExactPair,
    /// Unsafe when any reported category is `LIKELY` or `VERY_LIKELY`.
    AnyLikely,
}

impl SafetyPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SafetyPolicy::ExactPair => "exact-pair",
            SafetyPolicy::AnyLikely => "any-likely",
        }
    }
}

impl fmt::Display for SafetyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SafetyPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "exact-pair" | "exact_pair" => Ok(SafetyPolicy::ExactPair),
            "any-likely" | "any_likely" => Ok(SafetyPolicy::AnyLikely),
            other => Err(format!(
                "unknown safety policy '{other}' (expected exact-pair or any-likely)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyVerdict {
    pub safe: bool,
    /// Categories that were reported, in adult, spoof, medical, violence,
    /// racy order.
    pub categories: Vec<(&'static str, Likelihood)>,
}

/// Classifies the reported safe-search categories. Categories the service
/// left out are ignored rather than treated as unknown.
pub fn safety_verdict(
    annotation: Option<&SafeSearchAnnotation>,
    policy: SafetyPolicy,
) -> SafetyVerdict {
    let categories = annotation
        .map(SafeSearchAnnotation::categories)
        .unwrap_or_default();

    let unsafe_picture = match policy {
        SafetyPolicy::ExactPair => {
            let mut values: Vec<Likelihood> = categories.iter().map(|(_, v)| *v).collect();
            values.sort();
            values == [Likelihood::Likely, Likelihood::VeryLikely]
        }
        SafetyPolicy::AnyLikely => categories.iter().any(|(_, v)| v.is_likely()),
    };

    SafetyVerdict {
        safe: !unsafe_picture,
        categories,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(description: &str, score: f32) -> EntityAnnotation {
        EntityAnnotation {
            description: description.into(),
            score,
        }
    }

    fn color_info(color: Color, score: f32) -> ColorInfo {
        ColorInfo { color, score }
    }

    #[test]
    fn labels_sorted_by_descending_score() {
        let labels = vec![label("dog", 0.5), label("cat", 0.9), label("pet", 0.7)];
        assert_eq!(sorted_labels(&labels), vec!["cat", "pet", "dog"]);
    }

    #[test]
    fn equal_scores_keep_received_order() {
        let labels = vec![
            label("b", 0.8),
            label("a", 0.8),
            label("top", 0.95),
            label("c", 0.8),
        ];
        assert_eq!(sorted_labels(&labels), vec!["top", "b", "a", "c"]);
    }

    #[test]
    fn no_labels_yields_empty_list() {
        assert!(sorted_labels(&[]).is_empty());
    }

    #[test]
    fn hex_color_pads_and_lowercases() {
        assert_eq!(hex_color(&Color::rgb(255, 0, 16)), "#ff0010");
        assert_eq!(hex_color(&Color::rgb(10, 20, 30)), "#0a141e");
    }

    #[test]
    fn absent_channels_are_zero() {
        assert_eq!(hex_color(&Color::default()), "#000000");
        let only_green = Color {
            green: Some(128.0),
            ..Color::default()
        };
        assert_eq!(hex_color(&only_green), "#008000");
    }

    #[test]
    fn dominant_color_is_highest_score_first_on_tie() {
        let colors = vec![
            color_info(Color::rgb(1, 1, 1), 0.2),
            color_info(Color::rgb(2, 2, 2), 0.6),
            color_info(Color::rgb(3, 3, 3), 0.6),
        ];
        assert_eq!(dominant_color(&colors), Some(Color::rgb(2, 2, 2)));
        assert_eq!(dominant_color(&[]), None);
    }

    #[test]
    fn hex_color_validation() {
        assert!(is_hex_color("#ffffff"));
        assert!(is_hex_color("#0a141e"));
        assert!(!is_hex_color("#FFFFFF"));
        assert!(!is_hex_color("ffffff"));
        assert!(!is_hex_color("#fffff"));
    }

    fn safe_search(
        adult: Option<Likelihood>,
        spoof: Option<Likelihood>,
        medical: Option<Likelihood>,
        violence: Option<Likelihood>,
        racy: Option<Likelihood>,
    ) -> SafeSearchAnnotation {
        SafeSearchAnnotation {
            adult,
            spoof,
            medical,
            violence,
            racy,
        }
    }

    // The exact-pair rule compares the whole collection of reported values,
    // not each category against a threshold. These cases pin that down.
    #[test]
    fn exact_pair_flags_only_likely_plus_very_likely() {
        use Likelihood::*;
        let cases = [
            (
                safe_search(Some(Likely), None, None, Some(VeryLikely), None),
                false,
            ),
            (
                safe_search(None, Some(VeryLikely), None, None, Some(Likely)),
                false,
            ),
            (
                safe_search(
                    Some(VeryLikely),
                    Some(VeryLikely),
                    Some(VeryLikely),
                    Some(VeryLikely),
                    Some(VeryLikely),
                ),
                true,
            ),
            (safe_search(Some(Likely), None, None, None, None), true),
            (safe_search(None, None, None, None, None), true),
            (
                safe_search(Some(Likely), None, Some(Unlikely), Some(VeryLikely), None),
                true,
            ),
            (
                safe_search(
                    Some(Unlikely),
                    Some(Unlikely),
                    Some(Unlikely),
                    Some(Unlikely),
                    Some(Unlikely),
                ),
                true,
            ),
        ];

        for (annotation, expected_safe) in cases {
            let verdict = safety_verdict(Some(&annotation), SafetyPolicy::ExactPair);
            assert_eq!(verdict.safe, expected_safe, "{annotation:?}");
        }
    }

    #[test]
    fn missing_safe_search_is_safe() {
        let verdict = safety_verdict(None, SafetyPolicy::ExactPair);
        assert!(verdict.safe);
        assert!(verdict.categories.is_empty());
        assert!(safety_verdict(None, SafetyPolicy::AnyLikely).safe);
    }

    #[test]
    fn any_likely_flags_single_category() {
        use Likelihood::*;
        let single = safe_search(Some(Likely), None, None, None, None);
        assert!(!safety_verdict(Some(&single), SafetyPolicy::AnyLikely).safe);

        let all_very = safe_search(
            Some(VeryLikely),
            Some(VeryLikely),
            Some(VeryLikely),
            Some(VeryLikely),
            Some(VeryLikely),
        );
        assert!(!safety_verdict(Some(&all_very), SafetyPolicy::AnyLikely).safe);

        let possible = safe_search(Some(Possible), Some(Unknown), None, None, None);
        assert!(safety_verdict(Some(&possible), SafetyPolicy::AnyLikely).safe);
    }

    #[test]
    fn safety_policy_parses() {
        assert_eq!("exact-pair".parse::<SafetyPolicy>(), Ok(SafetyPolicy::ExactPair));
        assert_eq!(" Any-Likely ".parse::<SafetyPolicy>(), Ok(SafetyPolicy::AnyLikely));
        assert!("strict".parse::<SafetyPolicy>().is_err());
    }
}
