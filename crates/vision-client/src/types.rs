//! Wire types of the image annotation REST API.
//!
//! Requests reference an image already stored in a bucket and list the
//! capabilities to run. Each per-image response is decoded into an
//! [`AnnotationResult`], which is either the annotations or the error status
//! the service reported for that image.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Capabilities the handler asks the annotation service for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeatureType {
    LabelDetection,
    ImageProperties,
    SafeSearchDetection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: FeatureType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSource {
    pub image_uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub source: ImageSource,
}

/// A single-image annotation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotateImageRequest {
    pub image: Image,
    pub features: Vec<Feature>,
}

impl AnnotateImageRequest {
    /// Builds a request for the image at `uri` asking for labels, image
    /// properties and safe-search classification.
    pub fn for_uri(uri: impl Into<String>) -> Self {
        Self {
            image: Image {
                source: ImageSource {
                    image_uri: uri.into(),
                },
            },
            features: [
                FeatureType::LabelDetection,
                FeatureType::ImageProperties,
                FeatureType::SafeSearchDetection,
            ]
            .into_iter()
            .map(|kind| Feature { kind })
            .collect(),
        }
    }

    pub fn image_uri(&self) -> &str {
        &self.image.source.image_uri
    }
}

/// Ordinal likelihood scale used by safe-search classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Likelihood {
    Unknown,
    VeryUnlikely,
    Unlikely,
    Possible,
    Likely,
    VeryLikely,
}

impl Likelihood {
    pub fn as_str(&self) -> &'static str {
        match self {
            Likelihood::Unknown => "UNKNOWN",
            Likelihood::VeryUnlikely => "VERY_UNLIKELY",
            Likelihood::Unlikely => "UNLIKELY",
            Likelihood::Possible => "POSSIBLE",
            Likelihood::Likely => "LIKELY",
            Likelihood::VeryLikely => "VERY_LIKELY",
        }
    }

    /// `true` for `LIKELY` and `VERY_LIKELY`.
    pub fn is_likely(self) -> bool {
        self >= Likelihood::Likely
    }
}

impl fmt::Display for Likelihood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityAnnotation {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub score: f32,
}

/// Color channels as sent by the service. Channels equal to zero are
/// omitted on the wire.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub red: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub green: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blue: Option<f32>,
}

impl Color {
    pub fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Self {
            red: Some(f32::from(red)),
            green: Some(f32::from(green)),
            blue: Some(f32::from(blue)),
        }
    }

    /// Integer channels, absent ones read as zero. Fractional values are
    /// truncated and out-of-range values saturate.
    pub fn channels(&self) -> (u8, u8, u8) {
        let channel = |value: Option<f32>| value.unwrap_or(0.0) as u8;
        (channel(self.red), channel(self.green), channel(self.blue))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorInfo {
    #[serde(default)]
    pub color: Color,
    #[serde(default)]
    pub score: f32,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct DominantColors {
    #[serde(default)]
    pub colors: Vec<ColorInfo>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageProperties {
    #[serde(default)]
    pub dominant_colors: DominantColors,
}

/// Safe-search verdict per category. Categories the service did not report
/// stay `None`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeSearchAnnotation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adult: Option<Likelihood>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spoof: Option<Likelihood>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medical: Option<Likelihood>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub violence: Option<Likelihood>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub racy: Option<Likelihood>,
}

impl SafeSearchAnnotation {
    /// Reported categories in the order adult, spoof, medical, violence, racy.
    pub fn categories(&self) -> Vec<(&'static str, Likelihood)> {
        [
            ("adult", self.adult),
            ("spoof", self.spoof),
            ("medical", self.medical),
            ("violence", self.violence),
            ("racy", self.racy),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|likelihood| (name, likelihood)))
        .collect()
    }
}

/// Error status reported for a single image.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

/// Successful annotation payload.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotations {
    #[serde(default)]
    pub label_annotations: Vec<EntityAnnotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_properties_annotation: Option<ImageProperties>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe_search_annotation: Option<SafeSearchAnnotation>,
}

impl Annotations {
    pub fn dominant_colors(&self) -> &[ColorInfo] {
        self.image_properties_annotation
            .as_ref()
            .map(|props| props.dominant_colors.colors.as_slice())
            .unwrap_or(&[])
    }
}

/// Outcome of annotating one image. An `error` member on the wire wins over
/// any annotations sent alongside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawAnnotateImageResponse", into = "RawAnnotateImageResponse")]
pub enum AnnotationResult {
    Success(Annotations),
    Error(Status),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawAnnotateImageResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<Status>,
    #[serde(flatten)]
    annotations: Annotations,
}

impl From<RawAnnotateImageResponse> for AnnotationResult {
    fn from(raw: RawAnnotateImageResponse) -> Self {
        match raw.error {
            Some(status) => AnnotationResult::Error(status),
            None => AnnotationResult::Success(raw.annotations),
        }
    }
}

impl From<AnnotationResult> for RawAnnotateImageResponse {
    fn from(result: AnnotationResult) -> Self {
        match result {
            AnnotationResult::Success(annotations) => Self {
                error: None,
                annotations,
            },
            AnnotationResult::Error(status) => Self {
                error: Some(status),
                annotations: Annotations::default(),
            },
        }
    }
}
