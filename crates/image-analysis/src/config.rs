use std::{env, net::SocketAddr, time::Duration};

use anyhow::{anyhow, bail, Context, Result};

use crate::analysis::{is_hex_color, SafetyPolicy};
use crate::handler::AnalysisSettings;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_VISION_ENDPOINT: &str = "https://vision.googleapis.com";
const DEFAULT_VISION_TIMEOUT_SECONDS: u64 = 30;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub db_url: String,
    pub vision_endpoint: String,
    pub vision_timeout: Duration,
    pub analysis: AnalysisSettings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let listen_addr = match var("IMAGE_ANALYSIS_ADDR") {
            Some(addr) => addr.parse::<SocketAddr>().context("invalid IMAGE_ANALYSIS_ADDR")?,
            None => {
                let port = match var("PORT") {
                    Some(port) => port.parse::<u16>().context("invalid PORT")?,
                    None => DEFAULT_PORT,
                };
                SocketAddr::from(([0, 0, 0, 0], port))
            }
        };

        let db_url = var("PICTURES_DB_DSN")
            .or_else(|| var("DATABASE_URL"))
            .ok_or_else(|| anyhow!("PICTURES_DB_DSN or DATABASE_URL must be configured"))?;

        let vision_endpoint =
            var("VISION_API_ENDPOINT").unwrap_or_else(|| DEFAULT_VISION_ENDPOINT.to_string());

        let vision_timeout = match var("VISION_API_TIMEOUT_SECONDS") {
            Some(value) => Duration::from_secs(
                value
                    .parse::<u64>()
                    .context("invalid VISION_API_TIMEOUT_SECONDS")?,
            ),
            None => Duration::from_secs(DEFAULT_VISION_TIMEOUT_SECONDS),
        };

        let defaults = AnalysisSettings::default();

        let storage_scheme = var("IMAGE_ANALYSIS_STORAGE_SCHEME")
            .map(|scheme| scheme.trim_end_matches("://").to_string())
            .unwrap_or(defaults.storage_scheme);

        let safety_policy = match var("IMAGE_ANALYSIS_SAFETY_POLICY") {
            Some(value) => value
                .parse::<SafetyPolicy>()
                .map_err(|err| anyhow!(err))
                .context("invalid IMAGE_ANALYSIS_SAFETY_POLICY")?,
            None => defaults.safety_policy,
        };

        let fallback_color = match var("IMAGE_ANALYSIS_FALLBACK_COLOR") {
            Some(value) => {
                let color = value.to_ascii_lowercase();
                if !is_hex_color(&color) {
                    bail!("IMAGE_ANALYSIS_FALLBACK_COLOR must look like #rrggbb, got '{value}'");
                }
                Some(color)
            }
            None => None,
        };

        Ok(Self {
            listen_addr,
            db_url,
            vision_endpoint,
            vision_timeout,
            analysis: AnalysisSettings {
                storage_scheme,
                safety_policy,
                fallback_color,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_dsn_is_set() {
        let config = config_from(&[("DATABASE_URL", "sqlite://pictures.db")]).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.db_url, "sqlite://pictures.db");
        assert_eq!(config.vision_endpoint, DEFAULT_VISION_ENDPOINT);
        assert_eq!(config.vision_timeout, Duration::from_secs(30));
        assert_eq!(config.analysis, AnalysisSettings::default());
    }

    #[test]
    fn database_url_is_required() {
        let err = config_from(&[]).unwrap_err();
        assert!(err.to_string().contains("PICTURES_DB_DSN"));
    }

    #[test]
    fn port_and_explicit_addr() {
        let config = config_from(&[("PICTURES_DB_DSN", "sqlite::memory:"), ("PORT", "9090")])
            .unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:9090".parse::<SocketAddr>().unwrap());

        let config = config_from(&[
            ("PICTURES_DB_DSN", "sqlite::memory:"),
            ("PORT", "9090"),
            ("IMAGE_ANALYSIS_ADDR", "127.0.0.1:7000"),
        ])
        .unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:7000".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn analysis_overrides() {
        let config = config_from(&[
            ("PICTURES_DB_DSN", "sqlite::memory:"),
            ("IMAGE_ANALYSIS_STORAGE_SCHEME", "storage://"),
            ("IMAGE_ANALYSIS_SAFETY_POLICY", "any-likely"),
            ("IMAGE_ANALYSIS_FALLBACK_COLOR", "#FFFFFF"),
            ("VISION_API_TIMEOUT_SECONDS", "5"),
        ])
        .unwrap();
        assert_eq!(config.analysis.storage_scheme, "storage");
        assert_eq!(config.analysis.safety_policy, SafetyPolicy::AnyLikely);
        assert_eq!(config.analysis.fallback_color.as_deref(), Some("#ffffff"));
        assert_eq!(config.vision_timeout, Duration::from_secs(5));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(config_from(&[
            ("PICTURES_DB_DSN", "sqlite::memory:"),
            ("IMAGE_ANALYSIS_SAFETY_POLICY", "paranoid"),
        ])
        .is_err());
        assert!(config_from(&[
            ("PICTURES_DB_DSN", "sqlite::memory:"),
            ("IMAGE_ANALYSIS_FALLBACK_COLOR", "white"),
        ])
        .is_err());
        assert!(config_from(&[("PICTURES_DB_DSN", "sqlite::memory:"), ("PORT", "http")]).is_err());
    }
}
