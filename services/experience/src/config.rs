//! Service configuration.
//!
//! Loaded once from the environment (and a `.env` file when present). Only the
//! log level is validated here; which collaborators get built depends on what
//! is set, see [`crate::build_resolver`] and [`crate::build_forwarder`].

use secrecy::SecretString;
use std::path::PathBuf;
use tracing::Level;

pub const DEFAULT_VIDEO_TABLE: &str = "videos";
pub const DEFAULT_VIDEO_BUCKET: &str = "videos";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Connection details for the hosted catalog and storage.
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub service_key: SecretString,
    pub video_table: String,
    pub video_bucket: String,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub conversation_id: Option<String>,
    pub demo_id: Option<String>,
    pub supabase: Option<SupabaseConfig>,
    pub catalog_file: Option<PathBuf>,
    pub search_url: Option<String>,
    pub search_api_key: Option<SecretString>,
    pub webhook_url: Option<String>,
    pub webhook_token: Option<SecretString>,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// *   `CONVERSATION_ID`, `DEMO_ID`: (Optional) Defaults for the session; the CLI may override them.
    /// *   `SUPABASE_URL`, `SUPABASE_SERVICE_KEY`: Hosted video catalog and storage. Both or neither.
    /// *   `VIDEO_TABLE`, `VIDEO_BUCKET`: (Optional) Table and bucket names. Default to "videos".
    /// *   `CATALOG_FILE`: (Optional) A JSON catalog used when Supabase is not configured.
    /// *   `SEARCH_URL`, `SEARCH_API_KEY`: (Optional) Semantic search endpoint.
    /// *   `WEBHOOK_URL`, `WEBHOOK_TOKEN`: (Optional) Analytics webhook.
    /// *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let secret = |key: &str| var(key).map(SecretString::from);

        let supabase = match (var("SUPABASE_URL"), secret("SUPABASE_SERVICE_KEY")) {
            (Some(url), Some(service_key)) => Some(SupabaseConfig {
                url,
                service_key,
                video_table: var("VIDEO_TABLE").unwrap_or_else(|| DEFAULT_VIDEO_TABLE.to_string()),
                video_bucket: var("VIDEO_BUCKET")
                    .unwrap_or_else(|| DEFAULT_VIDEO_BUCKET.to_string()),
            }),
            (Some(_), None) => {
                return Err(ConfigError::MissingVar(
                    "SUPABASE_SERVICE_KEY must be set together with SUPABASE_URL".to_string(),
                ));
            }
            (None, Some(_)) => {
                return Err(ConfigError::MissingVar(
                    "SUPABASE_URL must be set together with SUPABASE_SERVICE_KEY".to_string(),
                ));
            }
            (None, None) => None,
        };

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            conversation_id: var("CONVERSATION_ID"),
            demo_id: var("DEMO_ID"),
            supabase,
            catalog_file: var("CATALOG_FILE").map(PathBuf::from),
            search_url: var("SEARCH_URL"),
            search_api_key: secret("SEARCH_API_KEY"),
            webhook_url: var("WEBHOOK_URL"),
            webhook_token: secret("WEBHOOK_TOKEN"),
            log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = load(&[]).unwrap();
        assert!(config.supabase.is_none());
        assert!(config.catalog_file.is_none());
        assert!(config.webhook_url.is_none());
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    fn supabase_defaults_table_and_bucket() {
        let config = load(&[
            ("SUPABASE_URL", "https://abc.supabase.co"),
            ("SUPABASE_SERVICE_KEY", "service-key"),
            ("DEMO_ID", " demo-7 "),
        ])
        .unwrap();
        let supabase = config.supabase.unwrap();
        assert_eq!(supabase.video_table, "videos");
        assert_eq!(supabase.video_bucket, "videos");
        assert_eq!(supabase.service_key.expose_secret(), "service-key");
        assert_eq!(config.demo_id.as_deref(), Some("demo-7"));
    }

    #[test]
    fn supabase_url_requires_a_key() {
        let err = load(&[("SUPABASE_URL", "https://abc.supabase.co")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(_)));
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = load(&[("WEBHOOK_URL", "  "), ("WEBHOOK_TOKEN", "")]).unwrap();
        assert!(config.webhook_url.is_none());
        assert!(config.webhook_token.is_none());
    }

    #[test]
    fn rejects_unknown_log_levels() {
        let err = load(&[("RUST_LOG", "chatty")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(var, _) if var == "RUST_LOG"));
    }
}
