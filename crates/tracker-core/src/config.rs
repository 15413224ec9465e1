//! Configuration management for the tracker client.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`TRACKER__CLIENT__*`)
//! 2. Config file (`tracker.toml`, `[client]` section)
//! 3. Defaults

use std::time::Duration;

use serde::Deserialize;

use crate::error::TrackerError;
use crate::types::TenantSlug;

/// Client configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TrackerConfig {
    /// GraphQL endpoint every operation is POSTed to.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Organization slug used until another tenant is selected.
    #[serde(default = "default_organization")]
    pub default_organization: String,

    /// Upper bound on a single request, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_endpoint() -> String {
    "http://localhost:8000/graphql/".to_string()
}

fn default_organization() -> String {
    TenantSlug::DEFAULT.to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            default_organization: default_organization(),
            request_timeout_ms: default_timeout_ms(),
        }
    }
}

impl TrackerConfig {
    /// Load from `{file_prefix}.toml` (optional) and the environment.
    ///
    /// A missing file or missing `[client]` section yields defaults; a file
    /// that exists but does not parse is an error.
    pub fn load(file_prefix: &str) -> Result<Self, config::ConfigError> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("TRACKER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        match cfg.get::<TrackerConfig>("client") {
            Ok(c) => {
                tracing::debug!(endpoint = %c.endpoint, "Loaded client config");
                Ok(c)
            }
            Err(config::ConfigError::NotFound(_)) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn default_tenant(&self) -> Result<TenantSlug, TrackerError> {
        TenantSlug::new(self.default_organization.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TrackerConfig::default();
        assert_eq!(config.endpoint, "http://localhost:8000/graphql/");
        assert_eq!(config.default_organization, "demo-org");
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.default_tenant().unwrap().as_str(), "demo-org");
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("absent");
        let config = TrackerConfig::load(prefix.to_str().unwrap()).unwrap();
        assert_eq!(config.default_organization, "demo-org");
    }

    #[test]
    fn test_load_client_section_from_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("tracker.toml"),
            "[client]\nendpoint = \"https://tracker.example/graphql/\"\ndefault_organization = \"acme\"\nrequest_timeout_ms = 2500\n",
        )
        .unwrap();

        let prefix = dir.path().join("tracker");
        let config = TrackerConfig::load(prefix.to_str().unwrap()).unwrap();
        assert_eq!(config.endpoint, "https://tracker.example/graphql/");
        assert_eq!(config.default_organization, "acme");
        assert_eq!(config.request_timeout_ms, 2500);
    }

    #[test]
    fn test_invalid_default_organization_is_rejected() {
        let config = TrackerConfig {
            default_organization: "not a slug".to_string(),
            ..Default::default()
        };
        assert!(config.default_tenant().is_err());
    }
}
