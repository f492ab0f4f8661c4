//! Configuration management for the indexer
//!
//! Values come from a TOML file and can be overridden from the environment
//! with `ES_INDEXER__<SECTION>__<KEY>` variables.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use validator::Validate;

use crate::data::indices::{is_known_index, ALL_INDICES};
use crate::data::DEFAULT_BULK_SIZE_THRESHOLD;

const ENV_PREFIX: &str = "ES_INDEXER";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct IndexerConfig {
    #[validate]
    pub elastic: ElasticConfig,
    #[validate]
    pub indexer: IndexerSettings,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ElasticConfig {
    #[validate(url)]
    pub url: String,
    pub username: String,
    pub password: String,
    /// Byte threshold of one bulk request
    #[validate(range(min = 1024, max = 104857600))]
    pub bulk_request_max_size: usize,
    #[validate(range(min = 1, max = 600))]
    pub request_timeout_secs: u64,
    #[validate(range(min = 1, max = 120))]
    pub connect_timeout_secs: u64,
    #[validate(range(max = 20))]
    pub max_retries: u32,
    #[validate(range(min = 1, max = 60000))]
    pub retry_base_delay_ms: u64,
    pub retry_statuses: Vec<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct IndexerSettings {
    #[validate(length(min = 1))]
    pub enabled_indices: Vec<String>,
    #[validate(range(min = 0, max = 30))]
    pub denomination: i32,
    /// Install the lifecycle policies before the templates
    pub use_kibana: bool,
    /// Directory holding `templates/` and `policies/`; built-in templates when unset
    pub templates_path: Option<PathBuf>,
    /// Backfill the type of older token documents through a scroll
    pub with_scroll_on_tokens: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub log_level: String,
    pub structured_logging: bool,
}

impl Default for ElasticConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            username: String::new(),
            password: String::new(),
            bulk_request_max_size: DEFAULT_BULK_SIZE_THRESHOLD,
            request_timeout_secs: 60,
            connect_timeout_secs: 10,
            max_retries: 3,
            retry_base_delay_ms: 500,
            retry_statuses: vec![429, 502, 503, 504],
        }
    }
}

impl Default for IndexerSettings {
    fn default() -> Self {
        Self {
            enabled_indices: ALL_INDICES.iter().map(|index| index.to_string()).collect(),
            denomination: 18,
            use_kibana: false,
            templates_path: None,
            with_scroll_on_tokens: true,
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            structured_logging: false,
        }
    }
}

impl IndexerConfig {
    /// Load configuration from file, then apply environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator(ENV_SEPARATOR))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Defaults with environment overrides, used when no file is present
    pub fn from_env() -> Result<Self> {
        let config: Self = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?)
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator(ENV_SEPARATOR))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Field constraints plus the checks that span several fields
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self)?;

        for index in &self.indexer.enabled_indices {
            if !is_known_index(index) {
                return Err(anyhow::anyhow!("Unknown index in enabled_indices: {}", index));
            }
        }
        if self.elastic.username.is_empty() != self.elastic.password.is_empty() {
            return Err(anyhow::anyhow!(
                "Elastic username and password must be set together"
            ));
        }
        if self.elastic.retry_statuses.iter().any(|status| *status < 400) {
            return Err(anyhow::anyhow!("Retry statuses must be error statuses"));
        }
        Ok(())
    }

    /// Effective configuration rendered as TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = IndexerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.indexer.enabled_indices.len(), ALL_INDICES.len());
        assert_eq!(config.elastic.bulk_request_max_size, 4 * 1024 * 1024);
        assert!(config.indexer.with_scroll_on_tokens);
    }

    #[test]
    fn test_unknown_index_is_rejected() {
        let mut config = IndexerConfig::default();
        config.indexer.enabled_indices.push("scdeploys".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_indices_are_rejected() {
        let mut config = IndexerConfig::default();
        config.indexer.enabled_indices.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_credentials_go_together() {
        let mut config = IndexerConfig::default();
        config.elastic.username = "elastic".to_string();
        assert!(config.validate().is_err());

        config.elastic.password = "secret".to_string();
        config.validate().unwrap();
    }

    #[test]
    fn test_to_toml_round_trips_sections() {
        let rendered = IndexerConfig::default().to_toml().unwrap();
        assert!(rendered.contains("[elastic]"));
        assert!(rendered.contains("[indexer]"));
        assert!(rendered.contains("[monitoring]"));
    }
}
