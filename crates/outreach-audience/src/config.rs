//! Configuration
//!
//! Loaded from TOML; every field has a default. Environment variables
//! override the file, CLI flags override both.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const ENV_API_URL: &str = "OUTREACH_API_URL";
pub const ENV_API_KEY: &str = "OUTREACH_API_KEY";
pub const ENV_COMPANY_ID: &str = "OUTREACH_COMPANY_ID";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to write config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudienceConfig {
    pub company_id: String,
    pub api: ApiConfig,
    pub queue: QueueConfig,
    pub suggest: SuggestConfig,
    pub lifecycle: LifecycleConfig,
}

/// Upper bound for `api.max_retries`; the backoff doubles per attempt
pub const MAX_RETRIES: u32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
    /// Applies to GET requests only
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub page_size: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestConfig {
    pub debounce_ms: u64,
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Refuse to finalize while duplicate pairs remain
    pub block_finalize_on_duplicates: bool,
    /// Field holding the address used for invalid-email counts
    pub email_field: String,
}

impl Default for AudienceConfig {
    fn default() -> Self {
        Self {
            company_id: "default".to_string(),
            api: ApiConfig::default(),
            queue: QueueConfig::default(),
            suggest: SuggestConfig::default(),
            lifecycle: LifecycleConfig::default(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/v1".to_string(),
            api_key: String::new(),
            timeout_secs: 30,
            max_retries: 3,
            retry_delay_ms: 500,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { page_size: 20 }
    }
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 250,
            limit: 10,
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            block_finalize_on_duplicates: true,
            email_field: "email".to_string(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl SuggestConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl AudienceConfig {
    /// Parse, apply environment overrides and validate.
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from any variable source
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.is_empty()) {
            self.api.base_url = url;
        }
        if let Some(key) = lookup(ENV_API_KEY) {
            self.api.api_key = key;
        }
        if let Some(company) = lookup(ENV_COMPANY_ID).filter(|v| !v.is_empty()) {
            self.company_id = company;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.api.base_url)
            .map_err(|e| ConfigError::Invalid(format!("api.base_url '{}': {}", self.api.base_url, e)))?;
        if self.company_id.trim().is_empty() {
            return Err(ConfigError::Invalid("company_id must not be blank".into()));
        }
        if self.api.max_retries > MAX_RETRIES {
            return Err(ConfigError::Invalid(format!(
                "api.max_retries must be at most {}, got {}",
                MAX_RETRIES, self.api.max_retries
            )));
        }
        if self.queue.page_size == 0 {
            return Err(ConfigError::Invalid("queue.page_size must be at least 1".into()));
        }
        if self.suggest.limit == 0 {
            return Err(ConfigError::Invalid("suggest.limit must be at least 1".into()));
        }
        if self.lifecycle.email_field.trim().is_empty() {
            return Err(ConfigError::Invalid("lifecycle.email_field must not be blank".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = AudienceConfig::from_toml(
            r#"
            company_id = "acme"

            [queue]
            page_size = 50
            "#,
        )
        .unwrap();

        assert_eq!(config.company_id, "acme");
        assert_eq!(config.queue.page_size, 50);
        assert_eq!(config.suggest.debounce_ms, 250);
        assert!(config.lifecycle.block_finalize_on_duplicates);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let mut config = AudienceConfig::default();
        config.apply_overrides(|name| match name {
            ENV_API_URL => Some("https://api.example.com/v2".into()),
            ENV_COMPANY_ID => Some("globex".into()),
            _ => None,
        });
        assert_eq!(config.api.base_url, "https://api.example.com/v2");
        assert_eq!(config.company_id, "globex");
        assert_eq!(config.api.api_key, "");
    }

    #[test]
    fn test_validation() {
        let mut config = AudienceConfig::default();
        config.api.base_url = "not a url".into();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = AudienceConfig::default();
        config.queue.page_size = 0;
        assert!(config.validate().is_err());

        let mut config = AudienceConfig::default();
        config.api.max_retries = MAX_RETRIES;
        assert!(config.validate().is_ok());
        config.api.max_retries = 40;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = AudienceConfig::default();
        let text = config.to_toml().unwrap();
        assert_eq!(AudienceConfig::from_toml(&text).unwrap(), config);
    }
}
