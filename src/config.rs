use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use validator::Validate;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Runtime knobs of the mapping layer, with validation.
#[derive(Clone, Debug, Validate, Serialize, Deserialize)]
pub struct MapperConfig {
    /// Dialect selected for statement generation
    #[validate(length(min = 1, message = "Dialect name cannot be empty"))]
    pub dialect: String,

    /// Maximum number of ids per generated IN-list; larger requests are
    /// chunked (1-10000)
    #[validate(range(
        min = 1,
        max = 10000,
        message = "IN-list chunk size must be between 1 and 10000"
    ))]
    pub in_list_chunk_size: usize,

    /// Whether generated statements are memoized per entity type
    pub statement_cache_enabled: bool,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            dialect: "ansi".to_string(),
            in_list_chunk_size: 1000,
            statement_cache_enabled: true,
        }
    }
}

impl MapperConfig {
    /// Create configuration from environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            dialect: env::var("ROWGRAPH_DIALECT").unwrap_or_else(|_| "ansi".to_string()),
            in_list_chunk_size: parse_env_var("ROWGRAPH_IN_LIST_CHUNK_SIZE", "1000")?,
            statement_cache_enabled: parse_env_var("ROWGRAPH_STATEMENT_CACHE", "true")?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate an already assembled configuration
    pub fn validated(self) -> Result<Self, ConfigError> {
        self.validate()?;
        Ok(self)
    }
}

/// Parse an environment variable with a default fallback
fn parse_env_var<T>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(name).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: name.to_string(),
        value,
        source: Box::new(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(MapperConfig::default().validated().is_ok());
    }

    #[test]
    fn out_of_range_chunk_size_is_rejected() {
        let config = MapperConfig {
            in_list_chunk_size: 0,
            ..MapperConfig::default()
        };
        assert!(config.validated().is_err());
    }
}
