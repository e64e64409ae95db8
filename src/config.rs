use std::env;

use serde::{Deserialize, Serialize};

use crate::data::{STATS_DATE_COLUMN, STATS_TABLE};
use crate::{Error, Result};

pub const ENV_BATCH_SIZE: &str = "Q_BATCH_SIZE";
pub const ENV_LOOKUP_LIMIT: &str = "Q_LOOKUP_LIMIT";

/// Tunables of the notification model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Records staged between flushes in a batch save
    pub batch_size: usize,
    /// Default page size of autocomplete lookups
    pub lookup_limit: usize,
    /// Prefix of every permission checked by the model
    pub permission_base: String,
    /// Table and timestamp column the hit charts are computed from
    pub stats_table: String,
    pub stats_date_column: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            batch_size: 20,
            lookup_limit: 10,
            permission_base: "notification:notifications".to_string(),
            stats_table: STATS_TABLE.to_string(),
            stats_date_column: STATS_DATE_COLUMN.to_string(),
        }
    }
}

impl ModelConfig {
    /// Parse a JSON document; omitted fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ModelConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `Q_BATCH_SIZE` and `Q_LOOKUP_LIMIT`
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(batch_size) = read_env_usize(ENV_BATCH_SIZE)? {
            self.batch_size = batch_size;
        }
        if let Some(lookup_limit) = read_env_usize(ENV_LOOKUP_LIMIT)? {
            self.lookup_limit = lookup_limit;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be greater than zero".to_string()));
        }
        if self.permission_base.trim().is_empty() {
            return Err(Error::InvalidConfig("permission_base must not be empty".to_string()));
        }
        Ok(())
    }
}

fn read_env_usize(name: &str) -> Result<Option<usize>> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|e| Error::InvalidConfig(format!("{}={:?}: {}", name, value, e))),
        Err(_) => Ok(None),
    }
}
