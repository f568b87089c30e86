//! Engine configuration.
//!
//! Every field has a default, so a config file only needs the values it
//! changes:
//!
//! ```json
//! { "tidy": { "min_lots": 10, "max_payment": 5000.0 } }
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub curve: CurveConfig,
    pub tidy: TidyConfig,
    pub matching: MatchingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveConfig {
    /// Observations spanning more calendar days than this are skipped.
    pub max_span_days: i64,
}

impl Default for CurveConfig {
    fn default() -> Self {
        Self {
            max_span_days: 3660,
        }
    }
}

/// Filters and paging for tidy-opportunity search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TidyConfig {
    /// Partial matches below this many lots are discarded.
    pub min_lots: i64,
    /// Partial matches costing more than this are discarded. `None` = no cap.
    pub max_payment: Option<f64>,
    /// Ranked results to skip.
    pub offset: usize,
    /// Ranked results to return after `offset`. `None` = all.
    pub limit: Option<usize>,
}

/// Settings for cross-interest matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Ignore interests that are already accepted or rejected.
    pub open_only: bool,
    pub limit: Option<usize>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            open_only: true,
            limit: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.curve.max_span_days <= 0 {
            return Err(ConfigError::Invalid(format!(
                "curve.max_span_days must be positive, got {}",
                self.curve.max_span_days
            )));
        }
        if self.tidy.min_lots < 0 {
            return Err(ConfigError::Invalid(format!(
                "tidy.min_lots must not be negative, got {}",
                self.tidy.min_lots
            )));
        }
        if matches!(self.tidy.max_payment, Some(cap) if cap.is_nan()) {
            return Err(ConfigError::Invalid("tidy.max_payment is NaN".into()));
        }
        Ok(())
    }
}
