use serde::{Deserialize, Serialize};

use quire_types::MAX_TITLE_LEN;

use crate::error::{StoreError, StoreResult};

/// Milliseconds in one day.
const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Configuration for a block store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum block title length, in characters.
    pub max_title_len: usize,
    /// Retention policy driven by an external timer.
    pub retention: RetentionConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_title_len: MAX_TITLE_LEN,
            retention: RetentionConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> StoreResult<Self> {
        toml::from_str(s).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

/// How old data must be before retention purges it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Boards untouched for this many days are purged. 0 disables retention.
    pub max_age_days: u32,
    /// Rows removed per batch.
    pub batch_size: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_age_days: 0,
            batch_size: 100,
        }
    }
}

impl RetentionConfig {
    pub fn is_enabled(&self) -> bool {
        self.max_age_days > 0
    }

    /// The retention cutoff for a run happening at `now` (milliseconds).
    pub fn cutoff(&self, now: i64) -> i64 {
        now - i64::from(self.max_age_days) * DAY_MS
    }
}
