use thiserror::Error;

use quire_overlay::OverlayError;

/// Errors from loading driver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("malformed driver configuration: {0}")]
    Parse(String),

    #[error("driver '{driver}': {reason}")]
    Invalid { driver: String, reason: String },

    #[error(transparent)]
    Registry(#[from] OverlayError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
