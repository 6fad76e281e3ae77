use std::time::Duration;

use thiserror::Error;

use quire_store::StoreError;

/// Failures reported by a virtual driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("request failed with status {status}")]
    Status { status: u16 },

    #[error("malformed response body: {0}")]
    Decode(String),

    #[error("request error: {0}")]
    Request(String),
}

impl DriverError {
    /// Connection failures and timeouts may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::Timeout(_))
    }

    /// Wrap as an opaque store error attributed to `driver`.
    pub fn into_store_error(self, driver: &str) -> StoreError {
        StoreError::Driver {
            driver: driver.to_string(),
            message: self.to_string(),
        }
    }
}

pub type DriverResult<T> = Result<T, DriverError>;

/// Errors raised while assembling the overlay.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OverlayError {
    #[error("driver '{0}' is registered more than once")]
    DuplicateDriver(String),

    #[error("driver name must not be empty")]
    EmptyDriverName,
}
