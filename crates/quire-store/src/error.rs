use quire_types::TypeError;

/// Errors from block store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A point lookup found nothing (or only a soft-deleted row).
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The input failed structural validation; nothing was written.
    #[error("validation failed: {0}")]
    Validation(#[from] TypeError),

    /// An argument is out of range or inconsistent with stored state.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Two versions of the same block would share a history key.
    #[error("history conflict for block {block_id} at {update_at}")]
    HistoryConflict { block_id: String, update_at: i64 },

    /// A block's version chain is internally inconsistent.
    #[error("integrity violation for block {block_id}: {reason}")]
    IntegrityViolation { block_id: String, reason: String },

    /// A board names a virtual driver that is not registered.
    #[error("board {board_id} references unregistered driver '{driver}'")]
    DriverNotFound { board_id: String, driver: String },

    /// A registered driver failed to answer.
    #[error("driver '{driver}' failed: {message}")]
    Driver { driver: String, message: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// `true` for errors raised before any write was attempted.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::InvalidArgument(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
