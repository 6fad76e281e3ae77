use thiserror::Error;

/// Errors produced by type construction and validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("title too long: {len} characters, maximum is {max}")]
    TitleTooLong { len: usize, max: usize },

    #[error("fields are not serializable: {0}")]
    InvalidFields(String),

    #[error("invalid patch: {0}")]
    InvalidPatch(String),

    #[error("expected a {expected} block, got {actual}")]
    WrongBlockType { expected: String, actual: String },
}
