//! Versioned block storage for Quire.
//!
//! Blocks form trees (board -> view/card -> text, ...). Every mutation is
//! appended to a per-block history chain, reads see only the latest
//! version, and soft-deleted blocks remain in history until retention
//! purges them for good.
//!
//! # Components
//!
//! - [`Store`] -- the async store contract every backend and decorator implements
//! - [`HistoryLedger`] -- append-only version arena keyed by `(block_id, update_at)`
//! - [`InMemoryStore`] -- lock-protected engine for tests and embedding, with
//!   retention, card-limit ranking and per-user categories
//! - [`StoreConfig`] / [`RetentionConfig`] -- TOML-loadable settings
//!
//! # Design Rules
//!
//! 1. History rows are immutable; only retention removes them.
//! 2. Stamps are store-assigned and strictly increasing.
//! 3. Batch operations validate everything before writing anything.
//! 4. Point lookups on missing ids fail with not-found; tree queries return
//!    an empty result instead.

pub mod config;
pub mod error;
pub mod history;
pub mod memory;
pub mod traits;

pub use config::{RetentionConfig, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use history::HistoryLedger;
pub use memory::InMemoryStore;
pub use traits::Store;
