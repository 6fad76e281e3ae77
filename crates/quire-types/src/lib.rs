//! Foundation types for Quire.
//!
//! Quire is a hierarchical, versioned block store: blocks form trees of
//! boards, views, cards and text, every mutation is recorded in an
//! append-only history, and boards can delegate their content to external
//! drivers. Every other Quire crate depends on `quire-types`.
//!
//! # Key Types
//!
//! - [`Block`] -- A node in a document tree
//! - [`BlockPatch`] -- Partial update with merge semantics for `fields`
//! - [`Board`] -- Typed projection of a board-typed root block
//! - [`BoardMember`] -- Membership row granting a user access to a board
//! - [`Category`] / [`CategoryBoards`] -- Per-user board grouping
//! - [`IdType`] -- Prefixed, base32 identifiers
//! - [`MillisClock`] -- Strictly increasing millisecond stamps

pub mod block;
pub mod board;
pub mod category;
pub mod error;
pub mod id;
pub mod temporal;

pub use block::{
    Block, BlockPatch, BlockPatchBatch, BlockType, Fields, QueryBlockHistoryOptions,
    MAX_TITLE_LEN,
};
pub use board::{
    Board, BoardMember, BoardsAndBlocks, DeleteBoardsAndBlocks, FIELD_DESCRIPTION,
    FIELD_IS_TEMPLATE, FIELD_TEAM_ID, FIELD_VIRTUAL_DRIVER, ROLE_VIEWER,
};
pub use category::{Category, CategoryBoards, CategoryKind};
pub use error::TypeError;
pub use id::{is_board_id, is_valid_id, new_id, IdType, ID_LEN};
pub use temporal::{now_millis, MillisClock};
