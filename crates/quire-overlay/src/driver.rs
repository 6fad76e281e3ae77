use async_trait::async_trait;

use quire_types::{Block, BoardMember};

use crate::error::DriverResult;

/// An external service that owns the content of virtual boards.
///
/// `name()` is the stable identifier used as the registry key and stored in
/// a board's `virtual_driver` attribute.
#[async_trait]
pub trait Driver: Send + Sync {
    fn name(&self) -> &str;

    async fn get_blocks_for_board(&self, board_id: &str) -> DriverResult<Vec<Block>>;

    async fn get_members_for_board(&self, board_id: &str) -> DriverResult<Vec<BoardMember>>;
}
