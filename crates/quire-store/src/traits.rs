use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::info;

use quire_types::{
    Block, BlockPatch, BlockPatchBatch, BlockType, Board, BoardMember, BoardsAndBlocks, Category,
    CategoryBoards, DeleteBoardsAndBlocks, QueryBlockHistoryOptions,
};

use crate::config::RetentionConfig;
use crate::error::StoreResult;

/// Versioned storage for boards, blocks, members and categories.
///
/// All implementations must satisfy these invariants:
/// - Every write to a block appends a history row; history is never
///   rewritten, only purged wholesale by retention.
/// - Reads return the latest version only. Soft-deleted blocks are hidden
///   from point and tree reads but keep their history.
/// - Batch writes are all-or-nothing: validation runs over the whole batch
///   before anything is written.
/// - Stamps assigned by the store strictly increase across the store, so
///   two versions of a block never share an `update_at`.
#[async_trait]
pub trait Store: Send + Sync {
    // ---- blocks ------------------------------------------------------------

    /// Insert or replace a block, recording a new version.
    ///
    /// A replacement keeps the original `create_at` and `created_by`.
    /// Returns the stored version with its stamps.
    async fn insert_block(&self, block: Block, modified_by: &str) -> StoreResult<Block>;

    /// Insert several blocks atomically.
    async fn insert_blocks(&self, blocks: Vec<Block>, modified_by: &str)
        -> StoreResult<Vec<Block>>;

    /// Apply a partial update to a live block.
    async fn patch_block(
        &self,
        block_id: &str,
        patch: &BlockPatch,
        modified_by: &str,
    ) -> StoreResult<Block>;

    /// Apply one patch per block atomically.
    async fn patch_blocks(&self, batch: &BlockPatchBatch, modified_by: &str)
        -> StoreResult<Vec<Block>>;

    /// Soft-delete a block. Deleting a missing or deleted block is a no-op.
    async fn delete_block(&self, block_id: &str, modified_by: &str) -> StoreResult<()>;

    /// Restore the most recent live version of a soft-deleted block.
    async fn undelete_block(&self, block_id: &str, modified_by: &str) -> StoreResult<Block>;

    /// The current version of a live block.
    async fn get_block(&self, block_id: &str) -> StoreResult<Block>;

    /// Versions of one block ordered by `update_at`.
    async fn get_block_history(
        &self,
        block_id: &str,
        opts: QueryBlockHistoryOptions,
    ) -> StoreResult<Vec<Block>>;

    /// Versions of every block that belongs (or belonged) to a board.
    async fn get_block_history_descendants(
        &self,
        board_id: &str,
        opts: QueryBlockHistoryOptions,
    ) -> StoreResult<Vec<Block>>;

    /// A block plus its live children.
    async fn get_subtree2(&self, block_id: &str) -> StoreResult<Vec<Block>>;

    /// A block plus its live children and grandchildren.
    async fn get_subtree3(&self, block_id: &str) -> StoreResult<Vec<Block>>;

    async fn get_root_id(&self, block_id: &str) -> StoreResult<String>;

    /// Every live block in the store, ordered by id.
    async fn get_all_blocks(&self) -> StoreResult<Vec<Block>>;

    /// Live blocks of a board, excluding the board block itself.
    async fn get_blocks_for_board(&self, board_id: &str) -> StoreResult<Vec<Block>>;

    async fn get_blocks_with_parent(
        &self,
        board_id: &str,
        parent_id: &str,
    ) -> StoreResult<Vec<Block>>;

    async fn get_blocks_with_type(
        &self,
        board_id: &str,
        block_type: BlockType,
    ) -> StoreResult<Vec<Block>>;

    /// Default implementation filters [`Store::get_blocks_with_parent`].
    async fn get_blocks_with_parent_and_type(
        &self,
        board_id: &str,
        parent_id: &str,
        block_type: BlockType,
    ) -> StoreResult<Vec<Block>> {
        let mut blocks = self.get_blocks_with_parent(board_id, parent_id).await?;
        blocks.retain(|b| b.block_type == block_type);
        Ok(blocks)
    }

    // ---- boards and members -------------------------------------------------

    async fn insert_board(&self, board: Board, modified_by: &str) -> StoreResult<Board>;

    async fn get_board(&self, board_id: &str) -> StoreResult<Board>;

    /// Live boards of a team, ordered by title then id.
    async fn get_boards_for_team(&self, team_id: &str) -> StoreResult<Vec<Board>>;

    /// Soft-delete a board together with all of its live blocks.
    async fn delete_board(&self, board_id: &str, modified_by: &str) -> StoreResult<()>;

    /// Insert or replace a membership row.
    async fn save_member(&self, member: BoardMember) -> StoreResult<BoardMember>;

    async fn delete_member(&self, board_id: &str, user_id: &str) -> StoreResult<()>;

    async fn get_member_for_board(&self, board_id: &str, user_id: &str)
        -> StoreResult<BoardMember>;

    /// Stored members of a board, ordered by user id.
    async fn get_members_for_board(&self, board_id: &str) -> StoreResult<Vec<BoardMember>>;

    // ---- bulk ----------------------------------------------------------------

    /// Create boards and blocks as one atomic unit.
    async fn create_boards_and_blocks(
        &self,
        payload: BoardsAndBlocks,
        user_id: &str,
    ) -> StoreResult<BoardsAndBlocks>;

    /// Like [`Store::create_boards_and_blocks`], also making `user_id` an
    /// admin member of every created board.
    async fn create_boards_and_blocks_with_admin(
        &self,
        payload: BoardsAndBlocks,
        user_id: &str,
    ) -> StoreResult<(BoardsAndBlocks, Vec<BoardMember>)>;

    /// Soft-delete boards and blocks as one atomic unit. Every listed block
    /// must belong to one of the listed boards.
    async fn delete_boards_and_blocks(
        &self,
        payload: &DeleteBoardsAndBlocks,
        user_id: &str,
    ) -> StoreResult<()>;

    // ---- card usage ------------------------------------------------------------

    /// Live cards on live, non-template boards.
    async fn get_used_cards_count(&self) -> StoreResult<u64>;

    /// `update_at` of the `card_limit`-th most recently updated counted
    /// card, or 0 when fewer cards exist or `card_limit` is 0.
    async fn get_card_limit_timestamp(&self, card_limit: u64) -> StoreResult<i64>;

    // ---- retention ----------------------------------------------------------------

    /// Permanently purge boards (with their blocks, history, members and
    /// category assignments) last modified before `cutoff`, plus orphan
    /// blocks older than `cutoff`. Works in batches of `batch_size` blocks
    /// and returns the number of blocks purged.
    async fn run_data_retention(&self, cutoff: i64, batch_size: usize) -> StoreResult<u64>;

    /// Run retention for a policy at time `now`. Disabled policies purge
    /// nothing.
    async fn run_retention_policy(&self, policy: &RetentionConfig, now: i64) -> StoreResult<u64> {
        if !policy.is_enabled() {
            return Ok(0);
        }
        let cutoff = policy.cutoff(now);
        info!(cutoff, max_age_days = policy.max_age_days, "running retention policy");
        self.run_data_retention(cutoff, policy.batch_size).await
    }

    // ---- categories ------------------------------------------------------------------

    /// Create a category. An empty id is replaced by a generated one.
    async fn create_category(&self, category: Category) -> StoreResult<Category>;

    async fn get_category(&self, category_id: &str) -> StoreResult<Category>;

    /// Replace the mutable attributes of a live category, keeping its
    /// owner and `create_at`.
    async fn update_category(&self, category: Category) -> StoreResult<Category>;

    /// Soft-delete a category owned by `user_id` in `team_id`.
    async fn delete_category(
        &self,
        category_id: &str,
        user_id: &str,
        team_id: &str,
    ) -> StoreResult<()>;

    /// Live categories of a user in a team, in display order.
    async fn get_user_categories(&self, user_id: &str, team_id: &str)
        -> StoreResult<Vec<Category>>;

    /// Live categories of a user in a team with their assigned boards.
    async fn get_user_category_boards(
        &self,
        user_id: &str,
        team_id: &str,
    ) -> StoreResult<Vec<CategoryBoards>>;

    /// Assign boards to categories: `assignments` maps board id to
    /// category id. A board belongs to at most one category per user.
    async fn add_update_category_board(
        &self,
        user_id: &str,
        assignments: &BTreeMap<String, String>,
    ) -> StoreResult<()>;

    /// Set the display order of a user's categories. `category_ids` must
    /// name every live category of the user in the team exactly once.
    async fn reorder_categories(
        &self,
        user_id: &str,
        team_id: &str,
        category_ids: &[String],
    ) -> StoreResult<Vec<String>>;

    /// Set the display order of the boards in one category. `board_ids`
    /// must name every board assigned to it exactly once.
    async fn reorder_category_boards(
        &self,
        user_id: &str,
        category_id: &str,
        board_ids: &[String],
    ) -> StoreResult<Vec<String>>;
}
