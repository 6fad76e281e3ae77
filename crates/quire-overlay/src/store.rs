use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use quire_store::{Store, StoreResult};
use quire_types::{
    Block, BlockPatch, BlockPatchBatch, BlockType, Board, BoardMember, BoardsAndBlocks, Category,
    CategoryBoards, DeleteBoardsAndBlocks, QueryBlockHistoryOptions,
};

use crate::interceptor::{BoardReadInterceptor, Interception};
use crate::registry::DriverRegistry;
use crate::virtual_driver::VirtualDriverInterceptor;

/// A [`Store`] decorator that runs board-scoped reads through an ordered
/// interceptor chain. Every other call goes straight to the inner store.
pub struct OverlayStore<S> {
    inner: S,
    interceptors: Vec<Box<dyn BoardReadInterceptor>>,
}

impl<S: Store> OverlayStore<S> {
    /// An overlay with an empty chain; behaves exactly like `inner`.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            interceptors: Vec::new(),
        }
    }

    /// The standard overlay: virtual boards are served by `registry`.
    pub fn with_virtual_drivers(inner: S, registry: Arc<DriverRegistry>) -> Self {
        Self::new(inner).with_interceptor(Box::new(VirtualDriverInterceptor::new(registry)))
    }

    /// Append an interceptor to the end of the chain.
    pub fn with_interceptor(mut self, interceptor: Box<dyn BoardReadInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn interceptor_names(&self) -> Vec<&str> {
        self.interceptors.iter().map(|i| i.name()).collect()
    }
}

#[async_trait]
impl<S: Store> Store for OverlayStore<S> {
    async fn insert_block(&self, block: Block, modified_by: &str) -> StoreResult<Block> {
        self.inner.insert_block(block, modified_by).await
    }

    async fn insert_blocks(
        &self,
        blocks: Vec<Block>,
        modified_by: &str,
    ) -> StoreResult<Vec<Block>> {
        self.inner.insert_blocks(blocks, modified_by).await
    }

    async fn patch_block(
        &self,
        block_id: &str,
        patch: &BlockPatch,
        modified_by: &str,
    ) -> StoreResult<Block> {
        self.inner.patch_block(block_id, patch, modified_by).await
    }

    async fn patch_blocks(
        &self,
        batch: &BlockPatchBatch,
        modified_by: &str,
    ) -> StoreResult<Vec<Block>> {
        self.inner.patch_blocks(batch, modified_by).await
    }

    async fn delete_block(&self, block_id: &str, modified_by: &str) -> StoreResult<()> {
        self.inner.delete_block(block_id, modified_by).await
    }

    async fn undelete_block(&self, block_id: &str, modified_by: &str) -> StoreResult<Block> {
        self.inner.undelete_block(block_id, modified_by).await
    }

    async fn get_block(&self, block_id: &str) -> StoreResult<Block> {
        self.inner.get_block(block_id).await
    }

    async fn get_block_history(
        &self,
        block_id: &str,
        opts: QueryBlockHistoryOptions,
    ) -> StoreResult<Vec<Block>> {
        self.inner.get_block_history(block_id, opts).await
    }

    async fn get_block_history_descendants(
        &self,
        board_id: &str,
        opts: QueryBlockHistoryOptions,
    ) -> StoreResult<Vec<Block>> {
        self.inner.get_block_history_descendants(board_id, opts).await
    }

    async fn get_subtree2(&self, block_id: &str) -> StoreResult<Vec<Block>> {
        self.inner.get_subtree2(block_id).await
    }

    async fn get_subtree3(&self, block_id: &str) -> StoreResult<Vec<Block>> {
        self.inner.get_subtree3(block_id).await
    }

    async fn get_root_id(&self, block_id: &str) -> StoreResult<String> {
        self.inner.get_root_id(block_id).await
    }

    async fn get_all_blocks(&self) -> StoreResult<Vec<Block>> {
        self.inner.get_all_blocks().await
    }

    /// Local blocks first, then whatever the chain appends. A `Replace`
    /// substitutes the accumulated result and ends the chain.
    async fn get_blocks_for_board(&self, board_id: &str) -> StoreResult<Vec<Block>> {
        let mut blocks = self.inner.get_blocks_for_board(board_id).await?;
        for interceptor in &self.interceptors {
            match interceptor.blocks_for_board(&self.inner, board_id).await? {
                Interception::Pass => {}
                Interception::Augment(extra) => blocks.extend(extra),
                Interception::Replace(replacement) => {
                    debug!(board_id, interceptor = interceptor.name(), "board blocks replaced");
                    blocks = replacement;
                    break;
                }
            }
        }
        Ok(blocks)
    }

    async fn get_blocks_with_parent(
        &self,
        board_id: &str,
        parent_id: &str,
    ) -> StoreResult<Vec<Block>> {
        self.inner.get_blocks_with_parent(board_id, parent_id).await
    }

    async fn get_blocks_with_type(
        &self,
        board_id: &str,
        block_type: BlockType,
    ) -> StoreResult<Vec<Block>> {
        self.inner.get_blocks_with_type(board_id, block_type).await
    }

    async fn get_blocks_with_parent_and_type(
        &self,
        board_id: &str,
        parent_id: &str,
        block_type: BlockType,
    ) -> StoreResult<Vec<Block>> {
        self.inner
            .get_blocks_with_parent_and_type(board_id, parent_id, block_type)
            .await
    }

    async fn insert_board(&self, board: Board, modified_by: &str) -> StoreResult<Board> {
        self.inner.insert_board(board, modified_by).await
    }

    async fn get_board(&self, board_id: &str) -> StoreResult<Board> {
        self.inner.get_board(board_id).await
    }

    async fn get_boards_for_team(&self, team_id: &str) -> StoreResult<Vec<Board>> {
        self.inner.get_boards_for_team(team_id).await
    }

    async fn delete_board(&self, board_id: &str, modified_by: &str) -> StoreResult<()> {
        self.inner.delete_board(board_id, modified_by).await
    }

    async fn save_member(&self, member: BoardMember) -> StoreResult<BoardMember> {
        self.inner.save_member(member).await
    }

    async fn delete_member(&self, board_id: &str, user_id: &str) -> StoreResult<()> {
        self.inner.delete_member(board_id, user_id).await
    }

    async fn get_member_for_board(
        &self,
        board_id: &str,
        user_id: &str,
    ) -> StoreResult<BoardMember> {
        self.inner.get_member_for_board(board_id, user_id).await
    }

    /// The first `Replace` in the chain wins outright. Otherwise local
    /// members are returned followed by any augmented rows.
    async fn get_members_for_board(&self, board_id: &str) -> StoreResult<Vec<BoardMember>> {
        let mut augmented = Vec::new();
        for interceptor in &self.interceptors {
            match interceptor.members_for_board(&self.inner, board_id).await? {
                Interception::Pass => {}
                Interception::Augment(extra) => augmented.extend(extra),
                Interception::Replace(members) => {
                    debug!(board_id, interceptor = interceptor.name(), "board members replaced");
                    return Ok(members);
                }
            }
        }

        let mut members = self.inner.get_members_for_board(board_id).await?;
        members.extend(augmented);
        Ok(members)
    }

    async fn create_boards_and_blocks(
        &self,
        payload: BoardsAndBlocks,
        user_id: &str,
    ) -> StoreResult<BoardsAndBlocks> {
        self.inner.create_boards_and_blocks(payload, user_id).await
    }

    async fn create_boards_and_blocks_with_admin(
        &self,
        payload: BoardsAndBlocks,
        user_id: &str,
    ) -> StoreResult<(BoardsAndBlocks, Vec<BoardMember>)> {
        self.inner
            .create_boards_and_blocks_with_admin(payload, user_id)
            .await
    }

    async fn delete_boards_and_blocks(
        &self,
        payload: &DeleteBoardsAndBlocks,
        user_id: &str,
    ) -> StoreResult<()> {
        self.inner.delete_boards_and_blocks(payload, user_id).await
    }

    async fn get_used_cards_count(&self) -> StoreResult<u64> {
        self.inner.get_used_cards_count().await
    }

    async fn get_card_limit_timestamp(&self, card_limit: u64) -> StoreResult<i64> {
        self.inner.get_card_limit_timestamp(card_limit).await
    }

    async fn run_data_retention(&self, cutoff: i64, batch_size: usize) -> StoreResult<u64> {
        self.inner.run_data_retention(cutoff, batch_size).await
    }

    async fn create_category(&self, category: Category) -> StoreResult<Category> {
        self.inner.create_category(category).await
    }

    async fn get_category(&self, category_id: &str) -> StoreResult<Category> {
        self.inner.get_category(category_id).await
    }

    async fn update_category(&self, category: Category) -> StoreResult<Category> {
        self.inner.update_category(category).await
    }

    async fn delete_category(
        &self,
        category_id: &str,
        user_id: &str,
        team_id: &str,
    ) -> StoreResult<()> {
        self.inner
            .delete_category(category_id, user_id, team_id)
            .await
    }

    async fn get_user_categories(
        &self,
        user_id: &str,
        team_id: &str,
    ) -> StoreResult<Vec<Category>> {
        self.inner.get_user_categories(user_id, team_id).await
    }

    async fn get_user_category_boards(
        &self,
        user_id: &str,
        team_id: &str,
    ) -> StoreResult<Vec<CategoryBoards>> {
        self.inner.get_user_category_boards(user_id, team_id).await
    }

    async fn add_update_category_board(
        &self,
        user_id: &str,
        assignments: &BTreeMap<String, String>,
    ) -> StoreResult<()> {
        self.inner
            .add_update_category_board(user_id, assignments)
            .await
    }

    async fn reorder_categories(
        &self,
        user_id: &str,
        team_id: &str,
        category_ids: &[String],
    ) -> StoreResult<Vec<String>> {
        self.inner
            .reorder_categories(user_id, team_id, category_ids)
            .await
    }

    async fn reorder_category_boards(
        &self,
        user_id: &str,
        category_id: &str,
        board_ids: &[String],
    ) -> StoreResult<Vec<String>> {
        self.inner
            .reorder_category_boards(user_id, category_id, board_ids)
            .await
    }
}
