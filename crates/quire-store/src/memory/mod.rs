//! In-memory persistence engine.
//!
//! All state lives behind a single `RwLock`, so every operation (including
//! the bulk ones) is atomic with respect to concurrent readers. Stamps are
//! taken from a store-wide [`MillisClock`] while the write lock is held.

mod blocks;
mod boards;
mod cards;
mod categories;
mod retention;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tracing::debug;

use quire_types::{
    Block, BlockPatch, BlockPatchBatch, BlockType, Board, BoardMember, BoardsAndBlocks, Category,
    CategoryBoards, DeleteBoardsAndBlocks, MillisClock, QueryBlockHistoryOptions,
};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::history::HistoryLedger;
use crate::traits::Store;

/// `HashMap`/`BTreeMap`-backed [`Store`] for tests, local demos and embedding.
pub struct InMemoryStore {
    config: StoreConfig,
    inner: RwLock<StoreState>,
}

/// Placement of one board in one user's categories.
#[derive(Clone, Debug, PartialEq, Eq)]
struct CategoryAssignment {
    category_id: String,
    sort_order: i64,
}

#[derive(Debug, Default)]
struct StoreState {
    clock: MillisClock,
    history: HistoryLedger,
    /// parent id -> ids of blocks whose current version names it as parent.
    children: HashMap<String, BTreeSet<String>>,
    /// board id -> ids of blocks whose current version belongs to it.
    board_blocks: HashMap<String, BTreeSet<String>>,
    /// (board id, user id) -> membership.
    members: BTreeMap<(String, String), BoardMember>,
    categories: HashMap<String, Category>,
    /// (user id, board id) -> category placement.
    category_boards: BTreeMap<(String, String), CategoryAssignment>,
}

impl StoreState {
    /// Append a version to the ledger and move the block between the
    /// parent and board indexes if its placement changed.
    fn record(&mut self, row: Block) -> StoreResult<Block> {
        let previous = self
            .history
            .current(&row.id)
            .map(|b| (b.parent_id.clone(), b.board_id.clone()));

        let stored = self.history.append(row)?.clone();

        if let Some((parent_id, board_id)) = previous {
            if parent_id != stored.parent_id {
                remove_from(&mut self.children, &parent_id, &stored.id);
            }
            if board_id != stored.board_id {
                remove_from(&mut self.board_blocks, &board_id, &stored.id);
            }
        }
        if !stored.parent_id.is_empty() {
            self.children
                .entry(stored.parent_id.clone())
                .or_default()
                .insert(stored.id.clone());
        }
        self.board_blocks
            .entry(stored.board_id.clone())
            .or_default()
            .insert(stored.id.clone());

        Ok(stored)
    }

    /// Append a batch of staged versions. Every row is checked against the
    /// ledger before the first one is written.
    fn commit(&mut self, rows: Vec<Block>) -> StoreResult<Vec<Block>> {
        for row in &rows {
            self.history.check_append(&row.id, row.update_at)?;
        }
        rows.into_iter().map(|row| self.record(row)).collect()
    }

    /// Drop every trace of a block. Returns `true` if it existed.
    fn purge_block(&mut self, id: &str) -> bool {
        let Some(current) = self.history.current(id) else {
            return false;
        };
        let (parent_id, board_id) = (current.parent_id.clone(), current.board_id.clone());

        self.history.purge(id);
        remove_from(&mut self.children, &parent_id, id);
        remove_from(&mut self.board_blocks, &board_id, id);
        true
    }

    /// Live blocks with the given ids, in id order.
    fn live_blocks<'a>(&self, ids: impl IntoIterator<Item = &'a String>) -> Vec<Block> {
        ids.into_iter()
            .filter_map(|id| self.history.live(id))
            .cloned()
            .collect()
    }

    fn live_children(&self, parent_id: &str) -> Vec<Block> {
        self.children
            .get(parent_id)
            .map(|ids| self.live_blocks(ids))
            .unwrap_or_default()
    }

    /// Ids of every block indexed under a board, deleted ones included.
    fn board_block_ids(&self, board_id: &str) -> Vec<String> {
        self.board_blocks
            .get(board_id)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// The live board block with this id.
    fn live_board_block(&self, board_id: &str) -> Option<&Block> {
        self.history
            .live(board_id)
            .filter(|b| b.block_type == BlockType::Board)
    }
}

fn remove_from(index: &mut HashMap<String, BTreeSet<String>>, key: &str, id: &str) {
    if let Some(ids) = index.get_mut(key) {
        ids.remove(id);
        if ids.is_empty() {
            index.remove(key);
        }
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(StoreState::default()),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Number of distinct blocks with history, deleted ones included.
    pub fn block_count(&self) -> StoreResult<usize> {
        Ok(self.read()?.history.block_count())
    }

    /// Number of history rows across all blocks.
    pub fn history_row_count(&self) -> StoreResult<usize> {
        Ok(self.read()?.history.row_count())
    }

    /// Validate every version chain and the secondary indexes.
    pub fn validate_history(&self) -> StoreResult<()> {
        let state = self.read()?;
        state.history.validate_all()?;

        for (parent_id, ids) in &state.children {
            for id in ids {
                let indexed = state.history.current(id).map(|b| b.parent_id.as_str());
                if indexed != Some(parent_id.as_str()) {
                    return Err(StoreError::IntegrityViolation {
                        block_id: id.clone(),
                        reason: format!("stale parent index entry under {parent_id}"),
                    });
                }
            }
        }
        for (board_id, ids) in &state.board_blocks {
            for id in ids {
                let indexed = state.history.current(id).map(|b| b.board_id.as_str());
                if indexed != Some(board_id.as_str()) {
                    return Err(StoreError::IntegrityViolation {
                        block_id: id.clone(),
                        reason: format!("stale board index entry under {board_id}"),
                    });
                }
            }
        }
        Ok(())
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, StoreState>> {
        self.inner
            .read()
            .map_err(|_| StoreError::Internal("store read lock poisoned".into()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, StoreState>> {
        self.inner
            .write()
            .map_err(|_| StoreError::Internal("store write lock poisoned".into()))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert_block(&self, block: Block, modified_by: &str) -> StoreResult<Block> {
        block.validate(self.config.max_title_len)?;
        let mut state = self.write()?;
        let stored = state.insert_blocks(vec![block], modified_by)?;
        stored
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Internal("insert produced no row".into()))
    }

    async fn insert_blocks(
        &self,
        blocks: Vec<Block>,
        modified_by: &str,
    ) -> StoreResult<Vec<Block>> {
        for block in &blocks {
            block.validate(self.config.max_title_len)?;
        }
        let mut state = self.write()?;
        let stored = state.insert_blocks(blocks, modified_by)?;
        debug!(count = stored.len(), "blocks inserted");
        Ok(stored)
    }

    async fn patch_block(
        &self,
        block_id: &str,
        patch: &BlockPatch,
        modified_by: &str,
    ) -> StoreResult<Block> {
        let batch = BlockPatchBatch {
            block_ids: vec![block_id.to_string()],
            block_patches: vec![patch.clone()],
        };
        let mut state = self.write()?;
        let stored = state.patch_blocks(&batch, modified_by, self.config.max_title_len)?;
        stored
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Internal("patch produced no row".into()))
    }

    async fn patch_blocks(
        &self,
        batch: &BlockPatchBatch,
        modified_by: &str,
    ) -> StoreResult<Vec<Block>> {
        let mut state = self.write()?;
        state.patch_blocks(batch, modified_by, self.config.max_title_len)
    }

    async fn delete_block(&self, block_id: &str, modified_by: &str) -> StoreResult<()> {
        let mut state = self.write()?;
        state.delete_block(block_id, modified_by)
    }

    async fn undelete_block(&self, block_id: &str, modified_by: &str) -> StoreResult<Block> {
        let mut state = self.write()?;
        state.undelete_block(block_id, modified_by)
    }

    async fn get_block(&self, block_id: &str) -> StoreResult<Block> {
        let state = self.read()?;
        state
            .history
            .live(block_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("block", block_id))
    }

    async fn get_block_history(
        &self,
        block_id: &str,
        opts: QueryBlockHistoryOptions,
    ) -> StoreResult<Vec<Block>> {
        Ok(self.read()?.block_history(block_id, opts))
    }

    async fn get_block_history_descendants(
        &self,
        board_id: &str,
        opts: QueryBlockHistoryOptions,
    ) -> StoreResult<Vec<Block>> {
        Ok(self.read()?.board_history(board_id, opts))
    }

    async fn get_subtree2(&self, block_id: &str) -> StoreResult<Vec<Block>> {
        Ok(self.read()?.subtree(block_id, 1))
    }

    async fn get_subtree3(&self, block_id: &str) -> StoreResult<Vec<Block>> {
        Ok(self.read()?.subtree(block_id, 2))
    }

    async fn get_root_id(&self, block_id: &str) -> StoreResult<String> {
        let state = self.read()?;
        state
            .history
            .live(block_id)
            .map(|b| b.root_id.clone())
            .ok_or_else(|| StoreError::not_found("block", block_id))
    }

    async fn get_all_blocks(&self) -> StoreResult<Vec<Block>> {
        Ok(self.read()?.all_blocks())
    }

    async fn get_blocks_for_board(&self, board_id: &str) -> StoreResult<Vec<Block>> {
        Ok(self.read()?.blocks_for_board(board_id))
    }

    async fn get_blocks_with_parent(
        &self,
        board_id: &str,
        parent_id: &str,
    ) -> StoreResult<Vec<Block>> {
        let state = self.read()?;
        let mut blocks = state.live_children(parent_id);
        blocks.retain(|b| b.board_id == board_id);
        Ok(blocks)
    }

    async fn get_blocks_with_type(
        &self,
        board_id: &str,
        block_type: BlockType,
    ) -> StoreResult<Vec<Block>> {
        let mut blocks = self.read()?.blocks_for_board(board_id);
        blocks.retain(|b| b.block_type == block_type);
        Ok(blocks)
    }

    async fn insert_board(&self, board: Board, modified_by: &str) -> StoreResult<Board> {
        let block = boards::board_block(board, self.config.max_title_len)?;
        let mut state = self.write()?;
        let stored = state.insert_blocks(vec![block], modified_by)?;
        let block = stored
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Internal("insert produced no row".into()))?;
        Ok(Board::try_from(block)?)
    }

    async fn get_board(&self, board_id: &str) -> StoreResult<Board> {
        self.read()?.board(board_id)
    }

    async fn get_boards_for_team(&self, team_id: &str) -> StoreResult<Vec<Board>> {
        self.read()?.boards_for_team(team_id)
    }

    async fn delete_board(&self, board_id: &str, modified_by: &str) -> StoreResult<()> {
        let mut state = self.write()?;
        state.delete_board(board_id, modified_by)
    }

    async fn save_member(&self, member: BoardMember) -> StoreResult<BoardMember> {
        let mut state = self.write()?;
        state.save_member(member)
    }

    async fn delete_member(&self, board_id: &str, user_id: &str) -> StoreResult<()> {
        let mut state = self.write()?;
        state
            .members
            .remove(&(board_id.to_string(), user_id.to_string()));
        debug!(board_id, user_id, "member deleted");
        Ok(())
    }

    async fn get_member_for_board(
        &self,
        board_id: &str,
        user_id: &str,
    ) -> StoreResult<BoardMember> {
        let state = self.read()?;
        state
            .members
            .get(&(board_id.to_string(), user_id.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::not_found("member", format!("{board_id}/{user_id}")))
    }

    async fn get_members_for_board(&self, board_id: &str) -> StoreResult<Vec<BoardMember>> {
        Ok(self.read()?.members_for_board(board_id))
    }

    async fn create_boards_and_blocks(
        &self,
        payload: BoardsAndBlocks,
        user_id: &str,
    ) -> StoreResult<BoardsAndBlocks> {
        let staged = boards::stage_payload(payload, None, self.config.max_title_len)?;
        let mut state = self.write()?;
        let (created, _) = state.create_boards_and_blocks(staged, user_id)?;
        Ok(created)
    }

    async fn create_boards_and_blocks_with_admin(
        &self,
        payload: BoardsAndBlocks,
        user_id: &str,
    ) -> StoreResult<(BoardsAndBlocks, Vec<BoardMember>)> {
        let staged = boards::stage_payload(payload, Some(user_id), self.config.max_title_len)?;
        let mut state = self.write()?;
        state.create_boards_and_blocks(staged, user_id)
    }

    async fn delete_boards_and_blocks(
        &self,
        payload: &DeleteBoardsAndBlocks,
        user_id: &str,
    ) -> StoreResult<()> {
        let mut state = self.write()?;
        state.delete_boards_and_blocks(payload, user_id)
    }

    async fn get_used_cards_count(&self) -> StoreResult<u64> {
        Ok(self.read()?.counted_card_stamps().len() as u64)
    }

    async fn get_card_limit_timestamp(&self, card_limit: u64) -> StoreResult<i64> {
        Ok(self.read()?.card_limit_timestamp(card_limit))
    }

    async fn run_data_retention(&self, cutoff: i64, batch_size: usize) -> StoreResult<u64> {
        self.purge_expired(cutoff, batch_size)
    }

    async fn create_category(&self, category: Category) -> StoreResult<Category> {
        let mut state = self.write()?;
        state.create_category(category)
    }

    async fn get_category(&self, category_id: &str) -> StoreResult<Category> {
        let state = self.read()?;
        state
            .categories
            .get(category_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("category", category_id))
    }

    async fn update_category(&self, category: Category) -> StoreResult<Category> {
        let mut state = self.write()?;
        state.update_category(category)
    }

    async fn delete_category(
        &self,
        category_id: &str,
        user_id: &str,
        team_id: &str,
    ) -> StoreResult<()> {
        let mut state = self.write()?;
        state.delete_category(category_id, user_id, team_id)
    }

    async fn get_user_categories(
        &self,
        user_id: &str,
        team_id: &str,
    ) -> StoreResult<Vec<Category>> {
        Ok(self.read()?.user_categories(user_id, team_id))
    }

    async fn get_user_category_boards(
        &self,
        user_id: &str,
        team_id: &str,
    ) -> StoreResult<Vec<CategoryBoards>> {
        Ok(self.read()?.user_category_boards(user_id, team_id))
    }

    async fn add_update_category_board(
        &self,
        user_id: &str,
        assignments: &BTreeMap<String, String>,
    ) -> StoreResult<()> {
        let mut state = self.write()?;
        state.assign_category_boards(user_id, assignments)
    }

    async fn reorder_categories(
        &self,
        user_id: &str,
        team_id: &str,
        category_ids: &[String],
    ) -> StoreResult<Vec<String>> {
        let mut state = self.write()?;
        state.reorder_categories(user_id, team_id, category_ids)
    }

    async fn reorder_category_boards(
        &self,
        user_id: &str,
        category_id: &str,
        board_ids: &[String],
    ) -> StoreResult<Vec<String>> {
        let mut state = self.write()?;
        state.reorder_category_boards(user_id, category_id, board_ids)
    }
}
