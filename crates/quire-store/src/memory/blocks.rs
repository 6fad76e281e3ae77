use tracing::debug;

use quire_types::{Block, BlockPatchBatch, QueryBlockHistoryOptions};

use super::StoreState;
use crate::error::{StoreError, StoreResult};

impl StoreState {
    /// Stamp and write already-validated blocks as one unit.
    pub(super) fn insert_blocks(
        &mut self,
        blocks: Vec<Block>,
        modified_by: &str,
    ) -> StoreResult<Vec<Block>> {
        let mut staged: Vec<Block> = Vec::with_capacity(blocks.len());
        for mut block in blocks {
            let now = self.clock.tick();
            let origin = staged
                .iter()
                .rev()
                .find(|b| b.id == block.id)
                .or_else(|| self.history.current(&block.id))
                .map(|b| (b.create_at, b.created_by.clone()));

            match origin {
                Some((create_at, created_by)) => {
                    block.create_at = create_at;
                    block.created_by = created_by;
                }
                None => {
                    if block.create_at == 0 {
                        block.create_at = now;
                    }
                    if block.created_by.is_empty() {
                        block.created_by = modified_by.to_string();
                    }
                }
            }
            block.modified_by = modified_by.to_string();
            block.update_at = now;
            block.delete_at = 0;
            staged.push(block);
        }

        let stored = self.commit(staged)?;
        for block in &stored {
            debug!(block_id = %block.id, update_at = block.update_at, "block inserted");
        }
        Ok(stored)
    }

    /// Apply every patch of a batch, or none of them.
    pub(super) fn patch_blocks(
        &mut self,
        batch: &BlockPatchBatch,
        modified_by: &str,
        max_title_len: usize,
    ) -> StoreResult<Vec<Block>> {
        batch.validate()?;

        let mut staged: Vec<Block> = Vec::with_capacity(batch.block_ids.len());
        for (id, patch) in batch.block_ids.iter().zip(&batch.block_patches) {
            let mut block = match staged.iter().rev().find(|b| &b.id == id) {
                Some(pending) => pending.clone(),
                None => self
                    .history
                    .live(id)
                    .cloned()
                    .ok_or_else(|| StoreError::not_found("block", id.as_str()))?,
            };
            patch.apply(&mut block);
            block.validate(max_title_len)?;
            block.modified_by = modified_by.to_string();
            block.update_at = self.clock.tick();
            staged.push(block);
        }

        let stored = self.commit(staged)?;
        for block in &stored {
            debug!(block_id = %block.id, update_at = block.update_at, "block patched");
        }
        Ok(stored)
    }

    pub(super) fn delete_block(&mut self, id: &str, modified_by: &str) -> StoreResult<()> {
        let Some(current) = self.history.live(id) else {
            return Ok(());
        };
        let mut row = current.clone();
        let now = self.clock.tick();
        row.delete_at = now;
        row.update_at = now;
        row.modified_by = modified_by.to_string();

        self.record(row)?;
        debug!(block_id = id, delete_at = now, "block deleted");
        Ok(())
    }

    pub(super) fn undelete_block(&mut self, id: &str, modified_by: &str) -> StoreResult<Block> {
        let current = self
            .history
            .current(id)
            .ok_or_else(|| StoreError::not_found("block", id))?;
        if !current.is_deleted() {
            return Ok(current.clone());
        }

        let mut row = self
            .history
            .versions(id)
            .rev()
            .find(|b| !b.is_deleted())
            .cloned()
            .ok_or_else(|| StoreError::not_found("block", id))?;
        row.delete_at = 0;
        row.update_at = self.clock.tick();
        row.modified_by = modified_by.to_string();

        let stored = self.record(row)?;
        debug!(block_id = id, update_at = stored.update_at, "block undeleted");
        Ok(stored)
    }

    pub(super) fn block_history(&self, id: &str, opts: QueryBlockHistoryOptions) -> Vec<Block> {
        apply_history_options(self.history.versions(id).cloned().collect(), opts)
    }

    pub(super) fn board_history(
        &self,
        board_id: &str,
        opts: QueryBlockHistoryOptions,
    ) -> Vec<Block> {
        let mut rows: Vec<Block> = self
            .board_block_ids(board_id)
            .iter()
            .flat_map(|id| self.history.versions(id).cloned())
            .collect();
        rows.sort_by(|a, b| a.update_at.cmp(&b.update_at).then_with(|| a.id.cmp(&b.id)));
        apply_history_options(rows, opts)
    }

    /// A live block and its live descendants down to `depth` levels.
    pub(super) fn subtree(&self, id: &str, depth: usize) -> Vec<Block> {
        let Some(root) = self.history.live(id) else {
            return Vec::new();
        };

        let mut out = vec![root.clone()];
        let mut frontier = vec![root.id.clone()];
        for _ in 0..depth {
            let mut next = Vec::new();
            for parent_id in &frontier {
                for child in self.live_children(parent_id) {
                    next.push(child.id.clone());
                    out.push(child);
                }
            }
            frontier = next;
        }
        out
    }

    pub(super) fn all_blocks(&self) -> Vec<Block> {
        let mut blocks: Vec<Block> = self
            .history
            .current_rows()
            .filter(|b| !b.is_deleted())
            .cloned()
            .collect();
        blocks.sort_by(|a, b| a.id.cmp(&b.id));
        blocks
    }

    pub(super) fn blocks_for_board(&self, board_id: &str) -> Vec<Block> {
        let Some(ids) = self.board_blocks.get(board_id) else {
            return Vec::new();
        };
        self.live_blocks(ids.iter().filter(|id| id.as_str() != board_id))
    }
}

fn apply_history_options(mut rows: Vec<Block>, opts: QueryBlockHistoryOptions) -> Vec<Block> {
    if opts.descending {
        rows.reverse();
    }
    if opts.limit > 0 {
        rows.truncate(usize::try_from(opts.limit).unwrap_or(usize::MAX));
    }
    rows
}
