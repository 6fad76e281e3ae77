use std::collections::HashMap;

use tracing::info;

use quire_types::BlockType;

use super::{InMemoryStore, StoreState};
use crate::error::{StoreError, StoreResult};

impl StoreState {
    /// Blocks due for purging at `cutoff`.
    ///
    /// A board is due when the newest `update_at` among the board block and
    /// every block indexed under it is older than `cutoff`; all of those
    /// blocks are then due. Blocks whose board does not exist are due on
    /// their own `update_at`. Board blocks are listed last so that a board
    /// purged over several batches keeps its identity until its content is
    /// gone.
    fn expired_block_ids(&self, cutoff: i64) -> Vec<String> {
        let mut content = Vec::new();
        let mut boards = Vec::new();

        for (board_id, ids) in &self.board_blocks {
            if self.is_board(board_id) {
                if self.board_last_modified(board_id) < cutoff {
                    content.extend(ids.iter().filter(|id| *id != board_id).cloned());
                    boards.push(board_id.clone());
                }
            } else {
                content.extend(
                    ids.iter()
                        .filter(|id| {
                            self.history
                                .current(id)
                                .is_some_and(|b| b.update_at < cutoff)
                        })
                        .cloned(),
                );
            }
        }

        content.sort();
        boards.sort();
        content.extend(boards);
        content
    }

    fn is_board(&self, id: &str) -> bool {
        self.history
            .current(id)
            .is_some_and(|b| b.block_type == BlockType::Board)
    }

    fn board_last_modified(&self, board_id: &str) -> i64 {
        self.board_blocks
            .get(board_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.history.current(id))
            .map(|b| b.update_at)
            .max()
            .unwrap_or(i64::MIN)
    }

    /// Whether a planned block is still due. Writes that landed after the
    /// plan was taken keep the block, and its whole board, alive.
    fn still_expired(&self, id: &str, cutoff: i64, boards: &mut HashMap<String, bool>) -> bool {
        let Some(block) = self.history.current(id) else {
            return false;
        };
        if self.is_board(&block.board_id) {
            *boards
                .entry(block.board_id.clone())
                .or_insert_with(|| self.board_last_modified(&block.board_id) < cutoff)
        } else {
            block.update_at < cutoff
        }
    }

    /// Purge one batch of planned ids. Returns how many were purged.
    fn purge_batch(&mut self, ids: &[String], cutoff: i64) -> usize {
        let mut boards = HashMap::new();
        let mut purged = 0;
        for id in ids {
            if !self.still_expired(id, cutoff, &mut boards) {
                continue;
            }
            let was_board = self
                .history
                .current(id)
                .is_some_and(|b| b.block_type == BlockType::Board && b.board_id == b.id);
            if self.purge_block(id) {
                purged += 1;
                if was_board {
                    self.purge_board_relations(id);
                }
            }
        }
        purged
    }

    fn purge_board_relations(&mut self, board_id: &str) {
        self.members.retain(|(b, _), _| b != board_id);
        self.category_boards.retain(|(_, b), _| b != board_id);
    }
}

impl InMemoryStore {
    /// Batched hard-delete loop. The due set is computed once under the
    /// read lock; each batch then takes the write lock for at most
    /// `batch_size` ids, so readers and writers interleave with a long
    /// purge.
    pub(super) fn purge_expired(&self, cutoff: i64, batch_size: usize) -> StoreResult<u64> {
        if batch_size == 0 {
            return Err(StoreError::InvalidArgument(
                "retention batch size must be positive".into(),
            ));
        }

        let planned = self.read()?.expired_block_ids(cutoff);
        let mut total: u64 = 0;
        let mut batches = 0u32;
        for ids in planned.chunks(batch_size) {
            let purged = self.write()?.purge_batch(ids, cutoff);
            total += purged as u64;
            batches += 1;
            info!(cutoff, batch = batches, purged, total, "retention batch purged");
        }

        info!(cutoff, planned = planned.len(), batches, total, "data retention finished");
        Ok(total)
    }
}
