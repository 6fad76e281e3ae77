use std::collections::{BTreeMap, HashMap};
use std::ops::RangeInclusive;

use quire_types::Block;

use crate::error::{StoreError, StoreResult};

/// Append-only arena of block versions.
///
/// Every write to a block appends one immutable row keyed by
/// `(id, update_at)`. A secondary index maps each id to the stamp of its
/// latest row, which is the block's current state. Rows are only ever
/// removed by [`HistoryLedger::purge`], which drops a block entirely.
#[derive(Debug, Default)]
pub struct HistoryLedger {
    rows: BTreeMap<(String, i64), Block>,
    latest: HashMap<String, i64>,
}

fn key_range(id: &str) -> RangeInclusive<(String, i64)> {
    (id.to_string(), i64::MIN)..=(id.to_string(), i64::MAX)
}

impl HistoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that a row for `id` stamped `update_at` could be appended.
    pub fn check_append(&self, id: &str, update_at: i64) -> StoreResult<()> {
        match self.latest.get(id) {
            Some(&last) if update_at <= last => Err(StoreError::HistoryConflict {
                block_id: id.to_string(),
                update_at,
            }),
            _ => Ok(()),
        }
    }

    /// Append a new version. Its stamp must be strictly newer than the
    /// block's latest row.
    pub fn append(&mut self, row: Block) -> StoreResult<&Block> {
        self.check_append(&row.id, row.update_at)?;
        let key = (row.id.clone(), row.update_at);
        if self.rows.contains_key(&key) {
            return Err(StoreError::HistoryConflict {
                block_id: row.id,
                update_at: row.update_at,
            });
        }

        self.latest.insert(row.id.clone(), row.update_at);
        Ok(&*self.rows.entry(key).or_insert(row))
    }

    /// The latest version of a block, deleted or not.
    pub fn current(&self, id: &str) -> Option<&Block> {
        let stamp = *self.latest.get(id)?;
        self.rows.get(&(id.to_string(), stamp))
    }

    /// The latest version of a block if it is not soft-deleted.
    pub fn live(&self, id: &str) -> Option<&Block> {
        self.current(id).filter(|b| !b.is_deleted())
    }

    /// All versions of one block, oldest first.
    pub fn versions<'a>(&'a self, id: &str) -> impl DoubleEndedIterator<Item = &'a Block> + 'a {
        self.rows.range(key_range(id)).map(|(_, row)| row)
    }

    /// The latest version of every block, in no particular order.
    pub fn current_rows(&self) -> impl Iterator<Item = &Block> + '_ {
        self.latest
            .iter()
            .filter_map(|(id, stamp)| self.rows.get(&(id.clone(), *stamp)))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.latest.contains_key(id)
    }

    /// Remove every version of a block. Returns the number of rows dropped.
    pub fn purge(&mut self, id: &str) -> usize {
        if self.latest.remove(id).is_none() {
            return 0;
        }
        let keys: Vec<_> = self.rows.range(key_range(id)).map(|(k, _)| k.clone()).collect();
        for key in &keys {
            self.rows.remove(key);
        }
        keys.len()
    }

    /// Number of distinct blocks with at least one version.
    pub fn block_count(&self) -> usize {
        self.latest.len()
    }

    /// Total number of version rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Validate one block's chain: keys agree with their rows, stamps
    /// strictly increase, and the latest index points at the final row.
    pub fn validate_chain(&self, id: &str) -> StoreResult<()> {
        let violation = |reason: String| StoreError::IntegrityViolation {
            block_id: id.to_string(),
            reason,
        };

        let mut previous: Option<i64> = None;
        for ((key_id, stamp), row) in self.rows.range(key_range(id)) {
            if row.id != *key_id || row.update_at != *stamp {
                return Err(violation(format!("row keyed at {stamp} does not match its key")));
            }
            if let Some(prev) = previous {
                if *stamp <= prev {
                    return Err(violation(format!("stamp {stamp} does not follow {prev}")));
                }
            }
            previous = Some(*stamp);
        }

        match (previous, self.latest.get(id)) {
            (None, None) => Ok(()),
            (Some(last), Some(&indexed)) if last == indexed => Ok(()),
            (last, indexed) => Err(violation(format!(
                "latest index {indexed:?} disagrees with final row {last:?}"
            ))),
        }
    }

    /// Validate every chain in the ledger.
    pub fn validate_all(&self) -> StoreResult<()> {
        let mut ids: Vec<&String> = self.latest.keys().collect();
        ids.sort();
        ids.into_iter().try_for_each(|id| self.validate_chain(id))?;

        let orphaned = self
            .rows
            .keys()
            .find(|(id, _)| !self.latest.contains_key(id));
        match orphaned {
            Some((id, stamp)) => Err(StoreError::IntegrityViolation {
                block_id: id.clone(),
                reason: format!("row at {stamp} has no latest index entry"),
            }),
            None => Ok(()),
        }
    }
}
