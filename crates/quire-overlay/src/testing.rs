use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use quire_types::{Block, BoardMember};

use crate::driver::Driver;
use crate::error::{DriverError, DriverResult};

/// Driver that answers every board with fixed rows, or a fixed error.
pub struct StaticDriver {
    name: String,
    blocks: Vec<Block>,
    members: Vec<BoardMember>,
    failure: Option<DriverError>,
    calls: AtomicUsize,
}

impl StaticDriver {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            blocks: Vec::new(),
            members: Vec::new(),
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_blocks(mut self, blocks: Vec<Block>) -> Self {
        self.blocks = blocks;
        self
    }

    pub fn with_members(mut self, members: Vec<BoardMember>) -> Self {
        self.members = members;
        self
    }

    pub fn failing(mut self, error: DriverError) -> Self {
        self.failure = Some(error);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn answer<T: Clone>(&self, rows: &[T]) -> DriverResult<Vec<T>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(rows.to_vec()),
        }
    }
}

#[async_trait]
impl Driver for StaticDriver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_blocks_for_board(&self, _board_id: &str) -> DriverResult<Vec<Block>> {
        self.answer(&self.blocks)
    }

    async fn get_members_for_board(&self, _board_id: &str) -> DriverResult<Vec<BoardMember>> {
        self.answer(&self.members)
    }
}
