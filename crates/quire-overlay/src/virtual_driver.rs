use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use quire_store::{Store, StoreError, StoreResult};
use quire_types::{is_board_id, Block, BoardMember};

use crate::driver::Driver;
use crate::interceptor::{BoardReadInterceptor, Interception};
use crate::registry::DriverRegistry;

/// Routes reads of virtual boards to the driver named by the board.
///
/// Resolution per board id:
/// 1. Ids that cannot be board ids are never looked up.
/// 2. The board is fetched from the inner store; failures propagate.
/// 3. A board without a virtual driver is left to local storage.
/// 4. A driver name missing from the registry is a hard error.
///
/// Driver blocks are appended to the local ones. Driver members replace
/// the local ones and are reduced to viewer rights.
pub struct VirtualDriverInterceptor {
    registry: Arc<DriverRegistry>,
}

impl VirtualDriverInterceptor {
    pub fn new(registry: Arc<DriverRegistry>) -> Self {
        Self { registry }
    }

    async fn resolve(
        &self,
        store: &dyn Store,
        board_id: &str,
    ) -> StoreResult<Option<Arc<dyn Driver>>> {
        if !is_board_id(board_id) {
            return Ok(None);
        }
        let board = store.get_board(board_id).await?;
        if !board.is_virtual() {
            return Ok(None);
        }
        match self.registry.get(&board.virtual_driver) {
            Some(driver) => Ok(Some(driver)),
            None => Err(StoreError::DriverNotFound {
                board_id: board_id.to_string(),
                driver: board.virtual_driver,
            }),
        }
    }
}

#[async_trait]
impl BoardReadInterceptor for VirtualDriverInterceptor {
    fn name(&self) -> &str {
        "virtual-driver"
    }

    async fn blocks_for_board(
        &self,
        store: &dyn Store,
        board_id: &str,
    ) -> StoreResult<Interception<Block>> {
        match self.resolve(store, board_id).await? {
            None => Ok(Interception::Pass),
            Some(driver) => {
                let blocks = driver
                    .get_blocks_for_board(board_id)
                    .await
                    .map_err(|e| e.into_store_error(driver.name()))?;
                debug!(
                    board_id,
                    driver = driver.name(),
                    count = blocks.len(),
                    "driver blocks fetched"
                );
                Ok(Interception::Augment(blocks))
            }
        }
    }

    async fn members_for_board(
        &self,
        store: &dyn Store,
        board_id: &str,
    ) -> StoreResult<Interception<BoardMember>> {
        match self.resolve(store, board_id).await? {
            None => Ok(Interception::Pass),
            Some(driver) => {
                let reported = driver
                    .get_members_for_board(board_id)
                    .await
                    .map_err(|e| e.into_store_error(driver.name()))?;

                let mut members = Vec::new();
                for member in reported {
                    members.push(member.normalized_for_driver());
                }
                debug!(
                    board_id,
                    driver = driver.name(),
                    count = members.len(),
                    "driver members fetched"
                );
                Ok(Interception::Replace(members))
            }
        }
    }
}
