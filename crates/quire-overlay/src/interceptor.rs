use async_trait::async_trait;

use quire_store::{Store, StoreResult};
use quire_types::{Block, BoardMember};

/// What an interceptor decided for one board-scoped read.
#[derive(Clone, Debug, PartialEq)]
pub enum Interception<T> {
    /// Not handled; the result is unchanged.
    Pass,
    /// Append these rows to the result.
    Augment(Vec<T>),
    /// Use these rows instead of the result and stop the chain.
    Replace(Vec<T>),
}

/// A link in the overlay's interceptor chain.
///
/// Interceptors see the inner store so they can consult board metadata.
/// Both hooks pass by default.
#[async_trait]
pub trait BoardReadInterceptor: Send + Sync {
    fn name(&self) -> &str;

    async fn blocks_for_board(
        &self,
        _store: &dyn Store,
        _board_id: &str,
    ) -> StoreResult<Interception<Block>> {
        Ok(Interception::Pass)
    }

    async fn members_for_board(
        &self,
        _store: &dyn Store,
        _board_id: &str,
    ) -> StoreResult<Interception<BoardMember>> {
        Ok(Interception::Pass)
    }
}
