//! The repository contract shared by every backend

use std::future::Future;

use crate::entity::Entity;
use crate::error::Result;
use crate::query::QueryRequest;

/// Create/delete/query operations bound to one entity type and one table
pub trait BaseRepository<E: Entity>: Send + Sync {
    /// Insert `entity` unless a row with the same id exists
    ///
    /// Returns the number of rows inserted: 1, or 0 when the id was already
    /// taken. A conflict is not an error and the stored row is left untouched.
    fn set(&self, entity: &E) -> impl Future<Output = Result<u64>> + Send;

    /// Delete the row with this id, returning the number of rows removed
    ///
    /// Deleting an absent id returns 0 and no error.
    fn delete(&self, id: &str) -> impl Future<Output = Result<u64>> + Send;

    /// Return the entities matching every filter of `request`, in order
    ///
    /// An empty result is not an error.
    fn query(&self, request: &QueryRequest) -> impl Future<Output = Result<Vec<E>>> + Send;
}
