//! Base repository trait for database operations.

use crate::db::errors::Result;

/// Base repository trait providing common database operations.
///
/// A repository is a data access layer over one postgres table. Updates and deletes report the
/// number of rows they touched rather than failing when nothing matched.
#[async_trait::async_trait]
pub trait Repository {
    /// The request type for creating entities
    type CreateRequest;

    /// The request type for updating entities
    type UpdateRequest;

    /// The response/DTO type returned by operations
    type Response;

    /// The identifier type for lookups
    type Id: Send + Sync;

    /// Create a new entity
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response>;

    /// Get an entity by ID
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>>;

    /// List every entity
    async fn list(&mut self) -> Result<Vec<Self::Response>>;

    /// Update an entity by ID, returning the number of rows affected
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<u64>;

    /// Delete an entity by ID, returning the number of rows affected
    async fn delete(&mut self, id: Self::Id) -> Result<u64>;
}
