//! Generic repository contract.

use async_trait::async_trait;
use common::{AppError, AppResult};
use domain::{Entity, PagedResult, Query};

/// CRUD plus query over one entity type.
///
/// Mutations made through a unit of work are staged, not committed: the
/// entity returned by `add` carries its identity but is only durable after
/// `save_changes` succeeds. Reads never see another unit of work's staged
/// writes.
#[async_trait]
pub trait Repository<E: Entity>: Send + Sync {
    /// Assign identities and stage inserts. Entities must be transient.
    async fn add_many(&self, entities: Vec<E>) -> AppResult<Vec<E>>;

    /// Point lookup. A miss is `None`; a malformed id is `InvalidArgument`.
    async fn get(&self, id: &str) -> AppResult<Option<E>>;

    /// Stage a partial overwrite of each entity's settable fields.
    async fn update_many(&self, entities: &[E]) -> AppResult<()>;

    /// Stage hard deletes. Use-cases normally soft delete through `update`.
    async fn delete_many(&self, entities: &[E]) -> AppResult<()>;

    /// Unbounded scan. Only meant for small reference sets.
    async fn get_all(&self) -> AppResult<Vec<E>>;

    /// Filtered, sorted, paginated read with the filtered total.
    async fn query(&self, query: &Query<E::Field>) -> AppResult<PagedResult<E>>;

    async fn add(&self, entity: E) -> AppResult<E> {
        let mut added = self.add_many(vec![entity]).await?;
        added
            .pop()
            .ok_or_else(|| AppError::internal(format!("{} insert returned nothing", E::NAMESPACE)))
    }

    async fn update(&self, entity: &E) -> AppResult<()> {
        self.update_many(std::slice::from_ref(entity)).await
    }

    async fn delete(&self, entity: &E) -> AppResult<()> {
        self.delete_many(std::slice::from_ref(entity)).await
    }
}
