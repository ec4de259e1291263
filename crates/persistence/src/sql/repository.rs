//! Generic SeaORM repository driven by a [`SqlMapper`].

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use common::{AppError, AppResult};
use domain::{Entity, PagedResult, Query};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, TransactionTrait,
};
use uuid::Uuid;

use super::mapper::{FieldOf, SqlMapper};
use super::session::SqlSession;
use super::translator::{translate, SqlQuery};
use crate::identity::{parse_identity, require_identity, with_deadline};
use crate::repository::Repository;

pub struct SqlRepository<M: SqlMapper> {
    session: Arc<SqlSession>,
    _mapper: PhantomData<fn() -> M>,
}

impl<M: SqlMapper> SqlRepository<M> {
    pub(crate) fn new(session: Arc<SqlSession>) -> Self {
        Self {
            session,
            _mapper: PhantomData,
        }
    }

    fn namespace() -> &'static str {
        <M::Record as Entity>::NAMESPACE
    }
}

#[async_trait]
impl<M: SqlMapper> Repository<M::Record> for SqlRepository<M> {
    async fn add_many(&self, mut entities: Vec<M::Record>) -> AppResult<Vec<M::Record>> {
        if entities.is_empty() {
            return Ok(entities);
        }
        if entities.iter().any(|entity| !entity.identity().is_transient()) {
            return Err(AppError::invalid_argument(format!(
                "Cannot add an already persisted {} entity",
                Self::namespace()
            )));
        }

        let guard = self.session.open().await?;
        let outcome = match guard.transaction() {
            Ok(txn) => {
                with_deadline(self.session.timeout(), "insert", async {
                    for entity in entities.iter_mut() {
                        let id = Uuid::new_v4();
                        entity.identity_mut().assign(id.to_string())?;
                        insert_row::<M>(txn, entity, id).await?;
                    }
                    Ok::<_, AppError>(())
                })
                .await
            }
            Err(err) => Err(err),
        };
        let count = entities.len() as u64;
        guard.settle(outcome, count).await?;

        tracing::debug!(namespace = Self::namespace(), count, "Staged inserts");
        Ok(entities)
    }

    async fn get(&self, id: &str) -> AppResult<Option<M::Record>> {
        let id = parse_identity(id)?;
        let current = self.session.current().await;
        let timeout = self.session.timeout();
        match current.as_ref() {
            Some(txn) => with_deadline(timeout, "get", find_by_id::<M, _>(txn, id)).await,
            None => {
                with_deadline(timeout, "get", find_by_id::<M, _>(self.session.connection(), id)).await
            }
        }
    }

    async fn update_many(&self, entities: &[M::Record]) -> AppResult<()> {
        if entities.is_empty() {
            return Ok(());
        }
        let ids = entities
            .iter()
            .map(|entity| require_identity(entity))
            .collect::<AppResult<Vec<Uuid>>>()?;

        let guard = self.session.open().await?;
        let outcome = match guard.transaction() {
            Ok(txn) => {
                with_deadline(self.session.timeout(), "update", async {
                    for (entity, id) in entities.iter().zip(ids) {
                        update_row::<M>(txn, entity, id).await?;
                    }
                    Ok::<_, AppError>(())
                })
                .await
            }
            Err(err) => Err(err),
        };
        guard.settle(outcome, entities.len() as u64).await
    }

    async fn delete_many(&self, entities: &[M::Record]) -> AppResult<()> {
        if entities.is_empty() {
            return Ok(());
        }
        let ids = entities
            .iter()
            .map(|entity| require_identity(entity))
            .collect::<AppResult<Vec<Uuid>>>()?;

        let guard = self.session.open().await?;
        let outcome = match guard.transaction() {
            Ok(txn) => {
                with_deadline(self.session.timeout(), "delete", async {
                    for id in ids {
                        delete_row::<M>(txn, id).await?;
                    }
                    Ok::<_, AppError>(())
                })
                .await
            }
            Err(err) => Err(err),
        };
        guard.settle(outcome, entities.len() as u64).await
    }

    async fn get_all(&self) -> AppResult<Vec<M::Record>> {
        let native = translate::<M>(&Query::new())?;
        let current = self.session.current().await;
        let timeout = self.session.timeout();
        match current.as_ref() {
            Some(txn) => with_deadline(timeout, "scan", fetch_rows::<M, _>(txn, native)).await,
            None => {
                with_deadline(timeout, "scan", fetch_rows::<M, _>(self.session.connection(), native))
                    .await
            }
        }
    }

    async fn query(&self, query: &Query<FieldOf<M>>) -> AppResult<PagedResult<M::Record>> {
        let native = translate::<M>(query)?;
        let current = self.session.current().await;
        let timeout = self.session.timeout();
        let (items, total) = match current.as_ref() {
            Some(txn) => with_deadline(timeout, "query", fetch_page::<M, _>(txn, native)).await?,
            // Count and window must come from one snapshot
            None => {
                with_deadline(timeout, "query", async {
                    let read = self.session.connection().begin().await?;
                    let page = fetch_page::<M, _>(&read, native).await?;
                    read.commit().await?;
                    Ok::<_, AppError>(page)
                })
                .await?
            }
        };
        Ok(PagedResult::new(items, query.pagination, total))
    }
}

// ============================================================================
// Statements
// ============================================================================

async fn insert_row<M: SqlMapper>(
    txn: &DatabaseTransaction,
    record: &M::Record,
    id: Uuid,
) -> AppResult<()> {
    M::Entity::insert(M::to_active_model(record, id))
        .exec_without_returning(txn)
        .await?;
    M::write_related(txn, id, record).await
}

async fn update_row<M: SqlMapper>(
    txn: &DatabaseTransaction,
    record: &M::Record,
    id: Uuid,
) -> AppResult<()> {
    let result = M::Entity::update_many()
        .set(M::to_partial_active_model(record))
        .filter(M::id_column().eq(id))
        .exec(txn)
        .await?;
    if result.rows_affected == 0 {
        tracing::warn!(namespace = <M::Record as Entity>::NAMESPACE, %id, "Update target missing");
        return Err(AppError::NotFound);
    }
    M::write_related(txn, id, record).await
}

async fn delete_row<M: SqlMapper>(txn: &DatabaseTransaction, id: Uuid) -> AppResult<()> {
    M::delete_related(txn, id).await?;
    let result = M::Entity::delete_many()
        .filter(M::id_column().eq(id))
        .exec(txn)
        .await?;
    if result.rows_affected == 0 {
        tracing::warn!(namespace = <M::Record as Entity>::NAMESPACE, %id, "Delete target missing");
        return Err(AppError::NotFound);
    }
    Ok(())
}

async fn find_by_id<M: SqlMapper, C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> AppResult<Option<M::Record>> {
    let Some(model) = M::Entity::find()
        .filter(M::id_column().eq(id))
        .one(conn)
        .await?
    else {
        return Ok(None);
    };
    let mut records = vec![M::from_model(model)?];
    M::load_related(conn, &mut records).await?;
    Ok(records.pop())
}

async fn fetch_rows<M: SqlMapper, C: ConnectionTrait>(
    conn: &C,
    native: SqlQuery<M::Entity>,
) -> AppResult<Vec<M::Record>> {
    let mut select = M::Entity::find().filter(native.condition);
    for (column, order) in native.order {
        select = select.order_by(column, order);
    }
    if let Some(offset) = native.offset {
        select = select.offset(offset);
    }
    if let Some(limit) = native.limit {
        select = select.limit(limit);
    }

    let mut records = select
        .all(conn)
        .await?
        .into_iter()
        .map(M::from_model)
        .collect::<AppResult<Vec<_>>>()?;
    M::load_related(conn, &mut records).await?;
    Ok(records)
}

/// One page plus the total of the filtered set, ignoring the window.
async fn fetch_page<M: SqlMapper, C: ConnectionTrait>(
    conn: &C,
    native: SqlQuery<M::Entity>,
) -> AppResult<(Vec<M::Record>, u64)> {
    let total = M::Entity::find()
        .filter(native.condition.clone())
        .count(conn)
        .await?;
    let items = fetch_rows::<M, C>(conn, native).await?;
    Ok((items, total))
}
