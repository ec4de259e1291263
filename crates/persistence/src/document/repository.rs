//! Generic document repository driven by a [`DocumentMapper`].
//!
//! Writes are staged into the session's batch; reads always go to the
//! store, so they never see staged writes.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use common::{AppError, AppResult};
use domain::{Entity, PagedResult, Query};

use super::mapper::DocumentMapper;
use super::session::DocumentSession;
use super::store::{Document, WriteOp};
use super::translator::translate;
use crate::identity::{parse_identity, require_identity, with_deadline};
use crate::repository::Repository;

pub struct DocumentRepository<M: DocumentMapper> {
    session: Arc<DocumentSession>,
    _mapper: PhantomData<fn() -> M>,
}

impl<M: DocumentMapper> DocumentRepository<M> {
    pub(crate) fn new(session: Arc<DocumentSession>) -> Self {
        Self {
            session,
            _mapper: PhantomData,
        }
    }

    fn namespace() -> &'static str {
        <M::Record as Entity>::NAMESPACE
    }

    fn decode(documents: Vec<Document>) -> AppResult<Vec<M::Record>> {
        documents.into_iter().map(M::from_document).collect()
    }
}

#[async_trait]
impl<M: DocumentMapper> Repository<M::Record> for DocumentRepository<M> {
    async fn add_many(&self, mut entities: Vec<M::Record>) -> AppResult<Vec<M::Record>> {
        if entities.iter().any(|entity| !entity.identity().is_transient()) {
            return Err(AppError::invalid_argument(format!(
                "Cannot add an already persisted {} entity",
                Self::namespace()
            )));
        }

        let mut operations = Vec::with_capacity(entities.len());
        for entity in entities.iter_mut() {
            let id = self.session.store().generate_id();
            entity.identity_mut().assign(id.to_string())?;
            operations.push(WriteOp::Create {
                namespace: Self::namespace().to_string(),
                document: Document::new(id, M::to_document(entity)),
            });
        }
        self.session.stage(operations).await;

        tracing::debug!(namespace = Self::namespace(), count = entities.len(), "Staged inserts");
        Ok(entities)
    }

    async fn get(&self, id: &str) -> AppResult<Option<M::Record>> {
        let id = parse_identity(id)?;
        let found = with_deadline(
            self.session.timeout(),
            "get",
            self.session.store().fetch(Self::namespace(), id),
        )
        .await?;
        found.map(M::from_document).transpose()
    }

    async fn update_many(&self, entities: &[M::Record]) -> AppResult<()> {
        let operations = entities
            .iter()
            .map(|entity| -> AppResult<WriteOp> {
                Ok(WriteOp::Update {
                    namespace: Self::namespace().to_string(),
                    id: require_identity(entity)?,
                    fields: M::to_partial_document(entity),
                })
            })
            .collect::<AppResult<Vec<_>>>()?;
        self.session.stage(operations).await;
        Ok(())
    }

    async fn delete_many(&self, entities: &[M::Record]) -> AppResult<()> {
        let operations = entities
            .iter()
            .map(|entity| -> AppResult<WriteOp> {
                Ok(WriteOp::Delete {
                    namespace: Self::namespace().to_string(),
                    id: require_identity(entity)?,
                })
            })
            .collect::<AppResult<Vec<_>>>()?;
        self.session.stage(operations).await;
        Ok(())
    }

    async fn get_all(&self) -> AppResult<Vec<M::Record>> {
        let native = translate::<M::Record>(&Query::new())?;
        let documents = with_deadline(
            self.session.timeout(),
            "scan",
            self.session.store().find(Self::namespace(), &native),
        )
        .await?;
        Self::decode(documents)
    }

    async fn query(
        &self,
        query: &Query<<M::Record as Entity>::Field>,
    ) -> AppResult<PagedResult<M::Record>> {
        let native = translate::<M::Record>(query)?;
        let store = self.session.store();
        let (documents, total) = with_deadline(
            self.session.timeout(),
            "query",
            store.find_page(Self::namespace(), &native),
        )
        .await?;
        Ok(PagedResult::new(Self::decode(documents)?, query.pagination, total))
    }
}
