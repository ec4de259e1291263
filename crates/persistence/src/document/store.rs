//! Document store abstraction.
//!
//! A store keeps JSON field maps keyed by UUID inside namespaces. It offers
//! point reads, scans and atomic write batches, but no interactive
//! transactions.

use std::collections::HashSet;

use async_trait::async_trait;
use common::{AppError, AppResult};
use serde_json::Value;
use uuid::Uuid;

use super::filter::DocumentQuery;

pub type Fields = serde_json::Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: Uuid,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: Uuid, fields: Fields) -> Self {
        Self { id, fields }
    }
}

/// One staged write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Store a whole document under a new id
    Create { namespace: String, document: Document },
    /// Overwrite the given fields of an existing document
    Update {
        namespace: String,
        id: Uuid,
        fields: Fields,
    },
    Delete { namespace: String, id: Uuid },
}

impl WriteOp {
    pub fn namespace(&self) -> &str {
        match self {
            WriteOp::Create { namespace, .. }
            | WriteOp::Update { namespace, .. }
            | WriteOp::Delete { namespace, .. } => namespace,
        }
    }

    pub fn target(&self) -> Uuid {
        match self {
            WriteOp::Create { document, .. } => document.id,
            WriteOp::Update { id, .. } | WriteOp::Delete { id, .. } => *id,
        }
    }
}

/// Ordered writes applied all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    operations: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, operation: WriteOp) {
        self.operations.push(operation);
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn operations(&self) -> &[WriteOp] {
        &self.operations
    }

    pub fn into_operations(self) -> Vec<WriteOp> {
        self.operations
    }

    /// Documents that must already exist in the store for the batch to
    /// apply: update and delete targets not created earlier in the batch.
    /// Touching a document the batch itself deleted aborts the batch.
    pub fn preconditions(&self) -> AppResult<Vec<(String, Uuid)>> {
        let mut created = HashSet::new();
        let mut deleted = HashSet::new();
        let mut required = Vec::new();

        for operation in &self.operations {
            let key = (operation.namespace().to_string(), operation.target());
            match operation {
                WriteOp::Create { .. } => {
                    deleted.remove(&key);
                    created.insert(key);
                }
                WriteOp::Update { .. } | WriteOp::Delete { .. } => {
                    if deleted.contains(&key) {
                        return Err(AppError::transaction_aborted(format!(
                            "{}/{} was deleted earlier in the batch",
                            key.0, key.1
                        )));
                    }
                    if !created.contains(&key) && !required.contains(&key) {
                        required.push(key.clone());
                    }
                    if matches!(operation, WriteOp::Delete { .. }) {
                        created.remove(&key);
                        deleted.insert(key);
                    }
                }
            }
        }
        Ok(required)
    }
}

pub(crate) fn missing_target(namespace: &str, id: Uuid) -> AppError {
    AppError::transaction_aborted(format!("{}/{} does not exist", namespace, id))
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Mint an id for a new document.
    fn generate_id(&self) -> Uuid {
        Uuid::new_v4()
    }

    async fn fetch(&self, namespace: &str, id: Uuid) -> AppResult<Option<Document>>;

    async fn scan(&self, namespace: &str) -> AppResult<Vec<Document>>;

    /// Apply every operation or none. A missing update or delete target
    /// fails the whole batch with `TransactionAborted`.
    async fn commit(&self, batch: WriteBatch) -> AppResult<()>;

    async fn ping(&self) -> AppResult<()>;

    async fn find(&self, namespace: &str, query: &DocumentQuery) -> AppResult<Vec<Document>> {
        Ok(query.apply(self.scan(namespace).await?))
    }

    /// One window of matching documents plus the size of the whole
    /// matching set, both taken from the same scan.
    async fn find_page(
        &self,
        namespace: &str,
        query: &DocumentQuery,
    ) -> AppResult<(Vec<Document>, u64)> {
        Ok(query.apply_page(self.scan(namespace).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(namespace: &str, id: Uuid) -> WriteOp {
        WriteOp::Create {
            namespace: namespace.to_string(),
            document: Document::new(id, Fields::new()),
        }
    }

    #[test]
    fn test_preconditions_skip_documents_created_in_batch() {
        let fresh = Uuid::new_v4();
        let existing = Uuid::new_v4();
        let mut batch = WriteBatch::new();
        batch.push(create("tasks", fresh));
        batch.push(WriteOp::Update {
            namespace: "tasks".to_string(),
            id: fresh,
            fields: Fields::new(),
        });
        batch.push(WriteOp::Delete {
            namespace: "tasks".to_string(),
            id: existing,
        });

        assert_eq!(
            batch.preconditions().unwrap(),
            vec![("tasks".to_string(), existing)]
        );
    }

    #[test]
    fn test_update_after_delete_aborts() {
        let id = Uuid::new_v4();
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::Delete {
            namespace: "labels".to_string(),
            id,
        });
        batch.push(WriteOp::Update {
            namespace: "labels".to_string(),
            id,
            fields: Fields::new(),
        });
        assert!(matches!(
            batch.preconditions(),
            Err(AppError::TransactionAborted(_))
        ));
    }
}
