//! InMemoryDocumentStore - HashMap-backed document store for tests and local runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{AppError, AppResult};
use uuid::Uuid;

use super::store::{missing_target, Document, DocumentStore, Fields, WriteBatch, WriteOp};

type Namespaces = HashMap<String, BTreeMap<Uuid, Fields>>;

/// In-memory document store. Clone-friendly via Arc; clones share data.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    storage: Arc<RwLock<Namespaces>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a namespace.
    pub fn len(&self, namespace: &str) -> AppResult<usize> {
        let storage = self.storage.read().map_err(|_| poisoned())?;
        Ok(storage.get(namespace).map(BTreeMap::len).unwrap_or(0))
    }

    pub fn is_empty(&self, namespace: &str) -> AppResult<bool> {
        Ok(self.len(namespace)? == 0)
    }
}

fn poisoned() -> AppError {
    AppError::internal("document store lock poisoned")
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn fetch(&self, namespace: &str, id: Uuid) -> AppResult<Option<Document>> {
        let storage = self.storage.read().map_err(|_| poisoned())?;
        Ok(storage
            .get(namespace)
            .and_then(|documents| documents.get(&id))
            .map(|fields| Document::new(id, fields.clone())))
    }

    async fn scan(&self, namespace: &str) -> AppResult<Vec<Document>> {
        let storage = self.storage.read().map_err(|_| poisoned())?;
        Ok(storage
            .get(namespace)
            .map(|documents| {
                documents
                    .iter()
                    .map(|(id, fields)| Document::new(*id, fields.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn commit(&self, batch: WriteBatch) -> AppResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let required = batch.preconditions()?;

        let mut storage = self.storage.write().map_err(|_| poisoned())?;
        for (namespace, id) in &required {
            let exists = storage
                .get(namespace)
                .map(|documents| documents.contains_key(id))
                .unwrap_or(false);
            if !exists {
                return Err(missing_target(namespace, *id));
            }
        }

        // Preconditions hold, so every operation below applies
        for operation in batch.into_operations() {
            match operation {
                WriteOp::Create {
                    namespace,
                    document,
                } => {
                    storage
                        .entry(namespace)
                        .or_default()
                        .insert(document.id, document.fields);
                }
                WriteOp::Update {
                    namespace,
                    id,
                    fields,
                } => {
                    if let Some(existing) = storage
                        .get_mut(&namespace)
                        .and_then(|documents| documents.get_mut(&id))
                    {
                        existing.extend(fields);
                    }
                }
                WriteOp::Delete { namespace, id } => {
                    if let Some(documents) = storage.get_mut(&namespace) {
                        documents.remove(&id);
                    }
                }
            }
        }
        Ok(())
    }

    async fn ping(&self) -> AppResult<()> {
        self.storage.read().map_err(|_| poisoned())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(title: &str) -> Fields {
        let mut fields = Fields::new();
        fields.insert("title".to_string(), json!(title));
        fields
    }

    #[tokio::test]
    async fn test_commit_applies_in_order() {
        let store = InMemoryDocumentStore::new();
        let id = store.generate_id();

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::Create {
            namespace: "tasks".to_string(),
            document: Document::new(id, fields("draft")),
        });
        batch.push(WriteOp::Update {
            namespace: "tasks".to_string(),
            id,
            fields: fields("final"),
        });
        store.commit(batch).await.unwrap();

        let stored = store.fetch("tasks", id).await.unwrap().unwrap();
        assert_eq!(stored.fields["title"], json!("final"));
    }

    #[tokio::test]
    async fn test_failed_batch_writes_nothing() {
        let store = InMemoryDocumentStore::new();
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::Create {
            namespace: "tasks".to_string(),
            document: Document::new(Uuid::new_v4(), fields("kept?")),
        });
        batch.push(WriteOp::Delete {
            namespace: "tasks".to_string(),
            id: Uuid::new_v4(),
        });

        let result = store.commit(batch).await;
        assert!(matches!(result, Err(AppError::TransactionAborted(_))));
        assert!(store.is_empty("tasks").unwrap());
    }
}
