//! Redis document store.
//!
//! Layout per namespace:
//! - `{prefix}{namespace}:doc:{id}`: hash of field name to JSON-encoded value
//! - `{prefix}{namespace}:ids`: set of document ids
//!
//! Batches run as one MULTI/EXEC pipeline after an existence check of every
//! update and delete target. The check is not isolated from concurrent
//! writers.

use std::collections::HashMap;

use async_trait::async_trait;
use common::{AppError, AppResult, DocumentStoreConfig};
use redis::{aio::ConnectionManager, AsyncCommands, Client, RedisError};
use serde_json::Value;
use uuid::Uuid;

use super::store::{missing_target, Document, DocumentStore, Fields, WriteBatch, WriteOp};

#[derive(Clone)]
pub struct RedisDocumentStore {
    connection: ConnectionManager,
    key_prefix: String,
}

impl RedisDocumentStore {
    pub async fn connect(config: &DocumentStoreConfig) -> AppResult<Self> {
        let client = Client::open(config.url.as_str()).map_err(store_error)?;
        let connection = ConnectionManager::new(client).await.map_err(store_error)?;

        tracing::info!(prefix = %config.key_prefix, "Redis document store connected");

        Ok(Self {
            connection,
            key_prefix: config.key_prefix.clone(),
        })
    }

    fn document_key(&self, namespace: &str, id: Uuid) -> String {
        format!("{}{}:doc:{}", self.key_prefix, namespace, id)
    }

    fn index_key(&self, namespace: &str) -> String {
        format!("{}{}:ids", self.key_prefix, namespace)
    }
}

fn store_error(err: RedisError) -> AppError {
    tracing::error!("Redis error: {}", err);
    AppError::Store(err)
}

fn encode(fields: &Fields) -> AppResult<Vec<(String, String)>> {
    fields
        .iter()
        .map(|(name, value)| {
            serde_json::to_string(value)
                .map(|json| (name.clone(), json))
                .map_err(|e| AppError::internal(format!("Document serialization error: {}", e)))
        })
        .collect()
}

fn decode(namespace: &str, id: Uuid, raw: HashMap<String, String>) -> AppResult<Document> {
    let mut fields = Fields::new();
    for (name, json) in raw {
        let value: Value = serde_json::from_str(&json).map_err(|e| {
            AppError::corrupt_record(format!("{}/{} field {}: {}", namespace, id, name, e))
        })?;
        fields.insert(name, value);
    }
    Ok(Document::new(id, fields))
}

#[async_trait]
impl DocumentStore for RedisDocumentStore {
    async fn fetch(&self, namespace: &str, id: Uuid) -> AppResult<Option<Document>> {
        let mut conn = self.connection.clone();
        let raw: HashMap<String, String> = conn
            .hgetall(self.document_key(namespace, id))
            .await
            .map_err(store_error)?;

        if raw.is_empty() {
            return Ok(None);
        }
        decode(namespace, id, raw).map(Some)
    }

    async fn scan(&self, namespace: &str) -> AppResult<Vec<Document>> {
        let mut conn = self.connection.clone();
        let members: Vec<String> = conn
            .smembers(self.index_key(namespace))
            .await
            .map_err(store_error)?;
        if members.is_empty() {
            return Ok(Vec::new());
        }

        let ids = members
            .iter()
            .map(|raw| {
                Uuid::parse_str(raw).map_err(|_| {
                    AppError::corrupt_record(format!("{} index holds '{}'", namespace, raw))
                })
            })
            .collect::<AppResult<Vec<Uuid>>>()?;

        let mut pipe = redis::pipe();
        for id in &ids {
            pipe.hgetall(self.document_key(namespace, *id));
        }
        let rows: Vec<HashMap<String, String>> =
            pipe.query_async(&mut conn).await.map_err(store_error)?;

        ids.into_iter()
            .zip(rows)
            // An indexed id without a hash was deleted outside a batch
            .filter(|(_, raw)| !raw.is_empty())
            .map(|(id, raw)| decode(namespace, id, raw))
            .collect()
    }

    async fn commit(&self, batch: WriteBatch) -> AppResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let required = batch.preconditions()?;
        let mut conn = self.connection.clone();

        if !required.is_empty() {
            let mut check = redis::pipe();
            for (namespace, id) in &required {
                check.exists(self.document_key(namespace, *id));
            }
            let present: Vec<bool> = check.query_async(&mut conn).await.map_err(store_error)?;
            if let Some(((namespace, id), _)) =
                required.iter().zip(present).find(|(_, exists)| !exists)
            {
                return Err(missing_target(namespace, *id));
            }
        }

        let operations = batch.len();
        let mut pipe = redis::pipe();
        pipe.atomic();
        for operation in batch.into_operations() {
            match operation {
                WriteOp::Create {
                    namespace,
                    document,
                } => {
                    let key = self.document_key(&namespace, document.id);
                    pipe.del(&key).ignore();
                    if !document.fields.is_empty() {
                        pipe.cmd("HSET")
                            .arg(&key)
                            .arg(encode(&document.fields)?)
                            .ignore();
                    }
                    pipe.sadd(self.index_key(&namespace), document.id.to_string())
                        .ignore();
                }
                WriteOp::Update {
                    namespace,
                    id,
                    fields,
                } => {
                    if !fields.is_empty() {
                        pipe.cmd("HSET")
                            .arg(self.document_key(&namespace, id))
                            .arg(encode(&fields)?)
                            .ignore();
                    }
                }
                WriteOp::Delete { namespace, id } => {
                    pipe.del(self.document_key(&namespace, id)).ignore();
                    pipe.srem(self.index_key(&namespace), id.to_string())
                        .ignore();
                }
            }
        }

        let _: () = pipe.query_async(&mut conn).await.map_err(store_error)?;
        tracing::debug!(operations, "Redis batch committed");
        Ok(())
    }

    async fn ping(&self) -> AppResult<()> {
        let mut conn = self.connection.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(store_error)?;
        Ok(())
    }
}
