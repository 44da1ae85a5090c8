//! In-memory document store guarded by a single `RwLock`.

use crate::models::EngineError;
use crate::store::{Collection, DocKey, Document, DocumentStore, Precondition, WriteBatch, WriteOp};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    docs: HashMap<DocKey, Document>,
    collection_versions: HashMap<Collection, u64>,
    /// Monotonic write counter; every applied op gets the next value.
    last_version: u64,
}

impl Inner {
    fn check(&self, precondition: &Precondition) -> Result<(), EngineError> {
        match precondition {
            Precondition::Document { key, version } => {
                let current = self.docs.get(key).map(|d| d.version);
                if current != *version {
                    return Err(EngineError::ConcurrencyConflict(key.to_string()));
                }
            }
            Precondition::Collection { collection, version } => {
                let current = self.collection_versions.get(collection).copied().unwrap_or(0);
                if current != *version {
                    return Err(EngineError::ConcurrencyConflict(collection.to_string()));
                }
            }
        }
        Ok(())
    }

    fn apply(&mut self, op: WriteOp) {
        self.last_version += 1;
        let version = self.last_version;
        let key = match op {
            WriteOp::Set { key, data } => {
                self.docs.insert(
                    key,
                    Document {
                        id: key.id,
                        version,
                        data,
                    },
                );
                key
            }
            WriteOp::Delete { key } => {
                self.docs.remove(&key);
                key
            }
        };
        self.collection_versions.insert(key.collection, version);
    }
}

/// Serializable in-process store: commits are applied under an exclusive lock.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently stored in `collection`.
    pub fn count(&self, collection: Collection) -> Result<usize, EngineError> {
        let inner = self.inner.read().map_err(|_| EngineError::LockPoisoned)?;
        Ok(inner.docs.keys().filter(|k| k.collection == collection).count())
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, collection: Collection, id: Uuid) -> Result<Option<Document>, EngineError> {
        let inner = self.inner.read().map_err(|_| EngineError::LockPoisoned)?;
        Ok(inner.docs.get(&DocKey::new(collection, id)).cloned())
    }

    fn query(&self, collection: Collection, field: &str, value: &Value) -> Result<Vec<Document>, EngineError> {
        let inner = self.inner.read().map_err(|_| EngineError::LockPoisoned)?;
        Ok(inner
            .docs
            .iter()
            .filter(|(key, doc)| key.collection == collection && doc.data.get(field) == Some(value))
            .map(|(_, doc)| doc.clone())
            .collect())
    }

    fn collection_version(&self, collection: Collection) -> Result<u64, EngineError> {
        let inner = self.inner.read().map_err(|_| EngineError::LockPoisoned)?;
        Ok(inner.collection_versions.get(&collection).copied().unwrap_or(0))
    }

    fn commit_batch(&self, batch: WriteBatch) -> Result<(), EngineError> {
        let mut inner = self.inner.write().map_err(|_| EngineError::LockPoisoned)?;
        for precondition in &batch.preconditions {
            inner.check(precondition)?;
        }
        let ops = batch.ops.len();
        for op in batch.ops {
            inner.apply(op);
        }
        log::trace!("committed batch of {} write(s)", ops);
        Ok(())
    }
}
