//! Explicit transaction handle: version-tracked reads, staged writes.

use crate::models::EngineError;
use crate::store::{Collection, DocKey, DocumentStore, Entity, Precondition, WriteBatch, WriteOp};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Reads see the transaction's own staged writes first, then the store.
pub struct Transaction<'s, S: DocumentStore + ?Sized> {
    store: &'s S,
    /// Version observed for every document read from the store.
    reads: HashMap<DocKey, Option<u64>>,
    /// Collection version observed before the first query on it.
    scans: HashMap<Collection, u64>,
    /// `None` stages a delete. Ordered so commits are reproducible.
    writes: BTreeMap<DocKey, Option<Value>>,
}

impl<'s, S: DocumentStore + ?Sized> Transaction<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            reads: HashMap::new(),
            scans: HashMap::new(),
            writes: BTreeMap::new(),
        }
    }

    pub fn get<T: Entity>(&mut self, id: Uuid) -> Result<Option<T>, EngineError> {
        let key = DocKey::new(T::COLLECTION, id);
        if let Some(staged) = self.writes.get(&key) {
            return match staged {
                Some(data) => Ok(Some(serde_json::from_value(data.clone())?)),
                None => Ok(None),
            };
        }
        let doc = self.store.get(T::COLLECTION, id)?;
        self.reads.entry(key).or_insert(doc.as_ref().map(|d| d.version));
        match doc {
            Some(doc) => Ok(Some(serde_json::from_value(doc.data)?)),
            None => Ok(None),
        }
    }

    /// Like [`get`](Self::get), failing with `NotFound` when absent.
    pub fn require<T: Entity>(&mut self, id: Uuid) -> Result<T, EngineError> {
        self.get(id)?.ok_or(EngineError::NotFound { entity: T::NAME, id })
    }

    /// Documents whose `field` equals `value`, in id order.
    pub fn query<T: Entity>(&mut self, field: &str, value: impl Serialize) -> Result<Vec<T>, EngineError> {
        let value = serde_json::to_value(value)?;
        let version = self.store.collection_version(T::COLLECTION)?;
        self.scans.entry(T::COLLECTION).or_insert(version);

        let mut found: BTreeMap<Uuid, Value> = BTreeMap::new();
        for doc in self.store.query(T::COLLECTION, field, &value)? {
            if !self.writes.contains_key(&DocKey::new(T::COLLECTION, doc.id)) {
                found.insert(doc.id, doc.data);
            }
        }
        for (key, staged) in &self.writes {
            if key.collection != T::COLLECTION {
                continue;
            }
            if let Some(data) = staged {
                if data.get(field) == Some(&value) {
                    found.insert(key.id, data.clone());
                }
            }
        }
        found
            .into_values()
            .map(|data| serde_json::from_value(data).map_err(EngineError::from))
            .collect()
    }

    pub fn set<T: Entity>(&mut self, entity: &T) -> Result<(), EngineError> {
        let key = DocKey::new(T::COLLECTION, entity.id());
        self.writes.insert(key, Some(serde_json::to_value(entity)?));
        Ok(())
    }

    pub fn delete<T: Entity>(&mut self, id: Uuid) {
        self.writes.insert(DocKey::new(T::COLLECTION, id), None);
    }

    pub fn has_writes(&self) -> bool {
        !self.writes.is_empty()
    }

    /// Turn the transaction into a batch guarded by everything it observed.
    pub fn into_batch(self) -> WriteBatch {
        let mut preconditions: Vec<Precondition> = self
            .reads
            .into_iter()
            .map(|(key, version)| Precondition::Document { key, version })
            .collect();
        preconditions.extend(
            self.scans
                .into_iter()
                .map(|(collection, version)| Precondition::Collection { collection, version }),
        );
        let ops = self
            .writes
            .into_iter()
            .map(|(key, data)| match data {
                Some(data) => WriteOp::Set { key, data },
                None => WriteOp::Delete { key },
            })
            .collect();
        WriteBatch { preconditions, ops }
    }
}

/// Run `f` against a fresh transaction and commit its writes atomically.
///
/// Any error from `f` discards every staged write. Read-only transactions never commit.
pub fn run_transaction<S, T, F>(store: &S, f: F) -> Result<T, EngineError>
where
    S: DocumentStore + ?Sized,
    F: FnOnce(&mut Transaction<'_, S>) -> Result<T, EngineError>,
{
    let mut tx = Transaction::new(store);
    let value = f(&mut tx)?;
    if tx.has_writes() {
        store.commit_batch(tx.into_batch())?;
    }
    Ok(value)
}
