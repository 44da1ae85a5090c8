//! Transactional document store abstraction.
//!
//! The engine never talks to a database directly. It reads documents by id or by
//! field equality, stages writes in a [`Transaction`], and hands the resulting
//! [`WriteBatch`] to [`DocumentStore::commit_batch`], which applies it atomically
//! only if nothing the transaction read has changed in the meantime.

mod memory;
mod transaction;

pub use memory::MemoryStore;
pub use transaction::{run_transaction, Transaction};

use crate::models::{Bracket, EngineError, GameMatch, Round, ScheduleProposal, Stage, Standing};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Document collections, one per persisted entity.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Collection {
    Stages,
    Rounds,
    Matches,
    Standings,
    Brackets,
    Proposals,
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Collection::Stages => "stages",
            Collection::Rounds => "rounds",
            Collection::Matches => "matches",
            Collection::Standings => "standings",
            Collection::Brackets => "brackets",
            Collection::Proposals => "proposals",
        };
        f.write_str(s)
    }
}

/// Address of one document.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct DocKey {
    pub collection: Collection,
    pub id: Uuid,
}

impl DocKey {
    pub fn new(collection: Collection, id: Uuid) -> Self {
        Self { collection, id }
    }
}

impl fmt::Display for DocKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// A stored document with the version it was last written at.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub id: Uuid,
    pub version: u64,
    pub data: Value,
}

/// One staged write.
#[derive(Clone, Debug, PartialEq)]
pub enum WriteOp {
    Set { key: DocKey, data: Value },
    Delete { key: DocKey },
}

/// Optimistic check evaluated at commit time.
#[derive(Clone, Debug, PartialEq)]
pub enum Precondition {
    /// Document must still be at this version (`None`: must still be absent).
    Document { key: DocKey, version: Option<u64> },
    /// No document in the collection may have been written since this version.
    Collection { collection: Collection, version: u64 },
}

/// Writes committed together or not at all.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WriteBatch {
    pub preconditions: Vec<Precondition>,
    pub ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<T: Entity>(&mut self, entity: &T) -> Result<&mut Self, EngineError> {
        self.ops.push(WriteOp::Set {
            key: DocKey::new(T::COLLECTION, entity.id()),
            data: serde_json::to_value(entity)?,
        });
        Ok(self)
    }

    pub fn delete<T: Entity>(&mut self, id: Uuid) -> &mut Self {
        self.ops.push(WriteOp::Delete {
            key: DocKey::new(T::COLLECTION, id),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Backing store operations. Implementations must apply a batch atomically.
pub trait DocumentStore: Send + Sync {
    fn get(&self, collection: Collection, id: Uuid) -> Result<Option<Document>, EngineError>;

    /// Every document in `collection` whose top-level `field` equals `value`.
    fn query(&self, collection: Collection, field: &str, value: &Value) -> Result<Vec<Document>, EngineError>;

    /// Version of the latest write to `collection` (0 when never written).
    fn collection_version(&self, collection: Collection) -> Result<u64, EngineError>;

    /// Apply `batch` if all its preconditions hold, else fail with a concurrency conflict.
    fn commit_batch(&self, batch: WriteBatch) -> Result<(), EngineError>;
}

/// A typed entity persisted as a JSON document.
pub trait Entity: Serialize + DeserializeOwned {
    const COLLECTION: Collection;
    const NAME: &'static str;

    fn id(&self) -> Uuid;
}

impl Entity for Stage {
    const COLLECTION: Collection = Collection::Stages;
    const NAME: &'static str = "stage";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Entity for Round {
    const COLLECTION: Collection = Collection::Rounds;
    const NAME: &'static str = "round";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Entity for GameMatch {
    const COLLECTION: Collection = Collection::Matches;
    const NAME: &'static str = "match";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Entity for Standing {
    const COLLECTION: Collection = Collection::Standings;
    const NAME: &'static str = "standing";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Entity for Bracket {
    const COLLECTION: Collection = Collection::Brackets;
    const NAME: &'static str = "bracket";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Entity for ScheduleProposal {
    const COLLECTION: Collection = Collection::Proposals;
    const NAME: &'static str = "proposal";

    fn id(&self) -> Uuid {
        self.id
    }
}
