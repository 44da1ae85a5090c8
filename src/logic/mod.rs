//! Progression logic: pairing, standings, round lifecycle, brackets, reverts, proposals.
//!
//! Every operation is a free function over an explicit [`Transaction`](crate::store::Transaction)
//! and an [`OpContext`]; nothing here holds state between calls.

pub mod double_elimination;
pub mod lifecycle;
pub mod pairing;
pub mod playoffs;
pub mod proposals;
pub mod revert;
pub mod routing;
pub mod standings;

pub use pairing::{generate_pairings, Pairing};
pub use routing::{BracketShape, Destination, Feed, Feeder};

use crate::config::EngineConfig;
use crate::notify::Notification;
use chrono::{DateTime, Utc};

/// Per-operation inputs plus the notifications it wants sent once it commits.
pub struct OpContext<'a> {
    pub config: &'a EngineConfig,
    pub now: DateTime<Utc>,
    events: Vec<Notification>,
}

impl<'a> OpContext<'a> {
    pub fn new(config: &'a EngineConfig, now: DateTime<Utc>) -> Self {
        Self {
            config,
            now,
            events: Vec::new(),
        }
    }

    pub fn emit(&mut self, notification: Notification) {
        self.events.push(notification);
    }

    pub fn into_events(self) -> Vec<Notification> {
        self.events
    }
}
