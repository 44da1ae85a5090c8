//! Fire-and-forget notifications, dispatched only after a transaction commits.

use crate::models::{BracketId, CompetitorId, MatchId, ProposalId, ProposalStatus, StageId};
use serde::Serialize;
use std::sync::Mutex;

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    RoundCreated {
        stage_id: StageId,
        round: u32,
        matches: Vec<MatchId>,
    },
    StageCompleted {
        stage_id: StageId,
    },
    MatchesForfeited {
        stage_id: StageId,
        round: u32,
        matches: Vec<MatchId>,
    },
    /// A bracket node now has both competitors and can be scheduled.
    MatchReady {
        match_id: MatchId,
    },
    ChampionDecided {
        bracket_id: BracketId,
        champion: CompetitorId,
    },
    ProposalChanged {
        proposal_id: ProposalId,
        match_id: MatchId,
        status: ProposalStatus,
    },
}

/// Delivery failures must be handled inside the implementation; they never reach the engine.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Writes every notification to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &Notification) {
        match serde_json::to_string(notification) {
            Ok(json) => log::info!("notification: {}", json),
            Err(e) => log::warn!("could not encode notification {:?}: {}", notification, e),
        }
    }
}

/// Keeps every notification in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<Notification> {
        match self.seen.lock() {
            Ok(mut seen) => std::mem::take(&mut *seen),
            Err(_) => Vec::new(),
        }
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: &Notification) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(notification.clone());
        }
    }
}
