//! Stage: the Swiss aggregate (round pointer, rounds, flags).

use crate::models::competitor::CompetitorId;
use crate::models::round::RoundId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a stage.
pub type StageId = Uuid;

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub id: StageId,
    /// Initial competitor list; index is the competitor's seed.
    pub competitors: Vec<CompetitorId>,
    /// Round currently being played, from 1.
    pub current_round: u32,
    pub total_rounds: u32,
    /// Rounds in creation order.
    pub round_ids: Vec<RoundId>,
    pub active: bool,
    pub complete: bool,
    pub created_at: DateTime<Utc>,
}

impl Stage {
    /// A fresh stage pointing at round 1.
    pub fn new(competitors: Vec<CompetitorId>, total_rounds: u32, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            competitors,
            current_round: 1,
            total_rounds,
            round_ids: Vec::new(),
            active: true,
            complete: false,
            created_at: now,
        }
    }

    pub fn is_final_round(&self) -> bool {
        self.current_round >= self.total_rounds
    }
}
