//! Round (matchday): matches created together plus their scheduling window.

use crate::models::stage::StageId;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a round.
pub type RoundId = Uuid;

/// Where a round is in its lifecycle. Derived, never stored.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    /// Matches are being played.
    Open,
    /// Every match is finished or forfeited.
    Complete,
    /// The next round has been generated from this one.
    Advanced,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub id: RoundId,
    pub stage_id: StageId,
    pub number: u32,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub complete: bool,
}

impl Round {
    pub fn new(stage_id: StageId, number: u32, window_start: DateTime<Utc>, window: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            stage_id,
            number,
            window_start,
            window_end: window_start.checked_add_signed(window).unwrap_or(DateTime::<Utc>::MAX_UTC),
            complete: false,
        }
    }

    /// Forfeits apply once the window has passed.
    pub fn window_elapsed(&self, now: DateTime<Utc>) -> bool {
        now >= self.window_end
    }

    pub fn phase(&self, current_round: u32) -> RoundPhase {
        if current_round > self.number {
            RoundPhase::Advanced
        } else if self.complete {
            RoundPhase::Complete
        } else {
            RoundPhase::Open
        }
    }
}
