//! Standing: one ranking record per competitor per stage.

use crate::models::competitor::{CompetitorId, Entrant};
use crate::models::stage::StageId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a standing document.
pub type StandingId = Uuid;

/// Ranking record. Mutated only by the standings calculator.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Standing {
    pub id: StandingId,
    pub stage_id: StageId,
    pub competitor: CompetitorId,
    /// Position in the stage's initial competitor list; the stable base order for ranking.
    pub seed: u32,
    pub points: i64,
    pub match_wins: u32,
    pub match_losses: u32,
    /// Forfeited draws.
    pub match_draws: u32,
    pub game_wins: u32,
    pub game_losses: u32,
    pub rounds_won: u32,
    pub rounds_lost: u32,
    /// Everyone faced so far, byes included. Only used for rematch exclusion.
    pub opponents: Vec<Entrant>,
    /// Sum of the current points of every faced competitor.
    pub buchholz: i64,
}

impl Standing {
    /// Zeroed standing for a competitor entering a stage.
    pub fn new(stage_id: StageId, competitor: CompetitorId, seed: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            stage_id,
            competitor,
            seed,
            points: 0,
            match_wins: 0,
            match_losses: 0,
            match_draws: 0,
            game_wins: 0,
            game_losses: 0,
            rounds_won: 0,
            rounds_lost: 0,
            opponents: Vec::new(),
            buchholz: 0,
        }
    }

    /// Clear every accumulated field, keeping identity and seed.
    pub fn reset(&mut self) {
        *self = Self {
            id: self.id,
            ..Self::new(self.stage_id, self.competitor, self.seed)
        };
    }

    pub fn round_differential(&self) -> i64 {
        i64::from(self.rounds_won) - i64::from(self.rounds_lost)
    }

    pub fn has_faced(&self, other: CompetitorId) -> bool {
        self.opponents.contains(&Entrant::Team(other))
    }

    pub fn had_bye(&self) -> bool {
        self.opponents.iter().any(|o| o.is_bye())
    }

    pub fn matches_played(&self) -> usize {
        self.opponents.len()
    }
}
