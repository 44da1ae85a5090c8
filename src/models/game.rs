//! Match (game), its lifecycle state, and bracket classification.

use crate::models::bracket::{BracketId, NodeAddress, SlotPosition};
use crate::models::competitor::{CompetitorId, Entrant};
use crate::models::round::{Round, RoundId};
use crate::models::stage::StageId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a match.
pub type MatchId = Uuid;

/// Game line credited for a bye.
pub const BYE_SCORE: (u32, u32) = (2, 0);

/// Score line written to a match forfeited at the end of its window.
pub const FORFEIT_SCORE: (u32, u32) = (1, 1);

/// Lifecycle of a single match.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchState {
    /// At least one slot is still empty.
    #[default]
    PendingPairing,
    PendingSchedule,
    Scheduled,
    Ready,
    InProgress,
    Completed,
    Forfeited,
}

impl fmt::Display for MatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatchState::PendingPairing => "pending_pairing",
            MatchState::PendingSchedule => "pending_schedule",
            MatchState::Scheduled => "scheduled",
            MatchState::Ready => "ready",
            MatchState::InProgress => "in_progress",
            MatchState::Completed => "completed",
            MatchState::Forfeited => "forfeited",
        };
        f.write_str(s)
    }
}

/// Which part of an elimination bracket a match belongs to.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BracketSide {
    /// Swiss matches.
    #[default]
    None,
    Winners,
    Losers,
    GrandFinal,
}

impl fmt::Display for BracketSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BracketSide::None => "none",
            BracketSide::Winners => "winners",
            BracketSide::Losers => "losers",
            BracketSide::GrandFinal => "grand_final",
        };
        f.write_str(s)
    }
}

/// Rounds won by each slot on one map.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct MapResult {
    pub score_a: u32,
    pub score_b: u32,
}

/// A single match between two slots.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct GameMatch {
    pub id: MatchId,
    /// Set for Swiss matches.
    pub stage_id: Option<StageId>,
    pub round_id: Option<RoundId>,
    /// Set for elimination bracket nodes.
    pub bracket_id: Option<BracketId>,
    pub side: BracketSide,
    /// Stage-relative (Swiss) or side-relative (bracket) round number, from 1.
    pub round: u32,
    /// Position within the round, from 1. For bracket nodes this is the slot number.
    pub ordinal: u32,
    pub slot_a: Option<Entrant>,
    pub slot_b: Option<Entrant>,
    pub score_a: u32,
    pub score_b: u32,
    /// Per-map sub-scores, when reported.
    pub maps: Vec<MapResult>,
    pub best_of: u8,
    /// True for played, bye and forfeited matches alike.
    pub completed: bool,
    pub forfeited: bool,
    /// Winner was assigned by an admin rather than reported with scores.
    pub admin_override: bool,
    pub winner: Option<CompetitorId>,
    pub state: MatchState,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl GameMatch {
    fn blank(side: BracketSide, round: u32, ordinal: u32, best_of: u8) -> Self {
        Self {
            id: Uuid::new_v4(),
            stage_id: None,
            round_id: None,
            bracket_id: None,
            side,
            round,
            ordinal,
            slot_a: None,
            slot_b: None,
            score_a: 0,
            score_b: 0,
            maps: Vec::new(),
            best_of,
            completed: false,
            forfeited: false,
            admin_override: false,
            winner: None,
            state: MatchState::PendingPairing,
            scheduled_at: None,
            completed_at: None,
        }
    }

    /// A Swiss pairing waiting to be scheduled.
    pub fn swiss(round: &Round, ordinal: u32, a: CompetitorId, b: CompetitorId, best_of: u8) -> Self {
        Self {
            stage_id: Some(round.stage_id),
            round_id: Some(round.id),
            slot_a: Some(Entrant::Team(a)),
            slot_b: Some(Entrant::Team(b)),
            state: MatchState::PendingSchedule,
            ..Self::blank(BracketSide::None, round.number, ordinal, best_of)
        }
    }

    /// A bye: created already completed with a 2-0 line for `competitor`.
    pub fn bye(round: &Round, ordinal: u32, competitor: CompetitorId, now: DateTime<Utc>) -> Self {
        Self {
            stage_id: Some(round.stage_id),
            round_id: Some(round.id),
            slot_a: Some(Entrant::Team(competitor)),
            slot_b: Some(Entrant::Bye),
            score_a: BYE_SCORE.0,
            score_b: BYE_SCORE.1,
            completed: true,
            winner: Some(competitor),
            state: MatchState::Completed,
            completed_at: Some(now),
            ..Self::blank(BracketSide::None, round.number, ordinal, 1)
        }
    }

    /// An empty bracket node at `address`.
    pub fn bracket_node(bracket_id: BracketId, address: NodeAddress, best_of: u8) -> Self {
        Self {
            bracket_id: Some(bracket_id),
            ..Self::blank(address.side, address.round, address.slot, best_of)
        }
    }

    pub fn address(&self) -> NodeAddress {
        NodeAddress::new(self.side, self.round, self.ordinal)
    }

    pub fn team_a(&self) -> Option<CompetitorId> {
        self.slot_a.and_then(Entrant::team)
    }

    pub fn team_b(&self) -> Option<CompetitorId> {
        self.slot_b.and_then(Entrant::team)
    }

    pub fn slot(&self, position: SlotPosition) -> Option<Entrant> {
        match position {
            SlotPosition::A => self.slot_a,
            SlotPosition::B => self.slot_b,
        }
    }

    pub fn slot_mut(&mut self, position: SlotPosition) -> &mut Option<Entrant> {
        match position {
            SlotPosition::A => &mut self.slot_a,
            SlotPosition::B => &mut self.slot_b,
        }
    }

    /// Which slot `competitor` occupies, if any.
    pub fn position_of(&self, competitor: CompetitorId) -> Option<SlotPosition> {
        if self.team_a() == Some(competitor) {
            Some(SlotPosition::A)
        } else if self.team_b() == Some(competitor) {
            Some(SlotPosition::B)
        } else {
            None
        }
    }

    pub fn is_participant(&self, competitor: CompetitorId) -> bool {
        self.position_of(competitor).is_some()
    }

    pub fn is_bye(&self) -> bool {
        self.slot_a.is_some_and(Entrant::is_bye) || self.slot_b.is_some_and(Entrant::is_bye)
    }

    pub fn is_bracket_node(&self) -> bool {
        self.bracket_id.is_some()
    }

    /// Both slots hold a real competitor.
    pub fn has_both_competitors(&self) -> bool {
        self.team_a().is_some() && self.team_b().is_some()
    }

    pub fn loser(&self) -> Option<CompetitorId> {
        let winner = self.winner?;
        if self.team_a() == Some(winner) {
            self.team_b()
        } else {
            self.team_a()
        }
    }

    /// Record a played result. Callers validate the scores first.
    pub fn complete(&mut self, score_a: u32, score_b: u32, maps: Vec<MapResult>, now: DateTime<Utc>) {
        self.score_a = score_a;
        self.score_b = score_b;
        self.maps = maps;
        self.winner = if score_a > score_b { self.team_a() } else { self.team_b() };
        self.completed = true;
        self.state = MatchState::Completed;
        self.completed_at = Some(now);
    }

    /// Record an admin-assigned winner without scores.
    pub fn complete_by_override(&mut self, winner: CompetitorId, now: DateTime<Utc>) {
        self.winner = Some(winner);
        self.admin_override = true;
        self.completed = true;
        self.state = MatchState::Completed;
        self.completed_at = Some(now);
    }

    /// Force-complete as a 1-1 draw with no winner.
    pub fn forfeit(&mut self, now: DateTime<Utc>) {
        self.score_a = FORFEIT_SCORE.0;
        self.score_b = FORFEIT_SCORE.1;
        self.maps.clear();
        self.winner = None;
        self.completed = true;
        self.forfeited = true;
        self.state = MatchState::Forfeited;
        self.completed_at = Some(now);
    }

    /// Drop any result, returning the match to the state its slots allow.
    pub fn reset_result(&mut self) {
        self.score_a = 0;
        self.score_b = 0;
        self.maps.clear();
        self.winner = None;
        self.completed = false;
        self.forfeited = false;
        self.admin_override = false;
        self.completed_at = None;
        self.state = MatchState::PendingPairing;
        self.refresh_pairing_state();
    }

    /// Keep `state` in line with slot occupancy for a match without a result.
    pub fn refresh_pairing_state(&mut self) {
        if self.completed {
            return;
        }
        if !self.has_both_competitors() {
            self.state = MatchState::PendingPairing;
        } else if self.state == MatchState::PendingPairing {
            self.state = if self.scheduled_at.is_some() {
                MatchState::Scheduled
            } else {
                MatchState::PendingSchedule
            };
        }
    }
}
