//! Elimination bracket aggregate and node addressing.

use crate::models::competitor::CompetitorId;
use crate::models::game::BracketSide;
use crate::models::stage::StageId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a bracket.
pub type BracketId = Uuid;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BracketFormat {
    DoubleElimination,
    /// Playoff bracket; its final is classified as the grand final.
    SingleElimination,
}

/// Which of a node's two slots.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotPosition {
    A,
    B,
}

impl SlotPosition {
    /// Odd slots feed position A of the merged node, even slots position B.
    pub fn by_parity(slot: u32) -> Self {
        if slot % 2 == 1 {
            SlotPosition::A
        } else {
            SlotPosition::B
        }
    }
}

/// Position of a node: side, round within that side, slot within the round (all from 1).
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct NodeAddress {
    pub side: BracketSide,
    pub round: u32,
    pub slot: u32,
}

impl NodeAddress {
    pub const fn new(side: BracketSide, round: u32, slot: u32) -> Self {
        Self { side, round, slot }
    }

    pub const fn grand_final() -> Self {
        Self::new(BracketSide::GrandFinal, 1, 1)
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} round {} slot {}", self.side, self.round, self.slot)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Bracket {
    pub id: BracketId,
    pub format: BracketFormat,
    pub size: u32,
    /// Entrants in bracket order (first-round slot 1 takes the first two, and so on).
    pub seeds: Vec<CompetitorId>,
    pub best_of: u8,
    /// Swiss stage this bracket was carved out of, if any.
    pub source_stage_id: Option<StageId>,
    pub champion: Option<CompetitorId>,
    pub created_at: DateTime<Utc>,
}

impl Bracket {
    pub fn new(
        format: BracketFormat,
        seeds: Vec<CompetitorId>,
        best_of: u8,
        source_stage_id: Option<StageId>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            format,
            size: seeds.len() as u32,
            seeds,
            best_of,
            source_stage_id,
            champion: None,
            created_at: now,
        }
    }
}
