//! Competitor ids and match-slot entrants.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a competitor (team). The engine owns no other competitor data.
pub type CompetitorId = Uuid;

/// What can occupy a match slot or an opponent-history entry.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Entrant {
    Team(CompetitorId),
    /// Sentinel for "no opponent this round".
    Bye,
}

impl Entrant {
    pub fn team(self) -> Option<CompetitorId> {
        match self {
            Entrant::Team(id) => Some(id),
            Entrant::Bye => None,
        }
    }

    pub fn is_bye(self) -> bool {
        matches!(self, Entrant::Bye)
    }
}

impl From<CompetitorId> for Entrant {
    fn from(id: CompetitorId) -> Self {
        Entrant::Team(id)
    }
}
