//! Data structures for the progression engine: standings, matches, rounds, stages, brackets.

mod bracket;
mod competitor;
mod error;
mod game;
mod proposal;
mod round;
mod stage;
mod standing;

pub use bracket::{Bracket, BracketFormat, BracketId, NodeAddress, SlotPosition};
pub use competitor::{CompetitorId, Entrant};
pub use error::{EngineError, ErrorKind};
pub use game::{BracketSide, GameMatch, MapResult, MatchId, MatchState, BYE_SCORE, FORFEIT_SCORE};
pub use proposal::{ProposalId, ProposalStatus, ScheduleProposal};
pub use round::{Round, RoundId, RoundPhase};
pub use stage::{Stage, StageId};
pub use standing::{Standing, StandingId};
