//! Tournament progression engine: Swiss stages, standings, elimination brackets and reverts,
//! over a transactional document store.

pub mod clock;
pub mod config;
pub mod engine;
pub mod logic;
pub mod models;
pub mod notify;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use engine::Engine;
pub use logic::lifecycle::{AdvanceOutcome, RoundStatus};
pub use logic::revert::RevertReport;
pub use logic::{generate_pairings, Pairing};
pub use models::{
    Bracket, BracketFormat, BracketId, BracketSide, CompetitorId, EngineError, Entrant, ErrorKind,
    GameMatch, MapResult, MatchId, MatchState, NodeAddress, ProposalId, ProposalStatus, Round,
    RoundPhase, ScheduleProposal, SlotPosition, Stage, StageId, Standing,
};
pub use notify::{LogNotifier, Notification, Notifier, RecordingNotifier};
pub use store::{DocumentStore, MemoryStore};
