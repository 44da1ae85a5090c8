//! Engine error type and its classification.

use crate::models::competitor::CompetitorId;
use uuid::Uuid;

/// Broad category of an [`EngineError`]. Every category aborts the enclosing transaction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// Malformed input; nothing was mutated.
    Validation,
    /// Operation requested in the wrong state; nothing was mutated.
    Precondition,
    /// An internal invariant does not hold; the operation was aborted.
    Consistency,
    /// A competing writer won; retry the whole operation.
    ConcurrencyConflict,
}

/// Errors that can occur during engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },
    #[error("need at least {required} competitors (got {actual})")]
    NotEnoughCompetitors { required: usize, actual: usize },
    #[error("competitor {0} listed more than once")]
    DuplicateCompetitor(CompetitorId),
    #[error("competitor {0} does not take part in this match")]
    NotAParticipant(CompetitorId),
    #[error("round count must be at least 1")]
    InvalidRoundCount,
    #[error("round {requested} is out of range (stage is at round {current})")]
    InvalidRound { requested: u32, current: u32 },
    #[error("scores cannot both be zero")]
    ScoresBothZero,
    #[error("scores cannot be tied ({0}-{0})")]
    TiedScore(u32),
    #[error("map {index} has no rounds played")]
    EmptyMap { index: usize },
    #[error("playoff seeding needs exactly {expected} competitors (got {actual})")]
    WrongSeedCount { expected: usize, actual: usize },
    #[error("bracket size {0} is not a power of two of at least 4")]
    InvalidBracketSize(usize),
    #[error("{0} is not a valid position in this bracket")]
    InvalidBracketPosition(String),
    #[error("proposer and responder must be the two different competitors of the match")]
    SelfResponse,

    #[error("{remaining} match(es) in round {round} are not finished")]
    IncompleteMatches { round: u32, remaining: usize },
    #[error("match {0} already has a result")]
    MatchAlreadyCompleted(Uuid),
    #[error("match {0} has no result to revert")]
    MatchNotCompleted(Uuid),
    #[error("match {0} does not have two competitors assigned")]
    MatchNotReady(Uuid),
    #[error("match {id} cannot move from {from} to {to}")]
    InvalidTransition { id: Uuid, from: String, to: String },
    #[error("proposal {0} is no longer pending")]
    ProposalNotPending(Uuid),
    #[error("stage {0} is already complete")]
    StageComplete(Uuid),
    #[error("stage {0} is not complete")]
    StageNotComplete(Uuid),
    #[error("match {0} is not part of a bracket")]
    NotABracketMatch(Uuid),
    #[error("match {id} belongs to round {round}; revert the stage to that round instead")]
    NotInCurrentRound { id: Uuid, round: u32 },
    #[error("bye match {0} cannot be reverted on its own")]
    ByeMatch(Uuid),

    #[error("no legal pairing found: {0}")]
    NoLegalPairing(String),
    #[error("no standing for competitor {0}")]
    MissingStanding(CompetitorId),
    #[error("inconsistent state: {0}")]
    Inconsistent(String),
    #[error("stored document could not be decoded: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("store lock poisoned")]
    LockPoisoned,

    #[error("concurrent modification of {0}; retry the operation")]
    ConcurrencyConflict(String),
    #[error("stage {0} is busy with another advance or revert")]
    StageBusy(Uuid),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        use EngineError::*;
        match self {
            NotFound { .. }
            | NotEnoughCompetitors { .. }
            | DuplicateCompetitor(_)
            | NotAParticipant(_)
            | InvalidRoundCount
            | InvalidRound { .. }
            | ScoresBothZero
            | TiedScore(_)
            | EmptyMap { .. }
            | WrongSeedCount { .. }
            | InvalidBracketSize(_)
            | InvalidBracketPosition(_)
            | SelfResponse => ErrorKind::Validation,
            IncompleteMatches { .. }
            | MatchAlreadyCompleted(_)
            | MatchNotCompleted(_)
            | MatchNotReady(_)
            | InvalidTransition { .. }
            | ProposalNotPending(_)
            | StageComplete(_)
            | StageNotComplete(_)
            | NotABracketMatch(_)
            | NotInCurrentRound { .. }
            | ByeMatch(_) => ErrorKind::Precondition,
            NoLegalPairing(_)
            | MissingStanding(_)
            | Inconsistent(_)
            | Serialization(_)
            | LockPoisoned => ErrorKind::Consistency,
            ConcurrencyConflict(_) | StageBusy(_) => ErrorKind::ConcurrencyConflict,
        }
    }
}
