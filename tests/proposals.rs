//! Integration tests for scheduling proposals.

use chrono::{Duration, Utc};
use tournament_progression::{
    Engine, EngineConfig, EngineError, GameMatch, MatchState, MemoryStore, ProposalStatus,
};
use uuid::Uuid;

fn setup() -> (Engine<MemoryStore>, GameMatch) {
    let engine = Engine::new(MemoryStore::new(), EngineConfig::default());
    let field: Vec<_> = (0..4).map(|_| Uuid::new_v4()).collect();
    let stage = engine.start_stage(&field, 2).unwrap();
    let game = engine.round_matches(stage.id, 1).unwrap().remove(0);
    (engine, game)
}

#[test]
fn second_proposal_cancels_only_the_proposers_first() {
    let (engine, game) = setup();
    let (x, y) = (game.team_a().unwrap(), game.team_b().unwrap());
    let when = Utc::now() + Duration::days(2);

    let theirs = engine.propose_schedule(game.id, y, when).unwrap();
    let first = engine.propose_schedule(game.id, x, when + Duration::hours(1)).unwrap();
    let second = engine.propose_schedule(game.id, x, when + Duration::hours(3)).unwrap();

    let all = engine.proposals(game.id).unwrap();
    let pending_from_x: Vec<_> = all.iter().filter(|p| p.proposer == x && p.is_pending()).collect();
    assert_eq!(pending_from_x.len(), 1);
    assert_eq!(pending_from_x[0].id, second.id);
    let status_of = |id: Uuid| all.iter().find(|p| p.id == id).map(|p| p.status);
    assert_eq!(status_of(first.id), Some(ProposalStatus::Cancelled));
    assert_eq!(status_of(theirs.id), Some(ProposalStatus::Pending));
}

#[test]
fn answered_proposals_cannot_be_answered_again() {
    let (engine, game) = setup();
    let (x, y) = (game.team_a().unwrap(), game.team_b().unwrap());
    let proposal = engine.propose_schedule(game.id, x, Utc::now()).unwrap();
    let rejected = engine.respond_to_proposal(proposal.id, y, false).unwrap();
    assert_eq!(rejected.status, ProposalStatus::Rejected);
    assert!(matches!(
        engine.respond_to_proposal(proposal.id, y, true),
        Err(EngineError::ProposalNotPending(_))
    ));
    assert!(engine.get_match(game.id).unwrap().scheduled_at.is_none());
}

#[test]
fn outsiders_cannot_propose_or_respond() {
    let (engine, game) = setup();
    let outsider = Uuid::new_v4();
    assert!(matches!(
        engine.propose_schedule(game.id, outsider, Utc::now()),
        Err(EngineError::NotAParticipant(_))
    ));
    let proposal = engine
        .propose_schedule(game.id, game.team_a().unwrap(), Utc::now())
        .unwrap();
    assert!(matches!(
        engine.respond_to_proposal(proposal.id, outsider, true),
        Err(EngineError::NotAParticipant(_))
    ));
}

#[test]
fn reverting_a_round_drops_its_proposals() {
    let engine = Engine::new(MemoryStore::new(), EngineConfig::default());
    let field: Vec<_> = (0..4).map(|_| Uuid::new_v4()).collect();
    let stage = engine.start_stage(&field, 3).unwrap();
    for m in engine.round_matches(stage.id, 1).unwrap() {
        engine.record_match_result(m.id, 2, 1, Vec::new()).unwrap();
    }
    engine.advance_round(stage.id).unwrap();
    let next = engine.round_matches(stage.id, 2).unwrap().remove(0);
    engine
        .propose_schedule(next.id, next.team_a().unwrap(), Utc::now())
        .unwrap();
    assert_eq!(engine.proposals(next.id).unwrap().len(), 1);

    engine.revert_to_round(stage.id, 1).unwrap();
    assert!(engine.proposals(next.id).unwrap().is_empty());
}

#[test]
fn started_matches_cannot_be_rescheduled() {
    let (engine, game) = setup();
    let (x, y) = (game.team_a().unwrap(), game.team_b().unwrap());
    let agreed = Utc::now() + Duration::days(1);
    let first = engine.propose_schedule(game.id, x, agreed).unwrap();
    engine.respond_to_proposal(first.id, y, true).unwrap();
    engine.transition_match(game.id, MatchState::Ready).unwrap();

    let late = engine.propose_schedule(game.id, x, agreed + Duration::days(1)).unwrap();
    assert!(matches!(
        engine.respond_to_proposal(late.id, y, true),
        Err(EngineError::InvalidTransition { .. })
    ));
    let game = engine.get_match(game.id).unwrap();
    assert_eq!(game.state, MatchState::Ready);
    assert_eq!(game.scheduled_at, Some(agreed));

    // Declining is still allowed.
    let declined = engine.respond_to_proposal(late.id, y, false).unwrap();
    assert_eq!(declined.status, ProposalStatus::Rejected);
}
