//! Integration tests for Swiss stages: pairing across rounds, byes, forfeits, reverts.

use chrono::{Duration, Utc};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::HashSet;
use std::sync::Arc;
use tournament_progression::{
    AdvanceOutcome, CompetitorId, Engine, EngineConfig, EngineError, ManualClock, MatchState,
    MemoryStore, Notification, RecordingNotifier, RoundPhase, StageId,
};
use uuid::Uuid;

fn field(n: usize) -> Vec<CompetitorId> {
    (0..n).map(|_| Uuid::new_v4()).collect()
}

fn engine() -> Engine<MemoryStore> {
    Engine::new(MemoryStore::new(), EngineConfig::default())
}

/// Report a random 2-1 result for every unfinished match of the current round.
fn play_current_round(engine: &Engine<MemoryStore>, stage_id: StageId, rng: &mut StdRng) {
    let stage = engine.get_stage(stage_id).unwrap();
    for m in engine.round_matches(stage_id, stage.current_round).unwrap() {
        if m.completed {
            continue;
        }
        let (a, b) = if rng.gen_bool(0.5) { (2, 1) } else { (1, 2) };
        engine.record_match_result(m.id, a, b, Vec::new()).unwrap();
    }
}

fn assert_no_rematches(engine: &Engine<MemoryStore>, stage_id: StageId) {
    let mut seen = HashSet::new();
    for m in engine.stage_matches(stage_id).unwrap() {
        if let (Some(a), Some(b)) = (m.team_a(), m.team_b()) {
            let pair = if a < b { (a, b) } else { (b, a) };
            assert!(seen.insert(pair), "rematch in round {}", m.round);
        }
    }
}

fn run_six_rounds(n: usize, seed: u64) {
    let engine = engine();
    let mut rng = StdRng::seed_from_u64(seed);
    let stage = engine.start_stage(&field(n), 6).unwrap();
    for round in 1..=6 {
        play_current_round(&engine, stage.id, &mut rng);
        let outcome = engine.advance_round(stage.id).unwrap();
        if round < 6 {
            assert!(matches!(outcome, AdvanceOutcome::Advanced { round: r, .. } if r == round + 1));
        } else {
            assert_eq!(outcome, AdvanceOutcome::StageCompleted);
        }
    }
    assert_no_rematches(&engine, stage.id);

    let standings = engine.standings(stage.id).unwrap();
    for s in &standings {
        assert_eq!(s.opponents.len(), 6, "every competitor has a result for every round");
        assert_eq!(s.matches_played(), 6);
    }
    let stage = engine.get_stage(stage.id).unwrap();
    assert!(stage.complete);
    assert!(!stage.active);
}

#[test]
fn six_rounds_without_rematches_for_eight() {
    run_six_rounds(8, 8);
}

#[test]
fn six_rounds_without_rematches_for_nine() {
    run_six_rounds(9, 9);
}

#[test]
fn six_rounds_without_rematches_for_sixteen() {
    run_six_rounds(16, 16);
}

/// Long stages on a large field still advance every round once rematch-free draws get scarce.
fn run_long_stage(n: usize, rounds: u32, seed: u64) {
    let engine = engine();
    let mut rng = StdRng::seed_from_u64(seed);
    let stage = engine.start_stage(&field(n), rounds).unwrap();
    for round in 1..=rounds {
        play_current_round(&engine, stage.id, &mut rng);
        let outcome = engine.advance_round(stage.id);
        assert!(outcome.is_ok(), "round {} did not advance: {:?}", round, outcome);
    }
    assert!(engine.get_stage(stage.id).unwrap().complete);
    assert_no_rematches(&engine, stage.id);
}

#[test]
fn thirty_two_competitors_advance_through_twenty_four_rounds() {
    run_long_stage(32, 24, 0);
}

#[test]
fn odd_large_fields_advance_through_twenty_rounds() {
    run_long_stage(31, 20, 1);
    run_long_stage(33, 20, 2);
}

#[test]
fn odd_field_bye_goes_to_lowest_ranked_without_one() {
    let engine = engine();
    let mut rng = StdRng::seed_from_u64(42);
    let players = field(9);
    let stage = engine.start_stage(&players, 6).unwrap();

    let mut byed = HashSet::new();
    let mut expected = players[8];
    for round in 1..=6 {
        let matches = engine.round_matches(stage.id, round).unwrap();
        let bye = matches.iter().filter(|m| m.is_bye()).max_by_key(|m| m.ordinal).unwrap();
        assert_eq!(bye.state, MatchState::Completed);
        assert_eq!(bye.winner, Some(expected), "round {}", round);
        assert!(byed.insert(expected), "second bye for the same competitor");

        play_current_round(&engine, stage.id, &mut rng);
        if round == 6 {
            break;
        }
        let ranked = engine.standings(stage.id).unwrap();
        expected = ranked.iter().rev().find(|s| !s.had_bye()).unwrap().competitor;
        engine.advance_round(stage.id).unwrap();
    }
}

#[test]
fn advancing_needs_every_match_finished() {
    let engine = engine();
    let stage = engine.start_stage(&field(4), 3).unwrap();
    let first = engine.round_matches(stage.id, 1).unwrap()[0].clone();
    engine.record_match_result(first.id, 2, 0, Vec::new()).unwrap();

    let status = engine.check_round_completion(stage.id).unwrap();
    assert!(!status.complete);
    assert_eq!(status.phase, RoundPhase::Open);
    assert_eq!(status.remaining, 1);
    assert!(matches!(
        engine.advance_round(stage.id),
        Err(EngineError::IncompleteMatches { round: 1, remaining: 1 })
    ));
    assert!(matches!(
        engine.record_match_result(first.id, 2, 1, Vec::new()),
        Err(EngineError::MatchAlreadyCompleted(_))
    ));
}

#[test]
fn elapsed_window_forfeits_before_advancing() {
    let start = Utc::now();
    let clock = Arc::new(ManualClock::new(start));
    let recorder = Arc::new(RecordingNotifier::new());
    let engine = engine().with_clock(clock.clone()).with_notifier(recorder.clone());
    let stage = engine.start_stage(&field(4), 3).unwrap();
    let round_one = engine.round_matches(stage.id, 1).unwrap();
    engine.record_match_result(round_one[0].id, 2, 1, Vec::new()).unwrap();

    clock.advance(Duration::hours(169));
    let outcome = engine.advance_round(stage.id).unwrap();
    assert!(matches!(outcome, AdvanceOutcome::Advanced { round: 2, .. }));

    let forfeited = engine.get_match(round_one[1].id).unwrap();
    assert!(forfeited.forfeited);
    assert_eq!(forfeited.state, MatchState::Forfeited);
    assert_eq!((forfeited.score_a, forfeited.score_b), (1, 1));
    assert_eq!(forfeited.winner, None);

    for s in engine.standings(stage.id).unwrap() {
        if forfeited.is_participant(s.competitor) {
            assert_eq!((s.points, s.match_draws, s.game_wins, s.rounds_won), (0, 1, 0, 0));
            assert_eq!(s.opponents.len(), 1);
        }
    }

    let events = recorder.take();
    assert!(events.iter().any(|e| matches!(
        e,
        Notification::MatchesForfeited { round: 1, matches, .. } if matches == &vec![forfeited.id]
    )));
    assert!(events
        .iter()
        .any(|e| matches!(e, Notification::RoundCreated { round: 2, .. })));
}

#[test]
fn next_window_starts_where_the_previous_ended() {
    let start = Utc::now();
    let clock = Arc::new(ManualClock::new(start));
    let engine = engine().with_clock(clock.clone());
    let mut rng = StdRng::seed_from_u64(1);
    let stage = engine.start_stage(&field(4), 2).unwrap();
    play_current_round(&engine, stage.id, &mut rng);
    clock.advance(Duration::hours(2));
    engine.advance_round(stage.id).unwrap();

    let second = engine.round_matches(stage.id, 2).unwrap();
    assert!(second.iter().all(|m| m.state == MatchState::PendingSchedule));
    // A round 2 match can only be forfeited once the second window (starting at the first
    // window's end, not at the advance) has elapsed.
    clock.set(start + Duration::hours(2 * 168 - 1));
    assert!(engine.check_round_completion(stage.id).unwrap().forfeited.is_empty());
    clock.set(start + Duration::hours(2 * 168));
    assert_eq!(engine.check_round_completion(stage.id).unwrap().forfeited.len(), 2);
}

#[test]
fn forfeit_sweep_covers_every_active_stage() {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let engine = engine().with_clock(clock.clone());
    let first = engine.start_stage(&field(4), 2).unwrap();
    let second = engine.start_stage(&field(6), 2).unwrap();
    assert!(engine.apply_due_forfeits().is_empty());

    clock.advance(Duration::days(8));
    let swept: HashSet<StageId> = engine.apply_due_forfeits().into_iter().map(|(id, _)| id).collect();
    assert_eq!(swept, HashSet::from([first.id, second.id]));
    let status = engine.check_round_completion(first.id).unwrap();
    assert!(status.complete);
    assert_eq!(status.phase, RoundPhase::Complete);
}

#[test]
fn final_round_closes_the_stage() {
    let engine = engine();
    let mut rng = StdRng::seed_from_u64(3);
    let stage = engine.start_stage(&field(4), 1).unwrap();
    play_current_round(&engine, stage.id, &mut rng);
    assert_eq!(engine.advance_round(stage.id).unwrap(), AdvanceOutcome::StageCompleted);
    assert!(matches!(engine.advance_round(stage.id), Err(EngineError::StageComplete(_))));
}

#[test]
fn recompute_agrees_with_incremental_standings() {
    let engine = engine();
    let mut rng = StdRng::seed_from_u64(5);
    let stage = engine.start_stage(&field(9), 4).unwrap();
    for _ in 0..3 {
        play_current_round(&engine, stage.id, &mut rng);
        engine.advance_round(stage.id).unwrap();
    }
    play_current_round(&engine, stage.id, &mut rng);

    let live = engine.standings(stage.id).unwrap();
    engine.revert_to_round(stage.id, 4).unwrap();
    let once = engine.standings(stage.id).unwrap();
    engine.revert_to_round(stage.id, 4).unwrap();
    let twice = engine.standings(stage.id).unwrap();
    assert_eq!(once, live);
    assert_eq!(twice, once);
}

#[test]
fn revert_to_round_two_restores_the_live_snapshot() {
    let engine = engine();
    let mut rng = StdRng::seed_from_u64(7);
    let stage = engine.start_stage(&field(9), 6).unwrap();

    play_current_round(&engine, stage.id, &mut rng);
    engine.advance_round(stage.id).unwrap();
    play_current_round(&engine, stage.id, &mut rng);
    let snapshot = engine.standings(stage.id).unwrap();

    for _ in 3..=5 {
        engine.advance_round(stage.id).unwrap();
        play_current_round(&engine, stage.id, &mut rng);
    }
    let early: Vec<Vec<u8>> = engine
        .stage_matches(stage.id)
        .unwrap()
        .iter()
        .filter(|m| m.round <= 2)
        .map(|m| serde_json::to_vec(m).unwrap())
        .collect();

    let report = engine.revert_to_round(stage.id, 2).unwrap();
    assert_eq!(report.rounds_deleted, vec![3, 4, 5]);

    let after: Vec<Vec<u8>> = engine
        .stage_matches(stage.id)
        .unwrap()
        .iter()
        .map(|m| serde_json::to_vec(m).unwrap())
        .collect();
    assert_eq!(after, early);
    assert_eq!(engine.standings(stage.id).unwrap(), snapshot);

    let stage = engine.get_stage(stage.id).unwrap();
    assert_eq!(stage.current_round, 2);
    assert_eq!(stage.round_ids.len(), 2);
    assert!(engine.round_matches(stage.id, 3).is_err());

    // The stage carries on from round 2 as if nothing happened.
    assert!(matches!(
        engine.advance_round(stage.id).unwrap(),
        AdvanceOutcome::Advanced { round: 3, .. }
    ));
    assert_no_rematches(&engine, stage.id);
}

#[test]
fn revert_round_out_of_range_is_rejected() {
    let engine = engine();
    let stage = engine.start_stage(&field(4), 3).unwrap();
    assert!(matches!(
        engine.revert_to_round(stage.id, 2),
        Err(EngineError::InvalidRound { requested: 2, current: 1 })
    ));
    assert!(matches!(
        engine.revert_to_round(stage.id, 0),
        Err(EngineError::InvalidRound { .. })
    ));
}

#[test]
fn single_match_revert_recomputes_standings() {
    let engine = engine();
    let mut rng = StdRng::seed_from_u64(11);
    let stage = engine.start_stage(&field(5), 3).unwrap();
    play_current_round(&engine, stage.id, &mut rng);
    let round_one = engine.round_matches(stage.id, 1).unwrap();
    engine.advance_round(stage.id).unwrap();

    let played = round_one.iter().find(|m| !m.is_bye()).unwrap();
    assert!(matches!(
        engine.revert_single_match(played.id),
        Err(EngineError::NotInCurrentRound { round: 1, .. })
    ));

    let current = engine.round_matches(stage.id, 2).unwrap();
    let bye = current.iter().find(|m| m.is_bye()).unwrap();
    assert!(matches!(engine.revert_single_match(bye.id), Err(EngineError::ByeMatch(_))));

    let before = engine.standings(stage.id).unwrap();
    let target = current.iter().find(|m| !m.is_bye()).unwrap();
    engine.record_match_result(target.id, 2, 0, Vec::new()).unwrap();
    assert!(matches!(
        engine.revert_single_match(current.iter().find(|m| !m.is_bye() && m.id != target.id).unwrap().id),
        Err(EngineError::MatchNotCompleted(_))
    ));
    let reverted = engine.revert_single_match(target.id).unwrap();
    assert_eq!(reverted.state, MatchState::PendingSchedule);
    assert!(!reverted.completed);
    assert_eq!(engine.standings(stage.id).unwrap(), before);
}

#[test]
fn invalid_scores_change_nothing() {
    let engine = engine();
    let stage = engine.start_stage(&field(2), 1).unwrap();
    let m = engine.round_matches(stage.id, 1).unwrap().remove(0);
    assert!(matches!(
        engine.record_match_result(m.id, 0, 0, Vec::new()),
        Err(EngineError::ScoresBothZero)
    ));
    assert!(matches!(
        engine.record_match_result(m.id, 1, 1, Vec::new()),
        Err(EngineError::TiedScore(1))
    ));
    assert!(!engine.get_match(m.id).unwrap().completed);
    assert!(engine.standings(stage.id).unwrap().iter().all(|s| s.points == 0));
}

#[test]
fn match_state_moves_forward_only() {
    let engine = engine();
    let stage = engine.start_stage(&field(2), 1).unwrap();
    let m = engine.round_matches(stage.id, 1).unwrap().remove(0);
    assert!(matches!(
        engine.transition_match(m.id, MatchState::Ready),
        Err(EngineError::InvalidTransition { .. })
    ));
    let a = m.team_a().unwrap();
    let b = m.team_b().unwrap();
    let proposal = engine.propose_schedule(m.id, a, Utc::now()).unwrap();
    engine.respond_to_proposal(proposal.id, b, true).unwrap();
    assert_eq!(engine.transition_match(m.id, MatchState::Ready).unwrap().state, MatchState::Ready);
    assert_eq!(
        engine.transition_match(m.id, MatchState::InProgress).unwrap().state,
        MatchState::InProgress
    );
    assert!(matches!(
        engine.transition_match(m.id, MatchState::Scheduled),
        Err(EngineError::InvalidTransition { .. })
    ));
    let done = engine.record_match_result(m.id, 2, 0, Vec::new()).unwrap();
    assert_eq!(done.winner, Some(a));
}
