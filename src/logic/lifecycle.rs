//! Swiss round lifecycle: stage start, result recording, forfeits, completion, advance.

use crate::logic::pairing::{generate_pairings_with_budget, Pairing};
use crate::logic::{double_elimination, standings, OpContext};
use crate::models::{
    CompetitorId, EngineError, GameMatch, MapResult, MatchId, MatchState, Round, RoundPhase, Stage,
    StageId, Standing,
};
use crate::notify::Notification;
use crate::store::{DocumentStore, Transaction};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;

/// Result of [`check_round_completion`].
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct RoundStatus {
    pub round: u32,
    pub phase: RoundPhase,
    pub complete: bool,
    /// Matches neither completed nor forfeited.
    pub remaining: usize,
    /// Matches forfeited by this check.
    pub forfeited: Vec<MatchId>,
}

/// Result of [`advance_round`].
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AdvanceOutcome {
    /// The next round was paired.
    Advanced { round: u32, matches: Vec<MatchId> },
    /// The final planned round finished; the stage is closed.
    StageCompleted,
}

/// Every standing of a stage, in seed order.
pub fn load_standings<S: DocumentStore + ?Sized>(
    tx: &mut Transaction<'_, S>,
    stage_id: StageId,
) -> Result<Vec<Standing>, EngineError> {
    let mut found: Vec<Standing> = tx.query("stage_id", stage_id)?;
    found.sort_by_key(|s| s.seed);
    Ok(found)
}

/// Every match of a stage, in `(round, ordinal)` order.
pub fn load_stage_matches<S: DocumentStore + ?Sized>(
    tx: &mut Transaction<'_, S>,
    stage_id: StageId,
) -> Result<Vec<GameMatch>, EngineError> {
    let mut found: Vec<GameMatch> = tx.query("stage_id", stage_id)?;
    found.sort_by_key(|m| (m.round, m.ordinal));
    Ok(found)
}

/// Every round of a stage, in number order.
pub fn load_rounds<S: DocumentStore + ?Sized>(
    tx: &mut Transaction<'_, S>,
    stage_id: StageId,
) -> Result<Vec<Round>, EngineError> {
    let mut found: Vec<Round> = tx.query("stage_id", stage_id)?;
    found.sort_by_key(|r| r.number);
    Ok(found)
}

pub fn load_round<S: DocumentStore + ?Sized>(
    tx: &mut Transaction<'_, S>,
    stage: &Stage,
    number: u32,
) -> Result<Round, EngineError> {
    load_rounds(tx, stage.id)?
        .into_iter()
        .find(|r| r.number == number)
        .ok_or_else(|| EngineError::Inconsistent(format!("stage {} has no round {}", stage.id, number)))
}

pub fn load_round_matches<S: DocumentStore + ?Sized>(
    tx: &mut Transaction<'_, S>,
    round: &Round,
) -> Result<Vec<GameMatch>, EngineError> {
    let mut found: Vec<GameMatch> = tx.query("round_id", round.id)?;
    found.sort_by_key(|m| m.ordinal);
    Ok(found)
}

pub(crate) fn ensure_distinct(competitors: &[CompetitorId], required: usize) -> Result<(), EngineError> {
    if competitors.len() < required {
        return Err(EngineError::NotEnoughCompetitors {
            required,
            actual: competitors.len(),
        });
    }
    let mut seen = HashSet::new();
    for &c in competitors {
        if !seen.insert(c) {
            return Err(EngineError::DuplicateCompetitor(c));
        }
    }
    Ok(())
}

/// Create a Swiss stage: zeroed standings for every competitor and round 1.
pub fn start_stage<S: DocumentStore + ?Sized>(
    tx: &mut Transaction<'_, S>,
    ctx: &mut OpContext<'_>,
    competitors: &[CompetitorId],
    round_count: u32,
) -> Result<Stage, EngineError> {
    ensure_distinct(competitors, 2)?;
    if round_count == 0 {
        return Err(EngineError::InvalidRoundCount);
    }
    let mut stage = Stage::new(competitors.to_vec(), round_count, ctx.now);
    let mut table: Vec<Standing> = competitors
        .iter()
        .enumerate()
        .map(|(seed, &c)| Standing::new(stage.id, c, seed as u32))
        .collect();

    let start = ctx.now;
    create_round(tx, ctx, &mut stage, &mut table, 1, start)?;
    tx.set(&stage)?;
    log::info!(
        "started stage {} with {} competitors over {} rounds",
        stage.id,
        competitors.len(),
        round_count
    );
    Ok(stage)
}

/// Pair and persist round `number`. Byes are created completed and folded immediately.
fn create_round<S: DocumentStore + ?Sized>(
    tx: &mut Transaction<'_, S>,
    ctx: &mut OpContext<'_>,
    stage: &mut Stage,
    table: &mut [Standing],
    number: u32,
    window_start: DateTime<Utc>,
) -> Result<Round, EngineError> {
    let pairings = generate_pairings_with_budget(table, ctx.config.pairing_search_budget)?;
    let round = Round::new(stage.id, number, window_start, ctx.config.round_window());

    let mut created = Vec::with_capacity(pairings.len());
    for (i, pairing) in pairings.iter().enumerate() {
        let ordinal = i as u32 + 1;
        let game = match *pairing {
            Pairing::Match { a, b } => GameMatch::swiss(&round, ordinal, a, b, ctx.config.swiss_best_of),
            Pairing::Bye { competitor } => {
                let bye = GameMatch::bye(&round, ordinal, competitor, ctx.now);
                standings::apply_match(table, &bye)?;
                bye
            }
        };
        tx.set(&game)?;
        created.push(game.id);
    }
    standings::refresh_buchholz(table)?;
    for s in table.iter() {
        tx.set(s)?;
    }
    tx.set(&round)?;
    stage.round_ids.push(round.id);

    log::info!(
        "stage {}: round {} paired ({} matches, window ends {})",
        stage.id,
        number,
        created.len(),
        round.window_end
    );
    ctx.emit(Notification::RoundCreated {
        stage_id: stage.id,
        round: number,
        matches: created,
    });
    Ok(round)
}

fn validate_scores(score_a: u32, score_b: u32, maps: &[MapResult]) -> Result<(), EngineError> {
    if score_a == 0 && score_b == 0 {
        return Err(EngineError::ScoresBothZero);
    }
    if score_a == score_b {
        return Err(EngineError::TiedScore(score_a));
    }
    if let Some(index) = maps.iter().position(|m| m.score_a == 0 && m.score_b == 0) {
        return Err(EngineError::EmptyMap { index });
    }
    Ok(())
}

/// Record a played result and propagate it: standings for Swiss matches, routing for bracket nodes.
pub fn record_match_result<S: DocumentStore + ?Sized>(
    tx: &mut Transaction<'_, S>,
    ctx: &mut OpContext<'_>,
    match_id: MatchId,
    scores: (u32, u32),
    maps: Vec<MapResult>,
) -> Result<GameMatch, EngineError> {
    let mut game: GameMatch = tx.require(match_id)?;
    if game.completed {
        return Err(EngineError::MatchAlreadyCompleted(match_id));
    }
    if !game.has_both_competitors() {
        return Err(EngineError::MatchNotReady(match_id));
    }
    validate_scores(scores.0, scores.1, &maps)?;

    game.complete(scores.0, scores.1, maps, ctx.now);
    tx.set(&game)?;
    settle_completed(tx, ctx, &game)?;
    log::info!(
        "match {} finished {}-{} (winner {:?})",
        match_id,
        scores.0,
        scores.1,
        game.winner
    );
    Ok(game)
}

/// Push a freshly completed match into whatever depends on it.
pub(crate) fn settle_completed<S: DocumentStore + ?Sized>(
    tx: &mut Transaction<'_, S>,
    ctx: &mut OpContext<'_>,
    game: &GameMatch,
) -> Result<(), EngineError> {
    if let Some(bracket_id) = game.bracket_id {
        return double_elimination::route_completed(tx, ctx, bracket_id, game);
    }
    let stage_id = game
        .stage_id
        .ok_or_else(|| EngineError::Inconsistent(format!("match {} has neither stage nor bracket", game.id)))?;
    let mut table = load_standings(tx, stage_id)?;
    standings::apply_match(&mut table, game)?;
    standings::refresh_buchholz(&mut table)?;
    for s in &table {
        tx.set(s)?;
    }
    Ok(())
}

/// Force-complete every unfinished match of `round` as a forfeited draw, once its window has passed.
pub fn apply_forfeits<S: DocumentStore + ?Sized>(
    tx: &mut Transaction<'_, S>,
    ctx: &mut OpContext<'_>,
    round: &Round,
) -> Result<Vec<MatchId>, EngineError> {
    if !round.window_elapsed(ctx.now) {
        return Ok(Vec::new());
    }
    let mut pending: Vec<GameMatch> = load_round_matches(tx, round)?
        .into_iter()
        .filter(|m| !m.completed)
        .collect();
    if pending.is_empty() {
        return Ok(Vec::new());
    }

    let mut table = load_standings(tx, round.stage_id)?;
    let mut forfeited = Vec::with_capacity(pending.len());
    for game in &mut pending {
        game.forfeit(ctx.now);
        standings::apply_match(&mut table, game)?;
        tx.set(game)?;
        forfeited.push(game.id);
    }
    standings::refresh_buchholz(&mut table)?;
    for s in &table {
        tx.set(s)?;
    }
    log::warn!(
        "stage {}: round {} window closed at {}; forfeited {} match(es)",
        round.stage_id,
        round.number,
        round.window_end,
        forfeited.len()
    );
    ctx.emit(Notification::MatchesForfeited {
        stage_id: round.stage_id,
        round: round.number,
        matches: forfeited.clone(),
    });
    Ok(forfeited)
}

fn round_status<S: DocumentStore + ?Sized>(
    tx: &mut Transaction<'_, S>,
    ctx: &mut OpContext<'_>,
    stage: &Stage,
) -> Result<(Round, RoundStatus), EngineError> {
    let mut round = load_round(tx, stage, stage.current_round)?;
    let forfeited = apply_forfeits(tx, ctx, &round)?;
    let remaining = load_round_matches(tx, &round)?
        .iter()
        .filter(|m| !m.completed)
        .count();
    if remaining == 0 && !round.complete {
        round.complete = true;
        tx.set(&round)?;
        log::info!("stage {}: round {} complete", stage.id, round.number);
    }
    let status = RoundStatus {
        round: round.number,
        phase: round.phase(stage.current_round),
        complete: remaining == 0,
        remaining,
        forfeited,
    };
    Ok((round, status))
}

/// Apply due forfeits and mark the current round complete once nothing is left to play.
pub fn check_round_completion<S: DocumentStore + ?Sized>(
    tx: &mut Transaction<'_, S>,
    ctx: &mut OpContext<'_>,
    stage_id: StageId,
) -> Result<RoundStatus, EngineError> {
    let stage: Stage = tx.require(stage_id)?;
    let (_, status) = round_status(tx, ctx, &stage)?;
    Ok(status)
}

/// Close the current round and pair the next one, or close the stage after its last round.
pub fn advance_round<S: DocumentStore + ?Sized>(
    tx: &mut Transaction<'_, S>,
    ctx: &mut OpContext<'_>,
    stage_id: StageId,
) -> Result<AdvanceOutcome, EngineError> {
    let mut stage: Stage = tx.require(stage_id)?;
    if stage.complete {
        return Err(EngineError::StageComplete(stage_id));
    }
    let (current, status) = round_status(tx, ctx, &stage)?;
    if !status.complete {
        return Err(EngineError::IncompleteMatches {
            round: status.round,
            remaining: status.remaining,
        });
    }

    if stage.is_final_round() {
        stage.complete = true;
        stage.active = false;
        tx.set(&stage)?;
        log::info!("stage {} complete after {} rounds", stage.id, stage.total_rounds);
        ctx.emit(Notification::StageCompleted { stage_id });
        return Ok(AdvanceOutcome::StageCompleted);
    }

    let mut table = load_standings(tx, stage_id)?;
    let next = stage.current_round + 1;
    let round = create_round(tx, ctx, &mut stage, &mut table, next, current.window_end)?;
    stage.current_round = next;
    tx.set(&stage)?;
    let matches = load_round_matches(tx, &round)?.into_iter().map(|m| m.id).collect();
    Ok(AdvanceOutcome::Advanced { round: next, matches })
}

/// Move a match along scheduled → ready → in-progress.
pub fn transition_match<S: DocumentStore + ?Sized>(
    tx: &mut Transaction<'_, S>,
    match_id: MatchId,
    target: MatchState,
) -> Result<GameMatch, EngineError> {
    let mut game: GameMatch = tx.require(match_id)?;
    let allowed = matches!(
        (game.state, target),
        (MatchState::Scheduled, MatchState::Ready) | (MatchState::Ready, MatchState::InProgress)
    );
    if !allowed {
        return Err(EngineError::InvalidTransition {
            id: match_id,
            from: game.state.to_string(),
            to: target.to_string(),
        });
    }
    game.state = target;
    tx.set(&game)?;
    Ok(game)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::store::{run_transaction, MemoryStore};
    use uuid::Uuid;

    #[test]
    fn stage_start_validates_input() {
        let store = MemoryStore::new();
        let config = EngineConfig::default();
        let a = Uuid::new_v4();
        let result = run_transaction(&store, |tx| {
            let mut ctx = OpContext::new(&config, Utc::now());
            start_stage(tx, &mut ctx, &[a, a], 3)
        });
        assert!(matches!(result, Err(EngineError::DuplicateCompetitor(_))));
        let result = run_transaction(&store, |tx| {
            let mut ctx = OpContext::new(&config, Utc::now());
            start_stage(tx, &mut ctx, &[a, Uuid::new_v4()], 0)
        });
        assert!(matches!(result, Err(EngineError::InvalidRoundCount)));
    }

    #[test]
    fn scores_are_validated_before_anything_changes() {
        assert!(matches!(validate_scores(0, 0, &[]), Err(EngineError::ScoresBothZero)));
        assert!(matches!(validate_scores(1, 1, &[]), Err(EngineError::TiedScore(1))));
        let maps = [MapResult { score_a: 0, score_b: 0 }];
        assert!(matches!(validate_scores(2, 0, &maps), Err(EngineError::EmptyMap { index: 0 })));
        assert!(validate_scores(2, 1, &[]).is_ok());
    }

    #[test]
    fn three_competitor_stage_gets_a_completed_bye() {
        let store = MemoryStore::new();
        let config = EngineConfig::default();
        let field: Vec<_> = (0..3).map(|_| Uuid::new_v4()).collect();
        let (stage, matches, table) = run_transaction(&store, |tx| {
            let mut ctx = OpContext::new(&config, Utc::now());
            let stage = start_stage(tx, &mut ctx, &field, 2)?;
            let matches = load_stage_matches(tx, stage.id)?;
            let table = load_standings(tx, stage.id)?;
            Ok((stage, matches, table))
        })
        .unwrap();
        assert_eq!(stage.current_round, 1);
        assert_eq!(matches.len(), 2);
        let bye = matches.iter().find(|m| m.is_bye()).unwrap();
        assert_eq!(bye.state, MatchState::Completed);
        assert_eq!(bye.winner, Some(field[2]));
        let byed = table.iter().find(|s| s.competitor == field[2]).unwrap();
        assert_eq!(byed.points, 3);
    }
}
