//! Single-elimination playoffs: crossed seeding of the top eight and admin-assigned winners.

use crate::logic::double_elimination::{create_bracket, route_completed};
use crate::logic::lifecycle::{ensure_distinct, load_standings};
use crate::logic::{standings, OpContext};
use crate::models::{Bracket, BracketFormat, CompetitorId, EngineError, GameMatch, MatchId, Stage, StageId};
use crate::store::{DocumentStore, Transaction};

/// Playoff field size.
pub const PLAYOFF_SEEDS: usize = 8;

/// Quarterfinal pairs by seed rank (1-based). Seeds 1 and 2 sit in opposite halves.
const QUARTERFINALS: [(usize, usize); 4] = [(1, 8), (3, 6), (2, 7), (4, 5)];

/// `seeds` (rank 1 first) rearranged into bracket order.
pub fn playoff_bracket_order(seeds: &[CompetitorId]) -> Result<Vec<CompetitorId>, EngineError> {
    if seeds.len() != PLAYOFF_SEEDS {
        return Err(EngineError::WrongSeedCount {
            expected: PLAYOFF_SEEDS,
            actual: seeds.len(),
        });
    }
    ensure_distinct(seeds, PLAYOFF_SEEDS)?;
    Ok(QUARTERFINALS
        .iter()
        .flat_map(|&(a, b)| [seeds[a - 1], seeds[b - 1]])
        .collect())
}

/// Create the playoff bracket for eight ordered seeds. Semifinals and the final appear
/// once their first feeder finishes.
pub fn generate_playoff_seeding<S: DocumentStore + ?Sized>(
    tx: &mut Transaction<'_, S>,
    ctx: &mut OpContext<'_>,
    seeds: &[CompetitorId],
    source_stage_id: Option<StageId>,
) -> Result<Bracket, EngineError> {
    let order = playoff_bracket_order(seeds)?;
    let best_of = ctx.config.playoff_best_of;
    create_bracket(tx, ctx, BracketFormat::SingleElimination, order, best_of, source_stage_id)
}

/// Seed playoffs from the top eight of a finished Swiss stage.
pub fn seed_playoffs_from_stage<S: DocumentStore + ?Sized>(
    tx: &mut Transaction<'_, S>,
    ctx: &mut OpContext<'_>,
    stage_id: StageId,
) -> Result<Bracket, EngineError> {
    let stage: Stage = tx.require(stage_id)?;
    if !stage.complete {
        return Err(EngineError::StageNotComplete(stage_id));
    }
    let mut table = load_standings(tx, stage_id)?;
    standings::rank(&mut table);
    if table.len() < PLAYOFF_SEEDS {
        return Err(EngineError::WrongSeedCount {
            expected: PLAYOFF_SEEDS,
            actual: table.len(),
        });
    }
    let top: Vec<CompetitorId> = table.iter().take(PLAYOFF_SEEDS).map(|s| s.competitor).collect();
    log::info!("stage {}: seeding playoffs from the top {}", stage_id, PLAYOFF_SEEDS);
    generate_playoff_seeding(tx, ctx, &top, Some(stage_id))
}

/// Admin override: complete a bracket node with `winner` and route as if it had been played.
pub fn advance_bracket_winner<S: DocumentStore + ?Sized>(
    tx: &mut Transaction<'_, S>,
    ctx: &mut OpContext<'_>,
    match_id: MatchId,
    winner: CompetitorId,
) -> Result<GameMatch, EngineError> {
    let mut game: GameMatch = tx.require(match_id)?;
    let Some(bracket_id) = game.bracket_id else {
        return Err(EngineError::NotABracketMatch(match_id));
    };
    if game.completed {
        return Err(EngineError::MatchAlreadyCompleted(match_id));
    }
    if !game.has_both_competitors() {
        return Err(EngineError::MatchNotReady(match_id));
    }
    if !game.is_participant(winner) {
        return Err(EngineError::NotAParticipant(winner));
    }
    game.complete_by_override(winner, ctx.now);
    tx.set(&game)?;
    log::info!("bracket {}: {} advanced from {} by override", bracket_id, winner, game.address());
    route_completed(tx, ctx, bracket_id, &game)?;
    Ok(game)
}
