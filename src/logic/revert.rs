//! Revert and recovery: delete forward state, then re-derive from what remains.
//!
//! Standings are never patched by subtracting a result; they are recomputed from the
//! surviving match history. Bracket reverts walk forward through the formulaic routing,
//! undoing completed downstream nodes before clearing the slot they were fed into.

use crate::logic::double_elimination::{bracket_shape, find_node, load_bracket_nodes};
use crate::logic::lifecycle::{load_round, load_rounds, load_stage_matches, load_standings};
use crate::logic::routing::{BracketShape, Destination};
use crate::logic::{standings, OpContext};
use crate::models::{
    Bracket, BracketId, BracketSide, CompetitorId, EngineError, Entrant, GameMatch, MatchId,
    NodeAddress, Round, ScheduleProposal, Stage, StageId,
};
use crate::store::{DocumentStore, Transaction};
use serde::Serialize;

/// What a [`revert_to_round`] removed.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct RevertReport {
    pub rounds_deleted: Vec<u32>,
    pub matches_deleted: usize,
    pub brackets_deleted: Vec<BracketId>,
}

fn delete_proposals<S: DocumentStore + ?Sized>(
    tx: &mut Transaction<'_, S>,
    match_id: MatchId,
) -> Result<(), EngineError> {
    let proposals: Vec<ScheduleProposal> = tx.query("match_id", match_id)?;
    for p in proposals {
        tx.delete::<ScheduleProposal>(p.id);
    }
    Ok(())
}

fn delete_match<S: DocumentStore + ?Sized>(tx: &mut Transaction<'_, S>, match_id: MatchId) -> Result<(), EngineError> {
    delete_proposals(tx, match_id)?;
    tx.delete::<GameMatch>(match_id);
    Ok(())
}

/// Roll a stage back so that `target` is its current round again.
///
/// Rounds after `target` are deleted with their matches and proposals, rounds up to
/// `target` are left as they are, and standings are recomputed from the remaining matches.
/// Playoff brackets seeded from this stage no longer reflect it and are deleted too.
pub fn revert_to_round<S: DocumentStore + ?Sized>(
    tx: &mut Transaction<'_, S>,
    ctx: &mut OpContext<'_>,
    stage_id: StageId,
    target: u32,
) -> Result<RevertReport, EngineError> {
    let mut stage: Stage = tx.require(stage_id)?;
    if target == 0 || target > stage.current_round {
        return Err(EngineError::InvalidRound {
            requested: target,
            current: stage.current_round,
        });
    }

    let mut report = RevertReport::default();
    for round in load_rounds(tx, stage_id)? {
        if round.number <= target {
            continue;
        }
        let matches: Vec<GameMatch> = tx.query("round_id", round.id)?;
        for game in &matches {
            delete_match(tx, game.id)?;
        }
        report.matches_deleted += matches.len();
        report.rounds_deleted.push(round.number);
        stage.round_ids.retain(|id| *id != round.id);
        tx.delete::<Round>(round.id);
    }

    let brackets: Vec<Bracket> = tx.query("source_stage_id", stage_id)?;
    for bracket in brackets {
        for node in load_bracket_nodes(tx, bracket.id)? {
            delete_match(tx, node.id)?;
        }
        tx.delete::<Bracket>(bracket.id);
        log::warn!("stage {}: deleted playoff bracket {} seeded from it", stage_id, bracket.id);
        report.brackets_deleted.push(bracket.id);
    }

    let mut table = load_standings(tx, stage_id)?;
    let remaining = load_stage_matches(tx, stage_id)?;
    standings::recompute(&mut table, &remaining)?;
    for s in &table {
        tx.set(s)?;
    }

    stage.current_round = target;
    stage.active = true;
    stage.complete = false;
    tx.set(&stage)?;
    log::info!(
        "stage {} reverted to round {} ({} round(s), {} match(es) deleted) at {}",
        stage_id,
        target,
        report.rounds_deleted.len(),
        report.matches_deleted,
        ctx.now
    );
    Ok(report)
}

/// Clear one result. Bracket nodes un-route their winner and loser; Swiss matches must be
/// in the stage's current round and standings are recomputed.
pub fn revert_single_match<S: DocumentStore + ?Sized>(
    tx: &mut Transaction<'_, S>,
    ctx: &mut OpContext<'_>,
    match_id: MatchId,
) -> Result<GameMatch, EngineError> {
    let mut game: GameMatch = tx.require(match_id)?;
    if !game.completed {
        return Err(EngineError::MatchNotCompleted(match_id));
    }
    if let Some(bracket_id) = game.bracket_id {
        let mut bracket: Bracket = tx.require(bracket_id)?;
        let shape = bracket_shape(&bracket)?;
        revert_node(tx, &mut bracket, &shape, match_id)?;
        tx.set(&bracket)?;
        return tx.require(match_id);
    }

    if game.is_bye() {
        return Err(EngineError::ByeMatch(match_id));
    }
    let stage_id = game
        .stage_id
        .ok_or_else(|| EngineError::Inconsistent(format!("match {} has neither stage nor bracket", match_id)))?;
    let stage: Stage = tx.require(stage_id)?;
    if stage.complete {
        return Err(EngineError::StageComplete(stage_id));
    }
    if game.round != stage.current_round {
        return Err(EngineError::NotInCurrentRound {
            id: match_id,
            round: game.round,
        });
    }

    game.reset_result();
    tx.set(&game)?;
    let mut table = load_standings(tx, stage_id)?;
    let matches = load_stage_matches(tx, stage_id)?;
    standings::recompute(&mut table, &matches)?;
    for s in &table {
        tx.set(s)?;
    }
    let mut round = load_round(tx, &stage, game.round)?;
    if round.complete {
        round.complete = false;
        tx.set(&round)?;
    }
    log::info!("match {} reverted in stage {} round {} at {}", match_id, stage_id, game.round, ctx.now);
    Ok(game)
}

/// Revert every completed node of one bracket round. Returns the reverted node ids.
pub fn revert_bracket_round<S: DocumentStore + ?Sized>(
    tx: &mut Transaction<'_, S>,
    ctx: &mut OpContext<'_>,
    bracket_id: BracketId,
    side: BracketSide,
    round: u32,
) -> Result<Vec<MatchId>, EngineError> {
    let mut bracket: Bracket = tx.require(bracket_id)?;
    let shape = bracket_shape(&bracket)?;
    if shape.matches_in_round(side, round) == 0 {
        return Err(EngineError::InvalidBracketPosition(format!("{} round {}", side, round)));
    }
    let completed: Vec<MatchId> = load_bracket_nodes(tx, bracket_id)?
        .into_iter()
        .filter(|m| m.side == side && m.round == round && m.completed)
        .map(|m| m.id)
        .collect();
    for &id in &completed {
        // An earlier node of this round may already have reverted this one via a cascade.
        let node: GameMatch = tx.require(id)?;
        if node.completed {
            revert_node(tx, &mut bracket, &shape, id)?;
        }
    }
    tx.set(&bracket)?;
    log::info!(
        "bracket {}: reverted {} node(s) of {} round {} at {}",
        bracket_id,
        completed.len(),
        side,
        round,
        ctx.now
    );
    Ok(completed)
}

/// Take `competitor` back out of a node by reverting the feeder that put them there.
pub fn revert_team_advancement<S: DocumentStore + ?Sized>(
    tx: &mut Transaction<'_, S>,
    ctx: &mut OpContext<'_>,
    match_id: MatchId,
    competitor: CompetitorId,
) -> Result<MatchId, EngineError> {
    let node: GameMatch = tx.require(match_id)?;
    let Some(bracket_id) = node.bracket_id else {
        return Err(EngineError::NotABracketMatch(match_id));
    };
    let position = node
        .position_of(competitor)
        .ok_or(EngineError::NotAParticipant(competitor))?;
    let mut bracket: Bracket = tx.require(bracket_id)?;
    let shape = bracket_shape(&bracket)?;
    let feeder = shape
        .feeders(node.address())
        .into_iter()
        .find(|f| f.position == position)
        .ok_or_else(|| EngineError::InvalidBracketPosition(format!("{} is seeded, not fed", node.address())))?;
    let source = find_node(tx, bracket_id, feeder.from)?
        .ok_or_else(|| EngineError::Inconsistent(format!("feeder {} of {} is missing", feeder.from, node.address())))?;
    if !source.completed {
        return Err(EngineError::Inconsistent(format!(
            "feeder {} of {} has no result",
            feeder.from,
            node.address()
        )));
    }
    revert_node(tx, &mut bracket, &shape, source.id)?;
    tx.set(&bracket)?;
    log::info!(
        "bracket {}: {} taken back out of {} at {}",
        bracket_id,
        competitor,
        node.address(),
        ctx.now
    );
    Ok(source.id)
}

/// Clear a completed node's result after un-routing everyone it sent forward.
fn revert_node<S: DocumentStore + ?Sized>(
    tx: &mut Transaction<'_, S>,
    bracket: &mut Bracket,
    shape: &BracketShape,
    node_id: MatchId,
) -> Result<(), EngineError> {
    let mut node: GameMatch = tx.require(node_id)?;
    if !node.completed {
        return Err(EngineError::MatchNotCompleted(node_id));
    }
    let from = node.address();
    let winner = node.winner;
    let loser = node.loser();

    if let Some(winner) = winner {
        match shape.winner_destination(from) {
            Some(dest) => unplace(tx, bracket, shape, dest, winner)?,
            None if bracket.champion == Some(winner) => {
                bracket.champion = None;
                log::info!("bracket {}: champion {} withdrawn", bracket.id, winner);
            }
            None => {}
        }
    }
    if let (Some(dest), Some(loser)) = (shape.loser_destination(from), loser) {
        unplace(tx, bracket, shape, dest, loser)?;
    }

    node.reset_result();
    tx.set(&node)?;
    log::debug!("bracket {}: cleared result of {}", bracket.id, from);
    Ok(())
}

fn unplace<S: DocumentStore + ?Sized>(
    tx: &mut Transaction<'_, S>,
    bracket: &mut Bracket,
    shape: &BracketShape,
    dest: Destination,
    competitor: CompetitorId,
) -> Result<(), EngineError> {
    let Some(existing) = find_node(tx, bracket.id, dest.node)? else {
        return Err(missing_slot(dest.node, competitor));
    };
    if existing.completed {
        revert_node(tx, bracket, shape, existing.id)?;
    }
    let mut node: GameMatch = tx.require(existing.id)?;
    if node.slot(dest.position) != Some(Entrant::Team(competitor)) {
        return Err(missing_slot(dest.node, competitor));
    }
    *node.slot_mut(dest.position) = None;
    delete_proposals(tx, node.id)?;

    if node.slot_a.is_none() && node.slot_b.is_none() {
        tx.delete::<GameMatch>(node.id);
        log::debug!("bracket {}: deleted empty node {}", bracket.id, dest.node);
    } else {
        node.scheduled_at = None;
        node.refresh_pairing_state();
        tx.set(&node)?;
    }
    Ok(())
}

fn missing_slot(node: NodeAddress, competitor: CompetitorId) -> EngineError {
    EngineError::Inconsistent(format!("{} was routed to {} but is not there", competitor, node))
}
