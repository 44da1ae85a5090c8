//! Bracket progression: bracket creation, routing completed nodes, lazy node creation.
//!
//! Used by both double-elimination brackets and single-elimination playoffs; the
//! [`BracketShape`] decides which destinations exist.

use crate::logic::lifecycle::ensure_distinct;
use crate::logic::routing::{BracketShape, Destination};
use crate::logic::OpContext;
use crate::models::{
    Bracket, BracketFormat, BracketId, BracketSide, CompetitorId, EngineError, Entrant, GameMatch,
    NodeAddress, StageId,
};
use crate::notify::Notification;
use crate::store::{DocumentStore, Transaction};

/// Every node of a bracket, ordered by side, round and slot.
pub fn load_bracket_nodes<S: DocumentStore + ?Sized>(
    tx: &mut Transaction<'_, S>,
    bracket_id: BracketId,
) -> Result<Vec<GameMatch>, EngineError> {
    let mut nodes: Vec<GameMatch> = tx.query("bracket_id", bracket_id)?;
    nodes.sort_by_key(|m| (m.side, m.round, m.ordinal));
    Ok(nodes)
}

/// The node at `address`, if it has been created.
pub fn find_node<S: DocumentStore + ?Sized>(
    tx: &mut Transaction<'_, S>,
    bracket_id: BracketId,
    address: NodeAddress,
) -> Result<Option<GameMatch>, EngineError> {
    Ok(load_bracket_nodes(tx, bracket_id)?
        .into_iter()
        .find(|m| m.address() == address))
}

pub fn bracket_shape(bracket: &Bracket) -> Result<BracketShape, EngineError> {
    BracketShape::new(bracket.format, bracket.size as usize)
}

/// Persist a bracket and its first-round nodes. `seeds` is in bracket order.
pub(crate) fn create_bracket<S: DocumentStore + ?Sized>(
    tx: &mut Transaction<'_, S>,
    ctx: &mut OpContext<'_>,
    format: BracketFormat,
    seeds: Vec<CompetitorId>,
    best_of: u8,
    source_stage_id: Option<StageId>,
) -> Result<Bracket, EngineError> {
    let shape = BracketShape::new(format, seeds.len())?;
    let bracket = Bracket::new(format, seeds, best_of, source_stage_id, ctx.now);

    for (i, pair) in bracket.seeds.chunks(2).enumerate() {
        let address = NodeAddress::new(BracketSide::Winners, 1, i as u32 + 1);
        let mut node = GameMatch::bracket_node(bracket.id, address, best_of);
        node.slot_a = Some(Entrant::Team(pair[0]));
        node.slot_b = Some(Entrant::Team(pair[1]));
        node.refresh_pairing_state();
        tx.set(&node)?;
        ctx.emit(Notification::MatchReady { match_id: node.id });
    }
    tx.set(&bracket)?;
    log::info!(
        "created {:?} bracket {} for {} entrants ({} winners rounds, {} losers rounds)",
        format,
        bracket.id,
        bracket.size,
        shape.winners_rounds,
        shape.losers_rounds()
    );
    Ok(bracket)
}

/// Start a double-elimination bracket. Winners round 1 pairs entrants in the given order.
pub fn start_double_elimination<S: DocumentStore + ?Sized>(
    tx: &mut Transaction<'_, S>,
    ctx: &mut OpContext<'_>,
    competitors: &[CompetitorId],
) -> Result<Bracket, EngineError> {
    ensure_distinct(competitors, 4)?;
    let best_of = ctx.config.bracket_best_of;
    create_bracket(
        tx,
        ctx,
        BracketFormat::DoubleElimination,
        competitors.to_vec(),
        best_of,
        None,
    )
}

/// Send the winner and loser of a completed node to their destinations.
pub(crate) fn route_completed<S: DocumentStore + ?Sized>(
    tx: &mut Transaction<'_, S>,
    ctx: &mut OpContext<'_>,
    bracket_id: BracketId,
    game: &GameMatch,
) -> Result<(), EngineError> {
    let mut bracket: Bracket = tx.require(bracket_id)?;
    let shape = bracket_shape(&bracket)?;
    let from = game.address();
    if !shape.contains(from) {
        return Err(EngineError::InvalidBracketPosition(from.to_string()));
    }
    let winner = game
        .winner
        .ok_or_else(|| EngineError::Inconsistent(format!("bracket node {} completed without a winner", game.id)))?;

    match shape.winner_destination(from) {
        Some(dest) => place(tx, ctx, &bracket, dest, winner)?,
        None => {
            bracket.champion = Some(winner);
            tx.set(&bracket)?;
            log::info!("bracket {}: {} is champion", bracket.id, winner);
            ctx.emit(Notification::ChampionDecided {
                bracket_id: bracket.id,
                champion: winner,
            });
        }
    }
    if let (Some(dest), Some(loser)) = (shape.loser_destination(from), game.loser()) {
        place(tx, ctx, &bracket, dest, loser)?;
    }
    Ok(())
}

/// Put `competitor` into `dest`, creating the node on first arrival.
fn place<S: DocumentStore + ?Sized>(
    tx: &mut Transaction<'_, S>,
    ctx: &mut OpContext<'_>,
    bracket: &Bracket,
    dest: Destination,
    competitor: CompetitorId,
) -> Result<(), EngineError> {
    let mut node = match find_node(tx, bracket.id, dest.node)? {
        Some(node) => node,
        None => {
            log::debug!("bracket {}: creating node {}", bracket.id, dest.node);
            GameMatch::bracket_node(bracket.id, dest.node, bracket.best_of)
        }
    };
    match node.slot(dest.position) {
        None => *node.slot_mut(dest.position) = Some(Entrant::Team(competitor)),
        Some(Entrant::Team(c)) if c == competitor => return Ok(()),
        Some(other) => {
            return Err(EngineError::Inconsistent(format!(
                "slot {:?} of {} already holds {:?}",
                dest.position, dest.node, other
            )))
        }
    }
    node.refresh_pairing_state();
    tx.set(&node)?;
    if node.has_both_competitors() {
        log::info!("bracket {}: {} is ready", bracket.id, dest.node);
        ctx.emit(Notification::MatchReady { match_id: node.id });
    }
    Ok(())
}
