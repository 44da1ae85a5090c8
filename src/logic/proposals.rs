//! Scheduling proposals: each competitor keeps at most one pending proposal per match.

use crate::logic::OpContext;
use crate::models::{
    CompetitorId, EngineError, GameMatch, MatchId, MatchState, ProposalId, ProposalStatus,
    ScheduleProposal,
};
use crate::notify::Notification;
use crate::store::{DocumentStore, Transaction};
use chrono::{DateTime, Utc};

/// Every proposal of a match, oldest first.
pub fn load_proposals<S: DocumentStore + ?Sized>(
    tx: &mut Transaction<'_, S>,
    match_id: MatchId,
) -> Result<Vec<ScheduleProposal>, EngineError> {
    let mut found: Vec<ScheduleProposal> = tx.query("match_id", match_id)?;
    found.sort_by_key(|p| (p.created_at, p.id));
    Ok(found)
}

fn change_status(ctx: &mut OpContext<'_>, proposal: &mut ScheduleProposal, status: ProposalStatus) {
    proposal.status = status;
    ctx.emit(Notification::ProposalChanged {
        proposal_id: proposal.id,
        match_id: proposal.match_id,
        status,
    });
}

/// Propose a time for a match. The proposer's own earlier pending proposals are cancelled;
/// the opponent's are left alone.
pub fn propose_schedule<S: DocumentStore + ?Sized>(
    tx: &mut Transaction<'_, S>,
    ctx: &mut OpContext<'_>,
    match_id: MatchId,
    proposer: CompetitorId,
    proposed_time: DateTime<Utc>,
) -> Result<ScheduleProposal, EngineError> {
    let game: GameMatch = tx.require(match_id)?;
    if game.completed {
        return Err(EngineError::MatchAlreadyCompleted(match_id));
    }
    if !game.has_both_competitors() {
        return Err(EngineError::MatchNotReady(match_id));
    }
    if !game.is_participant(proposer) {
        return Err(EngineError::NotAParticipant(proposer));
    }

    for mut earlier in load_proposals(tx, match_id)? {
        if earlier.is_pending() && earlier.proposer == proposer {
            change_status(ctx, &mut earlier, ProposalStatus::Cancelled);
            tx.set(&earlier)?;
        }
    }
    let mut proposal = ScheduleProposal::new(match_id, proposer, proposed_time, ctx.now);
    change_status(ctx, &mut proposal, ProposalStatus::Pending);
    tx.set(&proposal)?;
    log::info!("{} proposed {} for match {}", proposer, proposed_time, match_id);
    Ok(proposal)
}

/// Accept or reject a pending proposal on behalf of the opponent. Accepting schedules the
/// match and cancels every other pending proposal for it; a match already past `Scheduled`
/// cannot be rescheduled.
pub fn respond_to_proposal<S: DocumentStore + ?Sized>(
    tx: &mut Transaction<'_, S>,
    ctx: &mut OpContext<'_>,
    proposal_id: ProposalId,
    responder: CompetitorId,
    accept: bool,
) -> Result<ScheduleProposal, EngineError> {
    let mut proposal: ScheduleProposal = tx.require(proposal_id)?;
    if !proposal.is_pending() {
        return Err(EngineError::ProposalNotPending(proposal_id));
    }
    let mut game: GameMatch = tx.require(proposal.match_id)?;
    if !game.is_participant(responder) {
        return Err(EngineError::NotAParticipant(responder));
    }
    if responder == proposal.proposer {
        return Err(EngineError::SelfResponse);
    }
    if game.completed {
        return Err(EngineError::MatchAlreadyCompleted(game.id));
    }

    if !accept {
        change_status(ctx, &mut proposal, ProposalStatus::Rejected);
        tx.set(&proposal)?;
        return Ok(proposal);
    }
    if !matches!(game.state, MatchState::PendingSchedule | MatchState::Scheduled) {
        return Err(EngineError::InvalidTransition {
            id: game.id,
            from: game.state.to_string(),
            to: MatchState::Scheduled.to_string(),
        });
    }

    for mut other in load_proposals(tx, game.id)? {
        if other.id != proposal.id && other.is_pending() {
            change_status(ctx, &mut other, ProposalStatus::Cancelled);
            tx.set(&other)?;
        }
    }
    change_status(ctx, &mut proposal, ProposalStatus::Accepted);
    tx.set(&proposal)?;

    game.scheduled_at = Some(proposal.proposed_time);
    game.state = MatchState::Scheduled;
    tx.set(&game)?;
    log::info!("match {} scheduled for {}", game.id, proposal.proposed_time);
    Ok(proposal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::logic::lifecycle::{load_stage_matches, start_stage};
    use crate::store::{run_transaction, MemoryStore};
    use chrono::Duration;
    use uuid::Uuid;

    fn one_match(store: &MemoryStore, config: &EngineConfig) -> GameMatch {
        let field: Vec<_> = (0..2).map(|_| Uuid::new_v4()).collect();
        run_transaction(store, |tx| {
            let mut ctx = OpContext::new(config, Utc::now());
            let stage = start_stage(tx, &mut ctx, &field, 1)?;
            Ok(load_stage_matches(tx, stage.id)?.remove(0))
        })
        .unwrap()
    }

    #[test]
    fn accepting_schedules_and_cancels_the_rest() {
        let store = MemoryStore::new();
        let config = EngineConfig::default();
        let game = one_match(&store, &config);
        let (a, b) = (game.team_a().unwrap(), game.team_b().unwrap());
        let when = Utc::now() + Duration::days(1);

        let (mine, theirs) = run_transaction(&store, |tx| {
            let mut ctx = OpContext::new(&config, Utc::now());
            let mine = propose_schedule(tx, &mut ctx, game.id, a, when)?;
            let theirs = propose_schedule(tx, &mut ctx, game.id, b, when + Duration::hours(2))?;
            Ok((mine, theirs))
        })
        .unwrap();

        run_transaction(&store, |tx| {
            let mut ctx = OpContext::new(&config, Utc::now());
            respond_to_proposal(tx, &mut ctx, mine.id, b, true)
        })
        .unwrap();

        let (game, all) = run_transaction(&store, |tx| {
            Ok((tx.require::<GameMatch>(game.id)?, load_proposals(tx, game.id)?))
        })
        .unwrap();
        assert_eq!(game.state, MatchState::Scheduled);
        assert_eq!(game.scheduled_at, Some(when));
        let status = |id: ProposalId| all.iter().find(|p| p.id == id).unwrap().status;
        assert_eq!(status(mine.id), ProposalStatus::Accepted);
        assert_eq!(status(theirs.id), ProposalStatus::Cancelled);
    }

    #[test]
    fn proposer_cannot_accept_their_own_proposal() {
        let store = MemoryStore::new();
        let config = EngineConfig::default();
        let game = one_match(&store, &config);
        let a = game.team_a().unwrap();
        let result = run_transaction(&store, |tx| {
            let mut ctx = OpContext::new(&config, Utc::now());
            let p = propose_schedule(tx, &mut ctx, game.id, a, Utc::now())?;
            respond_to_proposal(tx, &mut ctx, p.id, a, true)
        });
        assert!(matches!(result, Err(EngineError::SelfResponse)));
    }
}
