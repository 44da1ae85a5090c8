//! Engine facade: one method per exposed operation, each a single store transaction.
//!
//! Notifications collected while an operation runs are sent only after its commit.
//! Advance and revert on one stage are serialized through a busy set; a second caller
//! gets [`EngineError::StageBusy`] instead of waiting.

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::logic::lifecycle::{self, AdvanceOutcome, RoundStatus};
use crate::logic::revert::{self, RevertReport};
use crate::logic::{double_elimination, playoffs, proposals, standings, OpContext};
use crate::models::{
    Bracket, BracketId, BracketSide, CompetitorId, EngineError, GameMatch, MapResult, MatchId,
    MatchState, ProposalId, ScheduleProposal, Stage, StageId, Standing,
};
use crate::notify::{LogNotifier, Notifier};
use crate::store::{run_transaction, DocumentStore, Transaction};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

pub struct Engine<S: DocumentStore> {
    store: S,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    busy: Mutex<HashSet<StageId>>,
}

/// Holds a stage in the busy set until dropped.
struct StageGuard<'a> {
    busy: &'a Mutex<HashSet<StageId>>,
    stage_id: StageId,
}

impl Drop for StageGuard<'_> {
    fn drop(&mut self) {
        let mut busy = match self.busy.lock() {
            Ok(busy) => busy,
            Err(poisoned) => poisoned.into_inner(),
        };
        busy.remove(&self.stage_id);
    }
}

impl<S: DocumentStore> Engine<S> {
    /// Engine on the system clock, logging its notifications.
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            clock: Arc::new(SystemClock),
            notifier: Arc::new(LogNotifier),
            busy: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn lock_stage(&self, stage_id: StageId) -> Result<StageGuard<'_>, EngineError> {
        let mut busy = self.busy.lock().map_err(|_| EngineError::LockPoisoned)?;
        if !busy.insert(stage_id) {
            log::warn!("stage {} is busy; rejecting concurrent advance/revert", stage_id);
            return Err(EngineError::StageBusy(stage_id));
        }
        Ok(StageGuard {
            busy: &self.busy,
            stage_id,
        })
    }

    /// Run `f` in one transaction; notify only once it has committed.
    fn execute<T, F>(&self, operation: &str, f: F) -> Result<T, EngineError>
    where
        F: FnOnce(&mut Transaction<'_, S>, &mut OpContext<'_>) -> Result<T, EngineError>,
    {
        let mut ctx = OpContext::new(&self.config, self.clock.now());
        match run_transaction(&self.store, |tx| f(tx, &mut ctx)) {
            Ok(value) => {
                for event in ctx.into_events() {
                    self.notifier.notify(&event);
                }
                Ok(value)
            }
            Err(e) => {
                log::warn!("{} aborted: {}", operation, e);
                Err(e)
            }
        }
    }

    fn read<T, F>(&self, f: F) -> Result<T, EngineError>
    where
        F: FnOnce(&mut Transaction<'_, S>) -> Result<T, EngineError>,
    {
        run_transaction(&self.store, f)
    }

    // Swiss stages

    pub fn start_stage(&self, competitors: &[CompetitorId], round_count: u32) -> Result<Stage, EngineError> {
        self.execute("start_stage", |tx, ctx| {
            lifecycle::start_stage(tx, ctx, competitors, round_count)
        })
    }

    pub fn record_match_result(
        &self,
        match_id: MatchId,
        score_a: u32,
        score_b: u32,
        maps: Vec<MapResult>,
    ) -> Result<GameMatch, EngineError> {
        self.execute("record_match_result", |tx, ctx| {
            lifecycle::record_match_result(tx, ctx, match_id, (score_a, score_b), maps)
        })
    }

    /// Admin override with explicit scores; goes through the normal result path.
    pub fn force_complete_match(&self, match_id: MatchId, score_a: u32, score_b: u32) -> Result<GameMatch, EngineError> {
        log::info!("admin force-completing match {} as {}-{}", match_id, score_a, score_b);
        self.record_match_result(match_id, score_a, score_b, Vec::new())
    }

    pub fn transition_match(&self, match_id: MatchId, target: MatchState) -> Result<GameMatch, EngineError> {
        self.execute("transition_match", |tx, _| lifecycle::transition_match(tx, match_id, target))
    }

    pub fn check_round_completion(&self, stage_id: StageId) -> Result<RoundStatus, EngineError> {
        self.execute("check_round_completion", |tx, ctx| {
            lifecycle::check_round_completion(tx, ctx, stage_id)
        })
    }

    pub fn advance_round(&self, stage_id: StageId) -> Result<AdvanceOutcome, EngineError> {
        let _guard = self.lock_stage(stage_id)?;
        self.execute("advance_round", |tx, ctx| lifecycle::advance_round(tx, ctx, stage_id))
    }

    /// Forfeit overdue matches in every active stage. Failures are logged per stage and do
    /// not stop the sweep.
    pub fn apply_due_forfeits(&self) -> Vec<(StageId, RoundStatus)> {
        let stages = match self.active_stages() {
            Ok(stages) => stages,
            Err(e) => {
                log::warn!("forfeit sweep could not list stages: {}", e);
                return Vec::new();
            }
        };
        let mut applied = Vec::new();
        for stage in stages {
            match self.check_round_completion(stage.id) {
                Ok(status) if !status.forfeited.is_empty() => applied.push((stage.id, status)),
                Ok(_) => {}
                Err(e) => log::warn!("forfeit sweep skipped stage {}: {}", stage.id, e),
            }
        }
        applied
    }

    // Brackets

    pub fn start_double_elimination(&self, competitors: &[CompetitorId]) -> Result<Bracket, EngineError> {
        self.execute("start_double_elimination", |tx, ctx| {
            double_elimination::start_double_elimination(tx, ctx, competitors)
        })
    }

    pub fn generate_playoff_seeding(&self, seeds: &[CompetitorId]) -> Result<Bracket, EngineError> {
        self.execute("generate_playoff_seeding", |tx, ctx| {
            playoffs::generate_playoff_seeding(tx, ctx, seeds, None)
        })
    }

    pub fn seed_playoffs_from_stage(&self, stage_id: StageId) -> Result<Bracket, EngineError> {
        self.execute("seed_playoffs_from_stage", |tx, ctx| {
            playoffs::seed_playoffs_from_stage(tx, ctx, stage_id)
        })
    }

    pub fn advance_bracket_winner(&self, match_id: MatchId, winner: CompetitorId) -> Result<GameMatch, EngineError> {
        self.execute("advance_bracket_winner", |tx, ctx| {
            playoffs::advance_bracket_winner(tx, ctx, match_id, winner)
        })
    }

    // Reverts

    pub fn revert_to_round(&self, stage_id: StageId, round: u32) -> Result<RevertReport, EngineError> {
        let _guard = self.lock_stage(stage_id)?;
        self.execute("revert_to_round", |tx, ctx| revert::revert_to_round(tx, ctx, stage_id, round))
    }

    pub fn revert_single_match(&self, match_id: MatchId) -> Result<GameMatch, EngineError> {
        let game = self.get_match(match_id)?;
        let _guard = match game.stage_id {
            Some(stage_id) => Some(self.lock_stage(stage_id)?),
            None => None,
        };
        self.execute("revert_single_match", |tx, ctx| revert::revert_single_match(tx, ctx, match_id))
    }

    pub fn revert_bracket_round(
        &self,
        bracket_id: BracketId,
        side: BracketSide,
        round: u32,
    ) -> Result<Vec<MatchId>, EngineError> {
        self.execute("revert_bracket_round", |tx, ctx| {
            revert::revert_bracket_round(tx, ctx, bracket_id, side, round)
        })
    }

    pub fn revert_team_advancement(&self, match_id: MatchId, competitor: CompetitorId) -> Result<MatchId, EngineError> {
        self.execute("revert_team_advancement", |tx, ctx| {
            revert::revert_team_advancement(tx, ctx, match_id, competitor)
        })
    }

    // Scheduling

    pub fn propose_schedule(
        &self,
        match_id: MatchId,
        proposer: CompetitorId,
        proposed_time: DateTime<Utc>,
    ) -> Result<ScheduleProposal, EngineError> {
        self.execute("propose_schedule", |tx, ctx| {
            proposals::propose_schedule(tx, ctx, match_id, proposer, proposed_time)
        })
    }

    pub fn respond_to_proposal(
        &self,
        proposal_id: ProposalId,
        responder: CompetitorId,
        accept: bool,
    ) -> Result<ScheduleProposal, EngineError> {
        self.execute("respond_to_proposal", |tx, ctx| {
            proposals::respond_to_proposal(tx, ctx, proposal_id, responder, accept)
        })
    }

    // Reads

    pub fn get_stage(&self, stage_id: StageId) -> Result<Stage, EngineError> {
        self.read(|tx| tx.require(stage_id))
    }

    pub fn active_stages(&self) -> Result<Vec<Stage>, EngineError> {
        self.read(|tx| tx.query("active", true))
    }

    /// Standings in ranking order.
    pub fn standings(&self, stage_id: StageId) -> Result<Vec<Standing>, EngineError> {
        self.read(|tx| {
            tx.require::<Stage>(stage_id)?;
            let mut table = lifecycle::load_standings(tx, stage_id)?;
            standings::rank(&mut table);
            Ok(table)
        })
    }

    pub fn stage_matches(&self, stage_id: StageId) -> Result<Vec<GameMatch>, EngineError> {
        self.read(|tx| lifecycle::load_stage_matches(tx, stage_id))
    }

    pub fn round_matches(&self, stage_id: StageId, round: u32) -> Result<Vec<GameMatch>, EngineError> {
        self.read(|tx| {
            let stage: Stage = tx.require(stage_id)?;
            let round = lifecycle::load_round(tx, &stage, round)?;
            lifecycle::load_round_matches(tx, &round)
        })
    }

    pub fn get_match(&self, match_id: MatchId) -> Result<GameMatch, EngineError> {
        self.read(|tx| tx.require(match_id))
    }

    pub fn get_bracket(&self, bracket_id: BracketId) -> Result<Bracket, EngineError> {
        self.read(|tx| tx.require(bracket_id))
    }

    pub fn bracket_nodes(&self, bracket_id: BracketId) -> Result<Vec<GameMatch>, EngineError> {
        self.read(|tx| {
            tx.require::<Bracket>(bracket_id)?;
            double_elimination::load_bracket_nodes(tx, bracket_id)
        })
    }

    /// A bracket together with its nodes, read in one transaction.
    pub fn bracket_with_nodes(&self, bracket_id: BracketId) -> Result<(Bracket, Vec<GameMatch>), EngineError> {
        self.read(|tx| {
            let bracket: Bracket = tx.require(bracket_id)?;
            let nodes = double_elimination::load_bracket_nodes(tx, bracket_id)?;
            Ok((bracket, nodes))
        })
    }

    pub fn proposals(&self, match_id: MatchId) -> Result<Vec<ScheduleProposal>, EngineError> {
        self.read(|tx| proposals::load_proposals(tx, match_id))
    }
}
