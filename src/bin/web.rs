//! Single binary web server exposing the progression engine as a JSON API.
//! Run with: cargo run --bin web
//! Listens on 0.0.0.0:8080 by default.
//! Override with env: HOST, PORT, FORFEIT_POLL_SECS, plus the engine settings read by
//! `EngineConfig::from_env` (ROUND_WINDOW_HOURS, SWISS_BEST_OF, ...).

use actix_web::{
    get, post,
    web::{Data, Json, Path},
    App, HttpResponse, HttpServer, Responder,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tournament_progression::{
    BracketId, BracketSide, CompetitorId, Engine, EngineConfig, EngineError, ErrorKind, MapResult,
    MatchId, MatchState, MemoryStore, ProposalId, StageId,
};
use uuid::Uuid;

type AppState = Data<Engine<MemoryStore>>;

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    service: &'static str,
}

#[derive(Deserialize)]
struct StartStageBody {
    competitors: Vec<CompetitorId>,
    #[serde(default = "default_round_count")]
    rounds: u32,
}

fn default_round_count() -> u32 {
    5
}

#[derive(Deserialize)]
struct CompetitorsBody {
    competitors: Vec<CompetitorId>,
}

#[derive(Deserialize)]
struct ResultBody {
    score_a: u32,
    score_b: u32,
    #[serde(default)]
    maps: Vec<MapResult>,
}

#[derive(Deserialize)]
struct TransitionBody {
    state: MatchState,
}

#[derive(Deserialize)]
struct WinnerBody {
    winner: CompetitorId,
}

#[derive(Deserialize)]
struct CompetitorBody {
    competitor: CompetitorId,
}

#[derive(Deserialize)]
struct RevertRoundBody {
    round: u32,
}

#[derive(Deserialize)]
struct RevertBracketRoundBody {
    side: BracketSide,
    round: u32,
}

#[derive(Deserialize)]
struct ProposeBody {
    proposer: CompetitorId,
    time: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RespondBody {
    responder: CompetitorId,
    accept: bool,
}

/// Path segment: a stage, match, bracket or proposal id.
#[derive(Deserialize)]
struct IdPath {
    id: Uuid,
}

/// Path segments: stage id and round number (e.g. /api/stages/{id}/rounds/{round})
#[derive(Deserialize)]
struct StageRoundPath {
    id: StageId,
    round: u32,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_forfeit_poll_secs() -> u64 {
    60
}

/// Map an engine result onto a JSON response; errors become `{"error": ...}`.
fn respond<T: Serialize>(result: Result<T, EngineError>) -> HttpResponse {
    match result {
        Ok(value) => HttpResponse::Ok().json(value),
        Err(e) => {
            let body = serde_json::json!({ "error": e.to_string() });
            match (e.kind(), &e) {
                (_, EngineError::NotFound { .. }) => HttpResponse::NotFound().json(body),
                (ErrorKind::Validation, _) => HttpResponse::BadRequest().json(body),
                (ErrorKind::Precondition, _) => HttpResponse::PreconditionFailed().json(body),
                (ErrorKind::ConcurrencyConflict, _) => HttpResponse::Conflict().json(body),
                (ErrorKind::Consistency, _) => {
                    log::error!("consistency error: {}", e);
                    HttpResponse::InternalServerError().json(body)
                }
            }
        }
    }
}

#[get("/api/health")]
async fn api_health() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        ok: true,
        service: "tournament-progression",
    })
}

#[post("/api/stages")]
async fn api_start_stage(state: AppState, body: Json<StartStageBody>) -> HttpResponse {
    respond(state.start_stage(&body.competitors, body.rounds))
}

#[get("/api/stages/{id}")]
async fn api_get_stage(state: AppState, path: Path<IdPath>) -> HttpResponse {
    respond(state.get_stage(path.id))
}

#[get("/api/stages/{id}/standings")]
async fn api_standings(state: AppState, path: Path<IdPath>) -> HttpResponse {
    respond(state.standings(path.id))
}

#[get("/api/stages/{id}/rounds/{round}")]
async fn api_round_matches(state: AppState, path: Path<StageRoundPath>) -> HttpResponse {
    respond(state.round_matches(path.id, path.round))
}

#[post("/api/stages/{id}/check")]
async fn api_check_round(state: AppState, path: Path<IdPath>) -> HttpResponse {
    respond(state.check_round_completion(path.id))
}

#[post("/api/stages/{id}/advance")]
async fn api_advance_round(state: AppState, path: Path<IdPath>) -> HttpResponse {
    respond(state.advance_round(path.id))
}

#[post("/api/stages/{id}/revert")]
async fn api_revert_to_round(state: AppState, path: Path<IdPath>, body: Json<RevertRoundBody>) -> HttpResponse {
    respond(state.revert_to_round(path.id, body.round))
}

#[post("/api/stages/{id}/playoffs")]
async fn api_seed_playoffs(state: AppState, path: Path<IdPath>) -> HttpResponse {
    respond(state.seed_playoffs_from_stage(path.id))
}

#[get("/api/matches/{id}")]
async fn api_get_match(state: AppState, path: Path<IdPath>) -> HttpResponse {
    respond(state.get_match(path.id))
}

#[post("/api/matches/{id}/result")]
async fn api_record_result(state: AppState, path: Path<IdPath>, body: Json<ResultBody>) -> HttpResponse {
    let ResultBody { score_a, score_b, maps } = body.into_inner();
    respond(state.record_match_result(path.id, score_a, score_b, maps))
}

#[post("/api/matches/{id}/force")]
async fn api_force_complete(state: AppState, path: Path<IdPath>, body: Json<ResultBody>) -> HttpResponse {
    respond(state.force_complete_match(path.id, body.score_a, body.score_b))
}

#[post("/api/matches/{id}/state")]
async fn api_transition_match(state: AppState, path: Path<IdPath>, body: Json<TransitionBody>) -> HttpResponse {
    respond(state.transition_match(path.id, body.state))
}

#[post("/api/matches/{id}/winner")]
async fn api_advance_winner(state: AppState, path: Path<IdPath>, body: Json<WinnerBody>) -> HttpResponse {
    respond(state.advance_bracket_winner(path.id, body.winner))
}

#[post("/api/matches/{id}/revert")]
async fn api_revert_match(state: AppState, path: Path<IdPath>) -> HttpResponse {
    respond(state.revert_single_match(path.id))
}

#[post("/api/matches/{id}/unadvance")]
async fn api_revert_advancement(state: AppState, path: Path<IdPath>, body: Json<CompetitorBody>) -> HttpResponse {
    let match_id: MatchId = path.id;
    respond(state.revert_team_advancement(match_id, body.competitor))
}

#[get("/api/matches/{id}/proposals")]
async fn api_list_proposals(state: AppState, path: Path<IdPath>) -> HttpResponse {
    respond(state.proposals(path.id))
}

#[post("/api/matches/{id}/proposals")]
async fn api_propose(state: AppState, path: Path<IdPath>, body: Json<ProposeBody>) -> HttpResponse {
    respond(state.propose_schedule(path.id, body.proposer, body.time))
}

#[post("/api/proposals/{id}/respond")]
async fn api_respond(state: AppState, path: Path<IdPath>, body: Json<RespondBody>) -> HttpResponse {
    let proposal_id: ProposalId = path.id;
    respond(state.respond_to_proposal(proposal_id, body.responder, body.accept))
}

#[post("/api/brackets/double-elimination")]
async fn api_start_double_elimination(state: AppState, body: Json<CompetitorsBody>) -> HttpResponse {
    respond(state.start_double_elimination(&body.competitors))
}

#[post("/api/brackets/playoffs")]
async fn api_playoff_seeding(state: AppState, body: Json<CompetitorsBody>) -> HttpResponse {
    respond(state.generate_playoff_seeding(&body.competitors))
}

#[get("/api/brackets/{id}")]
async fn api_get_bracket(state: AppState, path: Path<IdPath>) -> HttpResponse {
    let bracket_id: BracketId = path.id;
    let result = state
        .bracket_with_nodes(bracket_id)
        .map(|(bracket, nodes)| serde_json::json!({ "bracket": bracket, "nodes": nodes }));
    respond(result)
}

#[post("/api/brackets/{id}/revert")]
async fn api_revert_bracket_round(
    state: AppState,
    path: Path<IdPath>,
    body: Json<RevertBracketRoundBody>,
) -> HttpResponse {
    respond(state.revert_bracket_round(path.id, body.side, body.round))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let host = std::env::var("HOST").unwrap_or_else(|_| default_host());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or_else(default_port);
    let poll_secs: u64 = std::env::var("FORFEIT_POLL_SECS")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or_else(default_forfeit_poll_secs);
    let bind = (host.as_str(), port);

    let config = EngineConfig::from_env();
    log::info!("engine config: {:?}", config);
    let state = Data::new(Engine::new(MemoryStore::new(), config));

    // Background task: forfeit overdue matches in every active stage.
    let poller = state.clone();
    actix_web::rt::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(poll_secs.max(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            for (stage_id, status) in poller.apply_due_forfeits() {
                log::info!(
                    "forfeit sweep: stage {} round {} forfeited {} match(es)",
                    stage_id,
                    status.round,
                    status.forfeited.len()
                );
            }
        }
    });

    log::info!("Starting server at http://{}:{}", bind.0, bind.1);
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .service(api_health)
            .service(api_start_stage)
            .service(api_get_stage)
            .service(api_standings)
            .service(api_round_matches)
            .service(api_check_round)
            .service(api_advance_round)
            .service(api_revert_to_round)
            .service(api_seed_playoffs)
            .service(api_get_match)
            .service(api_record_result)
            .service(api_force_complete)
            .service(api_transition_match)
            .service(api_advance_winner)
            .service(api_revert_match)
            .service(api_revert_advancement)
            .service(api_list_proposals)
            .service(api_propose)
            .service(api_respond)
            .service(api_start_double_elimination)
            .service(api_playoff_seeding)
            .service(api_get_bracket)
            .service(api_revert_bracket_round)
    })
    .bind(bind)?
    .run()
    .await
}
