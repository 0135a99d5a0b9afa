//! HTTP API Server
//!
//! REST API over the election: admin commands, voter commands, queries
//! and the notification feed.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Json, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{
        sse::{Event as SseEvent, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Router,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::StreamExt;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::ApiConfig;
use crate::election::{
    Address, ElectionService, ElectionSummary, EventRecord, ProposalId, Standing, Voter,
    WorkflowStatus,
};
use crate::error::{Error, Result};

/// Header carrying the authenticated caller identity
pub const CALLER_HEADER: &str = "x-wolfvote-caller";

/// Shared handler state
struct AppState {
    election: Arc<ElectionService>,
    started_at: Instant,
}

/// HTTP API server
pub struct HttpServer {
    config: ApiConfig,
    state: Arc<AppState>,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new(config: ApiConfig, election: Arc<ElectionService>) -> Self {
        let state = Arc::new(AppState {
            election,
            started_at: Instant::now(),
        });

        Self { config, state }
    }

    /// Build the router with middleware applied
    pub fn router(&self) -> Router {
        let router =
            Self::create_router(Arc::clone(&self.state)).layer(TraceLayer::new_for_http());
        if self.config.cors_enabled {
            router.layer(CorsLayer::permissive())
        } else {
            router
        }
    }

    /// Create the router
    fn create_router(state: Arc<AppState>) -> Router {
        Router::new()
            // Status and info
            .route("/health", get(handle_health))
            .route("/status", get(handle_status))
            .route("/phase", get(handle_phase))
            // Voters
            .route("/voters", post(handle_add_voter))
            .route("/voters/:address", get(handle_voter))
            // Proposals
            .route("/proposals", get(handle_proposals).post(handle_add_proposal))
            .route("/proposals/:id", get(handle_proposal))
            // Ballots
            .route("/votes", post(handle_vote))
            // Phase transitions
            .route("/phase/start-proposals", post(handle_start_proposals))
            .route("/phase/end-proposals", post(handle_end_proposals))
            .route("/phase/start-voting", post(handle_start_voting))
            .route("/phase/end-voting", post(handle_end_voting))
            .route("/phase/tally", post(handle_tally))
            // Results
            .route("/winner", get(handle_winner))
            .route("/results", get(handle_results))
            // Notifications
            .route("/events", get(handle_events))
            .route("/events/stream", get(handle_event_stream))
            .with_state(state)
    }

    /// Start the HTTP server, stopping gracefully when `shutdown` resolves
    pub async fn start_with_shutdown<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if !self.config.enabled {
            tracing::info!("HTTP API disabled");
            return Ok(());
        }

        let app = self.router();

        let listener = tokio::net::TcpListener::bind(&self.config.bind_address).await?;
        tracing::info!("HTTP API listening on {}", self.config.bind_address);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| Error::Network(format!("HTTP server error: {}", e)))?;

        Ok(())
    }
}

// ============ Request/Response Types ============

/// Add voter request
#[derive(Debug, Deserialize, Serialize)]
pub struct AddVoterRequest {
    pub address: String,
}

/// Add proposal request
#[derive(Debug, Deserialize, Serialize)]
pub struct AddProposalRequest {
    pub description: String,
}

/// Vote request
#[derive(Debug, Deserialize, Serialize)]
pub struct VoteRequest {
    pub proposal_id: ProposalId,
}

/// Accepted command response
#[derive(Debug, Serialize, Deserialize)]
pub struct CommandResponse {
    pub success: bool,
    pub record: EventRecord,
}

/// Status response
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub summary: ElectionSummary,
    pub uptime_seconds: u64,
}

/// Health response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub name: String,
}

/// Phase response
#[derive(Debug, Serialize, Deserialize)]
pub struct PhaseResponse {
    pub phase: WorkflowStatus,
    pub index: u8,
}

/// Voter response
#[derive(Debug, Serialize, Deserialize)]
pub struct VoterResponse {
    pub address: Address,
    #[serde(flatten)]
    pub voter: Voter,
}

/// Winner response
#[derive(Debug, Serialize, Deserialize)]
pub struct WinnerResponse {
    pub phase: WorkflowStatus,
    pub winning_proposal_id: Option<ProposalId>,
    pub proposal: Option<Standing>,
}

/// Events query
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub since: u64,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

// ============ Helpers ============

fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::Unauthorized(_) => StatusCode::FORBIDDEN,
        Error::WrongPhase { .. } | Error::AlreadyRegistered(_) | Error::AlreadyVoted(_) => {
            StatusCode::CONFLICT
        }
        Error::ProposalNotFound(_) => StatusCode::NOT_FOUND,
        Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: Error) -> Response {
    (
        status_for(&err),
        Json(ErrorResponse {
            error: err.to_string(),
            code: err.code().to_string(),
        }),
    )
        .into_response()
}

fn command_response(result: Result<EventRecord>) -> Response {
    match result {
        Ok(record) => Json(CommandResponse {
            success: true,
            record,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

/// Extract the caller identity from the request headers
fn caller(headers: &HeaderMap) -> std::result::Result<Address, Response> {
    headers
        .get(CALLER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(Address::from)
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: format!("Missing {} header", CALLER_HEADER),
                    code: "MISSING_CALLER".to_string(),
                }),
            )
                .into_response()
        })
}

fn standing(proposal_id: ProposalId, proposal: crate::election::Proposal) -> Standing {
    Standing {
        proposal_id,
        description: proposal.description,
        vote_count: proposal.vote_count,
    }
}

// ============ Handlers ============

async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        healthy: true,
        name: state.election.name().to_string(),
    })
}

async fn handle_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(StatusResponse {
        summary: state.election.summary().await,
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}

async fn handle_phase(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let phase = state.election.current_phase().await;
    Json(PhaseResponse {
        phase,
        index: phase.index(),
    })
}

async fn handle_add_voter(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<AddVoterRequest>,
) -> Response {
    let caller = match caller(&headers) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    command_response(state.election.add_voter(&caller, Address::from(req.address)).await)
}

async fn handle_voter(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Response {
    let address = Address::from(address);
    match state.election.voter(&address).await {
        Some(voter) => Json(VoterResponse { address, voter }).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Voter {} not found", address),
                code: "VOTER_NOT_FOUND".to_string(),
            }),
        )
            .into_response(),
    }
}

async fn handle_proposals(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let proposals: Vec<Standing> = state
        .election
        .proposals()
        .await
        .into_iter()
        .enumerate()
        .map(|(idx, p)| standing(idx as ProposalId, p))
        .collect();
    Json(proposals)
}

async fn handle_proposal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<ProposalId>,
) -> Response {
    match state.election.proposal(id).await {
        Ok(p) => Json(standing(id, p)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn handle_add_proposal(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<AddProposalRequest>,
) -> Response {
    let caller = match caller(&headers) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    command_response(state.election.add_proposal(&caller, req.description).await)
}

async fn handle_vote(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<VoteRequest>,
) -> Response {
    let caller = match caller(&headers) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    command_response(state.election.set_vote(&caller, req.proposal_id).await)
}

async fn handle_start_proposals(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    match caller(&headers) {
        Ok(c) => command_response(state.election.start_proposals_registering(&c).await),
        Err(resp) => resp,
    }
}

async fn handle_end_proposals(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    match caller(&headers) {
        Ok(c) => command_response(state.election.end_proposals_registering(&c).await),
        Err(resp) => resp,
    }
}

async fn handle_start_voting(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    match caller(&headers) {
        Ok(c) => command_response(state.election.start_voting_session(&c).await),
        Err(resp) => resp,
    }
}

async fn handle_end_voting(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    match caller(&headers) {
        Ok(c) => command_response(state.election.end_voting_session(&c).await),
        Err(resp) => resp,
    }
}

async fn handle_tally(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    match caller(&headers) {
        Ok(c) => command_response(state.election.tally_votes(&c).await),
        Err(resp) => resp,
    }
}

async fn handle_winner(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let phase = state.election.current_phase().await;
    let winning_proposal_id = state.election.winning_proposal_id().await;
    let proposal = match winning_proposal_id {
        Some(id) => state.election.proposal(id).await.ok().map(|p| standing(id, p)),
        None => None,
    };

    Json(WinnerResponse {
        phase,
        winning_proposal_id,
        proposal,
    })
}

async fn handle_results(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.election.results().await)
}

async fn handle_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventsQuery>,
) -> impl IntoResponse {
    Json(state.election.events_since(query.since).await)
}

/// Live notifications as Server-Sent Events
async fn handle_event_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = std::result::Result<SseEvent, Infallible>>> {
    let rx = state.election.subscribe().await;

    let stream = BroadcastStream::new(rx).filter_map(|item| match item {
        Ok(record) => match SseEvent::default()
            .event(record.event.name())
            .id(record.sequence.to_string())
            .json_data(&record)
        {
            Ok(event) => Some(Ok(event)),
            Err(e) => {
                tracing::warn!("Failed to encode event #{}: {}", record.sequence, e);
                None
            }
        },
        Err(BroadcastStreamRecvError::Lagged(missed)) => {
            tracing::debug!("Event stream subscriber lagged, skipped {} events", missed);
            None
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
