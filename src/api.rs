// 🌐 HTTP API
// Thin translation between JSON requests and VotingService calls. All
// responses share one envelope: { success, data?, error? }.

use crate::approval::Decision;
use crate::auth::AdminCredential;
use crate::error::VoteError;
use crate::record::{StatsSnapshot, VoteRecord};
use crate::service::VotingService;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderMap, Method, StatusCode,
    },
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<VotingService>,
    /// `None` when no admin token is configured: admin routes always 401
    pub admin: Option<Arc<AdminCredential>>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

// ============================================================================
// Errors
// ============================================================================

pub enum ApiError {
    Vote(VoteError),
    Unauthorized,
}

impl From<VoteError> for ApiError {
    fn from(e: VoteError) -> Self {
        ApiError::Vote(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Vote(VoteError::validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::Vote(e) => match e {
                VoteError::Validation(message) => (StatusCode::BAD_REQUEST, message),
                VoteError::DuplicateVote { .. } => {
                    (StatusCode::CONFLICT, "You have already voted".to_string())
                }
                VoteError::NotFound { .. } => (StatusCode::NOT_FOUND, "Vote not found".to_string()),
                VoteError::Store(e) => {
                    error!(error = %e, "Store failure while handling request");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal error, please retry".to_string(),
                    )
                }
            },
        };

        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(message),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());

    match &state.admin {
        Some(credential) if credential.verify_header(header) => Ok(()),
        _ => {
            warn!("Rejected unauthorized admin request");
            Err(ApiError::Unauthorized)
        }
    }
}

// ============================================================================
// Request / response bodies
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitVoteRequest {
    #[serde(default, alias = "outfitId")]
    entry_id: Option<Value>,
    #[serde(default)]
    username: Option<String>,
}

#[derive(Serialize)]
struct SubmitVoteResponse {
    vote: VoteRecord,
    message: &'static str,
}

#[derive(Deserialize)]
struct StatusQuery {
    username: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoteStatusResponse {
    has_voted: bool,
    vote: Option<VoteRecord>,
}

#[derive(Serialize)]
struct PendingResponse {
    votes: Vec<VoteRecord>,
    count: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DecideRequest {
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    vote_id: Option<String>,
}

#[derive(Serialize)]
struct DecideResponse {
    action: Decision,
    vote: VoteRecord,
}

/// Entry ids may arrive as strings or numbers
fn entry_id_text(value: Option<Value>) -> String {
    match value {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn missing_fields() -> ApiError {
    VoteError::validation("Missing required fields").into()
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    ApiResponse::ok("OK")
}

/// POST /api/vote - Cast a vote
async fn submit_vote(
    State(state): State<AppState>,
    payload: Result<Json<SubmitVoteRequest>, JsonRejection>,
) -> ApiResult<SubmitVoteResponse> {
    let Json(request) = payload?;
    let entry_id = entry_id_text(request.entry_id);
    let username = request.username.unwrap_or_default();

    if entry_id.trim().is_empty() || username.trim().is_empty() {
        return Err(missing_fields());
    }

    let submission = state.service.submit_vote(&entry_id, &username)?;
    Ok(ApiResponse::ok(SubmitVoteResponse {
        vote: submission.record,
        message: submission.message,
    }))
}

/// GET /api/vote?username= - Has this user voted?
async fn vote_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<VoteStatusResponse> {
    let username = query.username.unwrap_or_default();
    let vote = state.service.vote_status(&username)?;

    Ok(ApiResponse::ok(VoteStatusResponse {
        has_voted: vote.is_some(),
        vote,
    }))
}

/// GET /api/stats - Live results
async fn get_stats(State(state): State<AppState>) -> ApiResult<StatsSnapshot> {
    Ok(ApiResponse::ok(state.service.stats()?))
}

/// GET /api/approve - Pending votes (admin)
async fn pending_votes(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<PendingResponse> {
    require_admin(&state, &headers)?;

    let votes = state.service.pending_votes()?;
    Ok(ApiResponse::ok(PendingResponse {
        count: votes.len(),
        votes,
    }))
}

/// POST /api/approve - Approve or reject a pending vote (admin)
async fn decide_vote(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<DecideRequest>, JsonRejection>,
) -> ApiResult<DecideResponse> {
    require_admin(&state, &headers)?;

    let Json(request) = payload?;
    let (Some(action), Some(vote_id)) = (request.action, request.vote_id) else {
        return Err(missing_fields());
    };

    let decision: Decision = action.parse()?;
    let vote = state.service.decide(decision, &vote_id)?;

    Ok(ApiResponse::ok(DecideResponse {
        action: decision,
        vote,
    }))
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/vote", get(vote_status).post(submit_vote))
        .route("/stats", get(get_stats))
        .route("/approve", get(pending_votes).post(decide_vote))
        .with_state(state);

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
