//! HTTP surface for the authorization service
//!
//! ## Endpoints
//!
//! - `POST /v1/sessions/decode` - Decode a token into a session
//! - `POST /v1/sessions/refresh` - Refresh a session, retiring its token id
//! - `POST /v1/sessions/revoke` - Revoke a session
//! - `POST /v1/check` - Single channel decision
//! - `POST /v1/channels` - Every channel available toward a realm
//! - `POST /v1/scopes/group` - Group scopes by resource
//! - `POST /v1/scopes/feature` - Feature scope check
//! - `GET /v1/revocations` - Revoked token ids
//! - `GET /v1/policy/:from/:to` - Policy snapshot for a realm pair
//! - `PUT /v1/policy` - Replace the policy table
//! - `GET /health` - Health check
//! - `GET /metrics` - Prometheus metrics (separate listener)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use icom_core::{Channel, Realm, TokenId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{debug, Level};

use crate::engine::AuthorizationDecision;
use crate::error::{AuthzError, DecodeError};
use crate::policy::{PolicyDocument, PolicySnapshot};
use crate::scope::ScopeSet;
use crate::service::AuthzService;
use crate::session::{encode_unsigned, Session};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AuthzService>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(service: Arc<AuthzService>) -> Self {
        Self {
            service,
            start_time: Instant::now(),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };

        let body = Json(ErrorResponse {
            error: error.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

impl From<DecodeError> for AppError {
    fn from(err: DecodeError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<AuthzError> for AppError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::SessionRevoked(_) | AuthzError::SessionExpired(_) => {
                AppError::Conflict(err.to_string())
            }
            AuthzError::Decode(_)
            | AuthzError::InvalidPolicy(_)
            | AuthzError::InvalidScope(_) => AppError::BadRequest(err.to_string()),
            AuthzError::Config(_) | AuthzError::Io(_) => AppError::Internal(err.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub session: Session,
    /// Unsigned token carrying the refreshed claims
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub token: String,
    pub target_realm: Realm,
    pub channel: Channel,
}

#[derive(Debug, Deserialize)]
pub struct ChannelsRequest {
    pub token: String,
    pub target_realm: Realm,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChannelsResponse {
    pub channels: BTreeSet<Channel>,
}

#[derive(Debug, Deserialize)]
pub struct ScopesRequest {
    pub scopes: ScopeSet,
}

#[derive(Debug, Deserialize)]
pub struct FeatureRequest {
    pub scopes: ScopeSet,
    pub feature: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeatureResponse {
    pub has_feature: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RevocationsResponse {
    pub revocations: BTreeSet<TokenId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PolicyVersionResponse {
    pub version: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: u64,
    pub version: String,
    pub policy_version: u64,
}

/// Metrics response (Prometheus format)
struct MetricsResponse {
    metrics: String,
}

impl IntoResponse for MetricsResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            self.metrics,
        )
            .into_response()
    }
}

/// POST /v1/sessions/decode
async fn decode_session(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> Result<Json<Session>, AppError> {
    Ok(Json(state.service.decode(&req.token)?))
}

/// POST /v1/sessions/refresh
async fn refresh_session(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> Result<Json<RefreshResponse>, AppError> {
    let session = state.service.decode(&req.token)?;
    let refreshed = state.service.refresh(&session)?;
    let token = encode_unsigned(&refreshed.to_claims());

    Ok(Json(RefreshResponse {
        session: refreshed,
        token,
    }))
}

/// POST /v1/sessions/revoke
async fn revoke_session(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> Result<StatusCode, AppError> {
    let session = state.service.decode(&req.token)?;
    state.service.revoke(&session);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/check
async fn check(
    State(state): State<AppState>,
    Json(req): Json<CheckRequest>,
) -> Json<AuthorizationDecision> {
    let decision = state
        .service
        .can_communicate_with_token(&req.token, req.target_realm, req.channel);

    debug!(
        "Check {} toward {}: {}",
        req.channel, req.target_realm, decision.reason_code
    );

    Json(decision)
}

/// POST /v1/channels
async fn available_channels(
    State(state): State<AppState>,
    Json(req): Json<ChannelsRequest>,
) -> Json<ChannelsResponse> {
    Json(ChannelsResponse {
        channels: state
            .service
            .get_available_channels_with_token(&req.token, req.target_realm),
    })
}

/// POST /v1/scopes/group
async fn group_scopes(
    State(state): State<AppState>,
    Json(req): Json<ScopesRequest>,
) -> Json<BTreeMap<String, Vec<String>>> {
    Json(state.service.group_scopes(&req.scopes))
}

/// POST /v1/scopes/feature
async fn feature_scope(
    State(state): State<AppState>,
    Json(req): Json<FeatureRequest>,
) -> Json<FeatureResponse> {
    Json(FeatureResponse {
        has_feature: state.service.has_feature_scope(&req.scopes, &req.feature),
    })
}

/// GET /v1/revocations
async fn list_revocations(State(state): State<AppState>) -> Json<RevocationsResponse> {
    Json(RevocationsResponse {
        revocations: state.service.list_revocations(),
    })
}

/// GET /v1/policy/:from/:to
async fn get_policy(
    State(state): State<AppState>,
    Path((from, to)): Path<(Realm, Realm)>,
) -> Json<PolicySnapshot> {
    Json(state.service.get_cross_realm_policy(from, to))
}

/// PUT /v1/policy
async fn replace_policy(
    State(state): State<AppState>,
    Json(document): Json<PolicyDocument>,
) -> Result<Json<PolicyVersionResponse>, AppError> {
    let version = state.service.replace_policy(document)?;
    Ok(Json(PolicyVersionResponse { version }))
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        version: crate::VERSION.to_string(),
        policy_version: state.service.policy_version(),
    })
}

/// GET /metrics
async fn metrics(State(state): State<AppState>) -> MetricsResponse {
    let mut metrics = format!(
        "# HELP authz_uptime_seconds Server uptime in seconds\n\
         # TYPE authz_uptime_seconds gauge\n\
         authz_uptime_seconds {}\n\
         # HELP authz_policy_version Installed policy version\n\
         # TYPE authz_policy_version gauge\n\
         authz_policy_version {}\n\
         # HELP authz_revocations Revoked token ids retained\n\
         # TYPE authz_revocations gauge\n\
         authz_revocations {}\n",
        state.start_time.elapsed().as_secs(),
        state.service.policy_version(),
        state.service.sessions().revocations().len(),
    );

    if let Some(collector) = state.service.engine().metrics() {
        metrics.push_str(&collector.export_prometheus());
    }

    MetricsResponse { metrics }
}

/// Create the HTTP router with all API endpoints
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace = TraceLayer::new_for_http().on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/v1/sessions/decode", post(decode_session))
        .route("/v1/sessions/refresh", post(refresh_session))
        .route("/v1/sessions/revoke", post(revoke_session))
        .route("/v1/check", post(check))
        .route("/v1/channels", post(available_channels))
        .route("/v1/scopes/group", post(group_scopes))
        .route("/v1/scopes/feature", post(feature_scope))
        .route("/v1/revocations", get(list_revocations))
        .route("/v1/policy/:from/:to", get(get_policy))
        .route("/health", get(health_check))
        .layer(ServiceBuilder::new().layer(trace).layer(cors))
        .with_state(state)
}

/// Create the metrics and administration router
///
/// Served on the metrics listener only, without CORS; policy replacement
/// lives here rather than on the public API.
pub fn create_metrics_router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/v1/policy", put(replace_policy))
        .with_state(state)
}

/// Periodically drop revocation entries past expiry and grace
pub fn spawn_prune_task(service: Arc<AuthzService>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            service.prune_revocations();
        }
    })
}
