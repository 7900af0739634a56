//! HTTP API surface.
//!
//! Two audiences share one router: web callers (queue submission, status
//! polls, account linking) authenticate with bearer credentials resolved
//! through the identity provider; the game-server consumer (queue drain,
//! code exchange from the game side) authenticates with the pre-shared
//! consumer token. Every handler authenticates before touching state.

pub mod bridge;
pub mod link;

use crate::channel::Broadcaster;
use crate::config::Config;
use crate::db::Database;
use crate::error::{BridgeError, BridgeResult};
use crate::identity::{Identity, IdentityResolver, TokenTableResolver};
use crate::policy::RolePolicy;
use crate::security::{RateLimitManager, StepUpVerifier};
use axum::Router;
use axum::http::{HeaderMap, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub resolver: Arc<dyn IdentityResolver>,
    pub policy: Arc<RolePolicy>,
    pub stepup: Arc<StepUpVerifier>,
    pub rate_limiter: Arc<RateLimitManager>,
    pub broadcaster: Broadcaster,
}

impl AppState {
    pub fn new(config: Arc<Config>, db: Database, broadcaster: Broadcaster) -> Self {
        let policy = Arc::new(RolePolicy::new(&config.policy));
        let stepup = Arc::new(StepUpVerifier::new(
            &config.security.step_up_secret,
            config.security.step_up_ttl_secs,
        ));
        let rate_limiter = Arc::new(RateLimitManager::new(config.security.rate_limits.clone()));
        let resolver: Arc<dyn IdentityResolver> =
            Arc::new(TokenTableResolver::new(&config.identity));

        Self {
            db,
            config,
            resolver,
            policy,
            stepup,
            rate_limiter,
            broadcaster,
        }
    }
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        // Web-facing bridge endpoints.
        .route("/bridge/queue", post(bridge::enqueue))
        .route("/bridge/queue/:id", get(bridge::status))
        .route("/bridge/stepup", post(bridge::issue_step_up))
        // Consumer-facing queue drain.
        .route("/bridge/pending", get(bridge::pending))
        .route("/bridge/executed/:id", post(bridge::mark_executed))
        // Web-facing linking endpoints.
        .route("/link/code", post(link::issue_code))
        .route("/link/redeem", post(link::redeem))
        .route("/link/unlink", post(link::unlink))
        .route("/link/status", get(link::status))
        // Consumer-facing linking endpoints (the game side of the exchange).
        .route("/bridge/link/code", post(link::consumer_issue_code))
        .route("/bridge/link/redeem", post(link::consumer_redeem))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Extract the bearer credential from the Authorization header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Resolve the calling web identity or fail with Unauthorized.
pub(crate) async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
) -> BridgeResult<Identity> {
    let token = bearer_token(headers).ok_or(BridgeError::Unauthorized)?;
    state
        .resolver
        .resolve(token)
        .await
        .ok_or(BridgeError::Unauthorized)
}

/// Gate for consumer-only endpoints: constant-time check against the
/// pre-shared consumer token.
pub(crate) fn require_consumer(state: &AppState, headers: &HeaderMap) -> BridgeResult<()> {
    let token = bearer_token(headers).ok_or(BridgeError::Unauthorized)?;
    let expected = state.config.security.consumer_token.as_bytes();
    if token.as_bytes().ct_eq(expected).into() {
        Ok(())
    } else {
        Err(BridgeError::Unauthorized)
    }
}

/// Refresh the queue depth gauge after a queue mutation. Best-effort; a
/// failed count never fails the request that triggered it.
pub(crate) async fn refresh_queue_depth(state: &AppState) {
    if let Ok(depth) = state.db.commands().pending_count().await {
        crate::metrics::set_queue_depth(depth);
    }
}

async fn metrics_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        crate::metrics::gather_metrics(),
    )
}
