//! Command queue handlers.
//!
//! Enqueue runs the full gate chain in order: authenticate, rate limit,
//! role policy, step-up. The durable write happens only after every gate
//! has passed, and the broadcast only after the write is confirmed, so a
//! broadcast never announces work that is not yet visible in the queue.

use super::{AppState, authenticate, require_consumer};
use crate::db::commands::{CommandRecord, CommandStatus};
use crate::error::{BridgeError, BridgeResult};
use crate::identity::Identity;
use crate::policy::Denial;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

/// Header carrying the step-up proof on sensitive requests.
const STEP_UP_HEADER: &str = "x-step-up-token";

#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    pub command: String,
}

/// Step-up gate: accounts with a second factor enrolled must present a
/// valid token bound to their own identity. Invalid, expired, and
/// wrong-subject tokens all map to the same re-verification prompt.
fn step_up_gate(state: &AppState, headers: &HeaderMap, identity: &Identity) -> BridgeResult<()> {
    if !identity.second_factor_enabled {
        return Ok(());
    }

    let token = headers
        .get(STEP_UP_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(BridgeError::StepUpRequired)?;

    match state.stepup.verify(token) {
        Ok(subject) if subject == identity.id => Ok(()),
        _ => Err(BridgeError::StepUpRequired),
    }
}

/// POST /bridge/queue
pub async fn enqueue(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<EnqueueRequest>,
) -> BridgeResult<impl IntoResponse> {
    let identity = authenticate(&state, &headers).await?;

    let command = req.command.trim();
    if command.is_empty() {
        return Err(BridgeError::BadRequest("command must not be empty".into()));
    }

    if !state.rate_limiter.check_sensitive(&identity.id) {
        return Err(BridgeError::RateLimited);
    }

    state
        .policy
        .authorize_command(&identity, command)
        .map_err(|denial| {
            let reason = match denial {
                Denial::NotStaff => "not staff",
                Denial::NotOwner => "not on owner allow-list",
                Denial::InsufficientRank => "insufficient rank",
            };
            warn!(caller = %identity.id, role = %identity.role, reason, "command rejected");
            BridgeError::Forbidden
        })?;

    step_up_gate(&state, &headers, &identity)?;

    let record = state.db.commands().enqueue(command).await?;
    crate::metrics::record_enqueue();
    state.broadcaster.broadcast_refresh();
    super::refresh_queue_depth(&state).await;

    info!(id = record.id, caller = %identity.id, "command queued");
    Ok((StatusCode::CREATED, Json(json!({ "id": record.id }))))
}

/// GET /bridge/queue/:id
pub async fn status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> BridgeResult<Json<CommandStatus>> {
    let identity = authenticate(&state, &headers).await?;
    if !state.policy.is_staff(&identity.role) {
        return Err(BridgeError::Forbidden);
    }

    let status = state
        .db
        .commands()
        .status(id)
        .await?
        .ok_or(BridgeError::NotFound)?;
    Ok(Json(status))
}

/// POST /bridge/stepup
///
/// Mint a step-up token for the calling identity. The second-factor
/// challenge itself lives with the identity provider fronting the bridge;
/// this endpoint turns a freshly verified session into a short-lived proof
/// the sensitive endpoints can check statelessly.
pub async fn issue_step_up(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> BridgeResult<Json<serde_json::Value>> {
    let identity = authenticate(&state, &headers).await?;
    if !identity.second_factor_enabled {
        return Err(BridgeError::BadRequest(
            "no second factor enrolled for this account".into(),
        ));
    }

    let token = state.stepup.issue(&identity.id);
    Ok(Json(json!({
        "token": token,
        "expires_in": state.stepup.ttl_secs(),
    })))
}

/// GET /bridge/pending (consumer)
pub async fn pending(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> BridgeResult<Json<Vec<CommandRecord>>> {
    require_consumer(&state, &headers)?;
    let records = state.db.commands().pending().await?;
    Ok(Json(records))
}

/// POST /bridge/executed/:id (consumer)
pub async fn mark_executed(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> BridgeResult<Json<serde_json::Value>> {
    require_consumer(&state, &headers)?;

    // Already-executed and unknown both fall through to NotFound; the
    // transition is one-way either way.
    if !state.db.commands().mark_executed(id).await? {
        return Err(BridgeError::NotFound);
    }
    crate::metrics::record_executed();
    super::refresh_queue_depth(&state).await;

    info!(id, "command marked executed");
    Ok(Json(json!({ "id": id, "executed": true })))
}
