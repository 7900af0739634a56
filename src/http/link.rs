//! Account linking handlers.
//!
//! The pairing protocol is symmetric: either side (web account, or game /
//! chat account via the consumer) generates a short-lived code and reads it
//! out-of-band to the other side, which redeems it. Redemption writes the
//! association first and deletes the code last, so a crash between the two
//! leaves a redeemable code pointing at an already-written link rather than
//! a consumed code with no link.

use super::{AppState, authenticate, require_consumer};
use crate::db::accounts::LinkSide;
use crate::db::links::LinkCode;
use crate::error::{BridgeError, BridgeResult};
use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct UnlinkRequest {
    pub side: String,
}

#[derive(Debug, Deserialize)]
pub struct ConsumerIssueRequest {
    pub source: String,
    pub source_id: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConsumerRedeemRequest {
    pub code: String,
    pub game_id: String,
    pub game_name: Option<String>,
}

/// Look up a code and apply lazy expiry: an expired row is deleted on
/// sight and reported as expired, distinct from never-existed.
async fn find_live_code(state: &AppState, code: &str) -> BridgeResult<LinkCode> {
    let found = state
        .db
        .link_codes()
        .find(code)
        .await?
        .ok_or(BridgeError::NotFound)?;

    if found.expires_at < chrono::Utc::now().timestamp_millis() {
        state.db.link_codes().delete(&found.code).await?;
        return Err(BridgeError::Expired);
    }
    Ok(found)
}

/// POST /link/code
///
/// Issue a pairing code for the calling web account. Reissuing invalidates
/// any earlier live code for the same account.
pub async fn issue_code(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> BridgeResult<Json<serde_json::Value>> {
    let identity = authenticate(&state, &headers).await?;
    if !state.rate_limiter.check_sensitive(&identity.id) {
        return Err(BridgeError::RateLimited);
    }

    let code = state
        .db
        .link_codes()
        .issue(
            "web",
            &identity.id,
            Some(&identity.display_name),
            state.config.link.code_ttl_secs,
        )
        .await?;
    crate::metrics::record_code_issued();

    Ok(Json(json!({
        "code": code.code,
        "expires_at": code.expires_at,
    })))
}

/// POST /link/redeem
///
/// Redeem a game- or chat-sourced code against the calling web account.
pub async fn redeem(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RedeemRequest>,
) -> BridgeResult<Json<serde_json::Value>> {
    let identity = authenticate(&state, &headers).await?;
    if !state.rate_limiter.check_sensitive(&identity.id) {
        return Err(BridgeError::RateLimited);
    }

    let code = find_live_code(&state, &req.code).await?;
    let side = match code.source.as_str() {
        "game" => LinkSide::Game,
        "chat" => LinkSide::Chat,
        // A web-sourced code is redeemed from the game side, not here.
        _ => {
            return Err(BridgeError::BadRequest(
                "this code must be redeemed in game".into(),
            ));
        }
    };

    state
        .db
        .account_links()
        .link(&identity.id, side, &code.source_id, code.display_name.as_deref())
        .await?;
    // Association confirmed durable; now the code may be consumed.
    state.db.link_codes().delete(&code.code).await?;
    crate::metrics::record_code_redeemed();

    info!(web_user = %identity.id, source = %code.source, "account linked");
    Ok(Json(json!({
        "linked": {
            "side": code.source,
            "id": code.source_id,
            "name": code.display_name,
        }
    })))
}

/// POST /link/unlink
pub async fn unlink(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UnlinkRequest>,
) -> BridgeResult<Json<serde_json::Value>> {
    let identity = authenticate(&state, &headers).await?;

    let side = LinkSide::parse(&req.side)
        .ok_or_else(|| BridgeError::BadRequest(format!("unknown side: {}", req.side)))?;

    let removed = state.db.account_links().unlink(&identity.id, side).await?;

    // Unlinking a game account leaves stale player state on the game
    // server; enqueue the configured sync command so the consumer refreshes
    // that player on its next drain.
    if side == LinkSide::Game {
        if let Some(player) = &removed {
            let sync = &state.config.link.sync_command;
            if !sync.is_empty() {
                let command = sync.replace("{player}", player);
                state.db.commands().enqueue(&command).await?;
                crate::metrics::record_enqueue();
                state.broadcaster.broadcast_refresh();
                super::refresh_queue_depth(&state).await;
            }
        }
    }

    info!(web_user = %identity.id, side = %req.side, removed = removed.is_some(), "account unlinked");
    Ok(Json(json!({ "removed": removed.is_some() })))
}

/// GET /link/status
pub async fn status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> BridgeResult<Json<serde_json::Value>> {
    let identity = authenticate(&state, &headers).await?;
    let association = state.db.account_links().get(&identity.id).await?;
    Ok(Json(json!({
        "linked": association.is_some(),
        "association": association,
    })))
}

/// POST /bridge/link/code (consumer)
///
/// Issue a code on behalf of a game or chat account, read out to the
/// player in game / in chat and redeemed on the website.
pub async fn consumer_issue_code(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ConsumerIssueRequest>,
) -> BridgeResult<Json<serde_json::Value>> {
    require_consumer(&state, &headers)?;

    if req.source != "game" && req.source != "chat" {
        return Err(BridgeError::BadRequest(format!(
            "unknown source: {}",
            req.source
        )));
    }
    if req.source_id.trim().is_empty() {
        return Err(BridgeError::BadRequest("source_id must not be empty".into()));
    }

    let code = state
        .db
        .link_codes()
        .issue(
            &req.source,
            &req.source_id,
            req.display_name.as_deref(),
            state.config.link.code_ttl_secs,
        )
        .await?;
    crate::metrics::record_code_issued();

    Ok(Json(json!({
        "code": code.code,
        "expires_at": code.expires_at,
    })))
}

/// POST /bridge/link/redeem (consumer)
///
/// Redeem a web-sourced code with a game identity: the player generated a
/// code on the website and typed it in game.
pub async fn consumer_redeem(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ConsumerRedeemRequest>,
) -> BridgeResult<Json<serde_json::Value>> {
    require_consumer(&state, &headers)?;

    let code = find_live_code(&state, &req.code).await?;
    if code.source != "web" {
        return Err(BridgeError::BadRequest(
            "this code must be redeemed on the website".into(),
        ));
    }

    state
        .db
        .account_links()
        .link(
            &code.source_id,
            LinkSide::Game,
            &req.game_id,
            req.game_name.as_deref(),
        )
        .await?;
    state.db.link_codes().delete(&code.code).await?;
    crate::metrics::record_code_redeemed();

    info!(web_user = %code.source_id, game_id = %req.game_id, "account linked from game");
    Ok(Json(json!({
        "web_user_id": code.source_id,
        "display_name": code.display_name,
    })))
}
