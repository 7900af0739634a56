//! Unified error handling for tidebridge.
//!
//! Every client-visible failure carries a stable machine-readable code next
//! to the human message, so the web client can react to specific conditions
//! (e.g. prompt for step-up re-verification instead of a generic error).

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Errors surfaced by the bridge API.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// No credential, or the credential resolved to no identity.
    #[error("authentication required")]
    Unauthorized,

    /// Authenticated, but role rank or allow-list membership is insufficient.
    #[error("insufficient permissions")]
    Forbidden,

    /// Authenticated and otherwise permitted, but second-factor proof is
    /// missing or stale. Distinct from [`BridgeError::Forbidden`] so the
    /// client can prompt for re-verification.
    #[error("step-up verification required")]
    StepUpRequired,

    /// Unknown command record or link code.
    #[error("not found")]
    NotFound,

    /// Link code past its TTL. Distinct from NotFound to give the player an
    /// actionable message ("regenerate your code").
    #[error("code has expired")]
    Expired,

    /// Durable-store I/O failure. Always retryable by the caller; never
    /// retried silently inside the bridge.
    #[error("storage unavailable")]
    StoreUnavailable,

    /// Too many sensitive actions from one caller.
    #[error("rate limit exceeded")]
    RateLimited,

    /// Malformed request payload (empty command, unknown unlink side, ...).
    #[error("invalid request: {0}")]
    BadRequest(String),
}

impl BridgeError {
    /// Stable error code string for response bodies and metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::StepUpRequired => "step_up_required",
            Self::NotFound => "not_found",
            Self::Expired => "expired",
            Self::StoreUnavailable => "store_unavailable",
            Self::RateLimited => "rate_limited",
            Self::BadRequest(_) => "bad_request",
        }
    }

    /// HTTP status this error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden | Self::StepUpRequired => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Expired | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        crate::metrics::record_error(self.error_code());
        let body = json!({
            "error": self.to_string(),
            "code": self.error_code(),
        });
        (self.status(), Json(body)).into_response()
    }
}

impl From<crate::db::DbError> for BridgeError {
    /// All durable-store errors are caught at the boundary and translated.
    /// The underlying cause is logged, never echoed to the client.
    fn from(err: crate::db::DbError) -> Self {
        tracing::error!(error = %err, "database operation failed");
        BridgeError::StoreUnavailable
    }
}

/// Result type for bridge request handlers.
pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(BridgeError::Unauthorized.error_code(), "unauthorized");
        assert_eq!(BridgeError::StepUpRequired.error_code(), "step_up_required");
        assert_eq!(BridgeError::Expired.error_code(), "expired");
        assert_eq!(
            BridgeError::StoreUnavailable.error_code(),
            "store_unavailable"
        );
    }

    #[test]
    fn test_step_up_is_distinct_from_forbidden() {
        // Same HTTP status, different machine code: the client UI keys off
        // the code to decide between "re-verify" and "not allowed".
        assert_eq!(
            BridgeError::StepUpRequired.status(),
            BridgeError::Forbidden.status()
        );
        assert_ne!(
            BridgeError::StepUpRequired.error_code(),
            BridgeError::Forbidden.error_code()
        );
    }

    #[test]
    fn test_store_errors_map_to_retryable_status() {
        assert_eq!(
            BridgeError::StoreUnavailable.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(BridgeError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
