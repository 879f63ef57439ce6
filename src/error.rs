//! Typed dispatcher-facing errors and their wire error codes (§4.D, §7).
//!
//! The teacher classifies errors by matching sentinel substrings in an
//! `anyhow::Error`'s message (`ipc::classify_error`). We use a typed enum
//! instead — the seam where the classification happens (the dispatcher) is
//! the same, but the match is on variants rather than strings.

use thiserror::Error;

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;
pub const PERMISSION_DENIED: i32 = -32043;
pub const PERMISSION_ALWAYS_DENIED: i32 = -32044;
pub const CANCELLED: i32 = -32800;
pub const RATE_LIMIT_EXCEEDED: i32 = -32070;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("parse error")]
    ParseError,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("method not found: {0}")]
    MethodNotFound(String),
    #[error("permission denied")]
    PermissionDenied,
    #[error("permission always denied")]
    PermissionAlwaysDenied,
    #[error("rate limit exceeded")]
    RateLimitExceeded,
    #[error("daemon unavailable")]
    DaemonOffline,
    #[error("daemon error: {0}")]
    DaemonError(String),
    #[error("handler failed: {0}")]
    HandlerFailed(#[from] anyhow::Error),
}

impl GatewayError {
    /// The stable wire error code for this variant (§4.D).
    pub fn code(&self) -> i32 {
        match self {
            GatewayError::ParseError => PARSE_ERROR,
            GatewayError::InvalidRequest(_) => INVALID_REQUEST,
            GatewayError::MethodNotFound(_) => METHOD_NOT_FOUND,
            GatewayError::PermissionDenied => PERMISSION_DENIED,
            GatewayError::PermissionAlwaysDenied => PERMISSION_ALWAYS_DENIED,
            GatewayError::RateLimitExceeded => RATE_LIMIT_EXCEEDED,
            GatewayError::DaemonOffline => CANCELLED,
            GatewayError::DaemonError(_) => INVALID_REQUEST,
            GatewayError::HandlerFailed(_) => INTERNAL_ERROR,
        }
    }

    pub fn message(&self) -> String {
        match self {
            GatewayError::HandlerFailed(e) => {
                tracing::error!(err = %e, "handler error");
                "Internal error".to_string()
            }
            other => other.to_string(),
        }
    }
}
