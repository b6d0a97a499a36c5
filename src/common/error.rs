use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type threaded through the registry, core pipeline and
/// HTTP edge via `?`. Converted to a `LinkGateErrorBody` once, at the axum
/// boundary, via `IntoResponse`.
#[derive(Debug, Error)]
pub enum LinkGateError {
    #[error("link not found or expired")]
    NotFound,

    #[error("requested range not satisfiable for a {size}-byte object")]
    RangeUnsatisfiable { size: u64 },

    #[error("malformed range header: {0}")]
    InvalidRange(String),

    #[error("upstream object store request failed: {0}")]
    UpstreamFailed(String),

    #[error("link already exists for this object")]
    Conflict,

    #[error("server is at its concurrent streaming capacity")]
    Busy,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl LinkGateError {
    fn status(&self) -> StatusCode {
        match self {
            LinkGateError::NotFound => StatusCode::NOT_FOUND,
            LinkGateError::RangeUnsatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            LinkGateError::InvalidRange(_) => StatusCode::BAD_REQUEST,
            LinkGateError::UpstreamFailed(_) => StatusCode::BAD_GATEWAY,
            LinkGateError::Conflict => StatusCode::CONFLICT,
            LinkGateError::Busy => StatusCode::SERVICE_UNAVAILABLE,
            LinkGateError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Lavalink-style JSON error envelope. Kept identical to the teacher's
/// `RustalinkError` wire shape — there is no reason for clients of this
/// gateway to see a different error format than the rest of the codebase
/// already speaks.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkGateErrorBody {
    pub timestamp: u64,
    pub status: u16,
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl LinkGateErrorBody {
    pub fn new(status: StatusCode, message: impl Into<String>, path: Option<String>) -> Self {
        Self {
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
            status: status.as_u16(),
            error: status
                .canonical_reason()
                .unwrap_or("Error")
                .to_string(),
            message: message.into(),
            path,
        }
    }
}

impl IntoResponse for LinkGateError {
    fn into_response(self) -> Response {
        let status = self.status();
        if matches!(self, LinkGateError::Internal(_)) {
            tracing::error!(error = %self, "internal error");
        }
        let body = LinkGateErrorBody::new(status, self.to_string(), None);
        (status, Json(body)).into_response()
    }
}

pub type LinkGateResult<T> = std::result::Result<T, LinkGateError>;
