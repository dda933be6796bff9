//! Relay error taxonomy and its HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

use crate::platform::PlatformError;

/// Result alias for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;

/// Errors surfaced by the relay's services and HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The guild, a role or a channel the relay is configured for is missing.
    #[error("{0}")]
    Configuration(String),
    /// The request is malformed; the caller can fix it.
    #[error("{0}")]
    Validation(String),
    /// The shared secret did not match.
    #[error("unauthorized")]
    Unauthorized,
    /// The platform call failed.
    #[error(transparent)]
    Platform(#[from] PlatformError),
    /// A platform call did not complete in time.
    #[error("timeout: {0}")]
    Timeout(String),
}

impl RelayError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Configuration(_) | Self::Platform(_) | Self::Timeout(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Validation(_) => "validation",
            Self::Unauthorized => "unauthorized",
            Self::Platform(_) => "platform",
            Self::Timeout(_) => "timeout",
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    kind: &'static str,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(kind = self.kind(), error = %self, "request failed");
        } else {
            warn!(kind = self.kind(), error = %self, "request rejected");
        }

        let body = ErrorBody {
            error: self.to_string(),
            kind: self.kind(),
        };
        (status, Json(body)).into_response()
    }
}
