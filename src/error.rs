use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Errors raised while building a security policy or enforcing it.
///
/// # Construction vs Request Time
///
/// - `InvalidConfiguration` - raised once, when a policy is built; a policy
///   that fails here never produces a usable layer
/// - `MissingHostForRedirect` - raised per request, when an HTTPS redirect is
///   required but the request carries no host to redirect to
/// - `Config` - environment loading failures of the bundled server
#[derive(Error, Debug)]
pub enum SageError {
    #[error("Invalid configuration for {field}: {value:?} {reason}")]
    InvalidConfiguration {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Cannot redirect {path} to https: request has no host")]
    MissingHostForRedirect { path: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SageError {
    /// Shorthand for building an `InvalidConfiguration` error.
    pub(crate) fn invalid(
        field: &'static str,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        SageError::InvalidConfiguration {
            field,
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Error response body for rejected requests.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for SageError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            SageError::MissingHostForRedirect { path } => {
                tracing::warn!(path = %path, "HTTPS redirect requested without a host");
                (
                    StatusCode::BAD_REQUEST,
                    "missing_host",
                    "A Host header is required to redirect this request to https.",
                )
            }
            // Configuration errors surface at startup; if one reaches a client,
            // never expose the details.
            SageError::InvalidConfiguration { .. } | SageError::Config(_) => {
                tracing::error!(error = %self, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "config_error",
                    "Service configuration error. Please contact support.",
                )
            }
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message: message.to_string(),
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Convenience type alias for Results with SageError.
pub type SageResult<T> = Result<T, SageError>;
