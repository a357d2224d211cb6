//! Gateway-facing error taxonomy. Internal classifier failures never
//! reach this type — they degrade to `decision = 2` inside the handler
//! instead.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use triroute::AdapterError;

/// Every way the routing entry point can fail a request.
#[derive(Debug, Error)]
pub enum RouterError {
    /// No or invalid bearer token, with a router API key configured.
    #[error("unauthorized")]
    Unauthorized,
    /// The payload is missing `messages`.
    #[error("invalid request")]
    InvalidRequest,
    /// An adapter needed a field the upstream descriptor didn't carry.
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    /// The upstream call failed, transport-level or with a non-2xx status.
    #[error("upstream error {status}: {details}")]
    Upstream {
        /// HTTP status to report to the client.
        status: u16,
        /// Raw upstream error body, or a transport error description.
        details: String,
    },
    /// The resolved provider tag has no adapter implementation.
    #[error("provider not supported")]
    ProviderNotSupported,
    /// Anything else, mapped to 500.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<AdapterError> for RouterError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::Upstream { status, details } => Self::Upstream { status, details },
            AdapterError::Transport(details) => Self::Upstream {
                status: 502,
                details,
            },
            AdapterError::MissingField(field) => Self::MissingField(field),
            AdapterError::ProviderNotSupported => Self::ProviderNotSupported,
        }
    }
}

impl IntoResponse for RouterError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, json!({"error": "unauthorized"})),
            Self::InvalidRequest => {
                (StatusCode::BAD_REQUEST, json!({"error": "invalid_request"}))
            }
            Self::MissingField(field) => (
                StatusCode::BAD_REQUEST,
                json!({"error": format!("missing_{field}")}),
            ),
            Self::Upstream { status, details } => {
                let code = StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY);
                (
                    code,
                    json!({"error": "upstream_error", "details": details}),
                )
            }
            Self::ProviderNotSupported => (
                StatusCode::NOT_IMPLEMENTED,
                json!({"error": "provider_not_supported"}),
            ),
            Self::Internal(details) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error": "internal_error", "details": details}),
            ),
        };
        (status, Json(body)).into_response()
    }
}
