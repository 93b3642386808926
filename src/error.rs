//! # Error Handling
//!
//! Two layers of errors live here:
//!
//! ### HTTP-facing errors (`AppError`)
//! Every handler returns `AppResult<T>`. `AppError` implements actix-web's `ResponseError`
//! so failures turn into JSON bodies with a matching status code.
//!
//! ### Domain errors
//! - **ServiceError**: an external collaborator (language model, recognizer, synthesizer,
//!   transport) failed. Pipeline stages recover from these with an apology.
//! - **SummaryError**: the one fatal path, the summary call itself failed.
//! - **SignalingError**: offer/candidate handling problems (unknown `pc_id`, capacity).
//!
//! Domain errors convert into `AppError` with `From`, so `?` works in handlers.

use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Custom error types for the HTTP surface.
///
/// ## Error Categories:
/// - **Internal**: Server-side problems (500 errors)
/// - **BadRequest**: Client sent invalid data (400 errors)
/// - **NotFound**: Unknown session / connection id (404 errors)
/// - **ConfigError**: Configuration problems (500 errors)
/// - **ValidationError**: Data validation failed (400 errors)
/// - **Unavailable**: Capacity exhausted or collaborator down (503 errors)
#[derive(Debug)]
pub enum AppError {
    Internal(String),
    BadRequest(String),
    NotFound(String),
    ConfigError(String),
    ValidationError(String),
    Unavailable(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::Unavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

/// ## JSON Response Format:
/// ```json
/// {
///   "error": {
///     "type": "not_found",
///     "message": "Connection not found",
///     "timestamp": "2025-01-01T12:00:00Z"
///   }
/// }
/// ```
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status, error_type, message) = match self {
            AppError::Internal(msg) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                msg.clone(),
            ),
            AppError::BadRequest(msg) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "bad_request",
                msg.clone(),
            ),
            AppError::NotFound(msg) => (
                actix_web::http::StatusCode::NOT_FOUND,
                "not_found",
                msg.clone(),
            ),
            AppError::ConfigError(msg) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "config_error",
                msg.clone(),
            ),
            AppError::ValidationError(msg) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "validation_error",
                msg.clone(),
            ),
            AppError::Unavailable(msg) => (
                actix_web::http::StatusCode::SERVICE_UNAVAILABLE,
                "unavailable",
                msg.clone(),
            ),
        };

        HttpResponse::build(status).json(json!({
            "error": {
                "type": error_type,
                "message": message,
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Malformed JSON from a client is a 400, not a 500.
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON parsing error: {}", err))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

/// Failure of an external collaborator (model, recognizer, synthesizer, transport).
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The collaborator answered with a non-success HTTP status.
    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// The request never produced a response (connect error, timeout, bad payload).
    #[error("{service} request failed: {message}")]
    Request {
        service: &'static str,
        message: String,
    },

    /// The collaborator answered but the payload was unusable.
    #[error("{service} returned an unexpected response: {message}")]
    InvalidResponse {
        service: &'static str,
        message: String,
    },
}

/// The summary model call failed at the transport level.
#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    #[error("summary generation failed: {0}")]
    SummaryGenerationFailed(#[source] ServiceError),
}

#[derive(Debug, thiserror::Error)]
pub enum SignalingError {
    #[error("connection {0} not found")]
    NotFound(String),

    #[error("maximum concurrent sessions ({0}) reached")]
    CapacityExceeded(usize),

    #[error("invalid offer: {0}")]
    InvalidOffer(String),

    #[error(transparent)]
    Transport(#[from] ServiceError),
}

impl From<SignalingError> for AppError {
    fn from(err: SignalingError) -> Self {
        match err {
            SignalingError::NotFound(_) => AppError::NotFound(err.to_string()),
            SignalingError::CapacityExceeded(_) => AppError::Unavailable(err.to_string()),
            SignalingError::InvalidOffer(_) => AppError::ValidationError(err.to_string()),
            SignalingError::Transport(_) => AppError::Internal(err.to_string()),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_web::test]
    async fn test_not_found_renders_json_body() {
        let err: AppError = SignalingError::NotFound("pc-1".to_string()).into();
        let response = err.error_response();
        assert_eq!(response.status(), actix_web::http::StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"]["type"], "not_found");
        assert_eq!(value["error"]["message"], "connection pc-1 not found");
    }

    #[test]
    fn test_capacity_maps_to_service_unavailable() {
        let err: AppError = SignalingError::CapacityExceeded(3).into();
        assert_eq!(
            err.error_response().status(),
            actix_web::http::StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_invalid_offer_is_a_validation_error() {
        let err: AppError = SignalingError::InvalidOffer("empty SDP".to_string()).into();
        assert_eq!(err.error_response().status(), actix_web::http::StatusCode::BAD_REQUEST);
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[test]
    fn test_service_error_messages() {
        let err = ServiceError::Status {
            service: "language model",
            status: 429,
            body: "rate limited".to_string(),
        };
        assert_eq!(err.to_string(), "language model returned HTTP 429: rate limited");
    }
}
