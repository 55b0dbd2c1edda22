use crate::matching::MatchError;
use crate::webhooks::{InboundError, RegistryError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Internal(message) => {
                error!("Request failed: {}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::InvalidUrl { .. } | RegistryError::NoEvents => {
                Self::BadRequest(err.to_string())
            }
            RegistryError::Store(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<InboundError> for ApiError {
    fn from(err: InboundError) -> Self {
        match err {
            InboundError::Malformed(_) => Self::BadRequest(err.to_string()),
            InboundError::MissingSignature(_) | InboundError::SignatureMismatch(_) => {
                Self::Unauthorized(err.to_string())
            }
            InboundError::Store(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<MatchError> for ApiError {
    fn from(err: MatchError) -> Self {
        match err {
            MatchError::LeadNotFound(_) => Self::NotFound(err.to_string()),
            MatchError::Store(_) => Self::Internal(err.to_string()),
        }
    }
}
