//! HTTP error responses for web adapter.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::domain::error::MarketError;

use super::dto::ErrorBody;

#[derive(Debug)]
pub struct WebError {
    pub status: StatusCode,
    pub message: String,
}

impl WebError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }
}

pub fn status_from_error(err: &MarketError) -> StatusCode {
    match err {
        MarketError::NotFound { .. } => StatusCode::NOT_FOUND,
        MarketError::Forbidden { .. } => StatusCode::FORBIDDEN,
        MarketError::InvalidArgument { .. } => StatusCode::BAD_REQUEST,
        MarketError::InvalidState { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<MarketError> for WebError {
    fn from(err: MarketError) -> Self {
        let status = status_from_error(&err);
        if err.is_internal() {
            tracing::error!(error = %err, "request failed");
            return Self::new(status, "internal error");
        }
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}
