use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::error::RenderError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    /// Deliberately carries no detail so every rejected download looks the same.
    #[error("Not found")]
    NotFound,

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RenderError> for ApiError {
    fn from(err: RenderError) -> Self {
        if err.is_input_error() {
            ApiError::BadRequest(err.to_string())
        } else {
            ApiError::Internal(err.to_string())
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    ok: bool,
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            ok: false,
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
