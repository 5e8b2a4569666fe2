use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout_types::ports::commerce_api::ApiError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SandboxError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),
}

impl SandboxError {
    pub fn status(&self) -> StatusCode {
        match self {
            SandboxError::BadRequest(_) => StatusCode::BAD_REQUEST,
            SandboxError::NotFound(_) => StatusCode::NOT_FOUND,
            SandboxError::Conflict(_) => StatusCode::CONFLICT,
            SandboxError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn message(&self) -> &str {
        match self {
            SandboxError::BadRequest(m)
            | SandboxError::NotFound(m)
            | SandboxError::Conflict(m)
            | SandboxError::Unavailable(m) => m,
        }
    }
}

impl From<SandboxError> for ApiError {
    fn from(e: SandboxError) -> Self {
        ApiError::status(e.status().as_u16(), e.message())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for SandboxError {
    fn into_response(self) -> Response {
        let body = serde_json::to_string(&ErrorBody {
            error: self.message().to_string(),
        })
        .unwrap_or_else(|_| "{\"error\":\"internal serialization\"}".into());
        (self.status(), [("content-type", "application/json")], body).into_response()
    }
}
