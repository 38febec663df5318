//! Mapping from domain errors to HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::debug;

use taskprio_core::CoreError;

use crate::http::responses::ErrorResponse;

/// A [`CoreError`] on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub CoreError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            CoreError::TaskNotFound(_)
            | CoreError::RuleNotFound(_)
            | CoreError::GroupNotFound(_)
            | CoreError::TemplateNotFound(_) => StatusCode::NOT_FOUND,
            CoreError::InvalidRule(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CoreError::InvalidPriority { .. } | CoreError::InvalidInput(_) => {
                StatusCode::BAD_REQUEST
            }
            CoreError::ConcurrentModification { .. }
            | CoreError::InvalidStateTransition { .. }
            | CoreError::RetryLimitExceeded { .. } => StatusCode::CONFLICT,
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        debug!(status = %status, error = %self.0, "Request failed");
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
