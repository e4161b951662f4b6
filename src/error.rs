use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::domain::{InvalidCoordinates, RideId};

/// Error taxonomy for the dispatch core.
///
/// `AlreadyTaken` is deliberately distinct from `InvalidTransition` so a
/// driver frontend can render "someone else accepted" instead of a
/// generic failure. `Conflict` is a transient storage conflict that
/// survived the internal retry budget.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
    #[error("Ride {0} already taken by another driver")]
    AlreadyTaken(RideId),
    #[error("Transient conflict: {0}")]
    Conflict(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code included in the JSON body.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::NotFound(_) => "not_found",
            AppError::InvalidTransition(_) => "invalid_transition",
            AppError::AlreadyTaken(_) => "already_taken",
            AppError::Conflict(_) => "conflict",
            AppError::Internal(_) => "internal",
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("record not found".to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<InvalidCoordinates> for AppError {
    fn from(err: InvalidCoordinates) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, error_message) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::InvalidTransition(msg) => (StatusCode::CONFLICT, msg),
            AppError::AlreadyTaken(ride_id) => (
                StatusCode::CONFLICT,
                format!("ride {} was accepted by another driver", ride_id),
            ),
            AppError::Conflict(msg) => {
                tracing::warn!(detail = %msg, "storage conflict surfaced to caller");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "temporarily unavailable, please retry".to_string(),
                )
            }
            AppError::Internal(msg) => {
                // Full cause goes to the log; the caller gets a generic signal.
                tracing::error!(detail = %msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "code": code,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_taken_has_distinct_code() {
        let err = AppError::AlreadyTaken(RideId::new(5));
        assert_eq!(err.code(), "already_taken");
        let err = AppError::InvalidTransition("x".to_string());
        assert_eq!(err.code(), "invalid_transition");
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn invalid_coordinates_map_to_validation() {
        let err: AppError = InvalidCoordinates {
            latitude: 99.0,
            longitude: 0.0,
        }
        .into();
        assert_eq!(err.code(), "validation");
    }
}
