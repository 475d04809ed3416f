//! Error types for EquipTrack server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::models::enums::EquipmentStatus;

/// Numeric error codes returned to clients alongside the HTTP status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    NotAuthorized = 2,
    StoreUnavailable = 3,
    NotFound = 4,
    InvalidState = 5,
    Conflict = 6,
    Rejected = 7,
    AlreadyClosed = 8,
    BadValue = 9,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The requested transition is not legal from the status the equipment is in.
    #[error("Invalid state: {message} (equipment is {found})")]
    InvalidState {
        message: String,
        found: EquipmentStatus,
    },

    /// A concurrent writer won the compare-and-swap; re-read before retrying.
    #[error("Conflict: {message}")]
    Conflict {
        message: String,
        found: Option<EquipmentStatus>,
    },

    /// Business rule violation, e.g. a duplicate open ledger entry.
    #[error("Rejected: {message}")]
    Rejected {
        message: String,
        found: Option<EquipmentStatus>,
    },

    #[error("Already closed: {0}")]
    AlreadyClosed(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn invalid_state(message: impl Into<String>, found: EquipmentStatus) -> Self {
        AppError::InvalidState {
            message: message.into(),
            found,
        }
    }

    pub fn conflict(message: impl Into<String>, found: Option<EquipmentStatus>) -> Self {
        AppError::Conflict {
            message: message.into(),
            found,
        }
    }

    pub fn rejected(message: impl Into<String>, found: Option<EquipmentStatus>) -> Self {
        AppError::Rejected {
            message: message.into(),
            found,
        }
    }

    /// Status the equipment was actually found in when the operation failed, if known
    pub fn current_status(&self) -> Option<EquipmentStatus> {
        match self {
            AppError::InvalidState { found, .. } => Some(*found),
            AppError::Conflict { found, .. } | AppError::Rejected { found, .. } => *found,
            _ => None,
        }
    }

    /// Attach the observed equipment status to an error that does not carry one yet
    pub fn with_status(self, status: EquipmentStatus) -> Self {
        match self {
            AppError::Conflict { message, found: None } => AppError::Conflict {
                message,
                found: Some(status),
            },
            AppError::Rejected { message, found: None } => AppError::Rejected {
                message,
                found: Some(status),
            },
            other => other,
        }
    }

    /// Whether the caller may retry the same operation after a backoff.
    ///
    /// Only infrastructure failures qualify. Every other kind needs a fresh
    /// decision from the initiating actor, since replaying a transition could
    /// apply it twice.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::StoreUnavailable(_) => true,
            AppError::Database(e) => is_transient(e),
            _ => false,
        }
    }
}

fn is_transient(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Tls(_)
    )
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
    /// Status the equipment was found in, so clients can re-render current truth
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_status: Option<EquipmentStatus>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let current_status = self.current_status();
        let (status, code, message) = match &self {
            AppError::Authentication(msg) => {
                (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthorized, msg.clone())
            }
            AppError::Authorization(msg) => {
                (StatusCode::FORBIDDEN, ErrorCode::NotAuthorized, msg.clone())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorCode::NotFound, msg.clone()),
            AppError::InvalidState { message, .. } => {
                (StatusCode::CONFLICT, ErrorCode::InvalidState, message.clone())
            }
            AppError::Conflict { message, .. } => {
                (StatusCode::CONFLICT, ErrorCode::Conflict, message.clone())
            }
            AppError::Rejected { message, .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, ErrorCode::Rejected, message.clone())
            }
            AppError::AlreadyClosed(msg) => {
                (StatusCode::CONFLICT, ErrorCode::AlreadyClosed, msg.clone())
            }
            AppError::StoreUnavailable(msg) => {
                tracing::error!("Store unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorCode::StoreUnavailable,
                    "Store unavailable, retry later".to_string(),
                )
            }
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                if is_transient(e) {
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        ErrorCode::StoreUnavailable,
                        "Store unavailable, retry later".to_string(),
                    )
                } else {
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ErrorCode::Failure,
                        "Database error".to_string(),
                    )
                }
            }
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::Failure,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
            current_status,
        });

        (status, body).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_status_reported_for_transition_failures() {
        let err = AppError::invalid_state("not available", EquipmentStatus::Loaned);
        assert_eq!(err.current_status(), Some(EquipmentStatus::Loaned));

        let err = AppError::conflict("lost race", None).with_status(EquipmentStatus::Reserved);
        assert_eq!(err.current_status(), Some(EquipmentStatus::Reserved));

        assert_eq!(AppError::NotFound("x".into()).current_status(), None);
    }

    #[test]
    fn test_with_status_keeps_existing_status() {
        let err = AppError::conflict("lost race", Some(EquipmentStatus::Loaned))
            .with_status(EquipmentStatus::Available);
        assert_eq!(err.current_status(), Some(EquipmentStatus::Loaned));
    }

    #[test]
    fn test_only_store_failures_are_retryable() {
        assert!(AppError::StoreUnavailable("down".into()).is_retryable());
        assert!(AppError::Database(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(!AppError::Database(sqlx::Error::RowNotFound).is_retryable());
        assert!(!AppError::conflict("lost race", None).is_retryable());
        assert!(!AppError::invalid_state("nope", EquipmentStatus::Loaned).is_retryable());
    }

    #[test]
    fn test_conflict_maps_to_409() {
        let response = AppError::conflict("lost race", Some(EquipmentStatus::Loaned)).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = AppError::StoreUnavailable("down".into()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
