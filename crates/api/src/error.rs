use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::DomainError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// The request is well-formed but the resource state forbids it.
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".into(),
                )
            }
        };

        let body = ErrorBody {
            error: error_code.into(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        let message = err.to_string();
        match err {
            DomainError::Validation(_) | DomainError::InvalidStatus(_) => {
                ApiError::Validation(message)
            }
            DomainError::RegistrationClosed
            | DomainError::CloseDateLocked
            | DomainError::CannotModifyAfterStart => ApiError::BadRequest(message),
            DomainError::NameExists(_)
            | DomainError::Overlap(_)
            | DomainError::AlreadyRegistered => ApiError::Conflict(message),
            DomainError::EventNotFound
            | DomainError::RegistrationNotFound
            | DomainError::UserNotFound
            | DomainError::NotificationNotFound => ApiError::NotFound(message),
            DomainError::Repository(inner) => ApiError::Internal(inner.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::from(DomainError::from(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::RepositoryError;

    fn status_of(err: DomainError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_validation_errors_are_bad_request() {
        assert_eq!(
            status_of(DomainError::validation("bad date")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(DomainError::InvalidStatus("borrado".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_state_locks_are_bad_request() {
        assert_eq!(status_of(DomainError::RegistrationClosed), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(DomainError::CloseDateLocked), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(DomainError::CannotModifyAfterStart),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_conflicts() {
        assert_eq!(
            status_of(DomainError::NameExists("Congreso".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(DomainError::Overlap("Congreso".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(status_of(DomainError::AlreadyRegistered), StatusCode::CONFLICT);
    }

    #[test]
    fn test_not_found() {
        assert_eq!(status_of(DomainError::EventNotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(DomainError::RegistrationNotFound),
            StatusCode::NOT_FOUND
        );
        assert_eq!(status_of(DomainError::UserNotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(DomainError::NotificationNotFound),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_repository_failure_is_opaque() {
        let err = ApiError::from(DomainError::Repository(RepositoryError::Backend(
            "connection refused".into(),
        )));
        assert!(matches!(err, ApiError::Internal(_)));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_api_error_display() {
        assert_eq!(
            ApiError::NotFound("event not found".into()).to_string(),
            "Not found: event not found"
        );
        assert_eq!(
            ApiError::BadRequest("closed".into()).to_string(),
            "Bad request: closed"
        );
    }
}
