//! Domain error types.

use thiserror::Error;

/// Failure reported by a repository implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// A uniqueness constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The storage backend failed.
    #[error("storage failure: {0}")]
    Backend(String),
}

/// Typed outcome of every core operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("{0}")]
    Validation(String),

    #[error("an active event named '{0}' already exists")]
    NameExists(String),

    #[error("event dates overlap with '{0}'")]
    Overlap(String),

    #[error("user is already registered for this event")]
    AlreadyRegistered,

    #[error("event not found")]
    EventNotFound,

    #[error("registration not found")]
    RegistrationNotFound,

    #[error("user not found")]
    UserNotFound,

    #[error("notification not found")]
    NotificationNotFound,

    #[error("registration for this event is closed")]
    RegistrationClosed,

    #[error("invalid registration status '{0}'")]
    InvalidStatus(String),

    #[error("the registration close date can no longer be changed")]
    CloseDateLocked,

    #[error("the event has already started")]
    CannotModifyAfterStart,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        DomainError::Validation(message.into())
    }
}

impl From<validator::ValidationErrors> for DomainError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{} is invalid", field))
                })
            })
            .collect::<Vec<_>>()
            .join("; ");
        DomainError::Validation(message)
    }
}

impl From<validator::ValidationError> for DomainError {
    fn from(error: validator::ValidationError) -> Self {
        DomainError::Validation(
            error
                .message
                .map(|m| m.to_string())
                .unwrap_or_else(|| error.code.to_string()),
        )
    }
}
