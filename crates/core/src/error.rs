use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum CoordinationError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid transition: cannot {action} {entity} ({reason})")]
    InvalidTransition {
        entity: &'static str,
        action: &'static str,
        reason: String,
    },
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: Uuid },
    #[error("scheduled end must be after scheduled start")]
    InvalidScheduleWindow,
    #[error("rating must be between 1 and 5")]
    RatingOutOfRange,
}

impl CoordinationError {
    /// Builds the `InvalidTransition` variant without the call-site noise.
    pub(crate) fn transition(
        entity: &'static str,
        action: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        CoordinationError::InvalidTransition {
            entity,
            action,
            reason: reason.into(),
        }
    }
}

pub type CoordinationResult<T> = std::result::Result<T, CoordinationError>;
