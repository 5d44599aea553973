//! Error taxonomy for request-path operations.

use bizplan_db::queries::is_unique_violation;

/// Failure of a synchronous, caller-visible operation.
///
/// Background generation failures never take this form; they are contained
/// in the worker (see [`crate::generation::GenerationError`]).
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The entity does not exist or is not owned by the caller.
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Authentication(String),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    /// Map a storage error to [`ServiceError::Conflict`] when it is a unique
    /// violation, otherwise to [`ServiceError::Internal`].
    pub fn conflict_or_internal(err: anyhow::Error, conflict: impl Into<String>) -> Self {
        if is_unique_violation(&err) {
            Self::Conflict(conflict.into())
        } else {
            Self::Internal(err)
        }
    }
}

/// Reject blank required text fields.
pub(crate) fn require_non_blank(field: &str, value: &str) -> Result<(), ServiceError> {
    if value.trim().is_empty() {
        return Err(ServiceError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_errors_become_internal() {
        let err = ServiceError::conflict_or_internal(anyhow::anyhow!("boom"), "dup");
        assert!(matches!(err, ServiceError::Internal(_)));
    }

    #[test]
    fn not_found_message_names_entity() {
        assert_eq!(ServiceError::NotFound("project").to_string(), "project not found");
    }

    #[test]
    fn blank_fields_are_rejected() {
        assert!(require_non_blank("name", "  ").is_err());
        assert!(require_non_blank("name", "Acme").is_ok());
    }
}
