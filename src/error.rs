use crate::auth::validation::ValidationErrors;
use crate::backend::BackendError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("{0}")]
    Backend(#[from] BackendError),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Validation(errors)
    }
}

impl AppError {
    pub fn is_unauthorized(&self) -> bool {
        match self {
            AppError::Unauthorized => true,
            AppError::Backend(e) => e.is_unauthorized(),
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::Backend(e) if e.is_not_found())
    }

    /// Text fit for showing to the user. Internal failures are logged and
    /// replaced with a generic message.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation(errors) => errors.to_string(),
            AppError::Backend(e) if e.code < 500 => e.message.clone(),
            AppError::Unauthorized => "Please sign in to continue".to_string(),
            AppError::Backend(e) => {
                tracing::error!("Backend error: {}", e);
                "An unexpected error occurred".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "An unexpected error occurred".to_string()
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                "An unexpected error occurred".to_string()
            }
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_side_backend_errors_are_shown_verbatim() {
        let err = AppError::from(BackendError::conflict("user_already_exists", "Already exists"));
        assert_eq!(err.user_message(), "Already exists");
    }

    #[test]
    fn server_errors_are_masked() {
        let err = AppError::from(BackendError::internal("disk on fire"));
        assert_eq!(err.user_message(), "An unexpected error occurred");
        assert_eq!(
            AppError::Internal("boom".into()).user_message(),
            "An unexpected error occurred"
        );
    }

    #[test]
    fn unauthorized_is_recognised_through_backend_errors() {
        assert!(AppError::Unauthorized.is_unauthorized());
        assert!(AppError::from(BackendError::unauthorized("x", "no")).is_unauthorized());
        assert!(!AppError::Internal("post".into()).is_unauthorized());
    }

    #[test]
    fn not_found_is_recognised_through_backend_errors() {
        let err = AppError::from(BackendError::not_found("document_not_found", "No such post"));
        assert!(err.is_not_found());
        assert_eq!(err.user_message(), "No such post");
        assert!(!AppError::Unauthorized.is_not_found());
    }
}
