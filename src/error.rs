use thiserror::Error;

use crate::auth::repo::StoreError;
use crate::auth::validate::ValidationErrors;

/// Every failure a core operation can report.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed")]
    Validation(ValidationErrors),
    #[error("{message}")]
    Conflict {
        field: &'static str,
        message: String,
    },
    #[error("{0}")]
    Authentication(String),
    #[error("{0}")]
    NotFound(String),
    #[error("storage failure: {0:#}")]
    Storage(anyhow::Error),
    #[error("mail failure: {0:#}")]
    Mail(anyhow::Error),
    #[error("internal failure: {0:#}")]
    Internal(anyhow::Error),
}

impl AppError {
    pub fn conflict(field: &'static str) -> Self {
        let message = match field {
            "email" => "Email already exists",
            "phone_number" => "Phone number already exists",
            _ => "Record already exists",
        };
        AppError::Conflict {
            field,
            message: message.into(),
        }
    }

    pub fn invalid_credentials() -> Self {
        AppError::Authentication("Invalid credentials".into())
    }

    pub fn user_not_found() -> Self {
        AppError::NotFound("User not found".into())
    }

    /// Backend failure where a uniqueness violation is not a user error.
    pub fn storage(err: StoreError) -> Self {
        AppError::Storage(err.into())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation { field } => AppError::conflict(field),
            StoreError::Backend(e) => AppError::Storage(e),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Validation(errors)
    }
}
