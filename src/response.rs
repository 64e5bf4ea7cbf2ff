//! JSON envelope shared by every endpoint:
//! `{"status": "success"|"error", "message": ..., "data"?: ...}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::auth::validate::ValidationErrors;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub status: Status,
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<ValidationErrors>,
}

pub fn success<T: Serialize>(data: T, message: &str, code: StatusCode) -> Response {
    let body = Envelope {
        status: Status::Success,
        message: Some(message.to_string()),
        data: Some(data),
        errors: None,
    };
    (code, Json(body)).into_response()
}

pub fn error(message: &str, code: StatusCode) -> Response {
    let body: Envelope<()> = Envelope {
        status: Status::Error,
        message: Some(message.to_string()),
        data: None,
        errors: None,
    };
    (code, Json(body)).into_response()
}

fn error_with_fields(message: &str, errors: ValidationErrors, code: StatusCode) -> Response {
    let body: Envelope<()> = Envelope {
        status: Status::Error,
        message: Some(message.to_string()),
        data: None,
        errors: Some(errors),
    };
    (code, Json(body)).into_response()
}

/// An `AppError` paired with the message shown if it turns out internal,
/// e.g. "User registration failed".
#[derive(Debug)]
pub struct ApiError {
    failure: &'static str,
    error: AppError,
}

impl ApiError {
    pub fn new(failure: &'static str, error: AppError) -> Self {
        Self { failure, error }
    }
}

impl From<AppError> for ApiError {
    fn from(error: AppError) -> Self {
        Self::new("Request failed", error)
    }
}

/// Attach the client-facing failure message to a core result.
pub trait OrFail<T> {
    fn or_fail(self, failure: &'static str) -> Result<T, ApiError>;
}

impl<T> OrFail<T> for Result<T, AppError> {
    fn or_fail(self, failure: &'static str) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::new(failure, e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.error {
            AppError::Validation(errors) => {
                let message = errors
                    .first_message()
                    .unwrap_or("The given data was invalid")
                    .to_string();
                error_with_fields(&message, errors, StatusCode::UNPROCESSABLE_ENTITY)
            }
            AppError::Conflict { field, message } => {
                let mut errors = ValidationErrors::new();
                errors.add(field, message.clone());
                error_with_fields(&message, errors, StatusCode::CONFLICT)
            }
            AppError::Authentication(message) => error(&message, StatusCode::UNAUTHORIZED),
            AppError::NotFound(message) => error(&message, StatusCode::NOT_FOUND),
            internal @ (AppError::Storage(_) | AppError::Mail(_) | AppError::Internal(_)) => {
                error!(error = %internal, "{}", self.failure);
                error(self.failure, StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body_json(res: Response) -> Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn success_envelope_carries_data() {
        let res = success(serde_json::json!({"token": "t"}), "ok", StatusCode::CREATED);
        assert_eq!(res.status(), StatusCode::CREATED);
        let body = body_json(res).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["message"], "ok");
        assert_eq!(body["data"]["token"], "t");
    }

    #[tokio::test]
    async fn unit_data_serializes_as_null() {
        let body = body_json(success((), "sent", StatusCode::OK)).await;
        assert!(body.as_object().unwrap().contains_key("data"));
        assert!(body["data"].is_null());
    }

    #[tokio::test]
    async fn error_envelope_has_no_data() {
        let body = body_json(error("nope", StatusCode::UNAUTHORIZED)).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "nope");
        assert!(body.get("data").is_none());
    }

    #[tokio::test]
    async fn internal_errors_are_masked() {
        let err = ApiError::new(
            "User login failed",
            AppError::Storage(anyhow::anyhow!("password authentication failed for user postgres")),
        );
        let res = err.into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(res).await;
        assert_eq!(body["message"], "User login failed");
        assert!(!body.to_string().contains("postgres"));
    }

    #[tokio::test]
    async fn hasher_failures_are_masked_500s() {
        let res = ApiError::new(
            "Password update failed",
            AppError::Internal(anyhow::anyhow!("argon2 output length invalid")),
        )
        .into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(res).await;
        assert_eq!(body["message"], "Password update failed");
        assert!(!body.to_string().contains("argon2"));
    }

    #[tokio::test]
    async fn conflict_lists_the_field() {
        let res = ApiError::from(AppError::conflict("email")).into_response();
        assert_eq!(res.status(), StatusCode::CONFLICT);
        let body = body_json(res).await;
        assert_eq!(body["message"], "Email already exists");
        assert_eq!(body["errors"]["email"][0], "Email already exists");
    }
}
