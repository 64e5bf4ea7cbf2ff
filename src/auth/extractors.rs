use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRef, FromRequest, FromRequestParts, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::auth::repo_types::User;
use crate::auth::tokens::TokenStore;
use crate::auth::validate::ValidationErrors;
use crate::error::AppError;
use crate::response::ApiError;

/// The caller resolved from `Authorization: Bearer <token>`, together with
/// the token it presented.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

fn unauthenticated() -> ApiError {
    AppError::Authentication("Unauthenticated".into()).into()
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?;
    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))?
        .trim();
    (!token.is_empty()).then_some(token)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    TokenStore: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(unauthenticated)?.to_string();

        let tokens = TokenStore::from_ref(state);
        let user = tokens
            .resolve(&token)
            .await
            .map_err(|e| ApiError::new("Authentication failed", e))?;

        match user {
            Some(user) => Ok(AuthUser { user, token }),
            None => {
                warn!("unknown or revoked token");
                Err(unauthenticated())
            }
        }
    }
}

/// `Json<T>` whose rejection is rendered in the error envelope.
pub struct Payload<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for Payload<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Payload(value)),
            Err(rejection) => {
                let mut errors = ValidationErrors::new();
                errors.add("body", rejection.body_text());
                Err(AppError::Validation(errors).into())
            }
        }
    }
}
