use axum::{
    extract::State,
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            ForgotPasswordRequest, LoginRequest, PasswordUpdateRequest, ProfileUpdateRequest,
            PublicUser, RegisterRequest, ResetPasswordRequest, TokenResponse,
        },
        extractors::{AuthUser, Payload},
    },
    response::{success, ApiError, OrFail},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
}

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/profile", get(profile))
        .route("/profile-update", post(profile_update))
        .route("/password-update", post(password_update))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Payload(payload): Payload<RegisterRequest>,
) -> Result<Response, ApiError> {
    let user = state
        .accounts
        .register(payload)
        .await
        .or_fail("User registration failed")?;
    Ok(success(
        PublicUser::from(user),
        "User registered successfully",
        StatusCode::CREATED,
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Payload(payload): Payload<LoginRequest>,
) -> Result<Response, ApiError> {
    let token = state
        .accounts
        .login(payload)
        .await
        .or_fail("User login failed")?;
    Ok(success(
        TokenResponse { token },
        "User logged in successfully",
        StatusCode::OK,
    ))
}

#[instrument(skip_all, fields(user_id = %auth.user.id))]
pub async fn profile(auth: AuthUser) -> Result<Response, ApiError> {
    Ok(success(
        PublicUser::from(auth.user),
        "User profile retrieved successfully",
        StatusCode::OK,
    ))
}

#[instrument(skip_all, fields(user_id = %auth.user.id))]
pub async fn profile_update(
    State(state): State<AppState>,
    auth: AuthUser,
    Payload(payload): Payload<ProfileUpdateRequest>,
) -> Result<Response, ApiError> {
    let user = state
        .accounts
        .update_profile(&auth.user, payload)
        .await
        .or_fail("User profile update failed")?;
    Ok(success(
        PublicUser::from(user),
        "User profile updated successfully",
        StatusCode::OK,
    ))
}

#[instrument(skip_all, fields(user_id = %auth.user.id))]
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> Result<Response, ApiError> {
    state
        .accounts
        .logout(&auth.user)
        .await
        .or_fail("User logout failed")?;
    Ok(success(
        Vec::<()>::new(),
        "User logged out successfully",
        StatusCode::OK,
    ))
}

#[instrument(skip_all, fields(user_id = %auth.user.id))]
pub async fn password_update(
    State(state): State<AppState>,
    auth: AuthUser,
    Payload(payload): Payload<PasswordUpdateRequest>,
) -> Result<Response, ApiError> {
    let user = state
        .accounts
        .change_password(&auth.user, &auth.token, payload)
        .await
        .or_fail("User password update failed")?;
    Ok(success(
        PublicUser::from(user),
        "User password updated successfully",
        StatusCode::OK,
    ))
}

/// The reset token only travels by mail; the response never carries it.
#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Payload(payload): Payload<ForgotPasswordRequest>,
) -> Result<Response, ApiError> {
    state
        .accounts
        .request_password_reset(payload)
        .await
        .or_fail("Password reset link send failed")?;
    Ok(success((), "Password reset link sent successfully", StatusCode::OK))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Payload(payload): Payload<ResetPasswordRequest>,
) -> Result<Response, ApiError> {
    state
        .accounts
        .reset_password(payload)
        .await
        .or_fail("Password reset failed")?;
    Ok(success((), "Password reset successfully", StatusCode::OK))
}
