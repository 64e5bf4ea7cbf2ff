//! Account lifecycle: registration, login/logout, profile and password
//! changes, and password reset. Handlers resolve the caller first and pass
//! the `User` in; nothing here reads request state.

use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::dto::{
    ForgotPasswordRequest, LoginRequest, PasswordUpdateRequest, ProfileUpdateRequest,
    RegisterRequest, ResetPasswordRequest,
};
use crate::auth::password::{hash_password_async, verify_decoy_async, verify_password_async};
use crate::auth::repo::{StoreError, UserRepo};
use crate::auth::repo_types::{NewUser, User};
use crate::auth::tokens::TokenStore;
use crate::auth::validate::{self, normalize_email};
use crate::config::AuthConfig;
use crate::error::AppError;
use crate::mail::{Mailer, PasswordResetMail};

#[derive(Clone)]
pub struct CredentialManager {
    users: Arc<dyn UserRepo>,
    tokens: TokenStore,
    mailer: Arc<dyn Mailer>,
    settings: AuthConfig,
}

impl CredentialManager {
    pub fn new(
        users: Arc<dyn UserRepo>,
        tokens: TokenStore,
        mailer: Arc<dyn Mailer>,
        settings: AuthConfig,
    ) -> Self {
        Self {
            users,
            tokens,
            mailer,
            settings,
        }
    }

    pub async fn register(&self, mut input: RegisterRequest) -> Result<User, AppError> {
        input.name = input.name.trim().to_string();
        input.email = normalize_email(&input.email);
        input.phone_number = input.phone_number.trim().to_string();
        validate::register(&input)?;

        let password_hash = hash_password(input.password).await?;
        let user = self
            .users
            .create(NewUser {
                name: input.name,
                email: input.email,
                phone_number: input.phone_number,
                password_hash,
            })
            .await
            .map_err(|e| {
                if let StoreError::UniqueViolation { field } = &e {
                    warn!(field, "registration rejected: duplicate");
                }
                AppError::from(e)
            })?;

        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok(user)
    }

    /// Verify credentials and mint a session token.
    pub async fn login(&self, mut input: LoginRequest) -> Result<String, AppError> {
        input.email = normalize_email(&input.email);
        validate::login(&input)?;

        let Some(user) = self.users.find_by_email(&input.email).await? else {
            verify_decoy_async(input.password).await;
            warn!(email = %input.email, "login unknown email");
            return Err(AppError::invalid_credentials());
        };

        if !verify_password(input.password, user.password_hash.clone()).await? {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AppError::invalid_credentials());
        }

        let token = self.tokens.issue(&user).await?;
        info!(user_id = %user.id, "user logged in");
        Ok(token)
    }

    /// Revoke all of the user's session tokens. Safe to repeat.
    pub async fn logout(&self, user: &User) -> Result<(), AppError> {
        let revoked = self.tokens.revoke_all(user).await?;
        info!(user_id = %user.id, revoked, "user logged out");
        Ok(())
    }

    /// `current_token` is the token that authenticated this request; it
    /// survives the optional revocation of the user's other sessions.
    pub async fn change_password(
        &self,
        user: &User,
        current_token: &str,
        input: PasswordUpdateRequest,
    ) -> Result<User, AppError> {
        validate::password_update(&input)?;

        if !verify_password(input.old_password, user.password_hash.clone()).await? {
            warn!(user_id = %user.id, "password update with wrong old password");
            return Err(AppError::Authentication("Old password is incorrect".into()));
        }

        let password_hash = hash_password(input.new_password).await?;
        let updated = self
            .users
            .update_password(user.id, &password_hash)
            .await?
            .ok_or_else(AppError::user_not_found)?;

        if self.settings.revoke_on_password_change {
            self.tokens.revoke_all_except(user, current_token).await?;
        }

        info!(user_id = %user.id, "password updated");
        Ok(updated)
    }

    pub async fn update_profile(
        &self,
        user: &User,
        mut input: ProfileUpdateRequest,
    ) -> Result<User, AppError> {
        input.name = input.name.trim().to_string();
        input.email = normalize_email(&input.email);
        validate::profile_update(&input)?;

        let updated = self
            .users
            .update_profile(user.id, &input.name, &input.email)
            .await?
            .ok_or_else(AppError::user_not_found)?;

        info!(user_id = %user.id, "profile updated");
        Ok(updated)
    }

    /// Mail a reset link to the account owner and return the reset token.
    pub async fn request_password_reset(
        &self,
        mut input: ForgotPasswordRequest,
    ) -> Result<String, AppError> {
        input.email = normalize_email(&input.email);
        validate::forgot_password(&input)?;

        let Some(user) = self.users.find_by_email(&input.email).await? else {
            warn!(email = %input.email, "password reset for unknown email");
            return Err(AppError::user_not_found());
        };

        let token = self.tokens.issue_reset(&user).await?;
        let mail = PasswordResetMail {
            to: user.email.clone(),
            name: user.name.clone(),
            url: format!("{}?token={}", self.settings.reset_url_base, token),
            token: token.clone(),
        };
        self.mailer
            .send_password_reset(&mail)
            .await
            .map_err(AppError::Mail)?;

        info!(user_id = %user.id, "password reset link sent");
        Ok(token)
    }

    /// Consume a reset token, set the new password and end every session.
    pub async fn reset_password(&self, mut input: ResetPasswordRequest) -> Result<(), AppError> {
        input.email = normalize_email(&input.email);
        input.token = input.token.trim().to_string();
        validate::reset_password(&input)?;

        let invalid = || AppError::Authentication("Invalid or expired reset token".into());

        let owner = self.tokens.consume_reset(&input.token).await?;
        let user = match (owner, self.users.find_by_email(&input.email).await?) {
            (Some(owner), Some(user)) if owner == user.id => user,
            _ => {
                warn!(email = %input.email, "password reset with invalid token");
                return Err(invalid());
            }
        };

        let password_hash = hash_password(input.password).await?;
        self.users
            .update_password(user.id, &password_hash)
            .await?
            .ok_or_else(AppError::user_not_found)?;
        let revoked = self.tokens.revoke_all(&user).await?;
        self.tokens.revoke_resets(&user).await?;

        info!(user_id = %user.id, revoked, "password reset");
        Ok(())
    }
}

async fn hash_password(plain: String) -> Result<String, AppError> {
    hash_password_async(plain).await.map_err(AppError::Internal)
}

async fn verify_password(plain: String, hash: String) -> Result<bool, AppError> {
    verify_password_async(plain, hash)
        .await
        .map_err(AppError::Internal)
}
