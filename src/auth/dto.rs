use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::User;

// Missing fields deserialize as empty strings so the validator can report
// them with field-level messages instead of a body rejection.

/// Request body for user registration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
    pub phone_number: String,
}

/// Request body for login.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProfileUpdateRequest {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PasswordUpdateRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Request body for consuming a mailed reset token.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub token: String,
    pub password: String,
    pub password_confirmation: String,
}

/// Returned after a successful login.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone_number: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            phone_number: user.phone_number,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_user_never_contains_the_hash() {
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            name: "Ada".into(),
            email: "ada@x.com".into(),
            phone_number: "01234567890".into(),
            password_hash: "$argon2id$v=19$secret".into(),
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_string(&PublicUser::from(user)).unwrap();
        assert!(json.contains("ada@x.com"));
        assert!(!json.contains("argon2"));
        assert!(!json.contains("password"));
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let req: LoginRequest = serde_json::from_str(r#"{"email":"a@b.co"}"#).unwrap();
        assert_eq!(req.email, "a@b.co");
        assert!(req.password.is_empty());
    }
}
