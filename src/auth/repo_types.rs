use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,                   // unique user ID
    pub name: String,
    pub email: String,              // unique
    pub phone_number: String,       // unique
    pub password_hash: String,      // Argon2 PHC string, never exposed
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Columns for a user about to be inserted.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub password_hash: String,
}

/// What a bearer token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Session,
    PasswordReset,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Session => "session",
            TokenKind::PasswordReset => "password_reset",
        }
    }
}

/// A token row as persisted: only the digest of the plaintext is stored.
#[derive(Debug, Clone)]
pub struct NewToken {
    pub token_hash: String,
    pub user_id: Uuid,
    pub kind: TokenKind,
    pub expires_at: Option<OffsetDateTime>,
}
