use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{NewToken, NewUser, TokenKind, User};

/// Failures reported by a persistence backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint rejected the write; `field` names the column.
    #[error("unique constraint violated on {field}")]
    UniqueViolation { field: &'static str },
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Insert a user; email and phone number uniqueness is enforced here.
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn update_profile(
        &self,
        id: Uuid,
        name: &str,
        email: &str,
    ) -> Result<Option<User>, StoreError>;
    async fn update_password(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> Result<Option<User>, StoreError>;
}

#[async_trait]
pub trait TokenRepo: Send + Sync {
    async fn insert(&self, token: NewToken) -> Result<(), StoreError>;

    /// Owner of a live token of `kind`, recording the use.
    async fn find_user(
        &self,
        token_hash: &str,
        kind: TokenKind,
        now: OffsetDateTime,
    ) -> Result<Option<User>, StoreError>;

    /// Delete the user's tokens of `kind`, except `keep_hash` if given.
    async fn delete_for_user(
        &self,
        user_id: Uuid,
        kind: TokenKind,
        keep_hash: Option<&str>,
    ) -> Result<u64, StoreError>;

    /// Delete a live token of `kind` and return its owner; one caller wins.
    async fn take(
        &self,
        token_hash: &str,
        kind: TokenKind,
        now: OffsetDateTime,
    ) -> Result<Option<Uuid>, StoreError>;
}
