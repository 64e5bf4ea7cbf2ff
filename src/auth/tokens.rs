//! Bearer token issuance, lookup and revocation.
//!
//! Tokens are 32 random bytes, hex encoded. Only the SHA-256 digest is
//! persisted, so a leaked table cannot be replayed; the plaintext is returned
//! once at issuance.

use std::sync::Arc;

use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::auth::repo::TokenRepo;
use crate::auth::repo_types::{NewToken, TokenKind, User};
use crate::error::AppError;

/// Token byte length before hex encoding (32 bytes = 64 hex chars).
const TOKEN_BYTES: usize = 32;

#[derive(Clone)]
pub struct TokenStore {
    repo: Arc<dyn TokenRepo>,
    reset_ttl: Duration,
}

impl TokenStore {
    pub fn new(repo: Arc<dyn TokenRepo>, reset_ttl: Duration) -> Self {
        Self { repo, reset_ttl }
    }

    /// Mint a session token for `user`.
    pub async fn issue(&self, user: &User) -> Result<String, AppError> {
        self.mint(user.id, TokenKind::Session, None).await
    }

    /// Owner of a live session token; `None` if unknown or revoked.
    pub async fn resolve(&self, token: &str) -> Result<Option<User>, AppError> {
        let user = self
            .repo
            .find_user(&digest(token), TokenKind::Session, OffsetDateTime::now_utc())
            .await
            .map_err(AppError::storage)?;
        Ok(user)
    }

    /// Revoke every session token of `user`. Zero is not an error.
    pub async fn revoke_all(&self, user: &User) -> Result<u64, AppError> {
        let count = self
            .repo
            .delete_for_user(user.id, TokenKind::Session, None)
            .await
            .map_err(AppError::storage)?;
        debug!(user_id = %user.id, count, "session tokens revoked");
        Ok(count)
    }

    /// Revoke every session token of `user` except `keep`.
    pub async fn revoke_all_except(&self, user: &User, keep: &str) -> Result<u64, AppError> {
        let keep_hash = digest(keep);
        let count = self
            .repo
            .delete_for_user(user.id, TokenKind::Session, Some(&keep_hash))
            .await
            .map_err(AppError::storage)?;
        debug!(user_id = %user.id, count, "other session tokens revoked");
        Ok(count)
    }

    /// Mint a short-lived, single-use password-reset token. Any earlier reset
    /// token of `user` stops working.
    pub async fn issue_reset(&self, user: &User) -> Result<String, AppError> {
        let expires_at = OffsetDateTime::now_utc()
            .checked_add(self.reset_ttl)
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("reset token expiry out of range")))?;
        self.revoke_resets(user).await?;
        self.mint(user.id, TokenKind::PasswordReset, Some(expires_at))
            .await
    }

    /// Drop every outstanding reset token of `user`.
    pub async fn revoke_resets(&self, user: &User) -> Result<u64, AppError> {
        let count = self
            .repo
            .delete_for_user(user.id, TokenKind::PasswordReset, None)
            .await
            .map_err(AppError::storage)?;
        debug!(user_id = %user.id, count, "reset tokens revoked");
        Ok(count)
    }

    /// Burn a reset token and return its owner's id if it was still live.
    pub async fn consume_reset(&self, token: &str) -> Result<Option<Uuid>, AppError> {
        self.repo
            .take(
                &digest(token),
                TokenKind::PasswordReset,
                OffsetDateTime::now_utc(),
            )
            .await
            .map_err(AppError::storage)
    }

    async fn mint(
        &self,
        user_id: Uuid,
        kind: TokenKind,
        expires_at: Option<OffsetDateTime>,
    ) -> Result<String, AppError> {
        let token = generate_token();
        self.repo
            .insert(NewToken {
                token_hash: digest(&token),
                user_id,
                kind,
                expires_at,
            })
            .await
            .map_err(AppError::storage)?;
        debug!(user_id = %user_id, kind = kind.as_str(), "token issued");
        Ok(token)
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Hex SHA-256 of the plaintext token; the persisted lookup key.
pub fn digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::auth::repo::UserRepo;
    use crate::auth::repo_types::NewUser;
    use crate::store::MemoryStore;

    async fn setup() -> (Arc<MemoryStore>, TokenStore, User) {
        let store = Arc::new(MemoryStore::new());
        let tokens = TokenStore::new(store.clone(), Duration::minutes(30));
        let user = store
            .create(NewUser {
                name: "Ada".into(),
                email: "ada@x.com".into(),
                phone_number: "01234567890".into(),
                password_hash: "$argon2id$placeholder".into(),
            })
            .await
            .unwrap();
        (store, tokens, user)
    }

    #[test]
    fn generated_tokens_are_hex_and_unique() {
        let tokens: HashSet<String> = (0..256).map(|_| generate_token()).collect();
        assert_eq!(tokens.len(), 256);
        for t in &tokens {
            assert_eq!(t.len(), TOKEN_BYTES * 2);
            assert!(t.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn digest_is_stable_and_differs_from_token() {
        let t = generate_token();
        assert_eq!(digest(&t), digest(&t));
        assert_ne!(digest(&t), t);
    }

    #[tokio::test]
    async fn issue_then_resolve_returns_owner() {
        let (store, tokens, user) = setup().await;
        let token = tokens.issue(&user).await.unwrap();

        let resolved = tokens.resolve(&token).await.unwrap().expect("token resolves");
        assert_eq!(resolved.id, user.id);
        assert!(store.last_used_at(&digest(&token)).is_some());
    }

    #[tokio::test]
    async fn unknown_token_resolves_to_none() {
        let (_store, tokens, _user) = setup().await;
        assert!(tokens.resolve("deadbeef").await.unwrap().is_none());
        assert!(tokens.resolve("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn revoke_all_kills_every_session_token() {
        let (store, tokens, user) = setup().await;
        let a = tokens.issue(&user).await.unwrap();
        let b = tokens.issue(&user).await.unwrap();
        assert_ne!(a, b);

        assert_eq!(tokens.revoke_all(&user).await.unwrap(), 2);
        assert!(tokens.resolve(&a).await.unwrap().is_none());
        assert!(tokens.resolve(&b).await.unwrap().is_none());
        assert_eq!(store.token_count(user.id, TokenKind::Session), 0);

        // idempotent
        assert_eq!(tokens.revoke_all(&user).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn revoke_all_except_keeps_the_presented_token() {
        let (_store, tokens, user) = setup().await;
        let keep = tokens.issue(&user).await.unwrap();
        let drop = tokens.issue(&user).await.unwrap();

        assert_eq!(tokens.revoke_all_except(&user, &keep).await.unwrap(), 1);
        assert!(tokens.resolve(&keep).await.unwrap().is_some());
        assert!(tokens.resolve(&drop).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reset_tokens_do_not_authenticate_and_are_single_use() {
        let (_store, tokens, user) = setup().await;
        let reset = tokens.issue_reset(&user).await.unwrap();
        let session = tokens.issue(&user).await.unwrap();

        assert!(tokens.resolve(&reset).await.unwrap().is_none());
        assert_eq!(tokens.consume_reset(&session).await.unwrap(), None);

        assert_eq!(tokens.consume_reset(&reset).await.unwrap(), Some(user.id));
        assert_eq!(tokens.consume_reset(&reset).await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_reset_token_is_rejected() {
        let (store, _tokens, user) = setup().await;
        let expired = TokenStore::new(store, Duration::minutes(-1));
        let reset = expired.issue_reset(&user).await.unwrap();
        assert_eq!(expired.consume_reset(&reset).await.unwrap(), None);
    }

    #[tokio::test]
    async fn a_new_reset_token_supersedes_older_ones() {
        let (store, tokens, user) = setup().await;
        let first = tokens.issue_reset(&user).await.unwrap();
        for _ in 0..10 {
            tokens.issue_reset(&user).await.unwrap();
        }
        let last = tokens.issue_reset(&user).await.unwrap();
        assert_eq!(store.token_count(user.id, TokenKind::PasswordReset), 1);

        assert_eq!(tokens.consume_reset(&first).await.unwrap(), None);
        assert_eq!(tokens.consume_reset(&last).await.unwrap(), Some(user.id));
        assert_eq!(store.token_count(user.id, TokenKind::PasswordReset), 0);
    }

    #[tokio::test]
    async fn unrepresentable_reset_expiry_is_an_error_not_a_panic() {
        let (store, _tokens, user) = setup().await;
        let huge = TokenStore::new(store.clone(), Duration::MAX);
        let err = huge.issue_reset(&user).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        assert_eq!(store.token_count(user.id, TokenKind::PasswordReset), 0);
    }

    #[tokio::test]
    async fn logout_does_not_touch_reset_tokens() {
        let (store, tokens, user) = setup().await;
        tokens.issue_reset(&user).await.unwrap();
        tokens.issue(&user).await.unwrap();

        tokens.revoke_all(&user).await.unwrap();
        assert_eq!(store.token_count(user.id, TokenKind::PasswordReset), 1);
    }
}
