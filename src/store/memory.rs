use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo::{StoreError, TokenRepo, UserRepo};
use crate::auth::repo_types::{NewToken, NewUser, TokenKind, User};

#[derive(Debug, Clone)]
struct TokenRow {
    user_id: Uuid,
    kind: TokenKind,
    expires_at: Option<OffsetDateTime>,
    last_used_at: Option<OffsetDateTime>,
}

impl TokenRow {
    fn is_live(&self, kind: TokenKind, now: OffsetDateTime) -> bool {
        self.kind == kind && self.expires_at.map_or(true, |exp| exp > now)
    }
}

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    tokens: HashMap<String, TokenRow>,
}

impl Inner {
    /// Column of the first unique constraint `candidate` would break. Email is
    /// checked across every user before phone number.
    fn conflict(&self, candidate: &User) -> Option<&'static str> {
        let others = || self.users.values().filter(|u| u.id != candidate.id);
        if others().any(|u| u.email == candidate.email) {
            Some("email")
        } else if others().any(|u| u.phone_number == candidate.phone_number) {
            Some("phone_number")
        } else {
            None
        }
    }
}

/// Process-local store with the same constraints as the Postgres schema.
///
/// Each operation holds the lock for its whole check-then-write, which gives
/// the atomicity the database gets from its unique indexes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_count(&self) -> usize {
        self.inner.lock().users.len()
    }

    pub fn token_count(&self, user_id: Uuid, kind: TokenKind) -> usize {
        self.inner
            .lock()
            .tokens
            .values()
            .filter(|t| t.user_id == user_id && t.kind == kind)
            .count()
    }

    /// When the token with this digest last authenticated a request.
    pub fn last_used_at(&self, token_hash: &str) -> Option<OffsetDateTime> {
        self.inner
            .lock()
            .tokens
            .get(token_hash)
            .and_then(|t| t.last_used_at)
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            phone_number: user.phone_number,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };

        let mut inner = self.inner.lock();
        if let Some(field) = inner.conflict(&user) {
            return Err(StoreError::UniqueViolation { field });
        }
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.inner.lock().users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .inner
            .lock()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        name: &str,
        email: &str,
    ) -> Result<Option<User>, StoreError> {
        let mut inner = self.inner.lock();
        let Some(current) = inner.users.get(&id) else {
            return Ok(None);
        };

        let mut updated = current.clone();
        updated.name = name.to_string();
        updated.email = email.to_string();
        updated.updated_at = OffsetDateTime::now_utc();

        if let Some(field) = inner.conflict(&updated) {
            return Err(StoreError::UniqueViolation { field });
        }
        inner.users.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn update_password(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> Result<Option<User>, StoreError> {
        let mut inner = self.inner.lock();
        Ok(inner.users.get_mut(&id).map(|user| {
            user.password_hash = password_hash.to_string();
            user.updated_at = OffsetDateTime::now_utc();
            user.clone()
        }))
    }
}

#[async_trait]
impl TokenRepo for MemoryStore {
    async fn insert(&self, token: NewToken) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.tokens.contains_key(&token.token_hash) {
            return Err(StoreError::UniqueViolation { field: "token" });
        }
        inner.tokens.insert(
            token.token_hash,
            TokenRow {
                user_id: token.user_id,
                kind: token.kind,
                expires_at: token.expires_at,
                last_used_at: None,
            },
        );
        Ok(())
    }

    async fn find_user(
        &self,
        token_hash: &str,
        kind: TokenKind,
        now: OffsetDateTime,
    ) -> Result<Option<User>, StoreError> {
        let mut inner = self.inner.lock();
        let user_id = match inner.tokens.get_mut(token_hash) {
            Some(row) if row.is_live(kind, now) => {
                row.last_used_at = Some(now);
                row.user_id
            }
            _ => return Ok(None),
        };
        Ok(inner.users.get(&user_id).cloned())
    }

    async fn delete_for_user(
        &self,
        user_id: Uuid,
        kind: TokenKind,
        keep_hash: Option<&str>,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock();
        let before = inner.tokens.len();
        inner.tokens.retain(|hash, row| {
            row.user_id != user_id || row.kind != kind || Some(hash.as_str()) == keep_hash
        });
        Ok((before - inner.tokens.len()) as u64)
    }

    async fn take(
        &self,
        token_hash: &str,
        kind: TokenKind,
        now: OffsetDateTime,
    ) -> Result<Option<Uuid>, StoreError> {
        let mut inner = self.inner.lock();
        let live = inner
            .tokens
            .get(token_hash)
            .map_or(false, |row| row.is_live(kind, now));
        if !live {
            return Ok(None);
        }
        Ok(inner.tokens.remove(token_hash).map(|row| row.user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str, phone: &str) -> NewUser {
        NewUser {
            name: "Test".into(),
            email: email.into(),
            phone_number: phone.into(),
            password_hash: "$argon2id$placeholder".into(),
        }
    }

    #[tokio::test]
    async fn rejects_duplicate_email_and_phone() {
        let store = MemoryStore::new();
        store.create(new_user("a@x.com", "01234567890")).await.unwrap();

        let err = store
            .create(new_user("a@x.com", "09999999999"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { field: "email" }));

        let err = store
            .create(new_user("b@x.com", "01234567890"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::UniqueViolation { field: "phone_number" }
        ));
        assert_eq!(store.user_count(), 1);
    }

    #[tokio::test]
    async fn email_clash_wins_over_phone_clash_on_different_users() {
        let store = MemoryStore::new();
        for i in 0..16 {
            store
                .create(new_user(&format!("u{i}@x.com"), &format!("0{i:010}")))
                .await
                .unwrap();
        }
        for i in 0..16 {
            let other = (i + 1) % 16;
            let err = store
                .create(new_user(&format!("u{i}@x.com"), &format!("0{other:010}")))
                .await
                .unwrap_err();
            assert!(matches!(err, StoreError::UniqueViolation { field: "email" }));
        }
    }

    #[tokio::test]
    async fn profile_update_cannot_steal_an_email() {
        let store = MemoryStore::new();
        store.create(new_user("a@x.com", "01111111111")).await.unwrap();
        let b = store.create(new_user("b@x.com", "02222222222")).await.unwrap();

        let err = store
            .update_profile(b.id, "B", "a@x.com")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { field: "email" }));

        // keeping one's own email is not a conflict
        let same = store.update_profile(b.id, "Bee", "b@x.com").await.unwrap();
        assert_eq!(same.unwrap().name, "Bee");
    }

    #[tokio::test]
    async fn take_is_single_use_and_respects_kind_and_expiry() {
        let store = MemoryStore::new();
        let user = store.create(new_user("a@x.com", "01111111111")).await.unwrap();
        let now = OffsetDateTime::now_utc();

        for (hash, expires_at) in [
            ("live", Some(now + time::Duration::minutes(5))),
            ("stale", Some(now - time::Duration::minutes(5))),
        ] {
            store
                .insert(NewToken {
                    token_hash: hash.into(),
                    user_id: user.id,
                    kind: TokenKind::PasswordReset,
                    expires_at,
                })
                .await
                .unwrap();
        }

        assert_eq!(store.take("live", TokenKind::Session, now).await.unwrap(), None);
        assert_eq!(
            store.take("live", TokenKind::PasswordReset, now).await.unwrap(),
            Some(user.id)
        );
        assert_eq!(store.take("live", TokenKind::PasswordReset, now).await.unwrap(), None);
        assert_eq!(store.take("stale", TokenKind::PasswordReset, now).await.unwrap(), None);
    }
}
