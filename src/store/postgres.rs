use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo::{StoreError, TokenRepo, UserRepo};
use crate::auth::repo_types::{NewToken, NewUser, TokenKind, User};

/// Postgres-backed users and personal access tokens.
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// Map a sqlx error onto the store taxonomy, naming the violated column.
fn classify(err: sqlx::Error, what: &'static str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let field = match db_err.constraint() {
                Some("users_email_key") => "email",
                Some("users_phone_number_key") => "phone_number",
                Some("personal_access_tokens_pkey") => "token",
                _ => "record",
            };
            return StoreError::UniqueViolation { field };
        }
    }
    StoreError::Backend(anyhow::Error::new(err).context(what))
}

#[async_trait]
impl UserRepo for PgStore {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, phone_number, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, phone_number, password_hash, created_at, updated_at
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone_number)
        .bind(&user.password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(|e| classify(e, "insert user"))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, phone_number, password_hash, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, phone_number, password_hash, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        name: &str,
        email: &str,
    ) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET name = $2, email = $3, updated_at = now()
             WHERE id = $1
            RETURNING id, name, email, phone_number, password_hash, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| classify(e, "update user profile"))
    }

    async fn update_password(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET password_hash = $2, updated_at = now()
             WHERE id = $1
            RETURNING id, name, email, phone_number, password_hash, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .fetch_optional(&self.db)
        .await
        .context("update user password")?;
        Ok(user)
    }
}

#[async_trait]
impl TokenRepo for PgStore {
    async fn insert(&self, token: NewToken) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO personal_access_tokens (token_hash, user_id, kind, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&token.token_hash)
        .bind(token.user_id)
        .bind(token.kind.as_str())
        .bind(token.expires_at)
        .execute(&self.db)
        .await
        .map_err(|e| classify(e, "insert token"))?;
        Ok(())
    }

    async fn find_user(
        &self,
        token_hash: &str,
        kind: TokenKind,
        now: OffsetDateTime,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE personal_access_tokens t
               SET last_used_at = $3
              FROM users u
             WHERE t.token_hash = $1
               AND t.kind = $2
               AND (t.expires_at IS NULL OR t.expires_at > $3)
               AND u.id = t.user_id
            RETURNING u.id, u.name, u.email, u.phone_number, u.password_hash,
                      u.created_at, u.updated_at
            "#,
        )
        .bind(token_hash)
        .bind(kind.as_str())
        .bind(now)
        .fetch_optional(&self.db)
        .await
        .context("resolve token")?;
        Ok(user)
    }

    async fn delete_for_user(
        &self,
        user_id: Uuid,
        kind: TokenKind,
        keep_hash: Option<&str>,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM personal_access_tokens
             WHERE user_id = $1
               AND kind = $2
               AND ($3::text IS NULL OR token_hash <> $3)
            "#,
        )
        .bind(user_id)
        .bind(kind.as_str())
        .bind(keep_hash)
        .execute(&self.db)
        .await
        .context("revoke user tokens")?;
        Ok(result.rows_affected())
    }

    async fn take(
        &self,
        token_hash: &str,
        kind: TokenKind,
        now: OffsetDateTime,
    ) -> Result<Option<Uuid>, StoreError> {
        let row = sqlx::query_as::<_, (Uuid,)>(
            r#"
            DELETE FROM personal_access_tokens
             WHERE token_hash = $1
               AND kind = $2
               AND (expires_at IS NULL OR expires_at > $3)
            RETURNING user_id
            "#,
        )
        .bind(token_hash)
        .bind(kind.as_str())
        .bind(now)
        .fetch_optional(&self.db)
        .await
        .context("consume token")?;
        Ok(row.map(|(user_id,)| user_id))
    }
}
