use std::net::SocketAddr;
use std::str::FromStr;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Lifetime of a password-reset token.
    pub reset_ttl_minutes: i64,
    /// Base of the link mailed to users; the token is appended as `?token=`.
    pub reset_url_base: String,
    /// Revoke every other session token of a user after a password change.
    pub revoke_on_password_change: bool,
}

/// Longest accepted reset-token lifetime: one week.
pub const MAX_RESET_TTL_MINUTES: i64 = 7 * 24 * 60;

impl AuthConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            (1..=MAX_RESET_TTL_MINUTES).contains(&self.reset_ttl_minutes),
            "RESET_TOKEN_TTL_MINUTES must be between 1 and {MAX_RESET_TTL_MINUTES}, got {}",
            self.reset_ttl_minutes
        );
        Ok(())
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            reset_ttl_minutes: 60,
            reset_url_base: "http://localhost:8080/reset-password".into(),
            revoke_on_password_change: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub from: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            from: "no-reply@localhost".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Postgres connection string; `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub host: String,
    pub port: u16,
    pub auth: AuthConfig,
    pub mail: MailConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: 10,
            host: "0.0.0.0".into(),
            port: 8080,
            auth: AuthConfig::default(),
            mail: MailConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let auth = AuthConfig {
            reset_ttl_minutes: env_or("RESET_TOKEN_TTL_MINUTES", defaults.auth.reset_ttl_minutes)?,
            reset_url_base: std::env::var("RESET_URL_BASE")
                .unwrap_or(defaults.auth.reset_url_base),
            revoke_on_password_change: std::env::var("AUTH_REVOKE_ON_PASSWORD_CHANGE")
                .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "yes"))
                .unwrap_or(defaults.auth.revoke_on_password_change),
        };
        auth.validate()?;

        let mail = MailConfig {
            from: std::env::var("MAIL_FROM").unwrap_or(defaults.mail.from),
        };

        Ok(Self {
            database_url,
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", defaults.max_connections)?,
            host: std::env::var("APP_HOST").unwrap_or(defaults.host),
            port: env_or("APP_PORT", defaults.port)?,
            auth,
            mail,
        })
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port).parse()?;
        Ok(addr)
    }
}

/// Reads `key` and parses it, falling back to `default` when unset.
fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(v) => v
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid {key}={v}: {e}")),
        Err(_) => Ok(default),
    }
}
