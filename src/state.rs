use std::sync::Arc;

use axum::extract::FromRef;
use tracing::warn;

use crate::auth::repo::{TokenRepo, UserRepo};
use crate::auth::services::CredentialManager;
use crate::auth::tokens::TokenStore;
use crate::config::AppConfig;
use crate::db;
use crate::mail::{LogMailer, Mailer};
use crate::store::{MemoryStore, PgStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub tokens: TokenStore,
    pub accounts: CredentialManager,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;
        let mailer = Arc::new(LogMailer::new(config.mail.from.clone()));

        match config.database_url.clone() {
            Some(url) => {
                let pool = db::connect(&url, config.max_connections).await?;
                db::migrate(&pool).await;
                let store = Arc::new(PgStore::new(pool));
                Ok(Self::from_parts(config, store.clone(), store, mailer))
            }
            None => {
                warn!("DATABASE_URL not set; accounts are kept in memory and lost on restart");
                let store = Arc::new(MemoryStore::new());
                Ok(Self::from_parts(config, store.clone(), store, mailer))
            }
        }
    }

    pub fn from_parts(
        config: AppConfig,
        users: Arc<dyn UserRepo>,
        tokens: Arc<dyn TokenRepo>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let reset_ttl = time::Duration::minutes(config.auth.reset_ttl_minutes);
        let tokens = TokenStore::new(tokens, reset_ttl);
        let accounts = CredentialManager::new(users, tokens.clone(), mailer, config.auth.clone());
        Self {
            config: Arc::new(config),
            tokens,
            accounts,
        }
    }
}

impl FromRef<AppState> for TokenStore {
    fn from_ref(state: &AppState) -> Self {
        state.tokens.clone()
    }
}
