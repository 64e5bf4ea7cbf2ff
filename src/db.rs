use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let db = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .context("connect to database")?;
    Ok(db)
}

/// Apply `./migrations`; a failure is logged and startup continues.
pub async fn migrate(db: &PgPool) {
    if let Err(e) = sqlx::migrate!("./migrations").run(db).await {
        tracing::warn!(error = %e, "migration failed; continuing");
    }
}
