//! Typed operations over the facelink persistent store.
//!
//! The backend is PostgreSQL with the pgvector extension. All writes are
//! append-only bulk transactions; reads resolve the latest row per passport.
//! Feature vectors cross the SQL boundary as `[x,y,...]` text literals cast
//! with `::vector`, and vector columns are never read back.

pub mod models;
pub mod repositories;

use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

use facelink_core::config::StorageConfig;

pub type DbPool = sqlx::PgPool;

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("unable to open connection pool: {0}")]
    Pool(#[from] sqlx::Error),
    #[error("unable to ping the store after {attempts} attempts, last error: {last}")]
    Unreachable { attempts: u32, last: sqlx::Error },
}

/// Build a lazily-connecting pool from the storage config and ping the
/// backend up to `max_pings` times before declaring it unreachable.
pub async fn connect(cfg: &StorageConfig) -> Result<DbPool, ConnectError> {
    let options = PgConnectOptions::new()
        .host(&cfg.addr)
        .port(cfg.port)
        .username(&cfg.user)
        .password(&cfg.passwd)
        .database(&cfg.default_db);

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_millis(cfg.read_timeout_ms))
        .connect_lazy_with(options);

    let mut last = None;
    for attempt in 1..=cfg.max_pings.max(1) {
        match sqlx::query("SELECT 1").execute(&pool).await {
            Ok(_) => {
                tracing::debug!(attempt, "store ping succeeded");
                return Ok(pool);
            }
            Err(e) => {
                tracing::warn!(attempt, error = %e, "store ping failed");
                last = Some(e);
            }
        }
    }

    Err(ConnectError::Unreachable {
        attempts: cfg.max_pings.max(1),
        last: last.unwrap_or(sqlx::Error::PoolClosed),
    })
}
