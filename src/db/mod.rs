//! Database connection pool, migrations, and health check.

pub mod completions;

use crate::config::DEFAULT_MAX_CONNECTIONS;
use crate::error::Result;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Database handle. Owns the connection pool; cheap to share behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    /// Connect to Postgres with the default pool size.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with(url, DEFAULT_MAX_CONNECTIONS).await
    }

    /// Connect to Postgres with an explicit pool size.
    pub async fn connect_with(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool, e.g. one the host application already owns.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `job_state` type and the completion table.
    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await?;
        tracing::info!("completion log schema is up to date");
        Ok(())
    }

    /// Drop the completion table and the `job_state` type.
    pub async fn revert(&self) -> Result<()> {
        MIGRATOR.undo(&self.pool, 0).await?;
        tracing::info!("completion log schema reverted");
        Ok(())
    }

    /// Simple health check: run a SELECT 1.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
