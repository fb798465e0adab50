use crate::config::Config;
use crate::error::PlatformError;
use anyhow::Result;
use deadpool::Runtime;
use diesel::{Connection, PgConnection};
use diesel_async::pooled_connection::deadpool::{Object, Pool};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::info;

// Aliases from diesel-async, so the pool, its objects and the manager all
// resolve against the same deadpool release.
pub type DbPool = Pool<AsyncPgConnection>;
pub type DbConnection = Object<AsyncPgConnection>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Build the connection pool. Objects are created lazily, so this does not
/// touch the server.
fn build_pool(url: &str, max_size: usize) -> Result<DbPool> {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(url);
    let pool = DbPool::builder(manager)
        .max_size(max_size)
        .runtime(Runtime::Tokio1)
        .build()?;
    Ok(pool)
}

/// Database manager for the platform
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Create a new database manager with connection pool
    pub async fn new() -> Result<Self> {
        let config = Config::get();
        let pool = build_pool(
            &config.database.url,
            config.database.max_connections as usize,
        )?;

        let db = Self { pool };

        // Test connection and run migrations
        db.initialize().await?;

        Ok(db)
    }

    /// Initialize the database by testing connection and running migrations
    async fn initialize(&self) -> Result<()> {
        let _conn = self.connection().await?;
        info!("Successfully connected to the database");

        self.run_migrations()?;

        Ok(())
    }

    /// Run database migrations over a plain synchronous connection; the
    /// migration harness is not async.
    fn run_migrations(&self) -> Result<()> {
        let config = Config::get();
        let mut conn = PgConnection::establish(&config.database.url)?;

        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| anyhow::anyhow!("failed to run migrations: {e}"))?;
        info!("Database migrations applied successfully");

        Ok(())
    }

    /// Get a database connection from the pool
    pub async fn connection(&self) -> Result<DbConnection, PlatformError> {
        self.pool
            .get()
            .await
            .map_err(|e| PlatformError::remote(format!("database pool error: {e}")))
    }

    /// Cheap liveness probe for the health endpoint.
    pub async fn ping(&self) -> Result<(), PlatformError> {
        let mut conn = self.connection().await?;
        diesel::sql_query("SELECT 1")
            .execute(&mut conn)
            .await
            .map_err(PlatformError::from)?;
        Ok(())
    }
}

/// Initialize database connection pool and run migrations
pub async fn init_database() -> Result<Database> {
    Database::new().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pool_builds_with_the_requested_capacity() {
        let pool = build_pool("postgres://localhost:5433/carematch_test", 5).unwrap();
        assert_eq!(pool.status().max_size, 5);
    }
}
