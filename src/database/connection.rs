//! PostgreSQL pool and schema setup

use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::config::DatabaseConfig;
use crate::utils::errors::Result;

pub type DatabasePool = PgPool;

const IDLE_TIMEOUT: Duration = Duration::from_secs(600);
const MAX_LIFETIME: Duration = Duration::from_secs(1800);

/// Pool options for the `[database]` settings
pub fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
        .idle_timeout(IDLE_TIMEOUT)
        .max_lifetime(MAX_LIFETIME)
}

/// Connect and make sure the pool can serve a query
pub async fn create_pool(config: &DatabaseConfig) -> Result<DatabasePool> {
    let pool = pool_options(config).connect(&config.url).await?;
    let latency = health_check(&pool).await?;

    info!(
        max_connections = config.max_connections,
        latency_ms = latency.as_millis() as u64,
        "Database pool ready"
    );
    Ok(pool)
}

/// Bring the schema up to date with `migrations/`
pub async fn run_migrations(pool: &DatabasePool) -> Result<()> {
    let migrator = sqlx::migrate!("./migrations");
    migrator.run(pool).await?;

    info!(known = migrator.iter().count(), "Schema migrations applied");
    Ok(())
}

/// Round-trip a trivial query and report how long it took
pub async fn health_check(pool: &DatabasePool) -> Result<Duration> {
    let started = Instant::now();
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(started.elapsed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    #[test]
    fn test_pool_options_follow_settings() {
        let mut settings = Settings::default();
        settings.database.max_connections = 7;
        settings.database.acquire_timeout_seconds = 3;

        let options = pool_options(&settings.database);
        assert_eq!(options.get_max_connections(), 7);
        assert_eq!(options.get_min_connections(), 1);
        assert_eq!(options.get_acquire_timeout(), Duration::from_secs(3));
        assert_eq!(options.get_idle_timeout(), Some(IDLE_TIMEOUT));
    }
}
