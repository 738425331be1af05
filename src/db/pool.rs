//! Async database connection pool implementation.
//!
//! Uses the bb8 connection pool manager with diesel_async for PostgreSQL
//! connections.

use std::time::Duration;

use diesel_async::pooled_connection::bb8::Pool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::config::DatabaseConfig;
use crate::error::AppError;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// Async connection pool type alias.
///
/// bb8::Pool internally uses Arc, so Clone is cheap (just a reference count
/// increment). Structures holding AsyncDbPool can derive Clone without
/// additional Arc wrapping.
pub type AsyncDbPool = Pool<AsyncPgConnection>;

/// Creates an async database connection pool from configuration and,
/// when `auto_migrate` is set, runs pending migrations first.
pub async fn establish_async_connection_pool(
    config: &DatabaseConfig,
) -> Result<AsyncDbPool, AppError> {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(config.url.clone());

    let pool = Pool::builder()
        .max_size(config.max_connections)
        .min_idle(Some(config.min_connections))
        .connection_timeout(Duration::from_secs(config.connection_timeout))
        .build(manager)
        .await
        .map_err(|e| AppError::ConnectionPool {
            source: anyhow::Error::from(e),
        })?;

    if config.auto_migrate {
        run_migrations(&config.url).await?;
    }

    Ok(pool)
}

/// Runs all pending embedded migrations against the given database URL.
///
/// Diesel migrations are synchronous, so this establishes a dedicated
/// blocking connection off the async runtime.
pub async fn run_migrations(database_url: &str) -> Result<(), AppError> {
    tracing::info!("Running database migrations...");

    let database_url = database_url.to_string();
    let applied = tokio::task::spawn_blocking(move || {
        use diesel::pg::PgConnection;
        use diesel::Connection;

        let mut conn = PgConnection::establish(&database_url).map_err(|e| AppError::Database {
            operation: "connect for migrations".to_string(),
            source: anyhow::Error::from(e),
        })?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| AppError::Database {
                operation: "run migrations".to_string(),
                source: anyhow::Error::msg(e.to_string()),
            })?;
        Ok::<_, AppError>(applied.iter().map(|m| m.to_string()).collect::<Vec<_>>())
    })
    .await
    .map_err(|e| AppError::Internal {
        source: anyhow::Error::from(e),
    })??;

    if applied.is_empty() {
        tracing::info!("Database migrations completed: no pending migrations");
    } else {
        tracing::info!(
            count = applied.len(),
            migrations = ?applied,
            "Database migrations completed successfully"
        );
    }

    Ok(())
}
