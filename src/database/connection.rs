use std::time::Duration;

use serde::Serialize;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio::time::timeout;
use tracing::{error, info};

use crate::config::DatabaseSettings;
use crate::error::AppError;

#[derive(Debug, Serialize)]
pub struct ConnectionPoolStats {
    pub size: u32,
    pub idle: u32,
    pub active: u32,
    pub max_connections: u32,
}

pub async fn establish_connection(settings: &DatabaseSettings) -> Result<PgPool, AppError> {
    info!(
        max_connections = settings.max_connections,
        min_connections = settings.min_connections,
        "Establishing database connection"
    );

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(settings.idle_timeout_secs))
        .test_before_acquire(true)
        .connect(&settings.url)
        .await
        .map_err(|e| {
            error!("Failed to connect to database: {}", e);
            AppError::DatabaseError(format!("Connection failed: {}", e))
        })?;

    info!("Database connection established");
    Ok(pool)
}

pub async fn test_connection(pool: &PgPool) -> Result<(), AppError> {
    timeout(Duration::from_secs(5), sqlx::query("SELECT 1").fetch_one(pool))
        .await
        .map_err(|_| AppError::DatabaseError("Connection test timed out".to_string()))?
        .map_err(|e| AppError::DatabaseError(format!("Connection test failed: {}", e)))?;

    info!("Database connection test successful");
    Ok(())
}

pub fn get_pool_stats(pool: &PgPool) -> ConnectionPoolStats {
    let idle = pool.num_idle() as u32;
    ConnectionPoolStats {
        size: pool.size(),
        idle,
        active: pool.size().saturating_sub(idle),
        max_connections: pool.options().get_max_connections(),
    }
}
