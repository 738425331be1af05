//! Application state for the Axum admin API.

use std::sync::Arc;

use crate::db::AsyncDbPool;
use crate::queue::WorkQueue;
use crate::repositories::Repositories;
use crate::services::Services;

/// Shared state for all request handlers.
///
/// Cloning is cheap: the pool is Arc-backed and the queue is an Arc.
#[derive(Clone)]
pub struct AppState {
    /// All business logic services
    pub services: Services,
    /// Direct access to the database connection pool (health checks)
    pub db_pool: AsyncDbPool,
    /// Broker handle (queue stats, health checks)
    pub queue: Arc<dyn WorkQueue>,
}

impl AppState {
    pub fn new(pool: AsyncDbPool, queue: Arc<dyn WorkQueue>) -> Self {
        let repos = Repositories::new(pool.clone());
        let services = Services::new(repos);
        Self {
            services,
            db_pool: pool,
            queue,
        }
    }
}
