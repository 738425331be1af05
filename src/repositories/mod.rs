//! Repository layer for data access operations.
//!
//! Provides async CRUD operations against the metadata store.

mod execution_repo;
mod job_repo;
mod schedule_repo;

pub use execution_repo::JobExecutionRepository;
pub use job_repo::JobRepository;
pub use schedule_repo::JobScheduleRepository;

use crate::db::AsyncDbPool;

/// Aggregates all repositories for convenient access.
///
/// Since `AsyncDbPool` uses `Arc` internally, cloning is cheap.
#[derive(Clone)]
pub struct Repositories {
    pub jobs: JobRepository,
    pub schedules: JobScheduleRepository,
    pub executions: JobExecutionRepository,
}

impl Repositories {
    pub fn new(pool: AsyncDbPool) -> Self {
        Self {
            jobs: JobRepository::new(pool.clone()),
            schedules: JobScheduleRepository::new(pool.clone()),
            executions: JobExecutionRepository::new(pool),
        }
    }
}
