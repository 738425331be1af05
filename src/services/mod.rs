//! Service layer for business logic operations.
//!
//! Services encapsulate business logic and coordinate between
//! repositories and handlers.

pub mod job_service;

pub use job_service::{CreateJob, JobService};

use crate::repositories::Repositories;

/// Aggregates all services for convenient access.
///
/// Designed to be used as Axum application state; cloning is cheap since
/// the underlying pool uses `Arc` internally.
#[derive(Clone)]
pub struct Services {
    pub jobs: JobService,
}

impl Services {
    pub fn new(repos: Repositories) -> Self {
        Self {
            jobs: JobService::new(repos),
        }
    }
}
