use utoipa::OpenApi;

pub const JOB_TAG: &str = "Jobs";
pub const QUEUE_TAG: &str = "Queue";
pub const HEALTH_TAG: &str = "Health";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Metronome",
        description = "Distributed CRON-style job scheduler with webhook delivery",
    ),
    tags(
        (name = JOB_TAG, description = "Job administration endpoints"),
        (name = QUEUE_TAG, description = "Work queue observability"),
        (name = HEALTH_TAG, description = "Health and readiness probes")
    ),
)]
pub struct ApiDoc;
