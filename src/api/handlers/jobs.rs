//! Job administration request handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::api::doc::JOB_TAG;
use crate::api::dto::{
    CreateJobRequest, CreateJobResponse, ExecutionResponse, HistoryParams, HistoryResponse,
    JobListResponse, JobResponse, PaginationParams, ScheduleResponse,
};
use crate::error::AppResult;
use crate::state::AppState;
use crate::utils::validate::{ValidatedJson, ValidatedQuery};

/// Creates job-related routes.
pub fn job_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(create_job))
        .routes(routes!(list_jobs))
        .routes(routes!(get_job))
        .routes(routes!(delete_job))
        .routes(routes!(get_job_schedule))
        .routes(routes!(get_job_history))
}

/// POST /api/jobs - Create a job with its initial schedule
#[utoipa::path(
    post,
    path = "/",
    tag = JOB_TAG,
    request_body = CreateJobRequest,
    responses(
        (status = 201, description = "Job created successfully", body = CreateJobResponse),
        (status = 400, description = "Invalid request, job type, or schedule")
    )
)]
async fn create_job(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CreateJobRequest>,
) -> AppResult<(StatusCode, Json<CreateJobResponse>)> {
    let input = req.into_create_job()?;
    let job = state.services.jobs.create_job(input).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateJobResponse {
            id: job.id,
            message: "Job created successfully".to_string(),
        }),
    ))
}

/// GET /api/jobs - List active jobs
#[utoipa::path(
    get,
    path = "/",
    tag = JOB_TAG,
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated list of active jobs", body = JobListResponse)
    )
)]
async fn list_jobs(
    State(state): State<AppState>,
    ValidatedQuery(params): ValidatedQuery<PaginationParams>,
) -> AppResult<Json<JobListResponse>> {
    let (jobs, total) = state
        .services
        .jobs
        .list_jobs(params.limit, params.offset)
        .await?;

    Ok(Json(JobListResponse {
        jobs: jobs.into_iter().map(JobResponse::from).collect(),
        total,
        limit: params.limit,
        offset: params.offset,
    }))
}

/// GET /api/jobs/:id - Get job by ID
#[utoipa::path(
    get,
    path = "/{id}",
    tag = JOB_TAG,
    params(
        ("id" = i32, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Job found", body = JobResponse),
        (status = 404, description = "Job missing or inactive")
    )
)]
async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<JobResponse>> {
    let job = state.services.jobs.get_job(id).await?;
    Ok(Json(JobResponse::from(job)))
}

/// DELETE /api/jobs/:id - Soft-delete a job
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = JOB_TAG,
    params(
        ("id" = i32, Path, description = "Job ID")
    ),
    responses(
        (status = 204, description = "Job deleted; pending schedule removed"),
        (status = 404, description = "Job missing or inactive")
    )
)]
async fn delete_job(State(state): State<AppState>, Path(id): Path<i32>) -> AppResult<StatusCode> {
    state.services.jobs.delete_job(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/jobs/:id/schedule - Pending next fire time
#[utoipa::path(
    get,
    path = "/{id}/schedule",
    tag = JOB_TAG,
    params(
        ("id" = i32, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Pending schedule row", body = ScheduleResponse),
        (status = 404, description = "No pending firing for this job")
    )
)]
async fn get_job_schedule(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<ScheduleResponse>> {
    let schedule = state.services.jobs.get_schedule(id).await?;
    Ok(Json(ScheduleResponse::from(schedule)))
}

/// GET /api/jobs/:id/history - Recent execution attempts
#[utoipa::path(
    get,
    path = "/{id}/history",
    tag = JOB_TAG,
    params(
        ("id" = i32, Path, description = "Job ID"),
        HistoryParams
    ),
    responses(
        (status = 200, description = "Execution history, most recent first", body = HistoryResponse)
    )
)]
async fn get_job_history(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    ValidatedQuery(params): ValidatedQuery<HistoryParams>,
) -> AppResult<Json<HistoryResponse>> {
    let executions = state.services.jobs.get_history(id, params.limit).await?;

    let executions: Vec<ExecutionResponse> =
        executions.into_iter().map(ExecutionResponse::from).collect();

    Ok(Json(HistoryResponse {
        total: executions.len(),
        limit: params.limit,
        executions,
    }))
}
