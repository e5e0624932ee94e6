use crate::{error::ApiError, state::AppState};
use axum::{
    extract::{Path, State},
    Json,
};
use jobs::JobStatus;
use types::SolveResult;
use utoipa::ToSchema;

#[derive(serde::Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CancelOut {
    pub job_id: String,
    pub cancelled: bool,
}

#[utoipa::path(
        get,
        path = "/v1/jobs/{id}",
        params(("id" = String, Path, description = "Job ID")),
        responses(
            (status = 200, description = "Job status", body = JobStatus),
            (status = 404, description = "Unknown job")
        )
    )]
pub async fn status(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<JobStatus>, ApiError> {
    state
        .jobs
        .get(&id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("job {id} not found")))
}

#[utoipa::path(
        get,
        path = "/v1/jobs/{id}/result",
        params(("id" = String, Path, description = "Job ID")),
        responses(
            (status = 200, description = "Solve result, including best failed and cancelled runs", body = SolveResult),
            (status = 404, description = "Unknown job"),
            (status = 409, description = "Job still queued or running")
        )
    )]
pub async fn result(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<SolveResult>, ApiError> {
    let st = state
        .jobs
        .get(&id)
        .ok_or_else(|| ApiError::NotFound(format!("job {id} not found")))?;
    match st {
        JobStatus::Failed { message } => Err(ApiError::Failed(message)),
        JobStatus::Queued | JobStatus::Running => Err(ApiError::NotReady(format!("job {id} is not finished"))),
        other => other
            .result()
            .cloned()
            .map(Json)
            .ok_or_else(|| ApiError::NotReady(format!("job {id} was cancelled before it started"))),
    }
}

#[utoipa::path(
        post,
        path = "/v1/jobs/{id}/cancel",
        params(("id" = String, Path, description = "Job ID")),
        responses(
            (status = 200, description = "Cancellation outcome", body = CancelOut),
            (status = 404, description = "Unknown job")
        )
    )]
pub async fn cancel(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<CancelOut>, ApiError> {
    if state.jobs.get(&id).is_none() {
        return Err(ApiError::NotFound(format!("job {id} not found")));
    }
    let cancelled = state.jobs.cancel(&id);
    Ok(Json(CancelOut { job_id: id, cancelled }))
}
