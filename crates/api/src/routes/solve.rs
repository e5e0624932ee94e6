use crate::{error::ApiError, state::AppState};
use axum::{extract::State, Json};
use sched_core::check_config;
use types::SolveEnvelope;
use utoipa::ToSchema;

#[derive(serde::Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobCreated {
    pub job_id: String,
    pub status: &'static str,
}

#[utoipa::path(
        post,
        path = "/v1/solve",
        request_body = SolveEnvelope,
        responses(
            (status = 200, description = "Job enqueued", body = JobCreated),
            (status = 400, description = "Run parameters rejected")
        )
    )]
pub async fn solve(
    State(state): State<AppState>,
    Json(env): Json<SolveEnvelope>,
) -> Result<Json<JobCreated>, ApiError> {
    check_config(&env.instance.params)?;
    let id = state.jobs.enqueue(env);
    tracing::info!(job = %id.0, "solve enqueued");
    Ok(Json(JobCreated {
        job_id: id.0,
        status: "queued",
    }))
}
