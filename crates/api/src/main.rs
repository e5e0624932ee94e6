mod error;
mod state;
mod telemetry;
pub mod routes {
    pub mod explain;
    pub mod health;
    pub mod jobs;
    pub mod solve;
    pub mod validate;
}

use axum::{
    routing::{get, post},
    Router,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
        paths(
            routes::health::health,
            routes::solve::solve,
            routes::jobs::status,
            routes::jobs::result,
            routes::jobs::cancel,
            routes::validate::validate_handler,
            routes::explain::explain,
        ),
        components(schemas(
            types::Instance, types::Teacher, types::Requirement, types::RunParams,
            types::Availability, types::Slot, types::SlotConstraint, types::ConstraintKind,
            types::CohortClash, types::GradeLevel, types::DayOfWeek, types::SchoolType,
            types::TeacherId, types::RequirementId, types::SubjectArea,
            types::SolveParams, types::SolveEnvelope, types::SearchMode, types::AnnealParams,
            types::PenaltyWeights, types::CombinablePair,
            types::SolveResult, types::SolveStatus, types::ScheduleRecord, types::AttemptMetrics,
            types::PlacementCount, types::LogLine, types::LogLevel,
            types::Grid, types::Coord, types::Occupant,
            jobs::JobId, jobs::JobStatus,
            routes::health::Health,
            routes::validate::ValidationReport,
            routes::solve::JobCreated,
            routes::jobs::CancelOut,
            routes::explain::ExplainIn,
            routes::explain::ExplainOut,
            routes::explain::Cost
        )),
        tags(
            (name = "timetable", description = "School timetabling API")
        )
    )]
struct ApiDoc;

fn app(state: state::AppState) -> Router {
    Router::new()
        .route("/v1/health", get(routes::health::health))
        .route("/v1/solve", post(routes::solve::solve))
        .route("/v1/validate", post(routes::validate::validate_handler))
        .route("/v1/explain", post(routes::explain::explain))
        .route("/v1/jobs/:id", get(routes::jobs::status))
        .route("/v1/jobs/:id/result", get(routes::jobs::result))
        .route("/v1/jobs/:id/cancel", post(routes::jobs::cancel))
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(telemetry::stack())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let port = std::env::var("UNISCHEDULE__SERVER__PORT").unwrap_or_else(|_| "8080".into());
    let addr: std::net::SocketAddr = format!("0.0.0.0:{port}").parse()?;
    tracing::info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state::AppState::new_default())).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use http::{Request, StatusCode};
    use tower::ServiceExt;

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn instance() -> serde_json::Value {
        serde_json::json!({
            "params": { "periodsPerDay": 2, "fullCoverageGrades": [] },
            "teachers": [{ "id": "A", "qualifications": ["Math"] }],
            "requirements": [{ "id": "Math10", "subject": "Math", "grade": 10, "periodsPerWeek": 2 }]
        })
    }

    async fn json_body(res: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let res = app(state::AppState::new_default())
            .oneshot(Request::get("/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn validate_lists_problems() {
        let mut inst = instance();
        inst["requirements"][0]["teacher"] = serde_json::json!("Nobody");
        let res = app(state::AppState::new_default())
            .oneshot(post_json("/v1/validate", inst))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["ok"], false);
        assert!(!body["errors"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn solve_rejects_zero_periods() {
        let mut inst = instance();
        inst["params"]["periodsPerDay"] = serde_json::json!(0);
        let res = app(state::AppState::new_default())
            .oneshot(post_json("/v1/solve", serde_json::json!({ "instance": inst })))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn solve_rejects_an_oversized_grid() {
        let mut inst = instance();
        inst["params"]["periodsPerDay"] = serde_json::json!(u32::MAX);
        inst["params"]["tracksPerPeriod"] = serde_json::json!(u32::MAX);
        inst["params"]["numTerms"] = serde_json::json!(u32::MAX);
        inst["requirements"][0]["grade"] = serde_json::json!("Mixed");
        let res = app(state::AppState::new_default())
            .oneshot(post_json("/v1/solve", serde_json::json!({ "instance": inst })))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let res = app(state::AppState::new_default())
            .oneshot(Request::get("/v1/jobs/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn explain_rejects_a_misshapen_grid() {
        let grid = serde_json::to_value(types::Grid::new(1, 3, 1)).unwrap();
        let res = app(state::AppState::new_default())
            .oneshot(post_json("/v1/explain", serde_json::json!({ "instance": instance(), "grid": grid })))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn explain_scores_an_empty_grid() {
        let grid = serde_json::to_value(types::Grid::new(1, 2, 1)).unwrap();
        let res = app(state::AppState::new_default())
            .oneshot(post_json("/v1/explain", serde_json::json!({ "instance": instance(), "grid": grid })))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["accepted"], false);
        assert_eq!(body["cost"]["unplacedPeriods"], 2);
        assert_eq!(body["cost"]["total"], 1000.0);
    }
}
