use std::time::Duration;

use tower::layer::util::{Identity, Stack};
use tower::ServiceBuilder;
use tower_http::map_response_body::MapResponseBodyLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, HttpMakeClassifier};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::Level;

/// Instances with a few hundred requirements and their grids stay well under this.
const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

type BodyToAxum<B> = fn(B) -> axum::body::Body;

type Layers = Stack<
    TimeoutLayer,
    Stack<
        RequestBodyLimitLayer,
        Stack<
            MapResponseBodyLayer<BodyToAxum<tower_http::limit::ResponseBody<axum::body::Body>>>,
            Stack<CorsLayer, Stack<TraceLayer<HttpMakeClassifier>, Identity>>,
        >,
    >,
>;

/// Request spans at INFO, permissive CORS, a body cap and a request timeout.
/// Solves run as jobs, so the timeout only bounds validate and explain.
pub fn stack() -> ServiceBuilder<Layers> {
    let trace = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));
    let cors = CorsLayer::permissive();
    let limit = RequestBodyLimitLayer::new(MAX_BODY_BYTES);

    ServiceBuilder::new()
        .layer(trace)
        .layer(cors)
        // CorsLayer needs a `Default` response body; the limit's body wrapper has none.
        .layer(MapResponseBodyLayer::new(
            axum::body::Body::new as BodyToAxum<tower_http::limit::ResponseBody<axum::body::Body>>,
        ))
        .layer(limit)
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
}
