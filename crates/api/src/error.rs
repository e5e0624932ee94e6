use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    NotReady(String),
    Failed(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, msg) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::NotReady(m) => (StatusCode::CONFLICT, m),
            ApiError::Failed(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (code, msg).into_response()
    }
}

impl From<sched_core::ConfigError> for ApiError {
    fn from(e: sched_core::ConfigError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}
