use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    Validation(String),
    RateLimitExceeded { limit: i64, reset_in_seconds: i64 },
    UpstreamFailed(String),
    NotFound(String),
    Unsupported(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation(reason) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": reason })),
            )
                .into_response(),
            AppError::RateLimitExceeded {
                limit,
                reset_in_seconds,
            } => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "error": "Rate limit exceeded",
                    "limit": limit,
                    "reset_in_seconds": reset_in_seconds,
                })),
            )
                .into_response(),
            AppError::UpstreamFailed(reason) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("Failed to fetch data: {}", reason) })),
            )
                .into_response(),
            AppError::NotFound(reason) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": reason })),
            )
                .into_response(),
            AppError::Unsupported(reason) => (
                StatusCode::NOT_IMPLEMENTED,
                Json(json!({ "error": reason })),
            )
                .into_response(),
        }
    }
}
