use axum::{extract::rejection::JsonRejection, http::StatusCode, Json};
use serde::Serialize;
use tracing::{debug, error};
use utoipa::ToSchema;

use crate::models::ValidationError;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            details: None,
        }),
    )
}

/// Helper to log error and return generic internal server error
pub fn internal_error<E: std::fmt::Display>(err: E) -> ApiError {
    error!("Internal error: {}", err);
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

pub fn not_found(entity: &str) -> ApiError {
    error_response(StatusCode::NOT_FOUND, format!("{entity} not found"))
}

pub fn bad_request(message: &str) -> ApiError {
    error_response(StatusCode::BAD_REQUEST, message)
}

pub fn invalid_input(err: ValidationError) -> ApiError {
    debug!(error = %err, "Rejected invalid input");
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: "Invalid input".to_string(),
            details: Some(err.messages()),
        }),
    )
}

/// Malformed JSON bodies are reported as 400 with the parser's message
pub fn rejected_body(rejection: JsonRejection) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: "Invalid input".to_string(),
            details: Some(vec![rejection.body_text()]),
        }),
    )
}
