use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::app_error::{AppError, ErrorCode};

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the error before it gets converted into a status response.
        tracing::error!(error = ?self, "Request failed");

        match self {
            AppError::Validation(msg) => {
                error_resp(StatusCode::BAD_REQUEST, ErrorCode::ValidationError, Some(msg))
            }
            AppError::Gateway { message, retryable } => {
                // Retryable processor failures surface as 502 so callers know
                // the rejection was not theirs; definitive rejections are 400.
                let status = if retryable {
                    StatusCode::BAD_GATEWAY
                } else {
                    StatusCode::BAD_REQUEST
                };
                error_resp(status, ErrorCode::GatewayError, Some(message))
            }
            AppError::Duplicate(msg) => {
                error_resp(StatusCode::CONFLICT, ErrorCode::DuplicateError, Some(msg))
            }
            AppError::Persistence(_) => error_resp(
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorCode::PersistenceError,
                None,
            ),
            AppError::NotFound => error_resp(StatusCode::NOT_FOUND, ErrorCode::NotFound, None),
            AppError::Unauthorized => {
                error_resp(StatusCode::UNAUTHORIZED, ErrorCode::Unauthorized, None)
            }
            AppError::Internal(_) => error_resp(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::InternalError,
                None,
            ),
        }
    }
}

fn error_resp(status: StatusCode, code: ErrorCode, message: Option<String>) -> Response {
    let body = match message {
        Some(msg) => serde_json::json!({ "code": code.as_str(), "message": msg }),
        None => serde_json::json!({ "code": code.as_str() }),
    };
    (status, Json(body)).into_response()
}
