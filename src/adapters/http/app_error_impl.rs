use crate::app_error::{AppError, ErrorKind};
use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the error before it gets converted into a status response.
        let status = status_for(&self);
        if status.is_server_error() {
            tracing::error!(error = ?self, "Request failed");
        } else {
            tracing::warn!(error = ?self, status = status.as_u16(), "Request rejected");
        }

        error_resp(status, &self)
    }
}

fn status_for(error: &AppError) -> StatusCode {
    match error.kind() {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Authorization => match error {
            AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            _ => StatusCode::FORBIDDEN,
        },
        ErrorKind::Dependency => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_resp(status: StatusCode, error: &AppError) -> Response {
    let body = serde_json::json!({
        "success": false,
        "code": error.code().as_str(),
        "message": error.public_message(),
    });
    (status, Json(body)).into_response()
}
