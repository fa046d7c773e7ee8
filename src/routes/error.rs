use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::models::response::ApiResponse;
use crate::services::product_service::ProductError;

impl ProductError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProductError::Business(_) | ProductError::Validation(_) => StatusCode::BAD_REQUEST,
            ProductError::NotFound(_) => StatusCode::NOT_FOUND,
            ProductError::Upstream(_) | ProductError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProductError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::warn!(error = %self, "Request rejected");
        }

        let message = match &self {
            ProductError::Storage(_) => "系统内部错误".to_string(),
            other => other.to_string(),
        };
        (status, Json(ApiResponse::error(status.as_u16(), message))).into_response()
    }
}
