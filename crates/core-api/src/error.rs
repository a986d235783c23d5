//! API error envelope: `{"error":{"code","message"},"request_id"?}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use core_state::StateError;
use serde_json::json;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub request_id: Option<u64>,
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "validation_error",
            message: message.into(),
            request_id: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "not_found",
            message: message.into(),
            request_id: None,
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            code: "conflict",
            message: message.into(),
            request_id: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal_error",
            message: message.into(),
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, id: u64) -> Self {
        self.request_id = Some(id);
        self
    }
}

impl From<StateError> for ApiError {
    fn from(err: StateError) -> Self {
        match &err {
            StateError::ZoneNotFound(_) | StateError::AnimationNotFound(_) => {
                ApiError::not_found(err.to_string())
            }
            StateError::Validation(_) | StateError::Param(_) => {
                ApiError::validation(err.to_string())
            }
            StateError::Conflict(_) => ApiError::conflict(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::debug!(
            target: "api.http",
            status = self.status.as_u16(),
            code = self.code,
            message = self.message.as_str(),
            "request_failed"
        );
        let mut body = json!({
            "error": {
                "code": self.code,
                "message": self.message,
            }
        });
        if let Some(id) = self.request_id {
            body["request_id"] = json!(id);
        }
        (self.status, Json(body)).into_response()
    }
}
