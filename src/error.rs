use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::auth::AuthError;

/// Error classification returned to clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Client errors (4xx)
    BadRequest,
    Unauthorized,
    NotFound,

    // Server errors (5xx)
    InternalServerError,
    BadGateway,
}

/// Structured error response format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
    pub status: u16,
}

/// Details of an error occurrence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    pub request_id: String,
    pub timestamp: String,
    pub path: String,
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub context: HashMap<String, serde_json::Value>,
}

/// Builder for creating error responses
pub struct ErrorResponseBuilder {
    code: ErrorCode,
    message: String,
    request_id: String,
    timestamp: String,
    path: String,
    context: HashMap<String, serde_json::Value>,
}

impl ErrorResponseBuilder {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            request_id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            path: "/".to_string(),
            context: HashMap::new(),
        }
    }

    pub fn request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn context(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> ErrorResponse {
        let status = code_to_status(&self.code);

        ErrorResponse {
            error: ErrorDetails {
                code: self.code,
                message: self.message,
                request_id: self.request_id,
                timestamp: self.timestamp,
                path: self.path,
                context: self.context,
            },
            status,
        }
    }
}

fn code_to_status(code: &ErrorCode) -> u16 {
    match code {
        ErrorCode::BadRequest => 400,
        ErrorCode::Unauthorized => 401,
        ErrorCode::NotFound => 404,
        ErrorCode::InternalServerError => 500,
        ErrorCode::BadGateway => 502,
    }
}

impl ErrorResponse {
    /// Client-facing body for an authentication failure. Only the generic
    /// message is exposed; the provider's own error code is echoed when the
    /// provider sent one, since it came from the browser's query string anyway.
    pub fn from_auth_error(err: &AuthError, path: &str) -> Self {
        let mut builder = ErrorResponseBuilder::new(err.error_code(), err.public_message()).path(path);

        if let AuthError::AuthorizationDenied { error, .. } = err {
            builder = builder.context("provider_error", error.clone());
        }

        builder.build()
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}
