//! Error responses shared by the HTTP routes and the socket boundary.
//!
//! Errors implement [`IntoErrorResponse`] to get:
//! - a status code and machine-readable code for HTTP replies,
//! - a severity that picks the log level when the error is reported.
use crate::registry::RegistryError;
use crate::settings::SettingsError;
use serde::{Deserialize, Serialize};
use std::fmt;
use warp::http::StatusCode;
use warp::reply::{self, Response};
use warp::Reply;

/// JSON body of every error reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Machine-readable error code (e.g., "room_not_found")
    pub error: String,
    /// Human-readable error message
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(
        error: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn into_response(self, status: StatusCode) -> Response {
        reply::with_status(reply::json(&self), status).into_response()
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

/// Error classification for logging levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Caused by the client; expected during normal play
    Client,
    /// Server-side failure that needs investigation
    Server,
    /// Shared state can no longer be trusted
    Critical,
}

pub trait IntoErrorResponse {
    fn status_code(&self) -> StatusCode;

    /// Machine-readable error code
    fn error_code(&self) -> &'static str;

    fn error_message(&self) -> String;

    fn error_details(&self) -> Option<serde_json::Value> {
        None
    }

    fn severity(&self) -> ErrorSeverity {
        if self.status_code().is_server_error() {
            ErrorSeverity::Server
        } else {
            ErrorSeverity::Client
        }
    }

    fn to_error_response(&self) -> ErrorResponse {
        if let Some(details) = self.error_details() {
            ErrorResponse::with_details(self.error_code(), self.error_message(), details)
        } else {
            ErrorResponse::new(self.error_code(), self.error_message())
        }
    }

    /// Logs the error at its severity and builds the HTTP reply.
    fn into_http_response(self) -> Response
    where
        Self: Sized,
    {
        let status = self.status_code();
        let error_response = self.to_error_response();
        log_error(self.severity(), &error_response);
        error_response.into_response(status)
    }
}

/// Reports an error at the level its severity calls for.
pub fn log_error(severity: ErrorSeverity, error: &ErrorResponse) {
    match severity {
        ErrorSeverity::Client => {
            tracing::info!(code = %error.error, message = %error.message, "client error");
        }
        ErrorSeverity::Server => {
            tracing::error!(code = %error.error, message = %error.message, "server error");
        }
        ErrorSeverity::Critical => {
            tracing::error!(
                code = %error.error,
                message = %error.message,
                critical = true,
                "critical error"
            );
        }
    }
}

impl IntoErrorResponse for RegistryError {
    fn status_code(&self) -> StatusCode {
        match self {
            RegistryError::RoomNotFound(_) => StatusCode::NOT_FOUND,
            RegistryError::RoomFull(_) => StatusCode::CONFLICT,
            RegistryError::StoragePoisoned => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            RegistryError::RoomNotFound(_) => "room_not_found",
            RegistryError::RoomFull(_) => "room_full",
            RegistryError::StoragePoisoned => "registry_storage_error",
        }
    }

    fn error_message(&self) -> String {
        self.to_string()
    }

    fn error_details(&self) -> Option<serde_json::Value> {
        match self {
            RegistryError::RoomNotFound(id) | RegistryError::RoomFull(id) => {
                Some(serde_json::json!({ "room_id": id }))
            }
            RegistryError::StoragePoisoned => None,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            RegistryError::StoragePoisoned => ErrorSeverity::Critical,
            _ => ErrorSeverity::Client,
        }
    }
}

impl IntoErrorResponse for SettingsError {
    fn status_code(&self) -> StatusCode {
        match self {
            SettingsError::InvalidValue(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            SettingsError::InvalidValue(_) => "invalid_settings",
            SettingsError::StoragePoisoned => "settings_storage_error",
            SettingsError::Io(_) | SettingsError::Parse(_) => "settings_load_error",
        }
    }

    fn error_message(&self) -> String {
        self.to_string()
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            SettingsError::InvalidValue(_) => ErrorSeverity::Client,
            SettingsError::StoragePoisoned => ErrorSeverity::Critical,
            _ => ErrorSeverity::Server,
        }
    }
}
