use warp::http::StatusCode;
use warp::log::{Info, Log};

/// Logs every HTTP response once, through [`log_response`].
pub fn request_log() -> Log<impl Fn(Info<'_>) + Copy + Send + Sync + 'static> {
    warp::log::custom(|info: Info<'_>| RequestMetrics::from_info(&info).log())
}

/// Log response with status code
pub fn log_response(status: StatusCode, path: &str, method: &str, duration_ms: u128) {
    if status.is_client_error() {
        tracing::warn!(
            status = %status.as_u16(),
            path = %path,
            method = %method,
            duration_ms = duration_ms,
            "client error"
        );
    } else if status.is_server_error() {
        tracing::error!(
            status = %status.as_u16(),
            path = %path,
            method = %method,
            duration_ms = duration_ms,
            "server error"
        );
    } else {
        tracing::info!(
            status = %status.as_u16(),
            path = %path,
            method = %method,
            duration_ms = duration_ms,
            "response sent"
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMetrics {
    pub path: String,
    pub method: String,
    pub status: u16,
    pub duration_ms: u128,
}

impl RequestMetrics {
    pub fn new(path: String, method: String, status: u16, duration_ms: u128) -> Self {
        Self {
            path,
            method,
            status,
            duration_ms,
        }
    }

    pub fn from_info(info: &Info<'_>) -> Self {
        Self::new(
            info.path().to_string(),
            info.method().to_string(),
            info.status().as_u16(),
            info.elapsed().as_millis(),
        )
    }

    pub fn log(&self) {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        log_response(status, &self.path, &self.method, self.duration_ms);
    }
}
