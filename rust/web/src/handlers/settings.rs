use crate::errors::IntoErrorResponse;
use crate::settings::{AppSettings, SettingsError, SettingsStore};
use gambit_ai::ModelKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reply::{self, Response};
use warp::Reply;

/// Partial update; absent fields keep their current value.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateSettingsRequest {
    pub default_level: Option<u8>,
    pub default_model: Option<String>,
    pub search_path: Option<String>,
}

/// Get current settings
pub async fn get_settings(store: Arc<SettingsStore>) -> Response {
    match store.get() {
        Ok(settings) => success_response(StatusCode::OK, settings),
        Err(err) => err.into_http_response(),
    }
}

/// Update settings
pub async fn update_settings(store: Arc<SettingsStore>, request: UpdateSettingsRequest) -> Response {
    match apply_update(&store, request) {
        Ok(settings) => {
            tracing::info!(
                level = settings.default_level,
                model = %settings.default_model,
                "engine defaults updated"
            );
            success_response(StatusCode::OK, settings)
        }
        Err(err) => err.into_http_response(),
    }
}

/// Reset settings to defaults
pub async fn reset_settings(store: Arc<SettingsStore>) -> Response {
    match store.reset() {
        Ok(settings) => success_response(StatusCode::OK, settings),
        Err(err) => err.into_http_response(),
    }
}

fn apply_update(
    store: &SettingsStore,
    request: UpdateSettingsRequest,
) -> Result<AppSettings, SettingsError> {
    let mut current = store.get()?;

    if let Some(level) = request.default_level {
        current.default_level = level;
    }

    if let Some(model) = request.default_model {
        current.default_model = model
            .parse::<ModelKind>()
            .map_err(|err| SettingsError::InvalidValue(err.to_string()))?;
    }

    if let Some(path) = request.search_path {
        current.search_path = PathBuf::from(path);
    }

    store.update(current)
}

fn success_response<T>(status: StatusCode, body: T) -> Response
where
    T: Serialize,
{
    reply::with_status(reply::json(&body), status).into_response()
}
