// Route exports
pub mod catalog;
pub mod search;

use crate::core::{SearchEngine, SearchError};
use crate::models::ErrorResponse;
use crate::services::{CacheManager, CatalogStore};
use actix_web::{error, http::StatusCode, web, HttpResponse};
use std::sync::Arc;
use std::time::Duration;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: SearchEngine,
    pub catalog: Arc<dyn CatalogStore>,
    pub cache: Option<Arc<CacheManager>>,
    pub search_timeout: Duration,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .configure(search::configure)
            .configure(catalog::configure),
    );
}

pub(crate) fn error_body(status: StatusCode, error: &str, message: impl Into<String>) -> HttpResponse {
    HttpResponse::build(status).json(ErrorResponse {
        error: error.to_string(),
        message: message.into(),
        status_code: status.as_u16(),
    })
}

/// Map a search failure to its HTTP response
pub(crate) fn search_error_response(err: &SearchError) -> HttpResponse {
    match err {
        SearchError::InvalidInput(message) => {
            error_body(StatusCode::BAD_REQUEST, "invalid_input", message.clone())
        }
        SearchError::StoreUnavailable(e) if !err.is_retryable() => {
            tracing::error!("Store error: {}", e);
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
        SearchError::StoreUnavailable(e) => {
            tracing::error!("Store unavailable: {}", e);
            let mut response =
                error_body(StatusCode::SERVICE_UNAVAILABLE, "store_unavailable", e.to_string());
            response.headers_mut().insert(
                actix_web::http::header::RETRY_AFTER,
                actix_web::http::header::HeaderValue::from_static("1"),
            );
            response
        }
    }
}

/// JSON error response for payload errors
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self)
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(
    err: error::JsonPayloadError,
    req: &actix_web::HttpRequest,
) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle path payload errors (e.g. a non-numeric enterprise id)
pub fn handle_path_error(err: error::PathError, _req: &actix_web::HttpRequest) -> actix_web::Error {
    JsonError {
        error: "invalid_path".to_string(),
        message: format!("Invalid path: {}", err),
        status_code: 400,
    }
    .into()
}
