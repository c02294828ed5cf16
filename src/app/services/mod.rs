//! HTTP services. Each module exposes `create_router(state)`.

pub mod frontend;
pub mod lang_detect;
pub mod ocr;
pub mod preprocessor;
pub mod router;

use crate::utils::error::{ErrorCategory, PhototypeError};
use axum::extract::multipart::Multipart;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Upload limit for the API services.
pub const DEFAULT_BODY_LIMIT: usize = 64 * 1024 * 1024;

/// Error rendered as `{"detail": "..."}`
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    pub fn unprocessable(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, detail)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "detail": self.detail }))).into_response()
    }
}

impl From<PhototypeError> for ApiError {
    fn from(err: PhototypeError) -> Self {
        let status = match err.category() {
            ErrorCategory::Validation => StatusCode::BAD_REQUEST,
            ErrorCategory::Tooling => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCategory::Network => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let detail = if status == StatusCode::BAD_REQUEST {
            tracing::warn!("Rejected request: {}", err);
            err.user_friendly_message()
        } else {
            tracing::error!("Request failed: {} ({:?})", err, err.category());
            err.to_string()
        };
        Self::new(status, detail)
    }
}

/// The `file` part of a multipart upload.
#[derive(Debug)]
pub struct Upload {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Reads the `file` field; `Ok(None)` when the form has none.
pub async fn read_upload(multipart: &mut Multipart) -> Result<Option<Upload>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {}", e)))?;
        return Ok(Some(Upload {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        }));
    }
    Ok(None)
}

/// Same as [`read_upload`] but a missing field is a 422, like a required form field.
pub async fn require_upload(multipart: &mut Multipart) -> Result<Upload, ApiError> {
    read_upload(multipart)
        .await?
        .ok_or_else(|| ApiError::unprocessable("Field 'file' is required"))
}

/// 在 blocking 執行緒上跑 CPU 密集或外部工具的工作
pub async fn run_blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> crate::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::internal(format!("Worker task failed: {}", e)))?
        .map_err(ApiError::from)
}

/// CORS, request tracing and the body limit shared by every service.
pub fn with_common_layers(router: Router, body_limit: usize) -> Router {
    router
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let err: ApiError = PhototypeError::ToolNotFound {
            tool: "pdftoppm".to_string(),
        }
        .into();
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.detail.contains("pdftoppm"));

        let err: ApiError = PhototypeError::ExtractionError {
            message: "broken".to_string(),
        }
        .into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
