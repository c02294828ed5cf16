//! OCR service for block images produced by the preprocessor.

use super::{with_common_layers, ApiError, DEFAULT_BODY_LIMIT};
use crate::domain::model::{OcrRequest, OcrResult};
use crate::domain::ports::OcrEngine;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Clone)]
pub struct OcrState {
    pub engine: Arc<dyn OcrEngine>,
    pub service_name: String,
    /// ISO 639-1 used when the request names none
    pub language: String,
    pub processed_dir: PathBuf,
}

pub fn create_router(state: OcrState) -> Router {
    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/ocr", post(ocr))
        .with_state(state);
    with_common_layers(router, DEFAULT_BODY_LIMIT)
}

async fn healthz(State(state): State<OcrState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": state.service_name,
        "language": state.language,
    }))
}

/// `Some(path)` when `file` exists inside `root`, `None` when it does not exist.
fn resolve_inside(root: &Path, file: &str) -> Result<Option<PathBuf>, ApiError> {
    let Ok(resolved) = Path::new(file).canonicalize() else {
        return Ok(None);
    };
    if resolved.starts_with(root) {
        Ok(Some(resolved))
    } else {
        Err(ApiError::new(
            StatusCode::FORBIDDEN,
            format!("File outside processed directory: {}", file),
        ))
    }
}

async fn ocr(
    State(state): State<OcrState>,
    Json(request): Json<OcrRequest>,
) -> Result<Json<OcrResult>, ApiError> {
    let language = request.language.unwrap_or_else(|| state.language.clone());
    let root = state
        .processed_dir
        .canonicalize()
        .map_err(|e| ApiError::internal(format!("Processed directory unavailable: {}", e)))?;

    let mut targets = Vec::with_capacity(request.files.len());
    for file in &request.files {
        targets.push((file.clone(), resolve_inside(&root, file)?));
    }

    let engine = state.engine.clone();
    let ocr_language = language.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut texts = Vec::new();
        let mut processed_files = Vec::new();
        let mut failed_files = Vec::new();

        for (file, resolved) in targets {
            let Some(path) = resolved else {
                tracing::warn!("OCR input missing: {}", file);
                failed_files.push(file);
                continue;
            };
            match engine.recognize(&path, &ocr_language) {
                Ok(text) => {
                    if !text.trim().is_empty() {
                        texts.push(text.trim().to_string());
                    }
                    processed_files.push(file);
                }
                Err(e) => {
                    tracing::warn!("OCR failed for {}: {}", file, e);
                    failed_files.push(file);
                }
            }
        }

        OcrResult {
            text: texts.join("\n\n"),
            processed_files,
            failed_files,
            ocr_language,
            method: engine.method().to_string(),
        }
    })
    .await
    .map_err(|e| ApiError::internal(format!("Worker task failed: {}", e)))?;

    tracing::info!(
        "OCR ({}) processed {} files, {} failed",
        language,
        result.processed_files.len(),
        result.failed_files.len()
    );
    Ok(Json(result))
}
