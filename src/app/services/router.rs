//! Router service: runs the document analysis pipeline for an uploaded PDF.

use super::{require_upload, with_common_layers, ApiError, DEFAULT_BODY_LIMIT};
use crate::core::analysis::AnalysisEngine;
use crate::domain::model::DocumentAnalysisResponse;
use crate::domain::ports::AnalysisBackend;
use crate::utils::error::PhototypeError;
use axum::extract::{Multipart, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct RouterState<B: AnalysisBackend> {
    pub engine: Arc<AnalysisEngine<B>>,
    pub default_ocr_language: String,
}

impl<B: AnalysisBackend> Clone for RouterState<B> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            default_ocr_language: self.default_ocr_language.clone(),
        }
    }
}

impl<B: AnalysisBackend> RouterState<B> {
    pub fn new(backend: B, default_ocr_language: impl Into<String>) -> Self {
        Self {
            engine: Arc::new(AnalysisEngine::new(backend)),
            default_ocr_language: default_ocr_language.into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeParams {
    pub ocr_language: Option<String>,
}

pub fn create_router<B: AnalysisBackend + 'static>(state: RouterState<B>) -> Router {
    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/analyze-document", post(analyze_document::<B>))
        .with_state(state);
    with_common_layers(router, DEFAULT_BODY_LIMIT)
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "router" }))
}

async fn analyze_document<B: AnalysisBackend + 'static>(
    State(state): State<RouterState<B>>,
    Query(params): Query<AnalyzeParams>,
    mut multipart: Multipart,
) -> Result<Json<DocumentAnalysisResponse>, ApiError> {
    let upload = require_upload(&mut multipart).await?;
    let filename = upload.filename.unwrap_or_default();
    if !filename.to_lowercase().ends_with(".pdf") {
        return Err(PhototypeError::ValidationError {
            message: "Only PDF files are supported".to_string(),
        }
        .into());
    }

    let language = params
        .ocr_language
        .unwrap_or_else(|| state.default_ocr_language.clone());
    let response = state.engine.analyze(&filename, upload.bytes, &language).await;
    if response.success {
        tracing::info!("{}: {}", filename, response.message);
    } else {
        tracing::warn!("{}: {}", filename, response.message);
    }
    Ok(Json(response))
}
