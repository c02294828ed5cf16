//! Language detection service: PDF text layer or plain text in, language scores out.

use super::{require_upload, run_blocking, with_common_layers, ApiError, DEFAULT_BODY_LIMIT};
use crate::config::toml_config::LangDetectConfig;
use crate::core::text::{analyze_text, TextAnalysis, MAX_TEXT_CHARS};
use crate::domain::model::{DetectionResponse, TextIn};
use crate::domain::ports::{LanguageDetector, TextLayerExtractor};
use axum::extract::{Multipart, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

const NO_TEXT_LAYER_DETAIL: &str = "No extractable text layer in PDF. Use OCR and call /detect-text.";
const IMAGE_ONLY_NOTE: &str =
    "Image-only PDFs yield empty text; run OCR upstream and send text to /detect-text instead.";

#[derive(Clone)]
pub struct LangDetectState {
    pub detector: Arc<dyn LanguageDetector>,
    pub extractor: Arc<dyn TextLayerExtractor>,
    pub defaults: LangDetectConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct DetectParams {
    pub chunk_min_chars: Option<usize>,
    pub doc_char_limit: Option<usize>,
    pub include_chunks: Option<bool>,
}

pub fn create_router(state: LangDetectState) -> Router {
    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/detect-language", post(detect_language))
        .route("/detect-text", post(detect_text))
        .with_state(state);
    with_common_layers(router, DEFAULT_BODY_LIMIT)
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn into_response(analysis: TextAnalysis, meta: Map<String, Value>) -> DetectionResponse {
    DetectionResponse {
        document_languages: analysis.document_languages,
        top_language: analysis.top_language,
        per_chunk: analysis.per_chunk,
        meta,
    }
}

async fn detect_language(
    State(state): State<LangDetectState>,
    Query(params): Query<DetectParams>,
    mut multipart: Multipart,
) -> Result<Json<DetectionResponse>, ApiError> {
    let chunk_min_chars = params.chunk_min_chars.unwrap_or(state.defaults.chunk_min_chars);
    let doc_char_limit = params.doc_char_limit.unwrap_or(state.defaults.doc_char_limit);
    let include_chunks = params.include_chunks.unwrap_or(true);

    let upload = require_upload(&mut multipart).await?;
    match upload.content_type.as_deref() {
        Some("application/pdf") | Some("application/octet-stream") => {}
        other => {
            tracing::debug!("Rejected upload with content type {:?}", other);
            return Err(ApiError::new(
                axum::http::StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "Only PDF is supported.",
            ));
        }
    }
    if upload.bytes.is_empty() {
        return Err(ApiError::bad_request("Empty file."));
    }

    let extractor = state.extractor.clone();
    let pdf = upload.bytes;
    let raw = run_blocking(move || extractor.extract_text(&pdf, doc_char_limit)).await?;
    if raw.trim().is_empty() {
        return Err(ApiError::unprocessable(NO_TEXT_LAYER_DETAIL));
    }

    let detector = state.detector.clone();
    let analysis = tokio::task::spawn_blocking(move || {
        analyze_text(detector.as_ref(), &raw, chunk_min_chars, include_chunks)
    })
    .await
    .map_err(|e| ApiError::internal(format!("Worker task failed: {}", e)))?;

    tracing::info!(
        "Detected {:?} in {} ({} paragraphs)",
        analysis.top_language,
        upload.filename.as_deref().unwrap_or("<unnamed>"),
        analysis.paragraphs_detected
    );

    let mut meta = Map::new();
    meta.insert("file_name".to_string(), json!(upload.filename));
    meta.insert("paragraphs_detected".to_string(), json!(analysis.paragraphs_detected));
    meta.insert("chunk_min_chars".to_string(), json!(chunk_min_chars));
    meta.insert("doc_char_limit".to_string(), json!(doc_char_limit));
    meta.insert("has_text_layer".to_string(), json!(true));
    meta.insert("note".to_string(), json!(IMAGE_ONLY_NOTE));

    Ok(Json(into_response(analysis, meta)))
}

async fn detect_text(
    State(state): State<LangDetectState>,
    Query(params): Query<DetectParams>,
    Json(body): Json<TextIn>,
) -> Result<Json<DetectionResponse>, ApiError> {
    let length = body.text.chars().count();
    if length == 0 || length > MAX_TEXT_CHARS {
        return Err(ApiError::unprocessable(format!(
            "text must contain between 1 and {} characters",
            MAX_TEXT_CHARS
        )));
    }

    let chunk_min_chars = params.chunk_min_chars.unwrap_or(state.defaults.chunk_min_chars);
    let include_chunks = params.include_chunks.unwrap_or(true);

    let detector = state.detector.clone();
    let analysis = tokio::task::spawn_blocking(move || {
        analyze_text(detector.as_ref(), &body.text, chunk_min_chars, include_chunks)
    })
    .await
    .map_err(|e| ApiError::internal(format!("Worker task failed: {}", e)))?;

    let mut meta = Map::new();
    meta.insert("paragraphs_detected".to_string(), json!(analysis.paragraphs_detected));
    meta.insert("chunk_min_chars".to_string(), json!(chunk_min_chars));

    Ok(Json(into_response(analysis, meta)))
}
