//! Frontend API: uploads, stored JSON documents, PDF excerpts and field validation.

use super::{read_upload, with_common_layers};
use crate::adapters::http::RouterClient;
use crate::adapters::storage::LocalStorage;
use crate::core::excerpt::generate_excerpts;
use crate::core::records::build_document;
use crate::core::text::DEFAULT_DOC_CHAR_LIMIT;
use crate::domain::model::{ValidationRecord, ValidationStatus};
use crate::domain::ports::{Storage, TextLayerExtractor};
use crate::utils::validation::{allowed_file, secure_filename};
use axum::body::Bytes;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

const ALLOWED_EXTENSIONS: &[&str] = &["pdf"];
pub const VALIDATIONS_FILE: &str = "validations.jsonl";

#[derive(Clone)]
pub struct FrontendState {
    pub uploads: LocalStorage,
    pub json: LocalStorage,
    pub extractor: Arc<dyn TextLayerExtractor>,
    pub router: Option<RouterClient>,
    pub max_upload_bytes: usize,
}

pub fn create_router(state: FrontendState) -> Router {
    // multipart framing on top of the largest accepted file
    let body_limit = state.max_upload_bytes + 1024 * 1024;
    let router = Router::new()
        .route("/api/list-json", get(list_json))
        .route("/api/json/:filename", get(get_json))
        .route("/uploads/:filename", get(serve_upload))
        .route("/api/pdf-excerpts/:filename", get(pdf_excerpts))
        .route("/upload", post(upload_pdf))
        .route("/api/validation", post(save_validation))
        .with_state(state);
    with_common_layers(router, body_limit)
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn upload_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "success": false, "error": message.into() }))).into_response()
}

async fn list_json(State(state): State<FrontendState>) -> Response {
    match state.json.list_files("json").await {
        Ok(files) => Json(json!({ "success": true, "files": files })).into_response(),
        Err(e) => error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn get_json(State(state): State<FrontendState>, Path(filename): Path<String>) -> Response {
    let filename = secure_filename(&filename);
    if filename.is_empty() || !state.json.exists(&filename).await {
        return error(StatusCode::NOT_FOUND, "File not found");
    }

    let bytes = match state.json.read_file(&filename).await {
        Ok(bytes) => bytes,
        Err(e) => return error(StatusCode::INTERNAL_SERVER_ERROR, format!("Error reading file: {}", e)),
    };
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(document) => Json(document).into_response(),
        Err(_) => error(StatusCode::BAD_REQUEST, "Invalid JSON file"),
    }
}

async fn serve_upload(State(state): State<FrontendState>, Path(filename): Path<String>) -> Response {
    let filename = secure_filename(&filename);
    if filename.is_empty() || !state.uploads.exists(&filename).await {
        return error(StatusCode::NOT_FOUND, "File not found");
    }
    match state.uploads.read_file(&filename).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, "application/pdf")], Bytes::from(bytes)).into_response(),
        Err(e) => error(StatusCode::INTERNAL_SERVER_ERROR, format!("Error reading file: {}", e)),
    }
}

/// `name.pdf` -> `name.json`
fn json_name_for(pdf_name: &str) -> String {
    match pdf_name.rsplit_once('.') {
        Some((stem, _)) => format!("{}.json", stem),
        None => format!("{}.json", pdf_name),
    }
}

async fn pdf_excerpts(State(state): State<FrontendState>, Path(filename): Path<String>) -> Response {
    let filename = secure_filename(&filename);
    let json_name = json_name_for(&filename);

    if !state.json.exists(&json_name).await {
        return error(StatusCode::NOT_FOUND, "JSON file not found");
    }
    if !state.uploads.exists(&filename).await {
        return error(StatusCode::NOT_FOUND, "PDF file not found");
    }

    let result = load_excerpts(&state, &json_name, &filename).await;

    match result {
        Ok(excerpts) => Json(json!({
            "success": true,
            "excerpts": excerpts,
            "filename": filename,
        }))
        .into_response(),
        Err(e) => {
            tracing::error!("Excerpt extraction failed for {}: {}", filename, e);
            error(StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to extract excerpts: {}", e))
        }
    }
}

async fn extract_text(state: &FrontendState, pdf: Vec<u8>) -> crate::Result<String> {
    let extractor = state.extractor.clone();
    tokio::task::spawn_blocking(move || extractor.extract_text(&pdf, DEFAULT_DOC_CHAR_LIMIT))
        .await
        .map_err(|e| crate::PhototypeError::ProcessingError {
            message: format!("Worker task failed: {}", e),
        })?
}

async fn load_excerpts(state: &FrontendState, json_name: &str, pdf_name: &str) -> crate::Result<Value> {
    let document: Value = serde_json::from_slice(&state.json.read_file(json_name).await?)?;
    let pdf = state.uploads.read_file(pdf_name).await?;
    let text = extract_text(state, pdf).await?;
    Ok(Value::Object(generate_excerpts(&text, &document)))
}

/// `16MB`, `1.5MB`, `512KB` or `100B`
fn format_size(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    let value = bytes as f64;
    let (amount, unit) = if value >= KB * KB {
        (value / (KB * KB), "MB")
    } else if value >= KB {
        (value / KB, "KB")
    } else {
        return format!("{}B", bytes);
    };
    let rounded = format!("{:.1}", amount);
    format!("{}{}", rounded.strip_suffix(".0").unwrap_or(&rounded), unit)
}

async fn upload_pdf(State(state): State<FrontendState>, mut multipart: Multipart) -> Response {
    let upload = match read_upload(&mut multipart).await {
        Ok(Some(upload)) => upload,
        Ok(None) => return upload_error(StatusCode::BAD_REQUEST, "No file provided"),
        Err(e) => return upload_error(e.status, e.detail),
    };

    let original_name = upload.filename.unwrap_or_default();
    if original_name.is_empty() {
        return upload_error(StatusCode::BAD_REQUEST, "No file selected");
    }
    if !allowed_file(&original_name, ALLOWED_EXTENSIONS) {
        return upload_error(StatusCode::BAD_REQUEST, "Only PDF files are allowed");
    }
    if upload.bytes.len() > state.max_upload_bytes {
        return upload_error(
            StatusCode::BAD_REQUEST,
            format!(
                "File too large. Maximum size is {}",
                format_size(state.max_upload_bytes)
            ),
        );
    }
    let filename = secure_filename(&original_name);
    if filename.is_empty() || !allowed_file(&filename, ALLOWED_EXTENSIONS) {
        return upload_error(StatusCode::BAD_REQUEST, "Invalid filename");
    }

    match process_upload(&state, &filename, upload.bytes).await {
        Ok(json_name) => {
            tracing::info!("Processed upload {} -> {}", filename, json_name);
            Json(json!({
                "success": true,
                "message": "PDF processed successfully",
                "filename": json_name,
            }))
            .into_response()
        }
        Err(e) => {
            tracing::error!("Upload processing failed for {}: {}", filename, e);
            upload_error(StatusCode::INTERNAL_SERVER_ERROR, format!("Processing failed: {}", e))
        }
    }
}

async fn process_upload(state: &FrontendState, filename: &str, pdf: Vec<u8>) -> crate::Result<String> {
    state.uploads.write_file(filename, &pdf).await?;

    let text = extract_text(state, pdf.clone()).await?;

    let language = match &state.router {
        Some(router) => match router.analyze_document(pdf, filename).await {
            Ok(analysis) => analysis.top_language().map(str::to_string),
            Err(e) => {
                tracing::warn!("Router unavailable, storing {} without language: {}", filename, e);
                None
            }
        },
        None => None,
    };

    let document = build_document(filename, &text, language.as_deref(), chrono::Local::now());
    let json_name = json_name_for(filename);
    state
        .json
        .write_file(&json_name, serde_json::to_string_pretty(&document)?.as_bytes())
        .await?;
    Ok(json_name)
}

#[derive(Debug, Deserialize)]
pub struct ValidationRequest {
    pub filename: Option<String>,
    pub field_path: Option<String>,
    pub status: Option<String>,
}

async fn save_validation(
    State(state): State<FrontendState>,
    Json(request): Json<ValidationRequest>,
) -> Response {
    let (Some(filename), Some(field_path), Some(status)) = (
        request.filename.filter(|s| !s.is_empty()),
        request.field_path.filter(|s| !s.is_empty()),
        request.status.filter(|s| !s.is_empty()),
    ) else {
        return error(StatusCode::BAD_REQUEST, "Missing required fields");
    };
    let Ok(status) = status.parse::<ValidationStatus>() else {
        return error(StatusCode::BAD_REQUEST, "Invalid status");
    };

    let record = ValidationRecord {
        filename,
        field_path,
        status,
        recorded_at: chrono::Utc::now(),
    };
    let line = match serde_json::to_string(&record) {
        Ok(line) => line,
        Err(e) => return error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    if let Err(e) = state.json.append_line(VALIDATIONS_FILE, &line).await {
        return error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }

    tracing::info!(
        "Validation {:?} recorded for {} {}",
        record.status,
        record.filename,
        record.field_path
    );
    Json(json!({ "success": true, "message": "Validation saved" })).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(16 * 1024 * 1024), "16MB");
        assert_eq!(format_size(3 * 512 * 1024), "1.5MB");
        assert_eq!(format_size(1024), "1KB");
        assert_eq!(format_size(100), "100B");
    }

    #[test]
    fn test_json_name_for() {
        assert_eq!(json_name_for("contract.pdf"), "contract.json");
        assert_eq!(json_name_for("a.b.pdf"), "a.b.json");
        assert_eq!(json_name_for("plain"), "plain.json");
    }
}
