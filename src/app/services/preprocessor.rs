//! Preprocessor service: rasterises PDFs and segments pages into block images.

use super::{require_upload, run_blocking, with_common_layers, ApiError, DEFAULT_BODY_LIMIT};
use crate::adapters::poppler::PopplerTools;
use crate::core::enhance::{process_pdf_file, summarize};
use crate::core::segmentation::{block_file_name, segment_page};
use crate::domain::model::{EnhanceSummary, PageSegments, PreprocessMetadata, SegmentBlock};
use crate::domain::ports::PageRasterizer;
use crate::utils::error::Result;
use crate::utils::validation::secure_filename;
use axum::extract::{Multipart, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Clone)]
pub struct PreprocessorState {
    pub rasterizer: Arc<dyn PageRasterizer>,
    pub poppler: PopplerTools,
    pub output_dir: PathBuf,
    pub dpi: u32,
    pub enhance_dpi: u32,
}

pub fn create_router(state: PreprocessorState) -> Router {
    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/preprocess/", post(preprocess))
        .route("/enhance/", post(enhance))
        .with_state(state);
    with_common_layers(router, DEFAULT_BODY_LIMIT)
}

async fn healthz(State(state): State<PreprocessorState>) -> Json<Value> {
    let poppler = state.poppler.clone();
    let check = tokio::task::spawn_blocking(move || poppler.check_pdfinfo()).await;
    let (available, detail) = match check {
        Ok(Ok(version)) => (true, version),
        Ok(Err(e)) => (false, e.to_string()),
        Err(e) => (false, e.to_string()),
    };
    Json(json!({
        "status": "ok",
        "poppler": {
            "available": available,
            "path": state.poppler.bin_dir().map(|p| p.display().to_string()),
            "detail": detail,
        }
    }))
}

/// Stem of the uploaded name, safe to use inside the output directory.
fn base_name(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let safe = secure_filename(&stem);
    if safe.is_empty() {
        "document".to_string()
    } else {
        safe
    }
}

/// 將每頁切成段落與標題區塊，存成 PNG 並寫出 metadata
pub fn preprocess_pdf(
    rasterizer: &dyn PageRasterizer,
    pdf: &[u8],
    filename: &str,
    output_dir: &Path,
    dpi: u32,
) -> Result<PreprocessMetadata> {
    std::fs::create_dir_all(output_dir)?;
    let base = base_name(filename);
    let pages = rasterizer.rasterize(pdf, dpi)?;

    let mut segments = Vec::with_capacity(pages.len());
    let mut saved_files = Vec::new();
    for (index, page) in pages.iter().enumerate() {
        let page_num = index + 1;
        let mut blocks = Vec::new();
        for block in segment_page(page) {
            let out_path = output_dir.join(block_file_name(&base, page_num, block.id));
            block.crop.save(&out_path)?;
            let image = out_path.to_string_lossy().into_owned();
            saved_files.push(image.clone());
            blocks.push(SegmentBlock {
                id: block.id,
                kind: block.kind,
                bbox: block.bbox,
                image,
            });
        }
        tracing::debug!("Page {} of {}: {} blocks", page_num, filename, blocks.len());
        segments.push(PageSegments {
            page: page_num,
            blocks,
        });
    }

    let metadata = PreprocessMetadata {
        filename: filename.to_string(),
        pages: pages.len(),
        segments,
        saved_files,
    };
    let meta_path = output_dir.join(format!("{}_metadata.json", base));
    std::fs::write(&meta_path, serde_json::to_string_pretty(&metadata)?)?;

    tracing::info!(
        "Preprocessed {}: {} pages, {} blocks",
        filename,
        metadata.pages,
        metadata.saved_files.len()
    );
    Ok(metadata)
}

async fn preprocess(
    State(state): State<PreprocessorState>,
    mut multipart: Multipart,
) -> std::result::Result<Json<PreprocessMetadata>, ApiError> {
    let upload = require_upload(&mut multipart).await?;
    let filename = upload.filename.unwrap_or_else(|| "document.pdf".to_string());

    let metadata = run_blocking(move || {
        preprocess_pdf(
            state.rasterizer.as_ref(),
            &upload.bytes,
            &filename,
            &state.output_dir,
            state.dpi,
        )
    })
    .await?;
    Ok(Json(metadata))
}

async fn enhance(
    State(state): State<PreprocessorState>,
    mut multipart: Multipart,
) -> std::result::Result<Json<EnhanceSummary>, ApiError> {
    let upload = require_upload(&mut multipart).await?;
    let filename = upload.filename.unwrap_or_else(|| "document.pdf".to_string());

    let summary = run_blocking(move || {
        let staging = tempfile::TempDir::new()?;
        let pdf_path = staging.path().join(format!("{}.pdf", base_name(&filename)));
        std::fs::write(&pdf_path, &upload.bytes)?;
        Ok(summarize(process_pdf_file(
            state.rasterizer.as_ref(),
            &pdf_path,
            &state.output_dir,
            state.enhance_dpi,
        )))
    })
    .await?;
    Ok(Json(summary))
}
