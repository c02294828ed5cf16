mod common;

use axum::http::StatusCode;
use common::{body_json, get_request, json_request, upload_request};
use image::{DynamicImage, Rgb, RgbImage};
use phototype::adapters::PopplerTools;
use phototype::app::services::ocr::{self, OcrState};
use phototype::app::services::preprocessor::{self, PreprocessorState};
use phototype::domain::ports::{OcrEngine, PageRasterizer};
use phototype::{PhototypeError, Result};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

/// Every "PDF" renders as one page with a paragraph and a heading.
struct FakeRasterizer;

impl PageRasterizer for FakeRasterizer {
    fn rasterize(&self, pdf: &[u8], _dpi: u32) -> Result<Vec<DynamicImage>> {
        if pdf == b"broken" {
            return Err(PhototypeError::ExtractionError {
                message: "pdftoppm failed".to_string(),
            });
        }
        let mut page = RgbImage::from_pixel(600, 800, Rgb([255, 255, 255]));
        for (x, y, w, h) in [(50, 100, 400, 12), (50, 120, 380, 12), (50, 400, 300, 120)] {
            for px in x..x + w {
                for py in y..y + h {
                    page.put_pixel(px, py, Rgb([0, 0, 0]));
                }
            }
        }
        Ok(vec![DynamicImage::ImageRgb8(page)])
    }
}

/// Returns the file name as the recognised text; `fail` in the name is an OCR error.
struct EchoEngine;

impl OcrEngine for EchoEngine {
    fn recognize(&self, image: &Path, language: &str) -> Result<String> {
        let name = image.file_name().unwrap().to_string_lossy().into_owned();
        if name.contains("fail") {
            return Err(PhototypeError::ExtractionError {
                message: "tesseract failed".to_string(),
            });
        }
        Ok(format!("{}:{}", language, name))
    }

    fn method(&self) -> &'static str {
        "tesseract"
    }
}

fn preprocessor_app(output_dir: &Path) -> axum::Router {
    preprocessor::create_router(PreprocessorState {
        rasterizer: Arc::new(FakeRasterizer),
        poppler: PopplerTools::new(None),
        output_dir: output_dir.to_path_buf(),
        dpi: 200,
        enhance_dpi: 400,
    })
}

fn ocr_app(processed_dir: &Path) -> axum::Router {
    ocr::create_router(OcrState {
        engine: Arc::new(EchoEngine),
        service_name: "ocr-ru".to_string(),
        language: "ru".to_string(),
        processed_dir: processed_dir.to_path_buf(),
    })
}

#[tokio::test]
async fn test_preprocess_saves_blocks_and_metadata() {
    let dir = TempDir::new().unwrap();
    let response = preprocessor_app(dir.path())
        .oneshot(upload_request("/preprocess/", "scan 01.pdf", "application/pdf", b"%PDF"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["filename"], "scan 01.pdf");
    assert_eq!(body["pages"], 1);
    let blocks = body["segments"][0]["blocks"].as_array().unwrap();
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0]["type"], "paragraph");

    let saved = body["saved_files"].as_array().unwrap();
    assert_eq!(saved.len(), 2);
    for file in saved {
        let path = Path::new(file.as_str().unwrap());
        assert!(path.exists());
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("scan_01_page1_block"));
    }

    let metadata: serde_json::Value =
        serde_json::from_slice(&std::fs::read(dir.path().join("scan_01_metadata.json")).unwrap())
            .unwrap();
    assert_eq!(metadata["saved_files"], body["saved_files"]);
}

#[tokio::test]
async fn test_preprocess_errors() {
    let dir = TempDir::new().unwrap();
    let response = preprocessor_app(dir.path())
        .oneshot(upload_request("/preprocess/", "broken.pdf", "application/pdf", b"broken"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_json(response).await["detail"]
        .as_str()
        .unwrap()
        .contains("pdftoppm failed"));
}

#[tokio::test]
async fn test_enhance_endpoint() {
    let dir = TempDir::new().unwrap();
    let response = preprocessor_app(dir.path())
        .oneshot(upload_request("/enhance/", "scan.pdf", "application/pdf", b"%PDF"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["pages"], 1);
    assert!(dir.path().join("scan").join("page_001.png").exists());

    let response = preprocessor_app(dir.path())
        .oneshot(upload_request("/enhance/", "bad.pdf", "application/pdf", b"broken"))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["status"], "failed");
}

#[tokio::test]
async fn test_preprocessor_healthz_reports_poppler() {
    let dir = TempDir::new().unwrap();
    let response = preprocessor_app(dir.path())
        .oneshot(get_request("/healthz"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert!(body["poppler"]["available"].is_boolean());
}

#[tokio::test]
async fn test_ocr_recognises_blocks_in_order() {
    let dir = TempDir::new().unwrap();
    for name in ["a_page1_block0.png", "a_page1_block1.png", "a_page1_fail.png"] {
        std::fs::write(dir.path().join(name), b"png").unwrap();
    }
    let file = |name: &str| dir.path().join(name).to_string_lossy().into_owned();

    let response = ocr_app(dir.path())
        .oneshot(json_request(
            "/ocr",
            json!({
                "files": [
                    file("a_page1_block0.png"),
                    file("a_page1_fail.png"),
                    file("missing.png"),
                    file("a_page1_block1.png")
                ]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["text"], "ru:a_page1_block0.png\n\nru:a_page1_block1.png");
    assert_eq!(body["processed_files"].as_array().unwrap().len(), 2);
    assert_eq!(
        body["failed_files"],
        json!([file("a_page1_fail.png"), file("missing.png")])
    );
    assert_eq!(body["ocr_language"], "ru");
    assert_eq!(body["method"], "tesseract");
}

#[tokio::test]
async fn test_ocr_rejects_files_outside_processed_dir() {
    let processed = TempDir::new().unwrap();
    let elsewhere = TempDir::new().unwrap();
    let outside = elsewhere.path().join("secret.png");
    std::fs::write(&outside, b"png").unwrap();

    let response = ocr_app(processed.path())
        .oneshot(json_request(
            "/ocr",
            json!({"files": [outside.to_string_lossy()], "language": "en"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = ocr_app(processed.path())
        .oneshot(get_request("/healthz"))
        .await
        .unwrap();
    assert_eq!(
        body_json(response).await,
        json!({"status": "ok", "service": "ocr-ru", "language": "ru"})
    );
}
