mod common;

use axum::http::StatusCode;
use common::{body_json, get_request, upload_request};
use httpmock::prelude::*;
use phototype::adapters::http::HttpAnalysisBackend;
use phototype::app::services::router::{create_router, RouterState};
use phototype::config::toml_config::RouterConfig;
use phototype::domain::ports::AnalysisBackend;
use serde_json::json;
use std::collections::BTreeMap;
use tower::ServiceExt;

fn router_config(server: &MockServer) -> RouterConfig {
    RouterConfig {
        lang_detect_url: server.base_url(),
        preprocessor_url: server.base_url(),
        ocr_urls: BTreeMap::from([
            ("en".to_string(), server.url("/ocr-en")),
            ("ru".to_string(), server.url("/ocr-ru")),
        ]),
        ..RouterConfig::default()
    }
}

fn app(server: &MockServer) -> axum::Router {
    let config = router_config(server);
    create_router(RouterState::new(
        HttpAnalysisBackend::from_config(&config),
        config.ocr_language.clone(),
    ))
}

#[tokio::test]
async fn test_healthz() {
    let server = MockServer::start_async().await;
    let response = app(&server).oneshot(get_request("/healthz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"status": "ok", "service": "router"})
    );
}

#[tokio::test]
async fn test_rejects_non_pdf_filename() {
    let server = MockServer::start_async().await;
    let response = app(&server)
        .oneshot(upload_request("/analyze-document", "notes.txt", "text/plain", b"x"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["detail"], "Only PDF files are supported");
}

#[tokio::test]
async fn test_text_layer_detection() {
    let server = MockServer::start_async().await;
    let detect_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/detect-language");
            then.status(200).json_body(json!({
                "document_languages": [{"lang": "ru", "prob": 1.0}],
                "top_language": "ru",
                "per_chunk": null,
                "meta": {}
            }));
        })
        .await;
    let preprocess_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/preprocess/");
            then.status(500);
        })
        .await;

    let response = app(&server)
        .oneshot(upload_request("/analyze-document", "Contract.PDF", "application/pdf", b"%PDF"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Language detected from PDF text layer");
    assert_eq!(body["language_detection"]["data"]["top_language"], "ru");
    assert!(body["preprocessing_result"].is_null());

    detect_mock.assert_async().await;
    preprocess_mock.assert_hits_async(0).await;
}

#[tokio::test]
async fn test_ocr_fallback_pipeline() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/detect-language");
            then.status(422).json_body(json!({
                "detail": "No extractable text layer in PDF. Use OCR and call /detect-text."
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/preprocess/");
            then.status(200).json_body(json!({
                "filename": "scan.pdf",
                "pages": 1,
                "segments": [],
                "saved_files": ["processed/scan_page1_block0.png"]
            }));
        })
        .await;
    let ocr_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/ocr-ru/ocr")
                .json_body(json!({
                    "files": ["processed/scan_page1_block0.png"],
                    "language": "ru"
                }));
            then.status(200).json_body(json!({
                "text": "Договор поставки",
                "processed_files": ["processed/scan_page1_block0.png"],
                "failed_files": [],
                "ocr_language": "ru",
                "method": "tesseract"
            }));
        })
        .await;
    let text_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/detect-text")
                .json_body(json!({"text": "Договор поставки"}));
            then.status(200).json_body(json!({
                "document_languages": [{"lang": "ru", "prob": 1.0}],
                "top_language": "ru",
                "per_chunk": [],
                "meta": {}
            }));
        })
        .await;

    let response = app(&server)
        .oneshot(upload_request(
            "/analyze-document?ocr_language=ru",
            "scan.pdf",
            "application/pdf",
            b"%PDF",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Language detected from OCR text extraction");
    assert_eq!(body["preprocessing_result"]["success"], true);
    assert_eq!(body["ocr_result"]["data"]["method"], "tesseract");
    assert_eq!(body["language_detection"]["data"]["top_language"], "ru");

    ocr_mock.assert_async().await;
    text_mock.assert_async().await;
}

#[tokio::test]
async fn test_preprocessing_failure() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/detect-language");
            then.status(422);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/preprocess/");
            then.status(503);
        })
        .await;

    let response = app(&server)
        .oneshot(upload_request("/analyze-document", "scan.pdf", "application/pdf", b"%PDF"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Document analysis failed: Preprocessing failed");
}

#[tokio::test]
async fn test_stage_failure_reasons() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/detect-language");
            then.status(502);
        })
        .await;
    let backend = HttpAnalysisBackend::from_config(&router_config(&server));

    let outcome = backend.detect_language_from_pdf(b"%PDF".to_vec(), "a.pdf").await;
    assert!(!outcome.success);
    assert_eq!(outcome.reason.as_deref(), Some("http_error_502"));

    let unreachable = HttpAnalysisBackend::from_config(&RouterConfig {
        preprocessor_url: "http://127.0.0.1:1".to_string(),
        ..RouterConfig::default()
    });
    let outcome = unreachable.preprocess(b"%PDF".to_vec(), "a.pdf").await;
    assert!(outcome.reason.unwrap().starts_with("exception: "));
}
