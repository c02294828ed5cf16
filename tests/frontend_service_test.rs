mod common;

use axum::http::StatusCode;
use common::{body_json, get_request, json_request, upload_request, FakeExtractor};
use httpmock::prelude::*;
use phototype::adapters::{LocalStorage, RouterClient};
use phototype::app::services::frontend::{create_router, FrontendState, VALIDATIONS_FILE};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

const CONTRACT_TEXT: &str = "ДОГОВОР № 24022311\nПРОДАВЕЦ: ОАО «БМЗ»\nг. Жлобин, Республика Беларусь";

struct Fixture {
    dir: TempDir,
    router: Option<RouterClient>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            router: None,
        }
    }

    fn uploads(&self) -> std::path::PathBuf {
        self.dir.path().join("uploads")
    }

    fn json(&self) -> std::path::PathBuf {
        self.dir.path().join("json")
    }

    fn app(&self) -> axum::Router {
        create_router(FrontendState {
            uploads: LocalStorage::new(self.uploads()),
            json: LocalStorage::new(self.json()),
            extractor: Arc::new(FakeExtractor),
            router: self.router.clone(),
            max_upload_bytes: 1024,
        })
    }
}

#[tokio::test]
async fn test_upload_creates_document() {
    let fixture = Fixture::new();

    let response = fixture
        .app()
        .oneshot(upload_request(
            "/upload",
            "договор 8A16.pdf",
            "application/pdf",
            CONTRACT_TEXT.as_bytes(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"success": true, "message": "PDF processed successfully", "filename": "8A16.json"})
    );

    assert!(fixture.uploads().join("8A16.pdf").exists());
    let document: serde_json::Value =
        serde_json::from_slice(&std::fs::read(fixture.json().join("8A16.json")).unwrap()).unwrap();
    assert!(document["fields"]["contract_number"]
        .as_str()
        .unwrap()
        .starts_with("AUTO_"));
    assert_eq!(document["text"], CONTRACT_TEXT);
    assert_eq!(document["metadata"]["source_file"], "8A16.pdf");
    assert_eq!(document["metadata"]["processing_method"], "Automated PDF extraction");
    assert!(document["metadata"].get("language").is_none());

    let response = fixture.app().oneshot(get_request("/api/list-json")).await.unwrap();
    assert_eq!(
        body_json(response).await,
        json!({"success": true, "files": ["8A16.json"]})
    );

    let response = fixture.app().oneshot(get_request("/api/json/8A16.json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["text"], CONTRACT_TEXT);

    let response = fixture.app().oneshot(get_request("/uploads/8A16.pdf")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "application/pdf"
    );
}

#[tokio::test]
async fn test_upload_rejections() {
    let fixture = Fixture::new();

    let cases = [
        ("", "application/pdf", b"%PDF".to_vec(), "No file selected"),
        ("notes.txt", "text/plain", b"hello".to_vec(), "Only PDF files are allowed"),
        ("big.pdf", "application/pdf", vec![b'a'; 2048], "File too large. Maximum size is 1KB"),
        ("договор.pdf", "application/pdf", b"%PDF".to_vec(), "Invalid filename"),
    ];
    for (filename, content_type, data, expected) in cases {
        let response = fixture
            .app()
            .oneshot(upload_request("/upload", filename, content_type, &data))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", expected);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], expected);
    }

    let response = fixture
        .app()
        .oneshot(upload_request("/upload", "broken.pdf", "application/pdf", b"broken"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_json(response).await["error"]
        .as_str()
        .unwrap()
        .starts_with("Processing failed: "));
}

#[tokio::test]
async fn test_upload_records_language_from_router() {
    let server = MockServer::start_async().await;
    let router_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/analyze-document");
            then.status(200).json_body(json!({
                "filename": "contract.pdf",
                "language_detection": {"success": true, "data": {"top_language": "ru"}},
                "preprocessing_result": null,
                "ocr_result": null,
                "success": true,
                "message": "Language detected from PDF text layer"
            }));
        })
        .await;

    let fixture = Fixture {
        router: Some(RouterClient::new(server.base_url(), Duration::from_secs(5))),
        ..Fixture::new()
    };
    let response = fixture
        .app()
        .oneshot(upload_request(
            "/upload",
            "contract.pdf",
            "application/pdf",
            CONTRACT_TEXT.as_bytes(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let document: serde_json::Value =
        serde_json::from_slice(&std::fs::read(fixture.json().join("contract.json")).unwrap())
            .unwrap();
    assert_eq!(document["metadata"]["language"], "ru");
    router_mock.assert_async().await;
}

#[tokio::test]
async fn test_json_lookup_errors() {
    let fixture = Fixture::new();
    std::fs::create_dir_all(fixture.json()).unwrap();
    std::fs::write(fixture.json().join("bad.json"), b"{not json").unwrap();

    let response = fixture.app().oneshot(get_request("/api/json/missing.json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "File not found");

    let response = fixture.app().oneshot(get_request("/api/json/bad.json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Invalid JSON file");

    let response = fixture.app().oneshot(get_request("/uploads/missing.pdf")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_pdf_excerpts() {
    let fixture = Fixture::new();
    std::fs::create_dir_all(fixture.json()).unwrap();
    std::fs::create_dir_all(fixture.uploads()).unwrap();
    std::fs::write(
        fixture.json().join("contract.json"),
        json!({"fields": {"contract_number": "24022311", "seller": {"location": "г. Жлобин"}}})
            .to_string(),
    )
    .unwrap();

    let response = fixture
        .app()
        .oneshot(get_request("/api/pdf-excerpts/contract.pdf"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "PDF file not found");

    std::fs::write(fixture.uploads().join("contract.pdf"), CONTRACT_TEXT).unwrap();
    let response = fixture
        .app()
        .oneshot(get_request("/api/pdf-excerpts/contract.pdf"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["filename"], "contract.pdf");
    assert_eq!(body["excerpts"]["contract_number"]["value"], "24022311");
    assert_eq!(body["excerpts"]["seller.location"]["field_type"], "str");

    let response = fixture
        .app()
        .oneshot(get_request("/api/pdf-excerpts/other.pdf"))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["error"], "JSON file not found");
}

#[tokio::test]
async fn test_validation_records() {
    let fixture = Fixture::new();

    let response = fixture
        .app()
        .oneshot(json_request(
            "/api/validation",
            json!({"filename": "contract.json", "field_path": "seller.location", "status": "approved"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"success": true, "message": "Validation saved"})
    );

    let response = fixture
        .app()
        .oneshot(json_request(
            "/api/validation",
            json!({"filename": "contract.json", "field_path": "date"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Missing required fields");

    let response = fixture
        .app()
        .oneshot(json_request(
            "/api/validation",
            json!({"filename": "contract.json", "field_path": "date", "status": "maybe"}),
        ))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["error"], "Invalid status");

    let log = std::fs::read_to_string(fixture.json().join(VALIDATIONS_FILE)).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 1);
    let record: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(record["status"], "approved");
    assert_eq!(record["field_path"], "seller.location");
}
