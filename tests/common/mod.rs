#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request, Response};
use phototype::domain::model::LanguageScore;
use phototype::domain::ports::{LanguageDetector, TextLayerExtractor};
use phototype::{PhototypeError, Result};

pub const BOUNDARY: &str = "phototype-test-boundary";

/// multipart/form-data body with a single `file` part
pub fn multipart_body(filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn upload_request(uri: &str, filename: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(filename, content_type, data)))
        .unwrap()
}

pub fn json_request(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Treats the PDF bytes as UTF-8 text; `b"broken"` fails like a corrupt file.
pub struct FakeExtractor;

impl TextLayerExtractor for FakeExtractor {
    fn extract_text(&self, pdf: &[u8], char_limit: usize) -> Result<String> {
        if pdf == b"broken" {
            return Err(PhototypeError::ExtractionError {
                message: "broken PDF".to_string(),
            });
        }
        Ok(String::from_utf8_lossy(pdf).chars().take(char_limit).collect())
    }
}

/// Cyrillic text is "ru", Latin text is "en".
pub struct ScriptDetector;

impl LanguageDetector for ScriptDetector {
    fn detect(&self, text: &str) -> Vec<LanguageScore> {
        let cyrillic = text
            .chars()
            .filter(|c| ('\u{0400}'..='\u{04FF}').contains(c))
            .count();
        let latin = text.chars().filter(|c| c.is_ascii_alphabetic()).count();
        let lang = if cyrillic > latin { "ru" } else { "en" };
        vec![LanguageScore {
            lang: lang.to_string(),
            prob: 0.9,
        }]
    }
}
