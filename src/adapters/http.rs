//! HTTP clients for the downstream services.

use crate::config::toml_config::RouterConfig;
use crate::core::analysis::NO_TEXT_LAYER;
use crate::domain::model::{DocumentAnalysisResponse, OcrRequest, StageOutcome, TextIn};
use crate::domain::ports::AnalysisBackend;
use crate::utils::error::{PhototypeError, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

fn pdf_form(pdf: Vec<u8>, filename: &str) -> Result<Form> {
    let part = Part::bytes(pdf)
        .file_name(filename.to_string())
        .mime_str("application/pdf")?;
    Ok(Form::new().part("file", part))
}

fn join(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

/// 200 -> success with the JSON body, other statuses via `on_status`.
async fn into_outcome(
    response: reqwest::Result<reqwest::Response>,
    on_status: impl FnOnce(StatusCode) -> StageOutcome,
) -> StageOutcome {
    let response = match response {
        Ok(response) => response,
        Err(e) => return StageOutcome::exception(e),
    };
    let status = response.status();
    tracing::debug!("{} -> {}", response.url(), status);
    if status != StatusCode::OK {
        return on_status(status);
    }
    match response.json::<Value>().await {
        Ok(data) => StageOutcome::success(data),
        Err(e) => StageOutcome::exception(e),
    }
}

/// 透過 HTTP 呼叫語言偵測、前處理與 OCR 服務
#[derive(Debug, Clone)]
pub struct HttpAnalysisBackend {
    client: Client,
    lang_detect_url: String,
    preprocessor_url: String,
    ocr_urls: BTreeMap<String, String>,
    detect_timeout: Duration,
    preprocess_timeout: Duration,
    ocr_timeout: Duration,
}

impl HttpAnalysisBackend {
    pub fn from_config(config: &RouterConfig) -> Self {
        Self {
            client: Client::new(),
            lang_detect_url: config.lang_detect_url.clone(),
            preprocessor_url: config.preprocessor_url.clone(),
            ocr_urls: config.ocr_urls.clone(),
            detect_timeout: Duration::from_secs(config.detect_timeout_seconds),
            preprocess_timeout: Duration::from_secs(config.preprocess_timeout_seconds),
            ocr_timeout: Duration::from_secs(config.ocr_timeout_seconds),
        }
    }
}

#[async_trait]
impl AnalysisBackend for HttpAnalysisBackend {
    async fn detect_language_from_pdf(&self, pdf: Vec<u8>, filename: &str) -> StageOutcome {
        let form = match pdf_form(pdf, filename) {
            Ok(form) => form,
            Err(e) => return StageOutcome::exception(e),
        };
        let response = self
            .client
            .post(join(&self.lang_detect_url, "/detect-language"))
            .multipart(form)
            .timeout(self.detect_timeout)
            .send()
            .await;
        into_outcome(response, |status| {
            if status == StatusCode::UNPROCESSABLE_ENTITY {
                StageOutcome::failure(NO_TEXT_LAYER)
            } else {
                StageOutcome::http_error(status.as_u16())
            }
        })
        .await
    }

    async fn detect_language_from_text(&self, text: &str) -> StageOutcome {
        let response = self
            .client
            .post(join(&self.lang_detect_url, "/detect-text"))
            .json(&TextIn {
                text: text.to_string(),
            })
            .timeout(self.detect_timeout)
            .send()
            .await;
        into_outcome(response, |status| StageOutcome::http_error(status.as_u16())).await
    }

    async fn preprocess(&self, pdf: Vec<u8>, filename: &str) -> StageOutcome {
        let form = match pdf_form(pdf, filename) {
            Ok(form) => form,
            Err(e) => return StageOutcome::exception(e),
        };
        let response = self
            .client
            .post(join(&self.preprocessor_url, "/preprocess/"))
            .multipart(form)
            .timeout(self.preprocess_timeout)
            .send()
            .await;
        into_outcome(response, |status| StageOutcome::http_error(status.as_u16())).await
    }

    async fn extract_text(&self, files: &[String], language: &str) -> StageOutcome {
        let Some(base) = self.ocr_urls.get(language) else {
            return StageOutcome::failure(format!("no_ocr_backend: {}", language));
        };
        let response = self
            .client
            .post(join(base, "/ocr"))
            .json(&OcrRequest {
                files: files.to_vec(),
                language: Some(language.to_string()),
            })
            .timeout(self.ocr_timeout)
            .send()
            .await;
        into_outcome(response, |status| StageOutcome::http_error(status.as_u16())).await
    }
}

/// 前端服務用來呼叫路由服務的客戶端
#[derive(Debug, Clone)]
pub struct RouterClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl RouterClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            timeout,
        }
    }

    pub async fn analyze_document(
        &self,
        pdf: Vec<u8>,
        filename: &str,
    ) -> Result<DocumentAnalysisResponse> {
        let response = self
            .client
            .post(join(&self.base_url, "/analyze-document"))
            .multipart(pdf_form(pdf, filename)?)
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PhototypeError::UpstreamError {
                service: "router".to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response.json().await?)
    }
}
