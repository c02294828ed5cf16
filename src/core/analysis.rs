use crate::domain::model::{DocumentAnalysisResponse, StageOutcome};
use crate::domain::ports::AnalysisBackend;
use serde_json::Value;

pub const NO_TEXT_LAYER: &str = "no_text_layer";

/// 文件分析流程：先嘗試直接從 PDF 文字層偵測語言，
/// 失敗時改走 前處理 -> OCR -> 文字語言偵測。
pub struct AnalysisEngine<B: AnalysisBackend> {
    backend: B,
}

impl<B: AnalysisBackend> AnalysisEngine<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub async fn analyze(
        &self,
        filename: &str,
        pdf: Vec<u8>,
        ocr_language: &str,
    ) -> DocumentAnalysisResponse {
        tracing::info!("Analyzing {} ({} bytes)", filename, pdf.len());

        // Step 1: 直接從文字層偵測
        let language_result = self
            .backend
            .detect_language_from_pdf(pdf.clone(), filename)
            .await;
        if language_result.success {
            tracing::info!("Language detected from text layer of {}", filename);
            return DocumentAnalysisResponse {
                filename: filename.to_string(),
                language_detection: Some(language_result),
                preprocessing_result: None,
                ocr_result: None,
                success: true,
                message: "Language detected from PDF text layer".to_string(),
            };
        }
        tracing::info!(
            "No usable text layer for {} ({}), falling back to OCR",
            filename,
            language_result.reason.as_deref().unwrap_or("unknown")
        );

        // Step 2: 前處理
        let preprocessing_result = self.backend.preprocess(pdf, filename).await;
        if !preprocessing_result.success {
            tracing::warn!(
                "Preprocessing failed for {}: {:?}",
                filename,
                preprocessing_result.reason
            );
            return Self::failed(filename, "Preprocessing failed");
        }

        // Step 3: OCR
        let saved_files = saved_files(&preprocessing_result);
        tracing::debug!("Running {} OCR on {} blocks", ocr_language, saved_files.len());
        let ocr_result = self.backend.extract_text(&saved_files, ocr_language).await;
        if !ocr_result.success {
            tracing::warn!("OCR failed for {}: {:?}", filename, ocr_result.reason);
            return Self::failed(filename, "OCR text extraction failed");
        }

        // Step 4: OCR 文字語言偵測
        let extracted_text = ocr_result
            .data
            .as_ref()
            .and_then(|data| data.get("text"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let language_detection = if extracted_text.trim().is_empty() {
            tracing::warn!("OCR produced no text for {}", filename);
            language_result
        } else {
            self.backend.detect_language_from_text(extracted_text).await
        };

        DocumentAnalysisResponse {
            filename: filename.to_string(),
            language_detection: Some(language_detection),
            preprocessing_result: Some(preprocessing_result),
            ocr_result: Some(ocr_result),
            success: true,
            message: "Language detected from OCR text extraction".to_string(),
        }
    }

    fn failed(filename: &str, reason: &str) -> DocumentAnalysisResponse {
        DocumentAnalysisResponse {
            filename: filename.to_string(),
            language_detection: None,
            preprocessing_result: None,
            ocr_result: None,
            success: false,
            message: format!("Document analysis failed: {}", reason),
        }
    }
}

fn saved_files(preprocessing: &StageOutcome) -> Vec<String> {
    preprocessing
        .data
        .as_ref()
        .and_then(|data| data.get("saved_files"))
        .and_then(Value::as_array)
        .map(|files| {
            files
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
