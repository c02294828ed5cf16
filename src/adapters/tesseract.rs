use crate::domain::ports::OcrEngine;
use crate::utils::error::{PhototypeError, Result};
use std::path::Path;
use std::process::Command;

/// Tesseract 命令列 OCR
#[derive(Debug, Clone, Default)]
pub struct TesseractEngine;

/// ISO 639-1 -> Tesseract traineddata name; unknown codes pass through.
pub fn tesseract_language(language: &str) -> &str {
    match language {
        "en" => "eng",
        "ru" => "rus",
        "de" => "deu",
        "fr" => "fra",
        "uk" => "ukr",
        "be" => "bel",
        other => other,
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, image: &Path, language: &str) -> Result<String> {
        let output = Command::new("tesseract")
            .arg(image)
            .arg("stdout")
            .args(["-l", tesseract_language(language)])
            .output()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => PhototypeError::ToolNotFound {
                    tool: "tesseract".to_string(),
                },
                _ => PhototypeError::IoError(e),
            })?;

        if !output.status.success() {
            return Err(PhototypeError::ExtractionError {
                message: format!(
                    "tesseract failed on {}: {}",
                    image.display(),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn method(&self) -> &'static str {
        "tesseract"
    }
}
