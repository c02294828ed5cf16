use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageScore {
    /// ISO 639-1 when known, ISO 639-3 otherwise
    pub lang: String,
    pub prob: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkLanguage {
    pub chunk_index: usize,
    pub start_char: usize,
    pub end_char: usize,
    pub text_preview: String,
    pub languages: Vec<LanguageScore>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResponse {
    pub document_languages: Vec<LanguageScore>,
    pub top_language: Option<String>,
    pub per_chunk: Option<Vec<ChunkLanguage>>,
    #[serde(default)]
    pub meta: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextIn {
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Title,
    Paragraph,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentBlock {
    pub id: usize,
    #[serde(rename = "type")]
    pub kind: BlockKind,
    /// `[x, y, w, h]` in page pixels
    pub bbox: [u32; 4],
    pub image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSegments {
    pub page: usize,
    pub blocks: Vec<SegmentBlock>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessMetadata {
    pub filename: String,
    pub pages: usize,
    pub segments: Vec<PageSegments>,
    pub saved_files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum EnhanceSummary {
    Success { pages: usize, angles: Vec<f32> },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrRequest {
    pub files: Vec<String>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrResult {
    pub text: String,
    pub processed_files: Vec<String>,
    #[serde(default)]
    pub failed_files: Vec<String>,
    pub ocr_language: String,
    pub method: String,
}

/// 路由管線中單一階段的結果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl StageOutcome {
    pub fn success(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            reason: None,
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            reason: Some(reason.into()),
        }
    }

    pub fn http_error(status: u16) -> Self {
        Self::failure(format!("http_error_{}", status))
    }

    pub fn exception(err: impl std::fmt::Display) -> Self {
        Self::failure(format!("exception: {}", err))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentAnalysisResponse {
    pub filename: String,
    pub language_detection: Option<StageOutcome>,
    pub preprocessing_result: Option<StageOutcome>,
    pub ocr_result: Option<StageOutcome>,
    pub success: bool,
    pub message: String,
}

impl DocumentAnalysisResponse {
    /// 從語言偵測結果取出主要語言
    pub fn top_language(&self) -> Option<&str> {
        self.language_detection
            .as_ref()
            .filter(|outcome| outcome.success)
            .and_then(|outcome| outcome.data.as_ref())
            .and_then(|data| data.get("top_language"))
            .and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldExcerpt {
    pub value: String,
    pub excerpt: String,
    pub field_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Approved,
    Rejected,
}

impl std::str::FromStr for ValidationStatus {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub filename: String,
    pub field_path: String,
    pub status: ValidationStatus,
    pub recorded_at: chrono::DateTime<chrono::Utc>,
}
