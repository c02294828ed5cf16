use chrono::{DateTime, Local};
use serde_json::{json, Value};

pub const PROCESSING_METHOD: &str = "Automated PDF extraction";

/// `AUTO_` plus the first eight hex digits of a random UUID, upper case.
pub fn generate_contract_number() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("AUTO_{}", id[..8].to_uppercase())
}

/// 上傳 PDF 後寫入 `json/<stem>.json` 的文件內容
pub fn build_document(
    source_file: &str,
    text: &str,
    language: Option<&str>,
    now: DateTime<Local>,
) -> Value {
    let mut document = json!({
        "fields": {
            "contract_number": generate_contract_number(),
            "date": now.format("%d %B %Y").to_string(),
        },
        "text": text,
        "metadata": {
            "processed_date": now.to_rfc3339(),
            "source_file": source_file,
            "processing_method": PROCESSING_METHOD,
        }
    });
    if let Some(language) = language {
        document["metadata"]["language"] = Value::String(language.to_string());
    }
    document
}
