//! Locates the passages of a PDF's text that back each JSON field value.

use crate::domain::model::FieldExcerpt;
use serde_json::{Map, Value};

pub const DEFAULT_CONTEXT_CHARS: usize = 100;
/// Partial matches must be longer than this to count.
const MIN_PARTIAL_CHARS: usize = 10;

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercases char by char so indices line up with the original.
fn fold(chars: &[char]) -> Vec<char> {
    chars
        .iter()
        .map(|c| c.to_lowercase().next().unwrap_or(*c))
        .collect()
}

fn find_chars(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn excerpt_around(text: &[char], start: usize, len: usize, context: usize) -> String {
    let from = start.saturating_sub(context);
    let to = (start + len + context).min(text.len());
    let body: String = text[from..to].iter().collect();
    let body = body.trim();
    if from > 0 || to < text.len() {
        format!("...{}...", body)
    } else {
        body.to_string()
    }
}

/// Finds `search` in `pdf_text` (case-insensitive, whitespace-normalized).
///
/// Falls back to the longest run of consecutive words, leftmost first, that
/// is longer than ten characters.
pub fn find_text_excerpt(pdf_text: &str, search: &str, context: usize) -> Option<String> {
    let search = normalize_whitespace(search);
    if search.is_empty() || pdf_text.is_empty() {
        return None;
    }

    let text: Vec<char> = normalize_whitespace(pdf_text).chars().collect();
    let folded_text = fold(&text);

    let needle = fold(&search.chars().collect::<Vec<_>>());
    if let Some(start) = find_chars(&folded_text, &needle) {
        return Some(excerpt_around(&text, start, needle.len(), context));
    }

    let words: Vec<&str> = search.split(' ').collect();
    if words.len() < 2 {
        return None;
    }
    for size in (1..=words.len()).rev() {
        for offset in 0..=words.len() - size {
            let partial = words[offset..offset + size].join(" ");
            let partial: Vec<char> = fold(&partial.chars().collect::<Vec<_>>());
            if partial.len() <= MIN_PARTIAL_CHARS {
                continue;
            }
            if let Some(start) = find_chars(&folded_text, &partial) {
                return Some(excerpt_around(&text, start, partial.len(), context));
            }
        }
    }
    None
}

/// Leaf values rendered the way the stored documents print them.
fn leaf_string(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn leaf_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "NoneType",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Walks `fields` recursively; keys are `a.b` for objects and `a[i]` for arrays.
pub fn extract_field_excerpts(
    pdf_text: &str,
    fields: &Map<String, Value>,
    prefix: &str,
    context: usize,
) -> Map<String, Value> {
    let mut excerpts = Map::new();

    for (key, value) in fields {
        let field_path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };

        match value {
            Value::Object(nested) => {
                excerpts.extend(extract_field_excerpts(pdf_text, nested, &field_path, context));
            }
            Value::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    let item_path = format!("{}[{}]", field_path, index);
                    match item {
                        Value::Object(nested) => {
                            excerpts.extend(extract_field_excerpts(pdf_text, nested, &item_path, context));
                        }
                        leaf => {
                            let rendered = leaf_string(leaf);
                            if let Some(excerpt) = find_text_excerpt(pdf_text, &rendered, context) {
                                excerpts.insert(item_path, excerpt_value(rendered, excerpt, "array_item"));
                            }
                        }
                    }
                }
            }
            leaf => {
                let rendered = leaf_string(leaf);
                if let Some(excerpt) = find_text_excerpt(pdf_text, &rendered, context) {
                    excerpts.insert(field_path, excerpt_value(rendered, excerpt, leaf_type(leaf)));
                }
            }
        }
    }

    excerpts
}

fn excerpt_value(value: String, excerpt: String, field_type: &str) -> Value {
    serde_json::to_value(FieldExcerpt {
        value,
        excerpt,
        field_type: field_type.to_string(),
    })
    .unwrap_or(Value::Null)
}

/// Uses `document.fields` when present, otherwise the whole document.
pub fn generate_excerpts(pdf_text: &str, document: &Value) -> Map<String, Value> {
    if pdf_text.is_empty() {
        return Map::new();
    }
    let fields = match document.get("fields") {
        Some(Value::Object(fields)) => fields,
        _ => match document {
            Value::Object(root) => root,
            _ => return Map::new(),
        },
    };
    extract_field_excerpts(pdf_text, fields, "", DEFAULT_CONTEXT_CHARS)
}
