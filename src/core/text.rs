//! Paragraph reflow and language aggregation for extracted document text.

use crate::domain::model::{ChunkLanguage, LanguageScore};
use crate::domain::ports::LanguageDetector;

pub const DEFAULT_CHUNK_MIN_CHARS: usize = 40;
pub const DEFAULT_DOC_CHAR_LIMIT: usize = 300_000;
pub const MAX_TEXT_CHARS: usize = 1_000_000;

const PREVIEW_CHARS: usize = 120;
const PARAGRAPH_SEPARATOR_CHARS: usize = 2;
const SENTENCE_TERMINATORS: [char; 6] = ['.', '!', '?', '…', ':', ';'];

/// Collapses runs of spaces and tabs, then trims.
pub fn clean(s: &str) -> String {
    s.split([' ', '\t'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

/// Turns ragged PDF lines into paragraphs.
///
/// A lone newline that does not end a sentence is a soft wrap and becomes a space.
/// Runs of two or more newlines separate paragraphs.
pub fn reflow_paragraphs(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }

    let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");
    let chars: Vec<char> = normalized.chars().collect();
    let mut merged = String::with_capacity(normalized.len());

    for (i, &c) in chars.iter().enumerate() {
        if c != '\n' {
            merged.push(c);
            continue;
        }
        let prev = i.checked_sub(1).map(|p| chars[p]);
        let next = chars.get(i + 1).copied();
        let in_blank_run = prev == Some('\n') || next == Some('\n');
        let ends_sentence = prev.is_some_and(|p| SENTENCE_TERMINATORS.contains(&p));
        if in_blank_run || ends_sentence {
            merged.push('\n');
        } else {
            merged.push(' ');
        }
    }

    // "\n\n\n" leaves a leading newline on the next piece; trim drops it
    merged
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !clean(p).is_empty())
        .map(str::to_string)
        .collect()
}

/// Normalizes scores to sum to one, highest first.
pub fn normalize_scores(scores: Vec<LanguageScore>) -> Vec<LanguageScore> {
    let total: f64 = scores.iter().map(|s| s.prob).sum();
    let total = if total > 0.0 { total } else { 1.0 };
    let mut out: Vec<LanguageScore> = scores
        .into_iter()
        .map(|s| LanguageScore {
            lang: s.lang,
            prob: s.prob / total,
        })
        .collect();
    out.sort_by(|a, b| b.prob.total_cmp(&a.prob));
    out
}

pub fn detect_text(detector: &dyn LanguageDetector, text: &str, min_chars: usize) -> Vec<LanguageScore> {
    let cleaned = clean(text);
    if cleaned.chars().count() < min_chars {
        return Vec::new();
    }
    normalize_scores(detector.detect(&cleaned))
}

fn preview(paragraph: &str) -> String {
    let mut out: String = paragraph.chars().take(PREVIEW_CHARS).collect();
    if paragraph.chars().count() > PREVIEW_CHARS {
        out.push('…');
    }
    out
}

pub fn build_chunks(
    detector: &dyn LanguageDetector,
    paragraphs: &[String],
    min_chars: usize,
) -> Vec<ChunkLanguage> {
    let mut cursor = 0;
    paragraphs
        .iter()
        .enumerate()
        .map(|(index, paragraph)| {
            let start = cursor;
            let end = start + paragraph.chars().count();
            cursor = end + PARAGRAPH_SEPARATOR_CHARS;
            ChunkLanguage {
                chunk_index: index,
                start_char: start,
                end_char: end,
                text_preview: preview(paragraph),
                languages: detect_text(detector, paragraph, min_chars),
            }
        })
        .collect()
}

/// Averages chunk probabilities into document-level languages.
pub fn document_languages(chunks: &[ChunkLanguage]) -> Vec<LanguageScore> {
    let mut totals: Vec<(String, f64)> = Vec::new();
    for score in chunks.iter().flat_map(|chunk| chunk.languages.iter()) {
        match totals.iter_mut().find(|(lang, _)| *lang == score.lang) {
            Some((_, prob)) => *prob += score.prob,
            None => totals.push((score.lang.clone(), score.prob)),
        }
    }
    if totals.is_empty() {
        return Vec::new();
    }
    normalize_scores(
        totals
            .into_iter()
            .map(|(lang, prob)| LanguageScore { lang, prob })
            .collect(),
    )
}

#[derive(Debug, Clone)]
pub struct TextAnalysis {
    pub document_languages: Vec<LanguageScore>,
    pub top_language: Option<String>,
    pub per_chunk: Option<Vec<ChunkLanguage>>,
    pub paragraphs_detected: usize,
}

pub fn analyze_text(
    detector: &dyn LanguageDetector,
    raw: &str,
    min_chars: usize,
    include_chunks: bool,
) -> TextAnalysis {
    let paragraphs = reflow_paragraphs(raw);
    let chunks = build_chunks(detector, &paragraphs, min_chars);
    let document_languages = document_languages(&chunks);
    let top_language = document_languages.first().map(|s| s.lang.clone());

    TextAnalysis {
        document_languages,
        top_language,
        per_chunk: include_chunks.then_some(chunks),
        paragraphs_detected: paragraphs.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Cyrillic text is "ru", everything else "en".
    struct ScriptDetector;

    impl LanguageDetector for ScriptDetector {
        fn detect(&self, text: &str) -> Vec<LanguageScore> {
            let cyrillic = text
                .chars()
                .filter(|c| ('\u{0400}'..='\u{04FF}').contains(c))
                .count();
            let lang = if cyrillic * 2 > text.chars().count() { "ru" } else { "en" };
            vec![LanguageScore {
                lang: lang.to_string(),
                prob: 0.9,
            }]
        }
    }

    #[test]
    fn test_clean_collapses_spaces() {
        assert_eq!(clean("  a \t\t b  "), "a b");
        assert_eq!(clean(""), "");
    }

    #[test]
    fn test_reflow_merges_soft_wraps() {
        let raw = "This line wraps\nonto the next one.\nNew sentence line\n\nSecond paragraph";
        let paragraphs = reflow_paragraphs(raw);
        assert_eq!(
            paragraphs,
            vec![
                "This line wraps onto the next one.\nNew sentence line".to_string(),
                "Second paragraph".to_string()
            ]
        );
    }

    #[test]
    fn test_reflow_handles_crlf_and_blank_noise() {
        let raw = "First\r\n\r\n   \n\nSecond\rline";
        let paragraphs = reflow_paragraphs(raw);
        assert_eq!(paragraphs, vec!["First".to_string(), "Second line".to_string()]);
        assert!(reflow_paragraphs("").is_empty());
    }

    #[test]
    fn test_build_chunks_offsets_and_preview() {
        let long = "x".repeat(130);
        let paragraphs = vec!["short".to_string(), long.clone()];
        let chunks = build_chunks(&ScriptDetector, &paragraphs, 40);

        assert_eq!(chunks[0].start_char, 0);
        assert_eq!(chunks[0].end_char, 5);
        assert!(chunks[0].languages.is_empty());
        assert_eq!(chunks[1].start_char, 7);
        assert_eq!(chunks[1].end_char, 137);
        assert_eq!(chunks[1].text_preview.chars().count(), 121);
        assert!(chunks[1].text_preview.ends_with('…'));
        assert_eq!(chunks[1].languages[0].prob, 1.0);
    }

    #[test]
    fn test_document_languages_vote() {
        let raw = "The seller shall deliver the goods within the agreed time frame.\n\n\
                   Продавец обязуется поставить товар в согласованные сроки поставки.\n\n\
                   Payment is made in Russian rubles by bank transfer to the account.";
        let analysis = analyze_text(&ScriptDetector, raw, 40, false);

        assert_eq!(analysis.paragraphs_detected, 3);
        assert!(analysis.per_chunk.is_none());
        assert_eq!(analysis.top_language.as_deref(), Some("en"));
        let en = &analysis.document_languages[0];
        assert!((en.prob - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(analysis.document_languages[1].lang, "ru");
    }

    #[test]
    fn test_short_text_has_no_languages() {
        let analysis = analyze_text(&ScriptDetector, "Too short", 40, true);
        assert!(analysis.document_languages.is_empty());
        assert!(analysis.top_language.is_none());
        assert_eq!(analysis.per_chunk.map(|c| c.len()), Some(1));
    }
}
