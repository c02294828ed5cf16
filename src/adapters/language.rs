use crate::domain::model::LanguageScore;
use crate::domain::ports::LanguageDetector;

/// n-gram 語言偵測 (whatlang)，每段文字只回傳一個候選語言
#[derive(Debug, Clone, Default)]
pub struct WhatlangDetector;

/// ISO 639-3 -> ISO 639-1 for the languages whatlang knows that have one.
fn iso_639_1(code: &str) -> Option<&'static str> {
    let short = match code {
        "eng" => "en",
        "rus" => "ru",
        "ukr" => "uk",
        "bel" => "be",
        "deu" => "de",
        "fra" => "fr",
        "spa" => "es",
        "por" => "pt",
        "ita" => "it",
        "nld" => "nl",
        "pol" => "pl",
        "ces" => "cs",
        "slk" => "sk",
        "slv" => "sl",
        "hrv" => "hr",
        "srp" => "sr",
        "bul" => "bg",
        "mkd" => "mk",
        "ron" => "ro",
        "hun" => "hu",
        "fin" => "fi",
        "est" => "et",
        "lav" => "lv",
        "lit" => "lt",
        "swe" => "sv",
        "dan" => "da",
        "nob" => "nb",
        "tur" => "tr",
        "aze" => "az",
        "kat" => "ka",
        "hye" => "hy",
        "ell" => "el",
        "heb" => "he",
        "ara" => "ar",
        "pes" => "fa",
        "urd" => "ur",
        "hin" => "hi",
        "ben" => "bn",
        "tam" => "ta",
        "tel" => "te",
        "tha" => "th",
        "vie" => "vi",
        "ind" => "id",
        "cmn" => "zh",
        "jpn" => "ja",
        "kor" => "ko",
        "uzb" => "uz",
        "epo" => "eo",
        "lat" => "la",
        "afr" => "af",
        "yid" => "yi",
        _ => return None,
    };
    Some(short)
}

impl LanguageDetector for WhatlangDetector {
    fn detect(&self, text: &str) -> Vec<LanguageScore> {
        let Some(info) = whatlang::detect(text) else {
            return Vec::new();
        };
        let code = info.lang().code();
        vec![LanguageScore {
            lang: iso_639_1(code).unwrap_or(code).to_string(),
            prob: info.confidence(),
        }]
    }
}
