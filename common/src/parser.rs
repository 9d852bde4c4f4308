//! APIレスポンスパーサー
//!
//! Vision APIのレスポンス（自由文を含みうる）からJSONペイロードを抽出し、
//! AnalysisResult に変換する。
//!
//! 許容するゆらぎ:
//! - ペイロード前後の説明文、```json ブロック
//! - フィールド名の大文字小文字・別名（en/de, areas/locations 等）
//! - 欠落した任意フィールド（説明 → ""、信頼度 → 0、産地 → []）
//! - 信頼度の表記（85, 85.4, "85%"）

use crate::error::{Error, Result};
use crate::types::{AnalysisResult, GemstoneRecord, MAX_CONFIDENCE};
use regex::Regex;
use serde_json::{Map, Value};

const ENGLISH_KEYS: &[&str] = &["english", "en", "eng", "englisch"];
const GERMAN_KEYS: &[&str] = &["german", "de", "deu", "ger", "deutsch"];
const NAME_KEYS: &[&str] = &["name", "gemstone", "gemstone_name", "stone", "edelstein"];
const DESCRIPTION_KEYS: &[&str] = &["description", "desc", "beschreibung"];
const AREAS_KEYS: &[&str] = &[
    "areas_found",
    "areasfound",
    "areas",
    "locations",
    "geographic_locations",
    "regions",
    "fundorte",
];
const CONFIDENCE_KEYS: &[&str] = &["confidence", "confidence_level", "confidence_score", "vertrauen"];
const FILENAME_KEYS: &[&str] = &["image_filename", "imagefilename", "filename", "file_name"];

/// ラッパーオブジェクト（{"analysis": {...}} 等）を辿る深さ
const MAX_WRAPPER_DEPTH: usize = 2;

/// レスポンス中のJSONオブジェクト候補を抽出
///
/// 抽出優先順位:
/// 1. ```json ... ``` ブロック
/// 2. 文字列リテラルを考慮した括弧対応で切り出した {...}
pub fn extract_json_candidates(response: &str) -> Vec<&str> {
    lazy_static::lazy_static! {
        static ref FENCE_RE: Regex = Regex::new(r"(?s)```[A-Za-z]*\s*(.*?)```").unwrap();
    }

    let mut candidates = Vec::new();

    for cap in FENCE_RE.captures_iter(response) {
        if let Some(body) = cap.get(1) {
            let body = body.as_str().trim();
            if body.starts_with('{') {
                candidates.push(body);
            }
        }
    }

    for (start, ch) in response.char_indices() {
        if ch != '{' {
            continue;
        }
        if let Some(end) = matching_brace(&response[start..]) {
            candidates.push(&response[start..start + end + 1]);
        }
    }

    candidates
}

/// 先頭の '{' に対応する '}' のバイト位置
fn matching_brace(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }

    None
}

fn normalize_key(key: &str) -> String {
    key.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .collect()
}

/// 別名リストに一致する最初の値
fn lookup<'a>(map: &'a Map<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    map.iter()
        .find(|(key, _)| aliases.contains(&normalize_key(key).as_str()))
        .map(|(_, value)| value)
}

fn lookup_string(map: &Map<String, Value>, aliases: &[&str]) -> String {
    match lookup(map, aliases) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn parse_areas(value: Option<&Value>) -> Vec<String> {
    let raw: Vec<String> = match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(s)) => s.split([',', ';']).map(str::to_string).collect(),
        _ => Vec::new(),
    };

    raw.into_iter()
        .map(|area| area.trim().to_string())
        .filter(|area| !area.is_empty())
        .collect()
}

/// 信頼度を 0-100 の整数に正規化
///
/// 0 < x < 1 の小数は割合とみなして100倍する
pub fn parse_confidence(value: Option<&Value>) -> u8 {
    lazy_static::lazy_static! {
        static ref NUMBER_RE: Regex = Regex::new(r"-?\d+(?:[.,]\d+)?").unwrap();
    }

    let raw = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => NUMBER_RE
            .find(s)
            .and_then(|m| m.as_str().replace(',', ".").parse::<f64>().ok()),
        _ => None,
    };

    let Some(mut number) = raw.filter(|n| n.is_finite()) else {
        return 0;
    };

    if number > 0.0 && number < 1.0 {
        number *= 100.0;
    }

    number.round().clamp(0.0, MAX_CONFIDENCE as f64) as u8
}

fn parse_record(value: Option<&Value>, language: &str) -> GemstoneRecord {
    let Some(Value::Object(map)) = value else {
        return GemstoneRecord::default();
    };

    let mut record = GemstoneRecord {
        name: lookup_string(map, NAME_KEYS),
        description: lookup_string(map, DESCRIPTION_KEYS),
        areas_found: parse_areas(lookup(map, AREAS_KEYS)),
        confidence: parse_confidence(lookup(map, CONFIDENCE_KEYS)),
    };

    if record.confidence > 0 && record.areas_found.is_empty() {
        tracing::warn!(
            language,
            confidence = record.confidence,
            "産地が空のため信頼度を0に補正"
        );
        record.confidence = 0;
    }

    record
}

/// 英語・ドイツ語いずれかのセクションを持つオブジェクトを探す
fn find_payload(value: &Value, depth: usize) -> Option<&Map<String, Value>> {
    let Value::Object(map) = value else {
        return None;
    };

    let has_language = |aliases: &[&str]| matches!(lookup(map, aliases), Some(Value::Object(_)));
    if has_language(ENGLISH_KEYS) || has_language(GERMAN_KEYS) {
        return Some(map);
    }

    if depth == 0 {
        return None;
    }

    map.values().find_map(|child| find_payload(child, depth - 1))
}

fn build_result(payload: &Map<String, Value>) -> AnalysisResult {
    AnalysisResult {
        image_filename: lookup_string(payload, FILENAME_KEYS),
        english: parse_record(lookup(payload, ENGLISH_KEYS), "english"),
        german: parse_record(lookup(payload, GERMAN_KEYS), "german"),
    }
}

/// レスポンスからペイロードを取り出して AnalysisResult に変換
///
/// image_filename はペイロード内の値（モデルのエコー）をそのまま使う
pub fn parse_analysis_payload(response: &str) -> Result<AnalysisResult> {
    if response.trim().is_empty() {
        return Err(Error::MalformedResponse("empty response".into()));
    }

    for candidate in extract_json_candidates(response) {
        let Ok(value) = serde_json::from_str::<Value>(candidate) else {
            continue;
        };
        if let Some(payload) = find_payload(&value, MAX_WRAPPER_DEPTH) {
            return Ok(build_result(payload));
        }
    }

    let preview: String = response.chars().take(80).collect();
    Err(Error::MalformedResponse(format!(
        "no structured gemstone payload found: {:?}",
        preview
    )))
}

/// 1画像分のレスポンスをパース
///
/// image_filename は Loader が列挙したファイル名で上書きする
pub fn parse_analysis_response(response: &str, image_filename: &str) -> Result<AnalysisResult> {
    let mut result = parse_analysis_payload(response)?;
    result.image_filename = image_filename.to_string();
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLEAN: &str = r#"{
  "english": {
    "name": "Amethyst",
    "description": "A violet variety of quartz.",
    "areas_found": ["Brazil", "Uruguay", "Zambia"],
    "confidence": 92
  },
  "german": {
    "name": "Amethyst",
    "description": "Eine violette Varietät des Quarzes.",
    "areas_found": ["Brasilien", "Uruguay", "Sambia"],
    "confidence": 92
  },
  "image_filename": "amethyst.png"
}"#;

    // =============================================
    // extract_json_candidates テスト
    // =============================================

    #[test]
    fn test_candidates_from_fenced_block() {
        let response = format!("Here is the analysis:\n```json\n{}\n```\nDone.", CLEAN);
        let candidates = extract_json_candidates(&response);
        assert_eq!(candidates[0], CLEAN);
    }

    #[test]
    fn test_candidates_ignore_braces_inside_strings() {
        let response = r#"Result: {"english": {"name": "a } b"}} trailing"#;
        let candidates = extract_json_candidates(response);
        assert_eq!(candidates[0], r#"{"english": {"name": "a } b"}}"#);
    }

    #[test]
    fn test_candidates_unbalanced() {
        assert!(extract_json_candidates("{ \"english\": {").is_empty());
        assert!(extract_json_candidates("no json").is_empty());
    }

    // =============================================
    // parse_analysis_response テスト
    // =============================================

    #[test]
    fn test_parse_clean_payload() {
        let result = parse_analysis_response(CLEAN, "IMG_1.png").unwrap();
        assert_eq!(result.image_filename, "IMG_1.png");
        assert_eq!(result.english.name, "Amethyst");
        assert_eq!(result.english.areas_found, vec!["Brazil", "Uruguay", "Zambia"]);
        assert_eq!(result.german.description, "Eine violette Varietät des Quarzes.");
        assert_eq!(result.german.confidence, 92);
    }

    #[test]
    fn test_prose_wrapped_payload_matches_clean() {
        let clean = parse_analysis_response(CLEAN, "a.png").unwrap();
        let wrapped = format!(
            "Sure! I looked at the {{photo}} carefully.\n\n{}\n\nLet me know if you need more.",
            CLEAN
        );
        let parsed = parse_analysis_response(&wrapped, "a.png").unwrap();
        assert_eq!(parsed, clean);
    }

    #[test]
    fn test_case_insensitive_and_aliased_keys() {
        let response = r#"{
            "English": {"Name": "Rose Quartz", "Areas-Found": ["Madagascar"], "CONFIDENCE": "85%"},
            "Deutsch": {"NAME": "Rosenquarz", "Locations": "Madagaskar; Brasilien", "Confidence": 85.4}
        }"#;
        let result = parse_analysis_response(response, "rose.png").unwrap();
        assert_eq!(result.english.name, "Rose Quartz");
        assert_eq!(result.english.confidence, 85);
        assert_eq!(result.english.description, "");
        assert_eq!(result.german.name, "Rosenquarz");
        assert_eq!(result.german.areas_found, vec!["Madagaskar", "Brasilien"]);
        assert_eq!(result.german.confidence, 85);
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let response = r#"{"english": {"name": "Jasper", "areas_found": ["India"]}, "german": {"name": "Jaspis"}}"#;
        let result = parse_analysis_response(response, "j.png").unwrap();
        assert_eq!(result.english.description, "");
        assert_eq!(result.english.confidence, 0);
        assert!(result.german.areas_found.is_empty());
        assert_eq!(result.german.confidence, 0);
    }

    #[test]
    fn test_confidence_without_areas_is_downgraded() {
        let response = r#"{"english": {"name": "Onyx", "areas_found": [], "confidence": 70}}"#;
        let result = parse_analysis_response(response, "o.png").unwrap();
        assert_eq!(result.english.confidence, 0);
        assert!(result.is_valid());
    }

    #[test]
    fn test_confidence_normalization() {
        assert_eq!(parse_confidence(Some(&serde_json::json!(150))), 100);
        assert_eq!(parse_confidence(Some(&serde_json::json!(-5))), 0);
        assert_eq!(parse_confidence(Some(&serde_json::json!(0.85))), 85);
        assert_eq!(parse_confidence(Some(&serde_json::json!("about 60 %"))), 60);
        assert_eq!(parse_confidence(Some(&serde_json::json!("unknown"))), 0);
        assert_eq!(parse_confidence(Some(&serde_json::json!(null))), 0);
        assert_eq!(parse_confidence(None), 0);
    }

    #[test]
    fn test_wrapped_payload_object() {
        let response = format!(r#"{{"gemstone_analysis": {}}}"#, CLEAN);
        let result = parse_analysis_response(&response, "a.png").unwrap();
        assert_eq!(result.english.name, "Amethyst");
    }

    #[test]
    fn test_filename_from_loader_wins() {
        let result = parse_analysis_response(CLEAN, "loader-name.png").unwrap();
        assert_eq!(result.image_filename, "loader-name.png");

        let echoed = parse_analysis_payload(CLEAN).unwrap();
        assert_eq!(echoed.image_filename, "amethyst.png");
    }

    #[test]
    fn test_refusal_is_malformed() {
        let response = "I'm sorry, but I can't identify gemstones from this image.";
        let result = parse_analysis_response(response, "unknown.png");
        assert!(matches!(result, Err(Error::MalformedResponse(_))));
    }

    #[test]
    fn test_unrelated_json_is_malformed() {
        let response = r#"{"error": {"message": "content policy"}}"#;
        assert!(matches!(
            parse_analysis_response(response, "x.png"),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_empty_response_is_malformed() {
        assert!(parse_analysis_response("   ", "x.png").is_err());
    }

    #[test]
    fn test_serialized_result_round_trips() {
        let original = parse_analysis_response(CLEAN, "amethyst.png").unwrap();
        let json = serde_json::to_string_pretty(&original).unwrap();
        let parsed = parse_analysis_response(&json, &original.image_filename).unwrap();
        assert_eq!(parsed, original);
    }
}
