//! プロンプト生成モジュール
//!
//! - build_gemstone_prompt: 画像解析用の固定プロンプト
//! - gemstone_response_schema: 構造化出力（json_schema）の定義

use serde_json::{json, Value};

/// 構造化出力スキーマ名
pub const SCHEMA_NAME: &str = "gemstone_analysis";

const GEMSTONE_PROMPT: &str = r#"Analyze this semi-precious gemstone image and provide detailed information.
Please identify the type of gemstone, provide a detailed description of its characteristics,
and specify where this type of gemstone is typically found geographically.
Provide all information in both English and German.

## Output format (return ONLY this JSON object)
{
  "english": {
    "name": "common name of the gemstone",
    "description": "one paragraph on appearance, color, clarity and characteristics",
    "areas_found": ["geographic regions where this gemstone is typically found"],
    "confidence": 0
  },
  "german": {
    "name": "Name des Edelsteins",
    "description": "ein Absatz zu Aussehen, Farbe, Klarheit und Eigenschaften",
    "areas_found": ["geografische Fundorte"],
    "confidence": 0
  },
  "image_filename": ""
}

## Notes
- confidence is an integer from 0 to 100
- if the stone cannot be identified, use confidence 0 and an empty areas_found list
- english and german must describe the same stone"#;

/// 画像解析用プロンプト
///
/// 入力を取らない固定文字列。Aggregatorは1回だけ取得して使い回す。
pub fn build_gemstone_prompt() -> &'static str {
    GEMSTONE_PROMPT
}

fn language_record_schema(
    name_desc: &str,
    description_desc: &str,
    areas_desc: &str,
    confidence_desc: &str,
) -> Value {
    json!({
        "type": "object",
        "properties": {
            "name": { "type": "string", "description": name_desc },
            "description": { "type": "string", "description": description_desc },
            "areas_found": {
                "type": "array",
                "items": { "type": "string" },
                "description": areas_desc
            },
            "confidence": {
                "type": "number",
                "minimum": 0,
                "maximum": 100,
                "description": confidence_desc
            }
        },
        "required": ["name", "description", "areas_found", "confidence"],
        "additionalProperties": false
    })
}

/// 構造化出力スキーマ（strict）
pub fn gemstone_response_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "english": language_record_schema(
                "The name of the gemstone",
                "Detailed description of the gemstone's appearance, color, clarity, and characteristics",
                "Geographic locations where this gemstone is typically found",
                "Confidence level of the identification (0-100%)",
            ),
            "german": language_record_schema(
                "Der Name des Edelsteins",
                "Detaillierte Beschreibung des Aussehens, der Farbe, Klarheit und Eigenschaften des Edelsteins",
                "Geografische Orte, wo dieser Edelstein typischerweise gefunden wird",
                "Vertrauensniveau der Identifikation (0-100%)",
            ),
            "image_filename": {
                "type": "string",
                "description": "The filename of the analyzed image"
            }
        },
        "required": ["english", "german", "image_filename"],
        "additionalProperties": false
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_is_constant() {
        assert_eq!(build_gemstone_prompt(), build_gemstone_prompt());
        assert!(std::ptr::eq(build_gemstone_prompt(), build_gemstone_prompt()));
    }

    #[test]
    fn test_prompt_requests_bilingual_fields() {
        let prompt = build_gemstone_prompt();
        assert!(prompt.contains("English and German"));
        assert!(prompt.contains("\"areas_found\""));
        assert!(prompt.contains("\"confidence\""));
        assert!(prompt.contains("\"german\""));
    }

    #[test]
    fn test_schema_requires_both_languages() {
        let schema = gemstone_response_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert_eq!(required, vec!["english", "german", "image_filename"]);
        assert_eq!(schema["properties"]["german"]["properties"]["confidence"]["maximum"], 100);
    }
}
