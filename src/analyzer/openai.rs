//! OpenAI Chat Completions クライアント
//!
//! 画像をデータURLとして埋め込み、JSONスキーマ指定の構造化出力を要求する。
//! 応答テキストの解釈はパーサーに任せ、ここでは HTTP 層のエラー分類だけを行う。

use super::AnalysisClient;
use crate::config::Config;
use crate::error::{GemAiError, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use gem_ai_common::{gemstone_response_schema, SCHEMA_NAME};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// エラー本文をメッセージに含める最大文字数
const ERROR_BODY_PREVIEW: usize = 300;

pub struct OpenAiClient {
    http_client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
    max_tokens: u32,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiClient {
    /// 設定からクライアントを作成（APIキー未設定なら MissingApiKey）
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config.get_api_key()?;
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| GemAiError::Config(format!("HTTPクライアント作成失敗: {}", e)))?;

        Ok(Self {
            http_client,
            api_key,
            endpoint: format!("{}/chat/completions", config.api_base_url.trim_end_matches('/')),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    fn build_request(&self, image: &[u8], mime_type: &str, prompt: &str) -> ChatRequest {
        let data_url = format!("data:{};base64,{}", mime_type, STANDARD.encode(image));

        ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: prompt.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: data_url },
                    },
                ],
            }],
            response_format: ResponseFormat {
                format_type: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: SCHEMA_NAME,
                    strict: true,
                    schema: gemstone_response_schema(),
                },
            },
            max_tokens: self.max_tokens,
        }
    }
}

impl AnalysisClient for OpenAiClient {
    async fn analyze(&self, image: &[u8], mime_type: &str, prompt: &str) -> Result<String> {
        let request = self.build_request(image, mime_type, prompt);

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GemAiError::Transport(format!("リクエスト失敗: {}", e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body, retry_after));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| GemAiError::Transport(format!("レスポンス受信失敗: {}", e.without_url())))?;

        Ok(extract_content(chat))
    }
}

/// HTTPステータスをエラー種別に変換（429 のみ再試行対象）
fn classify_status(status: StatusCode, body: &str, retry_after: Option<Duration>) -> GemAiError {
    let preview: String = body.chars().take(ERROR_BODY_PREVIEW).collect();
    let message = format!("HTTP {}: {}", status.as_u16(), preview.trim());

    if status == StatusCode::TOO_MANY_REQUESTS {
        GemAiError::RateLimited {
            message,
            retry_after,
        }
    } else {
        GemAiError::Transport(message)
    }
}

/// Retry-After ヘッダ（秒数形式のみ）
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

/// 応答本文を取り出す（拒否時は拒否文をそのまま返し、パーサーで不正応答扱いになる）
fn extract_content(chat: ChatResponse) -> String {
    chat.choices
        .into_iter()
        .next()
        .map(|choice| {
            choice
                .message
                .content
                .or(choice.message.refusal)
                .unwrap_or_default()
        })
        .unwrap_or_default()
}

// Chat Completions リクエスト/レスポンス構造体

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
    json_schema: JsonSchemaFormat,
}

#[derive(Serialize)]
struct JsonSchemaFormat {
    name: &'static str,
    strict: bool,
    schema: serde_json::Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn client() -> OpenAiClient {
        OpenAiClient {
            http_client: reqwest::Client::new(),
            api_key: "sk-test-secret".into(),
            endpoint: "https://api.openai.com/v1/chat/completions".into(),
            model: "gpt-4o-mini".into(),
            max_tokens: 1500,
        }
    }

    #[test]
    fn test_request_shape() {
        let request = client().build_request(b"\x89PNG", "image/png", "Analyze");
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["max_tokens"], 1500);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"][0]["type"], "text");
        assert_eq!(json["messages"][0]["content"][0]["text"], "Analyze");
        assert_eq!(json["messages"][0]["content"][1]["type"], "image_url");
        let url = json["messages"][0]["content"][1]["image_url"]["url"].as_str().unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
        assert_eq!(json["response_format"]["type"], "json_schema");
        assert_eq!(json["response_format"]["json_schema"]["name"], SCHEMA_NAME);
        assert_eq!(json["response_format"]["json_schema"]["strict"], true);
    }

    #[test]
    fn test_request_never_contains_api_key() {
        let request = client().build_request(b"x", "image/jpeg", "p");
        let body = serde_json::to_string(&request).unwrap();
        assert!(!body.contains("sk-test-secret"));
        assert!(!format!("{:?}", client()).contains("sk-test-secret"));
    }

    #[test]
    fn test_classify_status() {
        let err = classify_status(
            StatusCode::TOO_MANY_REQUESTS,
            "quota",
            Some(Duration::from_secs(2)),
        );
        assert!(err.is_rate_limited());
        if let GemAiError::RateLimited { retry_after, .. } = err {
            assert_eq!(retry_after, Some(Duration::from_secs(2)));
        }

        let err = classify_status(StatusCode::UNAUTHORIZED, "bad key", None);
        assert!(matches!(err, GemAiError::Transport(ref m) if m.contains("401")));

        let err = classify_status(StatusCode::INTERNAL_SERVER_ERROR, "", None);
        assert!(matches!(err, GemAiError::Transport(_)));
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("3"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(3)));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(parse_retry_after(&headers), None);

        // Duration に収まらない値・負値・NaN は無視する
        for value in ["1e30", "-1", "NaN", "inf"] {
            headers.insert(RETRY_AFTER, HeaderValue::from_static(value));
            assert_eq!(parse_retry_after(&headers), None, "value = {}", value);
        }
    }

    #[test]
    fn test_extract_content() {
        let chat: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"content":"{\"english\":{}}"}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_content(chat), r#"{"english":{}}"#);

        let refused: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"content":null,"refusal":"I can't help"}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_content(refused), "I can't help");

        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert_eq!(extract_content(empty), "");
    }
}
