use std::fs;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::NameListExtractor;
use crate::config::LlmConfig;
use crate::error::ExtractError;

const API_VERSION: &str = "2023-06-01";

const SYSTEM_PROMPT: &str = "You read scenes from novels and identify the characters in them.";

/// Strip a Markdown code fence around the reply, if any.
static CODE_FENCE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\s*(.*?)\s*```$").unwrap());

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: usize,
    system: &'a str,
    messages: Vec<ApiMessage>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ApiContent>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContent {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

// ── Extractor ────────────────────────────────────────────────────────────

/// Name-list backend that asks a hosted Claude model for the characters
/// in a scene.
pub struct LlmExtractor {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
    max_tokens: usize,
}

impl LlmExtractor {
    /// Resolve the API key (environment first, then the key file) and build
    /// the HTTP client. No request is made here.
    pub fn from_config(config: &LlmConfig) -> Result<Self, ExtractError> {
        let api_key = match std::env::var("ANTHROPIC_API_KEY") {
            Ok(key) if !key.trim().is_empty() => key.trim().to_string(),
            _ => fs::read_to_string(&config.api_key_file)
                .map(|k| k.trim().to_string())
                .ok()
                .filter(|k| !k.is_empty())
                .ok_or(ExtractError::NoApiKey)?,
        };
        Self::new(api_key, config)
    }

    pub fn new(api_key: impl Into<String>, config: &LlmConfig) -> Result<Self, ExtractError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ExtractError::Config(e.to_string()))?;
        Ok(LlmExtractor {
            client,
            api_key: api_key.into(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    fn build_headers(&self) -> Result<HeaderMap, ExtractError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| ExtractError::Config(format!("Invalid API key: {e}")))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        Ok(headers)
    }

    fn build_request<'a>(&'a self, scene_text: &str) -> ApiRequest<'a> {
        ApiRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: SYSTEM_PROMPT,
            messages: vec![ApiMessage {
                role: "user",
                content: build_prompt(scene_text),
            }],
        }
    }
}

fn build_prompt(scene_text: &str) -> String {
    format!(
        "Extract all characters from the scene below. Reply with only a JSON array \
         of character name strings, for example [\"Alice\", \"White Rabbit\"]. \
         Reply with [] if there are none.\n\nScene:\n{scene_text}"
    )
}

/// Parse the model's reply into names: trimmed, non-empty, first occurrence kept.
fn parse_name_list(reply: &str) -> Result<Vec<String>, ExtractError> {
    let trimmed = reply.trim();
    let body = CODE_FENCE_REGEX
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map_or(trimmed, |m| m.as_str());

    // Tolerate prose around the array.
    let array = match (body.find('['), body.rfind(']')) {
        (Some(open), Some(close)) if open < close => &body[open..=close],
        _ => return Err(ExtractError::Parse(format!("no JSON array in reply: {body}"))),
    };

    let raw: Vec<String> =
        serde_json::from_str(array).map_err(|e| ExtractError::Parse(format!("{e}: {array}")))?;

    let mut names: Vec<String> = Vec::with_capacity(raw.len());
    for name in raw {
        let name = name.trim();
        if !name.is_empty() && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

#[async_trait]
impl NameListExtractor for LlmExtractor {
    fn backend_id(&self) -> &str {
        "llm"
    }

    async fn extract_names(&self, text: &str) -> Result<Vec<String>, ExtractError> {
        let response = self
            .client
            .post(format!("{}/messages", self.api_base))
            .headers(self.build_headers()?)
            .json(&self.build_request(text))
            .send()
            .await
            .map_err(|e| ExtractError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ExtractError::Api { status, message });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ExtractError::Parse(e.to_string()))?;

        let reply: String = api_response
            .content
            .into_iter()
            .filter_map(|c| match c {
                ApiContent::Text { text } => Some(text),
                ApiContent::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        parse_name_list(&reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_array() {
        let names = parse_name_list(r#"["Alice", "White Rabbit"]"#).unwrap();
        assert_eq!(names, vec!["Alice", "White Rabbit"]);
    }

    #[test]
    fn test_parse_fenced_array_with_duplicates() {
        let reply = "```json\n[\"Alice\", \" Alice \", \"\", \"Dinah\"]\n```";
        assert_eq!(parse_name_list(reply).unwrap(), vec!["Alice", "Dinah"]);
    }

    #[test]
    fn test_parse_array_inside_prose() {
        let reply = "Here are the characters:\n[\"Bill\"]\nHope that helps.";
        assert_eq!(parse_name_list(reply).unwrap(), vec!["Bill"]);
    }

    #[test]
    fn test_parse_failures() {
        assert!(matches!(parse_name_list("I could not find any."), Err(ExtractError::Parse(_))));
        assert!(matches!(parse_name_list("[1, 2]"), Err(ExtractError::Parse(_))));
        assert_eq!(parse_name_list("[]").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn test_response_content_blocks() {
        let body = r#"{"content": [
            {"type": "thinking", "thinking": "hmm"},
            {"type": "text", "text": "[\"Alice\"]"}
        ]}"#;
        let parsed: ApiResponse = serde_json::from_str(body).unwrap();
        assert!(matches!(parsed.content[0], ApiContent::Other));
        assert!(matches!(&parsed.content[1], ApiContent::Text { text } if text == "[\"Alice\"]"));
    }

    #[test]
    fn test_request_shape() {
        let config = LlmConfig {
            api_base: "https://example.test/v1/".into(),
            ..LlmConfig::default()
        };
        let extractor = LlmExtractor::new("sk-test", &config).unwrap();
        assert_eq!(extractor.api_base, "https://example.test/v1");

        let value = serde_json::to_value(extractor.build_request("Alice ran.")).unwrap();
        assert_eq!(value["model"], config.model.as_str());
        assert_eq!(value["messages"][0]["role"], "user");
        assert!(value["messages"][0]["content"].as_str().unwrap().ends_with("Alice ran."));

        let headers = extractor.build_headers().unwrap();
        assert_eq!(headers["x-api-key"], "sk-test");
        assert_eq!(headers["anthropic-version"], API_VERSION);
    }

    #[test]
    fn test_invalid_api_key_header() {
        let extractor = LlmExtractor::new("bad\nkey", &LlmConfig::default()).unwrap();
        assert!(matches!(extractor.build_headers(), Err(ExtractError::Config(_))));
    }
}
