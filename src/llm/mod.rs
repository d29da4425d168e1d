//! AI text service — used for email personalization and reply
//! classification. Both call sites treat the service as unreliable and
//! carry a fallback path.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use crate::error::LlmError;

/// Default model for personalization and classification.
pub const DEFAULT_MODEL: &str = "claude-haiku-4-5-20251001";

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

/// Prompt-to-text generation. One method is enough: both call sites are a
/// single user prompt with an optional system instruction.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        system: Option<&str>,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, LlmError>;
}

/// Anthropic Messages API client.
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: SecretString,
    model: String,
}

impl AnthropicClient {
    pub fn new(api_key: SecretString) -> Self {
        let model = std::env::var("OUTREACH_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Self {
            http: reqwest::Client::new(),
            api_key,
            model,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[async_trait]
impl TextGenerator for AnthropicClient {
    async fn generate(
        &self,
        system: Option<&str>,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let mut body = json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "messages": [{"role": "user", "content": prompt}],
        });
        if let Some(system) = system {
            body["system"] = json!(system);
        }

        let resp = self
            .http
            .post(API_URL)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::RequestFailed(format!(
                "HTTP {status}: {body}"
            )));
        }

        let parsed: MessagesResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        parsed
            .content
            .into_iter()
            .find(|b| b.kind == "text")
            .map(|b| b.text)
            .ok_or_else(|| LlmError::InvalidResponse("no text block in response".to_string()))
    }
}

/// Strip markdown code fences from a model response, if present.
/// Models sometimes wrap JSON output in ```json ... ``` despite instructions.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the fence line (possibly "```json") and the closing fence.
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or(rest);
    body.rsplit_once("```").map(|(b, _)| b).unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_fences_plain_text_untouched() {
        assert_eq!(strip_code_fences("{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn strip_fences_removes_json_fence() {
        let fenced = "```json\n{\"category\": \"interested\"}\n```";
        assert_eq!(strip_code_fences(fenced), "{\"category\": \"interested\"}");
    }

    #[test]
    fn strip_fences_removes_bare_fence() {
        let fenced = "```\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(fenced), "{\"a\": 1}");
    }
}
