//! OpenAI-compatible chat completion provider.
//!
//! Distinguishes throttling (HTTP 429) from every other failure so the
//! retry layer can back off on it alone.

use async_trait::async_trait;
use finelaw_core::config::FineLawConfig;
use finelaw_core::error::{FineLawError, Result};
use finelaw_core::traits::provider::{GenerateParams, Provider};
use finelaw_core::types::{Message, ProviderResponse, Usage};
use serde_json::{Value, json};

pub struct OpenAiCompatibleProvider {
    /// Provider name used in errors and logs.
    name: String,
    /// API key for bearer authentication.
    api_key: String,
    /// Base URL for the API (e.g., "https://api.openai.com/v1").
    base_url: String,
    /// Path for chat completions.
    chat_path: String,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(name: &str, base_url: &str, api_key: &str) -> Self {
        Self {
            name: name.to_string(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            chat_path: "/chat/completions".to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// API key: `config.api_key` > `OPENAI_API_KEY` > empty.
    pub fn from_config(config: &FineLawConfig) -> Self {
        Self::new("openai", &config.llm.endpoint, &config.resolve_api_key())
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("Authorization", format!("Bearer {}", self.api_key))
    }

    fn request_body(messages: &[Message], params: &GenerateParams) -> Value {
        let mut body = serde_json::to_value(params).unwrap_or_else(|_| json!({}));
        body["messages"] = serde_json::to_value(messages).unwrap_or_default();
        body
    }
}

#[async_trait]
impl Provider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(&self, messages: &[Message], params: &GenerateParams) -> Result<ProviderResponse> {
        if self.api_key.is_empty() {
            return Err(FineLawError::ApiKeyMissing(self.name.clone()));
        }

        let body = Self::request_body(messages, params);
        let url = format!("{}{}", self.base_url, self.chat_path);
        let req = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);
        let req = self.apply_auth(req);

        let resp = req.send().await.map_err(|e| {
            FineLawError::Http(format!("{} connection failed ({}): {}", self.name, url, e))
        })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_status(&self.name, status.as_u16(), &text));
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| FineLawError::Http(e.to_string()))?;
        parse_completion(&json)
    }
}

/// Map a non-success status to the error taxonomy.
pub(crate) fn classify_status(provider: &str, status: u16, body: &str) -> FineLawError {
    match status {
        429 => FineLawError::RateLimited {
            provider: provider.to_string(),
            message: body.to_string(),
        },
        _ => FineLawError::Provider(format!("{provider} API error {status}: {body}")),
    }
}

/// Parse a standard OpenAI chat completion into its first choice.
pub(crate) fn parse_completion(json: &Value) -> Result<ProviderResponse> {
    let choice = json["choices"]
        .get(0)
        .ok_or_else(|| FineLawError::Provider("No choices in response".into()))?;

    let content = choice["message"]["content"].as_str().map(String::from);

    let usage = json["usage"].as_object().map(|u| Usage {
        prompt_tokens: u.get("prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
        completion_tokens: u
            .get("completion_tokens")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32,
        total_tokens: u.get("total_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
    });

    Ok(ProviderResponse {
        content,
        finish_reason: choice["finish_reason"].as_str().map(String::from),
        usage,
    })
}
