//! Remote chat-completion provider trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{Message, ProviderResponse};

/// Generation parameters forwarded verbatim to the provider.
///
/// Optional fields are omitted from the request body when unset, so the
/// provider's own defaults apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateParams {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl Default for GenerateParams {
    /// Deterministic sampling on the stock chat model.
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".into(),
            top_p: Some(0.0),
            temperature: None,
            max_tokens: None,
        }
    }
}

#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    async fn chat(&self, messages: &[Message], params: &GenerateParams) -> Result<ProviderResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params_skip_unset_fields() {
        let json = serde_json::to_value(GenerateParams::default()).unwrap();
        assert_eq!(json["model"], "gpt-3.5-turbo");
        assert_eq!(json["top_p"], 0.0);
        assert!(json.get("temperature").is_none());
        assert!(json.get("max_tokens").is_none());
    }
}
