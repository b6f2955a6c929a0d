//! # FineLaw Providers
//!
//! Remote chat-completion access for FineLaw.
//!
//! Any OpenAI-compatible endpoint is handled by `OpenAiCompatibleProvider`;
//! `RetryingProvider` wraps it with exponential backoff on HTTP 429.

pub mod openai_compatible;
pub mod retry;

use finelaw_core::config::FineLawConfig;
use finelaw_core::error::{FineLawError, Result};
use finelaw_core::traits::Provider;

pub use openai_compatible::OpenAiCompatibleProvider;
pub use retry::{RetryPolicy, RetryingProvider};

/// Create the configured provider, already wrapped in the retry policy.
pub fn create_provider(config: &FineLawConfig) -> Result<Box<dyn Provider>> {
    let inner = OpenAiCompatibleProvider::from_config(config);
    if config.resolve_api_key().is_empty() {
        return Err(FineLawError::ApiKeyMissing(inner.name().to_string()));
    }
    let policy = RetryPolicy::from(&config.retry);
    tracing::debug!(
        "🔌 Provider {} at {} (retry: {:?})",
        inner.name(),
        config.llm.endpoint,
        policy
    );
    Ok(Box::new(RetryingProvider::new(inner, policy)))
}
