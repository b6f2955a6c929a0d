//! FineLaw configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{FineLawError, Result};
use crate::traits::provider::GenerateParams;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FineLawConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

impl FineLawConfig {
    /// Load config from the default path (~/.finelaw/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| FineLawError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| FineLawError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the FineLaw home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".finelaw")
    }

    /// API key resolution: config > `OPENAI_API_KEY` > empty.
    pub fn resolve_api_key(&self) -> String {
        if !self.api_key.is_empty() {
            self.api_key.clone()
        } else {
            std::env::var("OPENAI_API_KEY").unwrap_or_default()
        }
    }

    /// Generation parameters assembled from `[llm]`.
    pub fn generate_params(&self) -> GenerateParams {
        GenerateParams {
            model: self.llm.model.clone(),
            top_p: self.llm.top_p,
            temperature: self.llm.temperature,
            max_tokens: self.llm.max_tokens,
        }
    }
}

/// Expand `~` and environment variables in a configured path.
pub fn expand_path(p: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(p)
        .map_err(|e| FineLawError::Config(format!("Failed to expand path '{p}': {e}")))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

/// Remote chat-completion service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_top_p")]
    pub top_p: Option<f32>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

fn default_llm_endpoint() -> String { "https://api.openai.com/v1".into() }
fn default_llm_model() -> String { "gpt-3.5-turbo".into() }
fn default_top_p() -> Option<f32> { Some(0.0) }

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
            top_p: default_top_p(),
            temperature: None,
            max_tokens: None,
        }
    }
}

/// Vector index and embedding service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_save_path")]
    pub save_path: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_embedding_endpoint")]
    pub embedding_endpoint: String,
    #[serde(default)]
    pub embedding_api_key: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_save_path() -> String { "~/.finelaw/index".into() }
fn default_collection() -> String { "ru_code".into() }
fn default_embedding_model() -> String { "distiluse-base-multilingual-cased-v1".into() }
fn default_embedding_endpoint() -> String { "http://127.0.0.1:7997/v1".into() }
fn default_top_k() -> usize { 3 }

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            save_path: default_save_path(),
            collection: default_collection(),
            embedding_model: default_embedding_model(),
            embedding_endpoint: default_embedding_endpoint(),
            embedding_api_key: String::new(),
            top_k: default_top_k(),
        }
    }
}

/// Source document splitting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    #[serde(default)]
    pub code_path: String,
    #[serde(default = "default_heading_marker")]
    pub heading_marker: String,
    #[serde(default = "default_fine_keyword")]
    pub fine_keyword: String,
    /// Finalize the article after the last heading instead of dropping it.
    #[serde(default)]
    pub include_trailing_article: bool,
}

fn default_heading_marker() -> String { "Статья".into() }
fn default_fine_keyword() -> String { "штраф".into() }

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            code_path: String::new(),
            heading_marker: default_heading_marker(),
            fine_keyword: default_fine_keyword(),
            include_trailing_article: false,
        }
    }
}

/// Backoff on rate-limit responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_factor")]
    pub factor: f64,
    #[serde(default)]
    pub max_delay_ms: Option<u64>,
    /// `None` retries until the service stops throttling.
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

fn default_base_delay_ms() -> u64 { 1000 }
fn default_factor() -> f64 { 2.0 }

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            factor: default_factor(),
            max_delay_ms: None,
            max_attempts: None,
        }
    }
}

/// Prompt templates and answer labels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_fine_template")]
    pub fine_template: String,
    #[serde(default = "default_article_template")]
    pub article_template: String,
    #[serde(default = "default_answer_label")]
    pub answer_label: String,
    #[serde(default = "default_norm_label")]
    pub norm_label: String,
    #[serde(default = "default_jurisdiction")]
    pub jurisdiction: String,
    #[serde(default = "default_greeting")]
    pub greeting: String,
}

pub fn default_fine_template() -> String {
    "Контекст:\n{context}\n\
     Используя контекст, коротко ответь, какой штраф \
     установлен за следующее правонарушение \
     (в качестве ответа дай только денежную сумму): {query}"
        .into()
}

pub fn default_article_template() -> String {
    "Контекст:\n{context}\n\
     Используя контекст, коротко ответь, какая статья \
     определяет штраф за следующее правонарушение \
     (в качестве ответа дай только номер статьи): {query}\n"
        .into()
}

fn default_answer_label() -> String { "Ответ:".into() }
fn default_norm_label() -> String { "Норма:".into() }
fn default_jurisdiction() -> String { "КоАП РФ".into() }
fn default_greeting() -> String { "Штраф для какого нарушения вас интересует?".into() }

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            fine_template: default_fine_template(),
            article_template: default_article_template(),
            answer_label: default_answer_label(),
            norm_label: default_norm_label(),
            jurisdiction: default_jurisdiction(),
            greeting: default_greeting(),
        }
    }
}
