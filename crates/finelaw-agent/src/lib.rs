//! # FineLaw Agent
//!
//! The chat orchestrator: retrieves matching articles for a question, then
//! asks the remote model twice, once for the fine amount and once for the
//! article number, and composes both into a two-line answer.
//!
//! ```text
//! "превышение скорости на 30 км/ч"
//!   ↓ KnowledgeStore::retrieve(query, top_k)
//! context
//!   ↓ fine template   → provider → "от 1500 до 2000 рублей"
//!   ↓ article template → provider → "12.9 ч. 3"
//! "Ответ: от 1500 до 2000 рублей\nНорма: КоАП РФ 12.9 ч. 3"
//! ```

pub mod prompt;

use finelaw_core::config::{ChatConfig, FineLawConfig};
use finelaw_core::error::{FineLawError, Result};
use finelaw_core::traits::Provider;
use finelaw_core::traits::provider::GenerateParams;
use finelaw_core::types::Message;
use finelaw_knowledge::KnowledgeStore;

pub use prompt::PromptTemplate;

/// Templates, labels and generation parameters for [`FineChat`].
#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub fine_template: PromptTemplate,
    pub article_template: PromptTemplate,
    pub params: GenerateParams,
    pub answer_label: String,
    pub norm_label: String,
    pub jurisdiction: String,
}

impl ChatOptions {
    pub fn from_config(config: &FineLawConfig) -> Result<Self> {
        let chat: &ChatConfig = &config.chat;
        Ok(Self {
            fine_template: PromptTemplate::new(chat.fine_template.clone())?,
            article_template: PromptTemplate::new(chat.article_template.clone())?,
            params: config.generate_params(),
            answer_label: chat.answer_label.clone(),
            norm_label: chat.norm_label.clone(),
            jurisdiction: chat.jurisdiction.clone(),
        })
    }
}

impl Default for ChatOptions {
    fn default() -> Self {
        let chat = ChatConfig::default();
        Self {
            fine_template: PromptTemplate::trusted(chat.fine_template),
            article_template: PromptTemplate::trusted(chat.article_template),
            params: GenerateParams::default(),
            answer_label: chat.answer_label,
            norm_label: chat.norm_label,
            jurisdiction: chat.jurisdiction,
        }
    }
}

pub struct FineChat {
    store: KnowledgeStore,
    provider: Box<dyn Provider>,
    top_k: usize,
    options: ChatOptions,
}

impl FineChat {
    pub fn new(store: KnowledgeStore, provider: Box<dyn Provider>, top_k: usize, options: ChatOptions) -> Self {
        Self { store, provider, top_k, options }
    }

    /// Provider, retry policy, templates and top-k all taken from `config`.
    pub fn from_config(config: &FineLawConfig, store: KnowledgeStore) -> Result<Self> {
        let provider = finelaw_providers::create_provider(config)?;
        let options = ChatOptions::from_config(config)?;
        Ok(Self::new(store, provider, config.retrieval.top_k, options))
    }

    pub fn store(&self) -> &KnowledgeStore {
        &self.store
    }

    /// Answer one question. Retrieval and both remote calls run in order;
    /// the first non-retryable error ends the call.
    pub async fn respond(&self, query: &str) -> Result<String> {
        let context = self.store.retrieve(query, self.top_k).await?;
        tracing::debug!("📎 Context for '{}': {} chars", query, context.chars().count());

        let fine_prompt = self.options.fine_template.render(&context, query);
        let fine = self.ask(&fine_prompt).await?;

        let article_prompt = self.options.article_template.render(&context, query);
        let article = self.ask(&article_prompt).await?;

        tracing::info!("💬 '{}' → fine '{}', article '{}'", query, fine, article);
        Ok(format!(
            "{} {}\n{} {} {}",
            self.options.answer_label, fine, self.options.norm_label, self.options.jurisdiction, article
        ))
    }

    async fn ask(&self, prompt: &str) -> Result<String> {
        let messages = [Message::user(prompt)];
        let response = self.provider.chat(&messages, &self.options.params).await?;
        response.content.ok_or_else(|| {
            FineLawError::Provider(format!("{} returned an empty message", self.provider.name()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use finelaw_core::traits::Embedder;
    use finelaw_core::types::ProviderResponse;
    use finelaw_knowledge::Article;
    use finelaw_providers::{RetryPolicy, RetryingProvider};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct LengthEmbedder;

    #[async_trait]
    impl Embedder for LengthEmbedder {
        fn model(&self) -> &str {
            "length-test"
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| vec![t.chars().count() as f32, 1.0])
                .collect())
        }
    }

    /// Answers prompts from a queue and keeps every prompt it saw.
    #[derive(Clone)]
    struct MockProvider {
        replies: Arc<Mutex<VecDeque<Result<ProviderResponse>>>>,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    impl MockProvider {
        fn new(replies: Vec<Result<ProviderResponse>>) -> Self {
            Self {
                replies: Arc::new(Mutex::new(replies.into())),
                prompts: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        async fn chat(&self, messages: &[Message], params: &GenerateParams) -> Result<ProviderResponse> {
            assert_eq!(messages.len(), 1);
            assert_eq!(params.top_p, Some(0.0));
            self.prompts.lock().unwrap().push(messages[0].content.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(FineLawError::Provider("no reply scripted".into())))
        }
    }

    async fn store(dir: &std::path::Path) -> KnowledgeStore {
        let articles = vec![
            Article {
                title: "Статья 12.9. Превышение установленной скорости движения".into(),
                text: "штраф\n\nв размере пятисот рублей\n".into(),
                number: "штраф".into(),
            },
            Article {
                title: "Статья 12.19. Нарушение правил остановки".into(),
                text: "штраф\n\nв размере одной тысячи рублей\n".into(),
                number: "штраф".into(),
            },
        ];
        KnowledgeStore::build(&articles, dir, "ru_code", Box::new(LengthEmbedder))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_respond_composes_both_answers() {
        let dir = tempfile::tempdir().unwrap();
        let provider = MockProvider::new(vec![
            Ok(ProviderResponse::text("500 рублей")),
            Ok(ProviderResponse::text("12.9")),
        ]);
        let chat = FineChat::new(store(dir.path()).await, Box::new(provider.clone()), 2, ChatOptions::default());

        let answer = chat.respond("превышение скорости").await.unwrap();
        assert_eq!(answer, "Ответ: 500 рублей\nНорма: КоАП РФ 12.9");

        let prompts = provider.prompts.lock().unwrap().clone();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("денежную сумму): превышение скорости"));
        assert!(prompts[1].contains("номер статьи): превышение скорости"));
        for prompt in &prompts {
            assert!(prompt.contains("Статья 12.9"));
            assert!(prompt.contains("Статья 12.19"));
        }
    }

    #[tokio::test]
    async fn test_no_caching_between_identical_queries() {
        let dir = tempfile::tempdir().unwrap();
        let provider = MockProvider::new(vec![
            Ok(ProviderResponse::text("a")),
            Ok(ProviderResponse::text("b")),
            Ok(ProviderResponse::text("c")),
            Ok(ProviderResponse::text("d")),
        ]);
        let chat = FineChat::new(store(dir.path()).await, Box::new(provider.clone()), 1, ChatOptions::default());

        assert_eq!(chat.respond("q").await.unwrap(), "Ответ: a\nНорма: КоАП РФ b");
        assert_eq!(chat.respond("q").await.unwrap(), "Ответ: c\nНорма: КоАП РФ d");
        assert_eq!(provider.prompts.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_hard_error_stops_before_second_call() {
        let dir = tempfile::tempdir().unwrap();
        let provider = MockProvider::new(vec![
            Err(FineLawError::Provider("openai API error 401: Incorrect API key".into())),
            Ok(ProviderResponse::text("unused")),
        ]);
        let chat = FineChat::new(store(dir.path()).await, Box::new(provider.clone()), 1, ChatOptions::default());

        assert!(chat.respond("q").await.is_err());
        assert_eq!(provider.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_content_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let provider = MockProvider::new(vec![Ok(ProviderResponse::default())]);
        let chat = FineChat::new(store(dir.path()).await, Box::new(provider), 1, ChatOptions::default());

        let err = chat.respond("q").await.unwrap_err();
        assert!(matches!(err, FineLawError::Provider(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limits_are_absorbed_by_retry_layer() {
        let dir = tempfile::tempdir().unwrap();
        let throttled = || {
            Err(FineLawError::RateLimited { provider: "mock".into(), message: "429".into() })
        };
        let provider = MockProvider::new(vec![
            throttled(),
            Ok(ProviderResponse::text("1000 рублей")),
            throttled(),
            throttled(),
            Ok(ProviderResponse::text("12.19")),
        ]);
        let policy = RetryPolicy {
            max_attempts: None,
            base_delay: Duration::from_millis(10),
            factor: 2.0,
            max_delay: None,
        };
        let retrying = RetryingProvider::new(provider.clone(), policy);
        let chat = FineChat::new(store(dir.path()).await, Box::new(retrying), 1, ChatOptions::default());

        let answer = chat.respond("стоянка").await.unwrap();
        assert_eq!(answer, "Ответ: 1000 рублей\nНорма: КоАП РФ 12.19");
        assert_eq!(provider.prompts.lock().unwrap().len(), 5);
    }

    #[test]
    fn test_options_from_config_reject_bad_template() {
        let mut config = FineLawConfig::default();
        assert!(ChatOptions::from_config(&config).is_ok());
        config.chat.fine_template = "no placeholders".into();
        assert!(ChatOptions::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn test_from_config_builds_chat() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = FineLawConfig::default();
        config.api_key = "sk-test".into();
        config.retrieval.top_k = 5;
        let chat = FineChat::from_config(&config, store(dir.path()).await).unwrap();
        assert_eq!(chat.top_k, 5);
        assert_eq!(chat.store().count().unwrap(), 2);
    }

    #[test]
    fn test_custom_labels() {
        let mut config = FineLawConfig::default();
        config.chat.answer_label = "Answer:".into();
        config.chat.norm_label = "Norm:".into();
        config.chat.jurisdiction = "CAO RF".into();
        let options = ChatOptions::from_config(&config).unwrap();
        assert_eq!(options.answer_label, "Answer:");
        assert_eq!(options.jurisdiction, "CAO RF");
    }
}
