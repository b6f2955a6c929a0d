//! Exponential backoff on rate-limit errors.
//!
//! `RetryPolicy` decides how long to wait and whether to keep going;
//! `RetryingProvider` composes it around any provider's `chat` call.
//! Every other error class is returned on the first occurrence.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use finelaw_core::config::RetryConfig;
use finelaw_core::error::{FineLawError, Result};
use finelaw_core::traits::provider::{GenerateParams, Provider};
use finelaw_core::types::{Message, ProviderResponse};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total calls allowed, first one included. `None` = unbounded.
    pub max_attempts: Option<u32>,
    pub base_delay: Duration,
    pub factor: f64,
    pub max_delay: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.base_delay_ms),
            factor: config.factor.max(1.0),
            max_delay: config.max_delay_ms.map(Duration::from_millis),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based): `base * factor^(retry-1)`.
    pub fn delay_for_attempt(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(63) as i32;
        let secs = self.base_delay.as_secs_f64() * self.factor.powi(exponent);
        let delay = Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX);
        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }

    pub fn is_retryable(&self, err: &FineLawError) -> bool {
        err.is_rate_limited()
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget runs out.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retries = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if self.is_retryable(&err) => {
                    retries += 1;
                    if let Some(max) = self.max_attempts {
                        if retries >= max {
                            tracing::error!("❌ Giving up after {} rate-limited attempts: {}", retries, err);
                            return Err(err);
                        }
                    }
                    let delay = self.delay_for_attempt(retries);
                    tracing::warn!(
                        "⏳ Rate limited (retry {}), backing off {:?}: {}",
                        retries,
                        delay,
                        err
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// A provider whose every `chat` call runs under a [`RetryPolicy`].
pub struct RetryingProvider<P> {
    inner: P,
    policy: RetryPolicy,
}

impl<P: Provider> RetryingProvider<P> {
    pub fn new(inner: P, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<P: Provider> Provider for RetryingProvider<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn chat(&self, messages: &[Message], params: &GenerateParams) -> Result<ProviderResponse> {
        self.policy.run(|| self.inner.chat(messages, params)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Replays scripted outcomes and records when each call happened.
    struct ScriptedProvider {
        script: Mutex<VecDeque<Result<ProviderResponse>>>,
        calls: Mutex<Vec<Instant>>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Result<ProviderResponse>>) -> Self {
            Self { script: Mutex::new(script.into()), calls: Mutex::new(Vec::new()) }
        }

        fn call_times(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn chat(&self, _: &[Message], _: &GenerateParams) -> Result<ProviderResponse> {
            self.calls.lock().unwrap().push(Instant::now());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(FineLawError::Provider("script exhausted".into())))
        }
    }

    fn throttled() -> Result<ProviderResponse> {
        Err(FineLawError::RateLimited { provider: "scripted".into(), message: "429".into() })
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: None,
            base_delay: Duration::from_millis(100),
            factor: 2.0,
            max_delay: None,
        }
    }

    #[test]
    fn test_delay_grows_geometrically() {
        let p = policy();
        assert_eq!(p.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(p.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(p.delay_for_attempt(3), Duration::from_millis(400));

        let capped = RetryPolicy { max_delay: Some(Duration::from_millis(250)), ..policy() };
        assert_eq!(capped.delay_for_attempt(3), Duration::from_millis(250));

        // Far-out attempts saturate instead of overflowing.
        assert!(policy().delay_for_attempt(u32::MAX) >= Duration::from_secs(1));
    }

    #[test]
    fn test_policy_from_config() {
        let p = RetryPolicy::default();
        assert_eq!(p.base_delay, Duration::from_secs(1));
        assert_eq!(p.factor, 2.0);
        assert!(p.max_attempts.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_rate_limits_then_success() {
        let inner = ScriptedProvider::new(vec![
            throttled(),
            throttled(),
            Ok(ProviderResponse::text("500 рублей")),
        ]);
        let provider = RetryingProvider::new(inner, policy());

        let resp = provider
            .chat(&[Message::user("q")], &GenerateParams::default())
            .await
            .unwrap();
        assert_eq!(resp.content.as_deref(), Some("500 рублей"));

        let times = provider.inner.call_times();
        assert_eq!(times.len(), 3);
        let first_gap = times[1] - times[0];
        let second_gap = times[2] - times[1];
        assert!(first_gap >= Duration::from_millis(100));
        assert!(second_gap >= Duration::from_millis(200));
        assert!(second_gap > first_gap);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_are_not_retried() {
        let inner = ScriptedProvider::new(vec![
            Err(FineLawError::Provider("openai API error 401: Incorrect API key".into())),
            Ok(ProviderResponse::text("never reached")),
        ]);
        let provider = RetryingProvider::new(inner, policy());

        let err = provider
            .chat(&[Message::user("q")], &GenerateParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FineLawError::Provider(_)));
        assert_eq!(provider.inner.call_times().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_then_hard_error_stops() {
        let inner = ScriptedProvider::new(vec![
            throttled(),
            Err(FineLawError::Http("connection reset".into())),
        ]);
        let provider = RetryingProvider::new(inner, policy());

        let err = provider
            .chat(&[Message::user("q")], &GenerateParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FineLawError::Http(_)));
        assert_eq!(provider.inner.call_times().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_attempts() {
        let inner = ScriptedProvider::new(vec![throttled(), throttled(), throttled(), throttled()]);
        let bounded = RetryPolicy { max_attempts: Some(3), ..policy() };
        let provider = RetryingProvider::new(inner, bounded);

        let err = provider
            .chat(&[Message::user("q")], &GenerateParams::default())
            .await
            .unwrap_err();
        assert!(err.is_rate_limited());
        assert_eq!(provider.inner.call_times().len(), 3);
    }
}
