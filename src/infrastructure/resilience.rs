//! Retry and fallback around model invocations
//!
//! Each call is wrapped in a timeout and retried with exponential backoff
//! plus jitter while the failure looks transient. When a provider runs out of
//! attempts the next provider in the chain gets a fresh budget. Nothing here
//! keeps state between calls.

use backon::Retryable;
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::LlmSettings;

use super::llm::{Completion, CompletionRequest, LlmProvider, ProviderError};

/// HTTP statuses worth retrying
pub const RETRY_STATUS_CODES: [u16; 5] = [429, 500, 502, 503, 504];

/// Socket-level error codes worth retrying
pub const RETRY_ERROR_CODES: [&str; 4] = ["ECONNRESET", "ETIMEDOUT", "ENOTFOUND", "ECONNREFUSED"];

// Matched case-insensitively against the rendered error message
const TRANSIENT_MESSAGE_PATTERNS: [&str; 6] = [
    "econnreset",
    "etimedout",
    "enotfound",
    "econnrefused",
    "timeout",
    "connection reset",
];

/// Failure of a whole provider chain
#[derive(Debug, Error)]
pub enum ResilienceError {
    #[error("No LLM providers available")]
    NoProviders,

    #[error("All providers failed. Last error ({provider}): {source}")]
    Exhausted {
        /// Provider whose error is reported
        provider: String,
        /// Number of providers tried
        attempted: usize,
        source: ProviderError,
    },
}

/// One failed attempt that will be retried
#[derive(Debug)]
pub struct RetryAttempt<'a> {
    pub attempt: u32,
    pub delay: Duration,
    pub error: &'a ProviderError,
}

/// Retry budget and timing for one provider
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per provider, including the first
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Per-attempt timeout
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(30_000),
            timeout: Duration::from_millis(60_000),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(settings: &LlmSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            base_delay: settings.retry_base_delay,
            max_delay: settings.retry_max_delay,
            timeout: settings.request_timeout,
        }
    }

    /// `base_delay * 2^(attempt-1)`, capped at `max_delay`
    pub fn capped_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Capped delay plus uniform jitter of up to 25% of it
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let capped = self.capped_delay(attempt);
        let jitter: f64 = rand::rng().random_range(0.0..=0.25);
        capped + capped.mul_f64(jitter)
    }

    /// Delays between attempts for one provider, fed to `backon`
    pub fn backoff(&self) -> PolicyBackoff {
        PolicyBackoff {
            policy: self.clone(),
            attempt: 0,
        }
    }

    /// Runs `operation` until it succeeds, fails permanently, or the attempt
    /// budget is spent. Returns the last error in the latter two cases.
    pub async fn retry_with_backoff<T, F, Fut>(
        &self,
        provider: &str,
        mut operation: F,
    ) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let timeout = self.timeout;
        let max_attempts = self.max_retries.max(1);
        let mut attempt = 0;

        let result = (|| {
            let call = operation();
            async move {
                tokio::time::timeout(timeout, call)
                    .await
                    .unwrap_or(Err(ProviderError::Timeout(timeout)))
            }
        })
        .retry(self.backoff())
        .when(is_retryable)
        .notify(|error: &ProviderError, delay: Duration| {
            attempt += 1;
            let retry = RetryAttempt {
                attempt,
                delay,
                error,
            };
            warn!(
                provider,
                attempt = retry.attempt,
                max_attempts,
                delay_ms = retry.delay.as_millis() as u64,
                error = %retry.error,
                "retrying model invocation"
            );
        })
        .await;

        if let Err(error) = &result {
            if !is_retryable(error) {
                debug!(provider, error = %error, "not retrying model invocation");
            }
        }
        result
    }

    /// Invokes each provider in order until one succeeds
    ///
    /// Every provider gets the full retry budget; none is tried twice.
    pub async fn invoke_chain(
        &self,
        chain: &[Arc<dyn LlmProvider>],
        request: &CompletionRequest,
    ) -> Result<Completion, ResilienceError> {
        let mut last_failure = None;

        for provider in chain {
            let name = provider.name();
            debug!(provider = name, model = provider.model(), "invoking provider");

            match self
                .retry_with_backoff(name, || provider.generate(request))
                .await
            {
                Ok(completion) => return Ok(completion),
                Err(error) => {
                    warn!(provider = name, error = %error, "provider failed, trying next in chain");
                    last_failure = Some((name.to_string(), error));
                }
            }
        }

        match last_failure {
            Some((provider, source)) => Err(ResilienceError::Exhausted {
                provider,
                attempted: chain.len(),
                source,
            }),
            None => Err(ResilienceError::NoProviders),
        }
    }
}

/// [`RetryPolicy`] delays as an iterator
///
/// Yields `max_retries - 1` jittered delays, so a provider gets exactly
/// `max_retries` attempts in total.
#[derive(Debug, Clone)]
pub struct PolicyBackoff {
    policy: RetryPolicy,
    attempt: u32,
}

impl Iterator for PolicyBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.attempt + 1 >= self.policy.max_retries.max(1) {
            return None;
        }
        self.attempt += 1;
        Some(self.policy.backoff_delay(self.attempt))
    }
}

/// Decides whether a failed invocation is worth retrying
///
/// Client errors other than 429 are final, whatever their message says.
pub fn is_retryable(error: &ProviderError) -> bool {
    match error {
        ProviderError::Http { status, .. } if (400..500).contains(status) && *status != 429 => {
            return false
        }
        ProviderError::Http { status, .. } if RETRY_STATUS_CODES.contains(status) => return true,
        ProviderError::Timeout(_) => return true,
        ProviderError::Network {
            code: Some(code), ..
        } if RETRY_ERROR_CODES.contains(&code.as_str()) => return true,
        ProviderError::Config(_) => return false,
        _ => {}
    }

    let message = error.to_string().to_lowercase();
    TRANSIENT_MESSAGE_PATTERNS
        .iter()
        .any(|pattern| message.contains(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::llm::testing::{http_error, ScriptedProvider};

    fn network(code: Option<&str>, message: &str) -> ProviderError {
        ProviderError::Network {
            provider: "p".to_string(),
            code: code.map(str::to_string),
            message: message.to_string(),
        }
    }

    #[test]
    fn policy_from_settings() {
        let settings = LlmSettings {
            max_retries: 5,
            request_timeout: Duration::from_secs(5),
            ..LlmSettings::default()
        };
        let policy = RetryPolicy::from_config(&settings);

        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.timeout, Duration::from_secs(5));
        assert_eq!(policy.base_delay, RetryPolicy::default().base_delay);
    }

    #[test]
    fn capped_delay_doubles_then_caps() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.capped_delay(1), Duration::from_millis(1_000));
        assert_eq!(policy.capped_delay(2), Duration::from_millis(2_000));
        assert_eq!(policy.capped_delay(5), Duration::from_millis(16_000));
        assert_eq!(policy.capped_delay(6), Duration::from_millis(30_000));
        assert_eq!(policy.capped_delay(100), Duration::from_millis(30_000));
    }

    #[test]
    fn backoff_delay_stays_within_jitter_bounds() {
        let policy = RetryPolicy::default();

        for attempt in 1..=8 {
            let capped = policy.capped_delay(attempt);
            for _ in 0..200 {
                let delay = policy.backoff_delay(attempt);
                assert!(delay >= capped, "attempt {} delay {:?}", attempt, delay);
                assert!(delay <= capped.mul_f64(1.25), "attempt {} delay {:?}", attempt, delay);
            }
        }
    }

    #[test]
    fn backoff_yields_one_delay_per_retry() {
        let delays: Vec<Duration> = RetryPolicy::default().backoff().collect();

        assert_eq!(delays.len(), 2);
        assert!(delays[0] >= Duration::from_millis(1_000));
        assert!(delays[0] <= Duration::from_millis(1_250));
        assert!(delays[1] >= Duration::from_millis(2_000));
        assert!(delays[1] <= Duration::from_millis(2_500));

        let single = RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        };
        assert_eq!(single.backoff().count(), 0);
    }

    #[test]
    fn classification() {
        assert!(is_retryable(&http_error("p", 429)));
        assert!(is_retryable(&http_error("p", 503)));
        assert!(is_retryable(&http_error("p", 504)));
        assert!(!is_retryable(&http_error("p", 404)));
        assert!(!is_retryable(&http_error("p", 401)));
        assert!(is_retryable(&ProviderError::Timeout(Duration::from_secs(1))));
        assert!(is_retryable(&network(Some("ECONNREFUSED"), "refused")));
        assert!(is_retryable(&network(None, "socket: Connection reset by peer")));
        assert!(!is_retryable(&network(None, "certificate invalid")));
        assert!(!is_retryable(&ProviderError::Config("timeout".to_string())));
    }

    #[test]
    fn client_errors_are_final_even_with_transient_wording() {
        let error = ProviderError::Http {
            provider: "p".to_string(),
            status: 400,
            message: "upstream timeout in validation".to_string(),
        };
        assert!(!is_retryable(&error));
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_is_never_retried() {
        let provider = Arc::new(ScriptedProvider::failing("primary", 404));
        let chain: Vec<Arc<dyn LlmProvider>> = vec![provider.clone()];

        let result = RetryPolicy::default()
            .invoke_chain(&chain, &CompletionRequest::prompt("hi"))
            .await;

        assert!(matches!(result, Err(ResilienceError::Exhausted { .. })));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn service_unavailable_is_retried_up_to_budget() {
        let provider = Arc::new(ScriptedProvider::failing("primary", 503));
        let chain: Vec<Arc<dyn LlmProvider>> = vec![provider.clone()];

        let result = RetryPolicy::default()
            .invoke_chain(&chain, &CompletionRequest::prompt("hi"))
            .await;

        match result {
            Err(ResilienceError::Exhausted { provider: name, source, .. }) => {
                assert_eq!(name, "primary");
                assert_eq!(source.status(), Some(503));
            }
            other => panic!("expected exhaustion, got {:?}", other.map(|c| c.text)),
        }
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_waits_with_backoff() {
        let provider = Arc::new(ScriptedProvider::failing("primary", 500));
        let chain: Vec<Arc<dyn LlmProvider>> = vec![provider.clone()];
        let started = tokio::time::Instant::now();

        let _ = RetryPolicy::default()
            .invoke_chain(&chain, &CompletionRequest::prompt("hi"))
            .await;

        // Two sleeps: 1s..1.25s then 2s..2.5s
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(3_000), "{:?}", waited);
        assert!(waited <= Duration::from_millis(3_750), "{:?}", waited);
    }

    #[tokio::test(start_paused = true)]
    async fn falls_back_through_chain_in_order() {
        let primary = Arc::new(ScriptedProvider::failing("primary", 503));
        let fallback_a = Arc::new(ScriptedProvider::failing("fallback-a", 502));
        let fallback_b = Arc::new(ScriptedProvider::always("fallback-b", "hello"));
        let chain: Vec<Arc<dyn LlmProvider>> =
            vec![primary.clone(), fallback_a.clone(), fallback_b.clone()];

        let completion = RetryPolicy::default()
            .invoke_chain(&chain, &CompletionRequest::prompt("hi"))
            .await
            .expect("fallback succeeds");

        assert_eq!(completion.text, "hello");
        assert_eq!(completion.provider, "fallback-b");
        assert_eq!(primary.calls(), 3);
        assert_eq!(fallback_a.calls(), 3);
        assert_eq!(fallback_b.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_error_moves_straight_to_next_provider() {
        let primary = Arc::new(ScriptedProvider::failing("primary", 401));
        let fallback = Arc::new(ScriptedProvider::always("fallback", "ok"));
        let chain: Vec<Arc<dyn LlmProvider>> = vec![primary.clone(), fallback.clone()];

        let completion = RetryPolicy::default()
            .invoke_chain(&chain, &CompletionRequest::prompt("hi"))
            .await
            .unwrap();

        assert_eq!(completion.provider, "fallback");
        assert_eq!(primary.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts_are_retried() {
        let slow = Arc::new(
            ScriptedProvider::always("slow", "late").with_latency(Duration::from_secs(120)),
        );
        let chain: Vec<Arc<dyn LlmProvider>> = vec![slow.clone()];

        let result = RetryPolicy::default()
            .invoke_chain(&chain, &CompletionRequest::prompt("hi"))
            .await;

        match result {
            Err(ResilienceError::Exhausted { source, .. }) => {
                assert!(matches!(source, ProviderError::Timeout(_)));
            }
            _ => panic!("expected timeout exhaustion"),
        }
        assert_eq!(slow.calls(), 3);
    }

    #[tokio::test]
    async fn empty_chain_fails() {
        let result = RetryPolicy::default()
            .invoke_chain(&[], &CompletionRequest::prompt("hi"))
            .await;
        assert!(matches!(result, Err(ResilienceError::NoProviders)));
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failure() {
        let attempts = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let seen = attempts.clone();
        let policy = RetryPolicy::default();

        let value = policy
            .retry_with_backoff("flaky", || {
                let seen = seen.clone();
                async move {
                    if seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
                        Err(http_error("flaky", 502))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_budget_never_sleeps() {
        let provider = Arc::new(ScriptedProvider::failing("primary", 503));
        let chain: Vec<Arc<dyn LlmProvider>> = vec![provider.clone()];
        let policy = RetryPolicy {
            max_retries: 1,
            ..RetryPolicy::default()
        };
        let started = tokio::time::Instant::now();

        let result = policy
            .invoke_chain(&chain, &CompletionRequest::prompt("hi"))
            .await;

        assert!(result.is_err());
        assert_eq!(provider.calls(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
