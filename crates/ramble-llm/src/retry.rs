use std::time::Duration;

use futures::future::BoxFuture;
use tracing::warn;

use crate::client::{LlmClient, LlmRequest, LlmResponse};
use crate::error::{LlmError, Result};

/// Exponential backoff with jitter, mirroring the queue runner's
/// `next_retry_at` formula so both retry paths behave the same way
/// under load.
fn backoff_delay(attempt: u32, base_delay_ms: u64, max_delay_ms: u64, multiplier: f64, jitter_factor: f64) -> Duration {
    let exp = base_delay_ms as f64 * multiplier.powi(attempt as i32);
    let capped = exp.min(max_delay_ms as f64);
    let jitter = 1.0 + rand::random::<f64>() * jitter_factor;
    Duration::from_millis((capped * jitter) as u64)
}

/// Wraps any `LlmClient` with retry-with-backoff. `Network`/`RateLimit`/
/// `Timeout` always retry; `BadResponse` retries only up to `max_attempts`.
pub struct RetryingLlmClient<C: LlmClient> {
    inner: C,
    max_attempts: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
    multiplier: f64,
    jitter_factor: f64,
}

impl<C: LlmClient> RetryingLlmClient<C> {
    pub fn new(inner: C, max_attempts: u32) -> Self {
        Self {
            inner,
            max_attempts,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            multiplier: 2.0,
            jitter_factor: 0.25,
        }
    }

    pub fn with_backoff(mut self, base_delay_ms: u64, max_delay_ms: u64, multiplier: f64, jitter_factor: f64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self.max_delay_ms = max_delay_ms;
        self.multiplier = multiplier;
        self.jitter_factor = jitter_factor;
        self
    }
}

impl<C: LlmClient> LlmClient for RetryingLlmClient<C> {
    fn call<'a>(&'a self, request: LlmRequest) -> BoxFuture<'a, Result<LlmResponse>> {
        Box::pin(async move {
            let mut last_err: Option<LlmError> = None;

            for attempt in 0..self.max_attempts {
                match self.inner.call(request.clone()).await {
                    Ok(response) => return Ok(response),
                    Err(e) => {
                        let retryable = e.is_retryable() || matches!(e, LlmError::BadResponse(_));
                        if retryable && attempt + 1 < self.max_attempts {
                            let delay = backoff_delay(attempt, self.base_delay_ms, self.max_delay_ms, self.multiplier, self.jitter_factor);
                            warn!(attempt = attempt + 1, max_attempts = self.max_attempts, delay_ms = delay.as_millis() as u64, error = %e, "retrying LLM call");
                            tokio::time::sleep(delay).await;
                            last_err = Some(e);
                            continue;
                        }
                        last_err = Some(e);
                        break;
                    }
                }
            }

            Err(last_err.unwrap_or(LlmError::BadResponse("no attempts made".to_string())))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ModelConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FlakyClient {
        calls: Arc<AtomicUsize>,
        fail_times: usize,
    }

    impl LlmClient for FlakyClient {
        fn call<'a>(&'a self, _request: LlmRequest) -> BoxFuture<'a, Result<LlmResponse>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if n < self.fail_times {
                    Err(LlmError::Network("boom".to_string()))
                } else {
                    Ok(LlmResponse { content: "ok".to_string(), usage: None })
                }
            })
        }
    }

    fn sample_request() -> LlmRequest {
        LlmRequest {
            model: ModelConfig {
                provider: "openai".to_string(),
                model_id: "gpt-4o-mini".to_string(),
                api_key: None,
                base_url: None,
                max_tokens: 64,
                temperature: 0.0,
            },
            system_prompt: None,
            messages: vec![],
        }
    }

    #[tokio::test]
    async fn retries_network_errors_until_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let client = RetryingLlmClient::new(FlakyClient { calls: calls.clone(), fail_times: 2 }, 5)
            .with_backoff(1, 5, 2.0, 0.0);
        let response = client.call(sample_request()).await.unwrap();
        assert_eq!(response.content, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let client = RetryingLlmClient::new(FlakyClient { calls: calls.clone(), fail_times: 10 }, 3)
            .with_backoff(1, 5, 2.0, 0.0);
        let result = client.call(sample_request()).await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
