//! Resilient call executor.
//!
//! Each network attempt is classified into a `CallOutcome`. Retryable outcomes
//! are tried again with exponential backoff until the attempt ceiling; fatal
//! outcomes are returned at once.

use colloquy_core::error::ProviderError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::transport::HttpReply;

/// The result of one network attempt.
#[derive(Debug)]
pub enum CallOutcome {
    /// HTTP 200 with a well-formed JSON body, returned verbatim.
    Success(serde_json::Value),
    /// Rate limiting or a network-level failure.
    Retryable(ProviderError),
    /// Anything else. Never retried.
    Fatal(ProviderError),
}

impl CallOutcome {
    pub fn classify(result: Result<HttpReply, ProviderError>) -> Self {
        match result {
            Ok(reply) if reply.status == 200 => match serde_json::from_str(&reply.body) {
                Ok(value) => CallOutcome::Success(value),
                Err(e) => CallOutcome::Fatal(ProviderError::MalformedResponse(e.to_string())),
            },
            Ok(reply) if reply.status == 429 => CallOutcome::Retryable(ProviderError::RateLimited),
            Ok(reply) => CallOutcome::Fatal(ProviderError::ApiError {
                status_code: reply.status,
                message: reply.body,
            }),
            Err(e) if e.is_retryable() => CallOutcome::Retryable(e),
            Err(e) => CallOutcome::Fatal(e),
        }
    }
}

/// Attempt ceiling and backoff schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(300),
            multiplier: 2.0,
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &colloquy_config::RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            multiplier: config.backoff_multiplier,
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// No retries at all.
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay after the `failures`-th consecutive retryable failure (1-based).
    pub fn backoff(&self, failures: u32) -> Duration {
        let exp = self.multiplier.powi(failures.saturating_sub(1) as i32);
        let ms = (self.initial_backoff.as_millis() as f64 * exp).round();
        let cap = self.max_backoff.as_millis() as f64;
        Duration::from_millis(ms.min(cap) as u64)
    }

    /// Run `attempt` until it succeeds, fails fatally, or the ceiling is hit.
    ///
    /// Exhausting the ceiling turns the last retryable error into
    /// `ProviderError::Unavailable`.
    pub async fn run<F, Fut>(&self, label: &str, mut attempt: F) -> Result<serde_json::Value, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CallOutcome>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut n = 0;

        loop {
            n += 1;
            debug!(call = label, attempt = n, max_attempts, "Sending request");

            match attempt().await {
                CallOutcome::Success(value) => return Ok(value),
                CallOutcome::Fatal(e) => {
                    warn!(call = label, attempt = n, error = %e, "Request failed; not retrying");
                    return Err(e);
                }
                CallOutcome::Retryable(e) if n >= max_attempts => {
                    warn!(call = label, attempts = n, error = %e, "Retries exhausted");
                    return Err(ProviderError::Unavailable {
                        attempts: n,
                        reason: e.to_string(),
                    });
                }
                CallOutcome::Retryable(e) => {
                    let delay = self.backoff(n);
                    warn!(
                        call = label,
                        attempt = n,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Request failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
