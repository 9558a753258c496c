//! Bounded retry around a single completion call plus response parsing.
//!
//! A response that fails to parse is treated exactly like a transport error:
//! it consumes an attempt and is retried after back-off.

use std::time::Duration;

use tracing::warn;

use crate::config::PipelineConfig;
use crate::llm_client::{CompletionError, CompletionPort, CompletionRequest};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            retries: config.retry_attempts,
            base_delay: config.retry_delay,
        }
    }

    /// Exponential back-off before retry `n` (1-based): base, 2×base, 4×base…
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exponent)
    }
}

#[derive(Debug)]
pub struct Completed<T> {
    pub value: T,
    pub attempts: u32,
}

#[derive(Debug)]
pub struct Exhausted {
    pub attempts: u32,
    pub last_error: CompletionError,
}

/// Calls the port and parses the reply, retrying per `policy`.
///
/// The request's timeout is enforced here as well, so a port that ignores
/// it still cannot stall a slot.
pub async fn complete_with_retry<T, F>(
    port: &dyn CompletionPort,
    request: &CompletionRequest,
    policy: RetryPolicy,
    label: &str,
    parse: F,
) -> Result<Completed<T>, Exhausted>
where
    F: Fn(&str) -> Result<T, CompletionError>,
{
    let mut last_error = CompletionError::ConnectionFailure("no attempt made".to_string());

    for attempt in 0..=policy.retries {
        if attempt > 0 {
            let delay = policy.delay_for(attempt);
            warn!(
                "{label}: attempt {} failed ({last_error}), retrying after {}ms",
                attempt,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }

        let outcome = match tokio::time::timeout(request.timeout, port.complete(request)).await {
            Ok(Ok(text)) => parse(&text),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(CompletionError::Timeout(request.timeout)),
        };

        match outcome {
            Ok(value) => {
                return Ok(Completed {
                    value,
                    attempts: attempt + 1,
                })
            }
            Err(e) => last_error = e,
        }
    }

    Err(Exhausted {
        attempts: policy.retries + 1,
        last_error,
    })
}
