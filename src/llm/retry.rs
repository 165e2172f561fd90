//! Bounded retry around a completion provider

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{FrameworkError, FrameworkResult};

use super::provider::CompletionProvider;
use super::types::{Completion, CompletionRequest};

/// How many times to call the completion service and how long to wait between calls
///
/// Backoff doubles after every failure, capped at `max_backoff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(with = "millis")]
    pub initial_backoff: Duration,
    #[serde(with = "millis")]
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Retry up to `max_attempts` times without waiting
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Single attempt, no retry
    pub fn none() -> Self {
        Self::immediate(1)
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    /// Delay before attempt `attempt + 1`, given `attempt` failures so far (1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// Call `provider` under `policy`
///
/// Returns the first successful completion, or `CompletionFailure` carrying
/// the last error once every attempt has failed.
pub async fn complete_with_retry<P>(
    provider: &P,
    request: &CompletionRequest,
    policy: &RetryPolicy,
) -> FrameworkResult<Completion>
where
    P: CompletionProvider + ?Sized,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match provider.complete(request).await {
            Ok(completion) => {
                if attempt > 1 {
                    tracing::info!(
                        provider = provider.provider_name(),
                        attempt,
                        "Completion succeeded after retry"
                    );
                }
                return Ok(completion);
            }
            Err(e) if attempt < max_attempts => {
                let delay = policy.backoff_for(attempt);
                tracing::warn!(
                    provider = provider.provider_name(),
                    model = %request.model,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Completion failed, retrying: {:#}",
                    e
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
            Err(e) => {
                tracing::error!(
                    provider = provider.provider_name(),
                    model = %request.model,
                    attempts = attempt,
                    "Completion failed: {:#}",
                    e
                );
                return Err(FrameworkError::CompletionFailure {
                    attempts: attempt,
                    source: e,
                });
            }
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
