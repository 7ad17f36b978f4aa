//! Generic retry/backoff for `CapabilityTransient` failures (spec §7),
//! generalizing rlm-core's `llm::batch::RetryConfig` exponential-backoff
//! shape from "batched LLM queries" to "any capability call".

use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use tokio::time::sleep;

use crate::error::Error;

/// Retry policy for `CapabilityTransient` errors: up to three retries,
/// base delay 200ms, backoff factor 2, jitter ±25% (spec §7 exact values).
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub backoff_factor: f64,
    pub jitter_fraction: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 200,
            backoff_factor: 2.0,
            jitter_fraction: 0.25,
        }
    }
}

impl RetryPolicy {
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_factor.max(1.0).powi(attempt as i32);
        let base = self.base_delay_ms as f64 * factor;
        let jitter_span = base * self.jitter_fraction;
        let jitter = pseudo_jitter(attempt) * 2.0 * jitter_span - jitter_span;
        let millis = (base + jitter).max(0.0).round() as u64;
        Duration::from_millis(millis)
    }
}

/// A cheap, non-cryptographic jitter source in [0,1) derived from the
/// wall clock and the attempt number. Retry timing is not part of any
/// determinism guarantee (spec §4.7 only requires deterministic MCTS
/// selection), so this need not be seedable.
fn pseudo_jitter(attempt: u32) -> f64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    let mixed = nanos.wrapping_mul(2654435761).wrapping_add(attempt.wrapping_mul(2246822519));
    (mixed as f64) / (u32::MAX as f64)
}

/// Retry `op` up to `policy.max_retries` times while it returns a
/// `CapabilityTransient` error, honoring `deadline` if set. Any other
/// error kind (including `CapabilityPermanent`) is returned immediately.
pub async fn with_retry<T, F, Fut>(
    policy: RetryPolicy,
    deadline: Option<DateTime<Utc>>,
    mut op: F,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.max_retries => {
                if let Some(deadline) = deadline {
                    if Utc::now() >= deadline {
                        return Err(err);
                    }
                }
                sleep(policy.delay_for_attempt(attempt)).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy {
            base_delay_ms: 1,
            ..RetryPolicy::default()
        };
        let result: Result<u32, Error> = with_retry(policy, None, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Error::capability_transient("LanguageModel", "busy"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_permanent_errors() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::default();
        let result: Result<u32, Error> = with_retry(policy, None, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async move { Err(Error::capability_permanent("LanguageModel", "bad key")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay_ms: 1,
            ..RetryPolicy::default()
        };
        let result: Result<u32, Error> = with_retry(policy, None, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async move { Err(Error::capability_transient("LanguageModel", "busy")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }
}
