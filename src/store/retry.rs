//! Transparent retry of transient serialization failures at the transaction
//! boundary.
//!
//! Approve runs serializable and Inspect repeatable-read; under contention
//! PostgreSQL aborts the loser with SQLSTATE `40001` (serialization failure)
//! or `40P01` (deadlock detected). Those aborts are retried by re-running the
//! whole command closure, which re-reads every row from scratch. Business
//! failures are never retried.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::{EngineError, Result};

const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

/// True for storage-layer aborts that are safe to retry wholesale.
pub fn is_serialization_failure(err: &EngineError) -> bool {
    let EngineError::Database(sqlx::Error::Database(db_err)) = err else {
        return false;
    };
    matches!(
        db_err.code().as_deref(),
        Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED)
    )
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Jitter factor in `0.0..=1.0`; spreads concurrent retriers apart.
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(20),
            max_delay: Duration::from_secs(1),
            multiplier: 2.0,
            jitter: 0.5,
        }
    }
}

impl RetryConfig {
    fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64());
        let jittered = if self.jitter > 0.0 {
            let spread = capped * self.jitter;
            rand::thread_rng().gen_range((capped - spread)..=(capped + spread))
        } else {
            capped
        };
        Duration::from_secs_f64(jittered.max(0.0))
    }
}

/// Runs `op` until it succeeds, fails with a non-transient error, or the
/// retry budget is exhausted. `op` must open its own transaction so every
/// attempt starts from fresh state.
pub async fn with_txn_retry<T, F, Fut>(config: &RetryConfig, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if is_serialization_failure(&err) && attempt < config.max_retries => {
                let delay = config.delay_for(attempt);
                attempt += 1;
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "serialization conflict, retrying transaction"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn business_errors_are_not_transient() {
        assert!(!is_serialization_failure(&EngineError::Conflict("x".into())));
        assert!(!is_serialization_failure(&EngineError::Database(
            sqlx::Error::RowNotFound
        )));
    }

    #[test]
    fn delays_grow_and_stay_capped() {
        let config = RetryConfig {
            jitter: 0.0,
            ..RetryConfig::default()
        };
        assert!(config.delay_for(1) > config.delay_for(0));
        assert!(config.delay_for(30) <= config.max_delay);
    }

    #[tokio::test]
    async fn non_transient_errors_fail_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_txn_retry(&RetryConfig::default(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(EngineError::Conflict("cap exceeded".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn success_passes_through() {
        let result = with_txn_retry(&RetryConfig::default(), || async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
