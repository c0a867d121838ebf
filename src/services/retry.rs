//! Bounded retry for external service calls

use super::{ServiceError, ServiceResult};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry budget for one logical service call.
///
/// The backoff doubles after each failed attempt. `Unavailable` errors are
/// never retried.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(250),
        }
    }
}

/// Run `op` up to `policy.max_attempts` times.
///
/// Returns the first success, or the last error once the budget is spent.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> ServiceResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ServiceResult<T>>,
{
    let mut delay = policy.backoff;
    let mut last_err = ServiceError::Unavailable("retry budget of zero attempts".to_string());

    for attempt in 1..=policy.max_attempts.max(1) {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err @ ServiceError::Unavailable(_)) => return Err(err),
            Err(err) => {
                warn!(
                    "{} attempt {}/{} failed: {}",
                    label, attempt, policy.max_attempts, err
                );
                last_err = err;
                if attempt < policy.max_attempts {
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }

    Err(last_err)
}
