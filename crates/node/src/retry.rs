//! Retry with a fixed delay
//!
//! Startup dependencies that may be briefly unreachable are retried forever,
//! five seconds apart. Only cancellation ends the loop without a value.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Delay between attempts
pub const RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetryError {
    #[error("cancelled while trying to {0}")]
    Cancelled(&'static str),
}

/// Run `attempt` until it succeeds or `cancel` fires
///
/// `action` names the operation and `params` describes what it was given;
/// both appear in the warning logged for every failed attempt.
pub async fn retry_until_ready<T, E, F, Fut>(
    cancel: &CancellationToken,
    action: &'static str,
    params: &str,
    delay: Duration,
    mut attempt: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempts: u64 = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled(action));
        }

        attempts += 1;
        match attempt().await {
            Ok(value) => {
                if attempts > 1 {
                    tracing::info!(attempts, "{} succeeded", action);
                }
                return Ok(value);
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    params,
                    attempts,
                    "failed to {}, waiting and retrying",
                    action
                );
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(RetryError::Cancelled(action)),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
