//! Fail-open utilities for background work
//!
//! Background tasks (watchers, keep-alive pingers, snapshot polling) must never
//! take the orchestrator down with them. Their failures are logged and
//! swallowed here.
//!
//! DO NOT use fail-open for:
//! - Reconciliation passes (a failed spawn aborts the pass)
//! - Configuration loading

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::Result;

/// Run an operation whose failure should be logged rather than propagated
///
/// Logs the error via `tracing::warn!` on failure and returns `None`.
///
/// ```no_run
/// use weft_core::fail_open::fail_open;
/// use weft_core::Result;
///
/// async fn watch_widgets() -> Result<()> {
///     Ok(())
/// }
///
/// async fn example() {
///     let outcome = fail_open("watcher for widgets.v1@default", || watch_widgets()).await;
///     assert!(outcome.is_some());
/// }
/// ```
pub async fn fail_open<F, Fut, T>(operation_name: &str, f: F) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match f().await {
        Ok(val) => Some(val),
        Err(e) => {
            warn!("{} failed (fail-open): {}", operation_name, e);
            None
        }
    }
}

/// Like [`fail_open`] but retries with a linear backoff
///
/// The delay before attempt `n + 1` is `100ms * n`.
pub async fn fail_open_with_retries<F, Fut, T>(
    operation_name: &str,
    mut f: F,
    max_retries: usize,
) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    for attempt in 1..=max_retries {
        match f().await {
            Ok(val) => return Some(val),
            Err(e) if attempt == max_retries => {
                warn!(
                    "{} failed after {} retries (fail-open): {}",
                    operation_name, max_retries, e
                );
            }
            Err(e) => {
                warn!(
                    "{} failed (attempt {}/{}): {}",
                    operation_name, attempt, max_retries, e
                );
                tokio::time::sleep(Duration::from_millis(100 * attempt as u64)).await;
            }
        }
    }
    None
}
