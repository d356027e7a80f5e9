//! Concurrency-limited scheduler.
//!
//! Runs a per-item async function over an ordered list with at most `limit`
//! calls in flight. Results come back in input order no matter which item
//! finishes first, and a failing or panicking item only settles its own slot.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{watch, Semaphore};
use tracing::{debug, warn};

/// The settled outcome of one scheduled item.
#[derive(Debug, Clone, PartialEq)]
pub enum Settled<T> {
    /// The item's function returned `Ok`.
    Completed(T),
    /// The item's function returned `Err` or panicked.
    Failed(String),
    /// The run was cancelled before the item settled.
    Cancelled,
}

impl<T> Settled<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, Settled::Completed(_))
    }
}

/// Resolves once `cancel` flips to `true`; never resolves if the sender is
/// dropped without cancelling.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let sender_gone = cancel.wait_for(|flag| *flag).await.is_err();
    if sender_gone {
        std::future::pending::<()>().await;
    }
}

fn panic_message(err: tokio::task::JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panicked: {msg}")
    } else {
        "panicked".to_string()
    }
}

/// Run `f(index, item)` for every item with at most `limit` calls in flight.
///
/// - `limit` is clamped to at least 1; `limit >= items.len()` is full fan-out.
/// - `output[i]` is the settled outcome of `items[i]`.
/// - Flipping `cancel` to `true` drops in-flight calls and settles every
///   unfinished slot as [`Settled::Cancelled`]; finished slots are kept.
pub async fn run_bounded<I, T, E, F, Fut>(
    items: Vec<I>,
    limit: usize,
    cancel: watch::Receiver<bool>,
    f: F,
) -> Vec<Settled<T>>
where
    I: Send + 'static,
    T: Send + 'static,
    E: Display + Send + 'static,
    F: Fn(usize, I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    if items.is_empty() {
        return Vec::new();
    }

    let limit = limit.max(1);
    debug!(items = items.len(), limit, "scheduling items");

    let f = Arc::new(f);
    let sem = Arc::new(Semaphore::new(limit));
    let mut handles = Vec::with_capacity(items.len());

    for (index, item) in items.into_iter().enumerate() {
        let f = Arc::clone(&f);
        let sem = Arc::clone(&sem);
        let mut cancel = cancel.clone();

        handles.push(tokio::spawn(async move {
            let _permit = tokio::select! {
                biased;
                _ = cancelled(&mut cancel) => return Settled::Cancelled,
                permit = sem.acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(e) => return Settled::Failed(e.to_string()),
                },
            };

            tokio::select! {
                biased;
                _ = cancelled(&mut cancel) => Settled::Cancelled,
                outcome = f(index, item) => match outcome {
                    Ok(value) => Settled::Completed(value),
                    Err(e) => Settled::Failed(e.to_string()),
                },
            }
        }));
    }

    let mut settled = Vec::with_capacity(handles.len());
    for (index, handle) in handles.into_iter().enumerate() {
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                let msg = panic_message(e);
                warn!(index, error = %msg, "scheduled item did not complete");
                Settled::Failed(msg)
            }
        };
        settled.push(outcome);
    }
    settled
}
