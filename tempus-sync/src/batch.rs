//! Chunked runner for bulk destructive operations.
//!
//! Large delete/update sets hammer the upstream service if fired at once;
//! this runner partitions them into fixed-size batches, runs a batch
//! concurrently, and pauses between batches. Joins are settle-all: one
//! item's failure never aborts its batch or the batches after it.

use std::future::Future;
use std::time::Duration;

use futures::future::join_all;

use crate::domain::models::Progress;
use crate::domain::SyncError;

#[derive(Debug, Clone, Copy)]
pub struct BatchPolicy {
    pub batch_size: usize,
    pub delay: Duration,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            batch_size: 5,
            delay: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug)]
pub struct BatchFailure<T> {
    pub item: T,
    pub error: SyncError,
}

/// Partial results are data, not exceptions: every input item lands in
/// exactly one of the three buckets.
#[derive(Debug)]
pub struct BatchOutcome<T> {
    pub succeeded: Vec<T>,
    pub failed: Vec<BatchFailure<T>>,
    /// Items whose failure is permanent by construction (the object is not
    /// under the claimed parent scope); retrying or alarming is pointless.
    pub skipped: Vec<T>,
}

impl<T> Default for BatchOutcome<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

impl<T> BatchOutcome<T> {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.skipped.len()
    }
}

/// Run `op` over `items` in batches of `policy.batch_size`, sleeping
/// `policy.delay` between batches. `on_progress` fires after each batch.
pub async fn run_batched<T, F, Fut>(
    items: Vec<T>,
    policy: BatchPolicy,
    op: F,
    mut on_progress: Option<&mut (dyn FnMut(Progress) + Send)>,
) -> BatchOutcome<T>
where
    T: Clone,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<(), SyncError>>,
{
    let batch_size = policy.batch_size.max(1);
    let total = items.len();
    let mut outcome = BatchOutcome::default();

    for (batch_index, batch) in items.chunks(batch_size).enumerate() {
        if batch_index > 0 {
            tokio::time::sleep(policy.delay).await;
        }

        let results = join_all(batch.iter().cloned().map(|item| {
            let fut = op(item.clone());
            async move { (item, fut.await) }
        }))
        .await;

        let mut last_error = None;
        for (item, result) in results {
            match result {
                Ok(()) => outcome.succeeded.push(item),
                Err(error) if error.is_scope_mismatch() => {
                    tracing::warn!("skipping out-of-scope item: {}", error);
                    outcome.skipped.push(item);
                }
                Err(error) => {
                    tracing::warn!("batch item failed: {}", error);
                    last_error = Some(error.to_string());
                    outcome.failed.push(BatchFailure { item, error });
                }
            }
        }

        if let Some(cb) = on_progress.as_deref_mut() {
            cb(Progress {
                completed: outcome.total(),
                total,
                last_error,
            });
        }
    }

    outcome
}
