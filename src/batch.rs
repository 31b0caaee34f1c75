//! Batch coordinator: runs per-item analyses over many inputs with bounded
//! concurrency, per-item failure isolation and cooperative cancellation.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

use crate::errors::{Result, VegMetricsError};

/// Cooperative cancellation flag shared between a batch run and its caller.
/// Setting it stops new items from launching; items already in flight run
/// to completion.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// A structured per-item failure: which input failed and why. The batch as a
/// whole keeps going.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub index: usize,
    pub message: String,
}

/// Outcome for one batch item. The result list holds exactly one entry per
/// input, in input order, whatever mix of outcomes occurred.
#[derive(Debug)]
pub enum ItemOutcome<R> {
    Completed(R),
    Failed(ItemFailure),
    /// The cancellation flag was set before this item launched.
    Cancelled,
}

impl<R> ItemOutcome<R> {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Options for one batch run.
pub struct BatchOptions<'a> {
    /// Upper bound on items in flight; clamped to at least 1.
    pub concurrency: usize,
    pub cancel: Option<&'a CancelToken>,
    /// Called after each item with (finished, total).
    pub on_item_done: Option<&'a (dyn Fn(usize, usize) + Sync)>,
}

impl<'a> BatchOptions<'a> {
    pub fn with_concurrency(concurrency: usize) -> Self {
        Self {
            concurrency,
            cancel: None,
            on_item_done: None,
        }
    }

    pub fn cancel_token(mut self, token: &'a CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn on_item_done(mut self, callback: &'a (dyn Fn(usize, usize) + Sync)) -> Self {
        self.on_item_done = Some(callback);
        self
    }
}

/// Run `worker` over all items on a dedicated pool of `concurrency` threads.
///
/// A worker error becomes a structured failure for that item; it never
/// aborts the batch or reorders the results.
pub fn process_batch<T, R, F>(
    items: &[T],
    worker: F,
    options: &BatchOptions,
) -> Result<Vec<ItemOutcome<R>>>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> Result<R> + Sync,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.concurrency.max(1))
        .build()
        .map_err(|e| VegMetricsError::Batch(format!("failed to build worker pool: {}", e)))?;

    let total = items.len();
    let finished = AtomicUsize::new(0);

    let outcomes = pool.install(|| {
        items
            .par_iter()
            .enumerate()
            .map(|(index, item)| {
                if options.cancel.is_some_and(|token| token.is_cancelled()) {
                    return ItemOutcome::Cancelled;
                }

                let outcome = match worker(item) {
                    Ok(result) => ItemOutcome::Completed(result),
                    Err(e) => ItemOutcome::Failed(ItemFailure {
                        index,
                        message: e.to_string(),
                    }),
                };

                let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(callback) = options.on_item_done {
                    callback(done, total);
                }

                outcome
            })
            .collect()
    });

    Ok(outcomes)
}
