//! Claim-based work distribution over a fixed number of units.
//!
//! A single atomic cursor hands out contiguous blocks of units to whichever
//! worker asks next. Fast workers simply claim more blocks, so uneven query
//! costs balance out without a scheduler.
//!
//! ```rust
//! use annbench::work::{for_each_range, WorkCursor};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let processed = AtomicUsize::new(0);
//! for_each_range(4, 1000, 7, |range| {
//!     processed.fetch_add(range.len(), Ordering::Relaxed);
//!     Ok(())
//! })
//! .unwrap();
//! assert_eq!(processed.into_inner(), 1000);
//!
//! let cursor = WorkCursor::new(10);
//! assert_eq!(cursor.claim(4), Some(0..4));
//! ```

use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;

use crate::error::{Error, Result};

/// Shared cursor over `[0, units)`.
///
/// `claim` is a single `fetch_add`; no lock is taken on the claim path.
#[derive(Debug)]
pub struct WorkCursor {
    next: AtomicUsize,
    units: usize,
    aborted: AtomicBool,
}

impl WorkCursor {
    /// Create a cursor over `units` units.
    pub fn new(units: usize) -> Self {
        Self {
            next: AtomicUsize::new(0),
            units,
            aborted: AtomicBool::new(false),
        }
    }

    /// Total number of units.
    pub fn units(&self) -> usize {
        self.units
    }

    /// Claim the next block of `batch` units and return its start offset.
    ///
    /// The block may extend past `units`; callers that need the clipped range
    /// should use [`WorkCursor::claim`]. Returns `None` once the cursor is
    /// exhausted or the run was aborted.
    pub fn claim_raw(&self, batch: usize) -> Option<usize> {
        if self.aborted.load(Ordering::Relaxed) {
            return None;
        }
        let start = self.next.fetch_add(batch, Ordering::Relaxed);
        (start < self.units).then_some(start)
    }

    /// Claim the next block of at most `batch` units.
    pub fn claim(&self, batch: usize) -> Option<Range<usize>> {
        self.claim_raw(batch)
            .map(|start| start..start.saturating_add(batch).min(self.units))
    }

    /// Stop handing out work. Blocks already claimed are unaffected.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Relaxed);
    }

    /// Whether [`WorkCursor::abort`] was called.
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Relaxed)
    }
}

/// Run `body(worker)` on `workers` scoped OS threads and join them all.
///
/// When a worker fails, the cursor is aborted so the others stop at their
/// next claim. After every thread has joined, the first error observed is
/// returned; otherwise the per-worker outputs are returned in worker order.
pub fn join_workers<T, F>(workers: usize, cursor: &WorkCursor, body: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(usize) -> Result<T> + Sync,
{
    if workers == 0 {
        return Err(Error::Config("<thread_count = 0> is invalid".into()));
    }

    let first_error: Mutex<Option<Error>> = Mutex::new(None);
    let record = |err: Error| {
        cursor.abort();
        let mut slot = first_error.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_none() {
            *slot = Some(err);
        }
    };

    let outputs: Vec<Option<T>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                let body = &body;
                let record = &record;
                scope.spawn(move || match body(worker) {
                    Ok(value) => Some(value),
                    Err(err) => {
                        record(err);
                        None
                    }
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(output) => output,
                Err(_) => {
                    record(Error::Resource("worker thread panicked".into()));
                    None
                }
            })
            .collect()
    });

    if let Some(err) = first_error.into_inner().unwrap_or_else(|e| e.into_inner()) {
        return Err(err);
    }
    Ok(outputs.into_iter().flatten().collect())
}

/// Process `[0, units)` in blocks of `batch` on `workers` threads.
pub fn for_each_range<F>(workers: usize, units: usize, batch: usize, task: F) -> Result<()>
where
    F: Fn(Range<usize>) -> Result<()> + Sync,
{
    if batch == 0 {
        return Err(Error::Config("<batch_size = 0> is invalid".into()));
    }
    let cursor = WorkCursor::new(units);
    join_workers(workers, &cursor, |_| {
        while let Some(range) = cursor.claim(batch) {
            task(range)?;
        }
        Ok(())
    })?;
    Ok(())
}
