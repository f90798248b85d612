//! Recall evaluation against exact ground truth.
//!
//! recall = |approx ∩ truth| / |truth|
//!
//! Ground-truth rows are stored sorted ascending and duplicate-free, so a
//! query is scored by sorting its approximate labels and walking both arrays
//! once. Sentinel labels (`-1` for "no result") never equal a valid index, so
//! short result lists are scored correctly without special casing.

use std::sync::Mutex;

use tracing::debug;

use crate::error::{Error, Result};
use crate::percentile::Percentile;
use crate::work::for_each_range;

/// Label value an index uses for an empty result slot.
pub const NO_RESULT: i64 = -1;

/// Score one query.
///
/// `approx` is sorted in place. `truth` must be sorted ascending without
/// duplicates. Returns `hits / truth.len()`, or `0.0` for empty truth.
pub fn recall(approx: &mut [i64], truth: &[i64]) -> f32 {
    if truth.is_empty() {
        return 0.0;
    }
    approx.sort_unstable();
    count_hits(approx, truth) as f32 / truth.len() as f32
}

/// Two-pointer intersection count of two ascending arrays.
///
/// Equal values advance both sides, so duplicates in `approx` are counted at
/// most once per ground-truth entry.
pub fn count_hits(approx: &[i64], truth: &[i64]) -> usize {
    let (mut ia, mut it, mut hits) = (0, 0, 0);
    while ia < approx.len() && it < truth.len() {
        match approx[ia].cmp(&truth[it]) {
            std::cmp::Ordering::Less => ia += 1,
            std::cmp::Ordering::Greater => it += 1,
            std::cmp::Ordering::Equal => {
                ia += 1;
                it += 1;
                hits += 1;
            }
        }
    }
    hits
}

/// Score every query and append each recall to `rates`.
///
/// `labels` holds `k2` results per query, `truth` holds `k1` sorted entries
/// per query. Queries are spread over `workers` threads one at a time; the
/// mutex is held only for the append.
pub fn evaluate(
    labels: &[i64],
    truth: &[i64],
    k1: usize,
    k2: usize,
    workers: usize,
    rates: &Mutex<Percentile<f32>>,
) -> Result<()> {
    if k1 == 0 || k2 == 0 {
        return Err(Error::Config("<top_k = 0> is invalid".into()));
    }
    let count = truth.len() / k1;
    if truth.len() != count * k1 || labels.len() != count * k2 {
        return Err(Error::Logic(format!(
            "label buffer holds {} entries, ground truth {}, expected {} queries of {}@{}",
            labels.len(),
            truth.len(),
            count,
            k1,
            k2
        )));
    }

    for_each_range(workers, count, 1, |range| {
        let mut scratch = Vec::with_capacity(k2);
        for q in range {
            scratch.clear();
            scratch.extend_from_slice(&labels[q * k2..(q + 1) * k2]);
            let rate = recall(&mut scratch, &truth[q * k1..(q + 1) * k1]);
            rates.lock().unwrap_or_else(|e| e.into_inner()).add(rate);
        }
        Ok(())
    })?;

    debug!(queries = count, k1, k2, "recall evaluated");
    Ok(())
}
