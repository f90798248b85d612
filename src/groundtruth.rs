//! Exact k-nearest-neighbor ground truth by brute force.
//!
//! For each query the whole corpus is scanned once while a bounded max-heap
//! keeps the `top_n` closest candidates seen so far. When the heap is full a
//! new candidate only enters by displacing the current farthest one.
//!
//! Output rows hold corpus indices sorted **ascending by index**, not by
//! distance. The recall evaluator relies on that order for its linear merge.
//!
//! Queries are processed in windows of `workers * window_factor` so query
//! files of any size stream through with bounded memory. Only the corpus is
//! held in memory, once, in file order.
//!
//! # Example
//!
//! ```rust
//! use annbench::distance::Metric;
//! use annbench::groundtruth::generate;
//! use annbench::vecs::{VectorSet, Vectors};
//!
//! let corpus = VectorSet::F32(
//!     Vectors::from_rows(&[vec![0.0f32, 0.0], vec![5.0, 5.0], vec![1.0, 0.0]]).unwrap(),
//! );
//! let queries = Vectors::from_rows(&[vec![0.1f32, 0.0]]).unwrap();
//! let gt = generate(&corpus, &queries, Metric::SquaredL2, 2, 1).unwrap();
//! assert_eq!(gt, vec![vec![0, 2]]);
//! ```

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::path::Path;
use std::time::Instant;

use tracing::{debug, info};

use crate::distance::{Kernel, Metric};
use crate::error::{Error, Result};
use crate::vecs::{Element, ElementType, FileKind, VectorSet, VectorSource, Vectors, VecsWriter};
use crate::work::{join_workers, WorkCursor};

/// Queries buffered per worker in one window.
pub const DEFAULT_WINDOW_FACTOR: usize = 1000;

/// Settings for file-to-file ground-truth generation.
#[derive(Debug, Clone)]
pub struct GroundTruthConfig {
    /// Worker threads.
    pub workers: usize,
    /// Queries buffered per worker and window.
    pub window_factor: usize,
}

impl Default for GroundTruthConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            window_factor: DEFAULT_WINDOW_FACTOR,
        }
    }
}

/// Summary of a file-to-file run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroundTruthStats {
    pub corpus: usize,
    pub queries: usize,
    pub windows: usize,
}

/// Heap entry ordered by distance, then by corpus index.
///
/// Breaking ties on the index makes the selected set independent of scan
/// interleaving: among equidistant candidates the lower index wins.
#[derive(Clone, Copy, Debug)]
struct Candidate {
    distance: f64,
    index: u32,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: the farthest candidate sits on top.
        self.distance
            .total_cmp(&other.distance)
            .then(self.index.cmp(&other.index))
    }
}

/// Fixed-capacity selection of the `capacity` smallest `(distance, index)`.
#[derive(Debug, Clone)]
pub struct TopN {
    capacity: usize,
    heap: BinaryHeap<Candidate>,
}

impl TopN {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity + 1),
        }
    }

    /// Offer a candidate.
    #[inline]
    pub fn push(&mut self, index: u32, distance: f64) {
        let candidate = Candidate { distance, index };
        if self.heap.len() < self.capacity {
            self.heap.push(candidate);
        } else if let Some(mut farthest) = self.heap.peek_mut() {
            if candidate < *farthest {
                *farthest = candidate;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drain into corpus indices sorted ascending.
    pub fn into_sorted_indices(self) -> Vec<u32> {
        let mut indices: Vec<u32> = self.heap.into_vec().into_iter().map(|c| c.index).collect();
        indices.sort_unstable();
        indices
    }

    /// Drain into `(index, distance)` pairs, closest first.
    pub fn into_sorted_by_distance(self) -> Vec<(u32, f64)> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|c| (c.index, c.distance))
            .collect()
    }
}

/// Top-`top_n` corpus indices for one widened query, ascending by index.
pub fn select_top_n<E: Element>(
    corpus: &Vectors<E>,
    query: &[f64],
    kernel: Kernel<E>,
    top_n: usize,
) -> Result<Vec<i32>> {
    if query.len() != corpus.dim() {
        return Err(Error::DimensionMismatch {
            expected: corpus.dim(),
            actual: query.len(),
        });
    }
    let mut tops = TopN::new(top_n);
    for (i, row) in corpus.rows().enumerate() {
        tops.push(i as u32, kernel(row, query));
    }
    Ok(tops
        .into_sorted_indices()
        .into_iter()
        .map(|i| i as i32)
        .collect())
}

/// Reject arguments that cannot produce `top_n` valid `i32` indices.
fn validate(corpus: &VectorSet, top_n: usize) -> Result<()> {
    if top_n == 0 {
        return Err(Error::Config("<top_n = 0> is invalid".into()));
    }
    if top_n > corpus.len() {
        return Err(Error::Logic(format!(
            "argument <top_n = {}> is larger than vector count {}",
            top_n,
            corpus.len()
        )));
    }
    if corpus.len() > i32::MAX as usize + 1 {
        return Err(Error::Logic(format!(
            "corpus of {} vectors cannot be indexed by .ivecs entries",
            corpus.len()
        )));
    }
    Ok(())
}

/// Ground truth for a window of flat, widened queries.
fn scan_window(
    corpus: &VectorSet,
    queries: &[f64],
    metric: Metric,
    top_n: usize,
    workers: usize,
) -> Result<Vec<Vec<i32>>> {
    match corpus {
        VectorSet::U8(c) => scan(c, queries, metric.kernel(), top_n, workers),
        VectorSet::I32(c) => scan(c, queries, metric.kernel(), top_n, workers),
        VectorSet::F32(c) => scan(c, queries, metric.kernel(), top_n, workers),
    }
}

fn scan<E: Element>(
    corpus: &Vectors<E>,
    queries: &[f64],
    kernel: Kernel<E>,
    top_n: usize,
    workers: usize,
) -> Result<Vec<Vec<i32>>> {
    let dim = corpus.dim();
    let count = queries.len() / dim;
    let cursor = WorkCursor::new(count);

    let parts = join_workers(workers, &cursor, |_| {
        let mut local = Vec::new();
        while let Some(range) = cursor.claim(1) {
            for q in range {
                let gt = select_top_n(corpus, &queries[q * dim..(q + 1) * dim], kernel, top_n)?;
                local.push((q, gt));
            }
        }
        Ok(local)
    })?;

    let mut out = vec![Vec::new(); count];
    for (q, gt) in parts.into_iter().flatten() {
        out[q] = gt;
    }
    Ok(out)
}

/// Ground truth for an in-memory query set.
///
/// Returns one row of `top_n` ascending corpus indices per query.
pub fn generate<Q: Element>(
    corpus: &VectorSet,
    queries: &Vectors<Q>,
    metric: Metric,
    top_n: usize,
    workers: usize,
) -> Result<Vec<Vec<i32>>> {
    validate(corpus, top_n)?;
    if queries.is_empty() {
        return Ok(Vec::new());
    }
    if queries.dim() != corpus.dim() {
        return Err(Error::DimensionMismatch {
            expected: corpus.dim(),
            actual: queries.dim(),
        });
    }
    let wide: Vec<f64> = queries.as_flat().iter().map(|&v| v.to_f64()).collect();
    scan_window(corpus, &wide, metric, top_n, workers)
}

/// Compute ground truth from vector files and write it as `.ivecs`.
///
/// The corpus is loaded once; queries stream through in windows. The output
/// file is created only after every argument has been validated.
pub fn generate_files(
    gt_path: &Path,
    base_path: &Path,
    query_path: &Path,
    metric: Metric,
    top_n: usize,
    config: &GroundTruthConfig,
) -> Result<GroundTruthStats> {
    if config.workers == 0 {
        return Err(Error::Config("<thread_count = 0> is invalid".into()));
    }
    if config.window_factor == 0 {
        return Err(Error::Config("<window_factor = 0> is invalid".into()));
    }
    if FileKind::from_path(gt_path)?.element != ElementType::I32 {
        return Err(Error::Config(format!(
            "groundtruth output '{}' must be .ivecs or .ivecs.gz",
            gt_path.display()
        )));
    }

    let start = Instant::now();
    let corpus = VectorSet::load(base_path)?;
    validate(&corpus, top_n)?;
    info!(
        corpus = corpus.len(),
        dim = corpus.dim(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "corpus loaded"
    );

    let dim = corpus.dim();
    let window = config.workers.saturating_mul(config.window_factor);
    let mut source = VectorSource::open(query_path)?;
    let mut writer: VecsWriter<i32> = VecsWriter::create(gt_path)?;
    let mut buffer: Vec<f64> = Vec::with_capacity(window.min(1 << 16) * dim);
    let mut stats = GroundTruthStats {
        corpus: corpus.len(),
        queries: 0,
        windows: 0,
    };

    loop {
        buffer.clear();
        let mut taken = 0;
        while taken < window {
            let before = buffer.len();
            match source.read_f64(&mut buffer)? {
                None => break,
                Some(d) if d != dim => {
                    debug!(record = source.records() - 1, "query dimension mismatch");
                    return Err(Error::DimensionMismatch {
                        expected: dim,
                        actual: d,
                    });
                }
                Some(_) => {
                    debug_assert_eq!(buffer.len() - before, dim);
                    taken += 1;
                }
            }
        }
        if taken == 0 {
            break;
        }

        let gts = scan_window(&corpus, &buffer, metric, top_n, config.workers)?;
        for gt in &gts {
            writer.write(gt)?;
        }
        stats.queries += taken;
        stats.windows += 1;
        debug!(window = stats.windows, queries = stats.queries, "window written");
    }
    writer.finish()?;

    info!(
        queries = stats.queries,
        windows = stats.windows,
        %metric,
        top_n,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "groundtruth written"
    );
    Ok(stats)
}
