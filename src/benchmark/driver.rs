//! Multi-threaded load generation against a [`SearchIndex`].

use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use tracing::{debug, info};

use crate::benchmark::affinity::pin_current_thread;
use crate::benchmark::case::{Percentage, TestCase, TopK};
use crate::benchmark::report::CaseReport;
use crate::error::{Error, Result};
use crate::index::SearchIndex;
use crate::monitor::{CpuMonitor, MemoryBandwidth, ProcessMemory};
use crate::percentile::{Order, Percentile};
use crate::recall;
use crate::vecs::{VectorSet, VecsReader, Vectors};
use crate::work::{join_workers, WorkCursor};

/// Load a query set of any element type as `f32`.
pub fn load_queries(path: &Path, dimension: usize) -> Result<Vectors<f32>> {
    let set = VectorSet::load(path)?;
    if set.is_empty() {
        return Err(Error::Format(format!(
            "query file '{}' holds no vectors",
            path.display()
        )));
    }
    if set.dim() != dimension {
        return Err(Error::DimensionMismatch {
            expected: dimension,
            actual: set.dim(),
        });
    }
    Ok(set.to_f32())
}

/// Load ground truth for `count` queries, keeping the first `k1` entries of
/// each record, sorted ascending.
///
/// Records past `count` are ignored.
pub fn load_ground_truth(path: &Path, count: usize, k1: usize) -> Result<Vec<i64>> {
    let mut reader = VecsReader::<i32>::open(path)?;
    let mut truth = Vec::with_capacity(count * k1);
    let mut row = Vec::new();
    for q in 0..count {
        row.clear();
        let dim = reader.read_into(&mut row)?.ok_or_else(|| {
            Error::Format(format!(
                "ground truth '{}' holds {q} records, {count} queries need one each",
                path.display()
            ))
        })?;
        if dim < k1 {
            return Err(Error::Format(format!(
                "ground truth vector is {dim}D, less than top_k {k1}"
            )));
        }
        let start = truth.len();
        truth.extend(row[..k1].iter().map(|&v| v as i64));
        truth[start..].sort_unstable();
    }
    Ok(truth)
}

/// Run one case: `case.loops` passes over `queries`, `case.batch_size`
/// queries per search call, one worker per `case.threads` entry.
///
/// `truth` holds `top_k.k1` sorted labels per query.
pub fn run_case<I: SearchIndex + ?Sized>(
    index: &I,
    queries: &Vectors<f32>,
    truth: &[i64],
    top_k: TopK,
    case: &TestCase,
) -> Result<CaseReport> {
    case.validate()?;
    let count = queries.len();
    let dim = queries.dim();
    let batch = case.batch_size;
    let k = top_k.k2;
    if count == 0 {
        return Err(Error::Config("query set is empty".into()));
    }
    if dim != index.dimension() {
        return Err(Error::DimensionMismatch {
            expected: index.dimension(),
            actual: dim,
        });
    }
    if batch > count {
        return Err(Error::Config(format!(
            "<batch> {batch} exceeds the {count} available queries"
        )));
    }
    if truth.len() != count * top_k.k1 {
        return Err(Error::Logic(format!(
            "ground truth holds {} labels, {count} queries need {}",
            truth.len(),
            count * top_k.k1
        )));
    }
    let vcount = case
        .loops
        .checked_mul(count)
        .ok_or_else(|| Error::Config(format!("<loop> {} is too large", case.loops)))?;

    let latencies: Vec<AtomicU32> = (0..vcount).map(|_| AtomicU32::new(0)).collect();
    let labels: Vec<AtomicI64> = (0..count * k)
        .map(|_| AtomicI64::new(recall::NO_RESULT))
        .collect();
    let flat = queries.as_flat();
    let cursor = WorkCursor::new(vcount);

    let mut cpu = CpuMonitor::new(true, true);
    let mut bandwidth = MemoryBandwidth::new();
    cpu.start()?;
    bandwidth.start();
    let started = Instant::now();

    join_workers(case.threads.len(), &cursor, |worker| {
        if let Some(core) = case.threads[worker] {
            pin_current_thread(core)?;
        }
        let mut distances = vec![0f32; batch * k];
        let mut scratch = vec![recall::NO_RESULT; batch * k];

        while let Some(voffset) = cursor.claim_raw(batch) {
            let offset = voffset % count;
            let tail = batch.min(count - offset);
            let head = batch - tail;

            let t0 = Instant::now();
            index.search(
                &flat[offset * dim..(offset + tail) * dim],
                k,
                &mut distances[..tail * k],
                &mut scratch[..tail * k],
            )?;
            if head > 0 {
                index.search(
                    &flat[..head * dim],
                    k,
                    &mut distances[tail * k..],
                    &mut scratch[tail * k..],
                )?;
            }
            let micros = u32::try_from(t0.elapsed().as_micros()).unwrap_or(u32::MAX);

            for slot in &latencies[voffset..vcount.min(voffset + batch)] {
                slot.store(micros, Ordering::Relaxed);
            }
            for (slot, &label) in labels[offset * k..(offset + tail) * k]
                .iter()
                .zip(&scratch[..tail * k])
            {
                slot.store(label, Ordering::Relaxed);
            }
            for (slot, &label) in labels[..head * k].iter().zip(&scratch[tail * k..]) {
                slot.store(label, Ordering::Relaxed);
            }
        }
        Ok(())
    })?;

    let wall = started.elapsed();
    let cpu_util = cpu.end()?;
    let (mem_read_bw, mem_write_bw) = bandwidth.end();

    let mut latency = Percentile::new(Order::LowerIsBetter);
    let collected: Vec<u32> = latencies.into_iter().map(AtomicU32::into_inner).collect();
    latency.add_slice(&collected);

    let labels: Vec<i64> = labels.into_iter().map(AtomicI64::into_inner).collect();
    let rates = Mutex::new(Percentile::new(Order::HigherIsBetter));
    let workers = std::thread::available_parallelism().map_or(1, |n| n.get());
    recall::evaluate(&labels, truth, top_k.k1, k, workers, &rates)?;
    let recall = rates.into_inner().unwrap_or_else(|e| e.into_inner());

    let qps = vcount as f64 / wall.as_secs_f64();
    debug!(
        case = %case,
        queries = vcount,
        wall_ms = wall.as_secs_f64() * 1e3,
        qps,
        resident_bytes = ProcessMemory::sample().map(|m| m.resident_bytes),
        "case finished"
    );

    Ok(CaseReport {
        qps,
        cpu_util,
        mem_read_bw,
        mem_write_bw,
        latency,
        recall,
    })
}

/// One index, one query set, one ground truth; any number of cases.
pub struct Benchmark<I> {
    index: I,
    queries: Vectors<f32>,
    truth: Vec<i64>,
    top_k: TopK,
}

impl<I: SearchIndex> Benchmark<I> {
    /// Check shapes up front so every case can run.
    pub fn new(index: I, queries: Vectors<f32>, truth: Vec<i64>, top_k: TopK) -> Result<Self> {
        if queries.dim() != index.dimension() {
            return Err(Error::DimensionMismatch {
                expected: index.dimension(),
                actual: queries.dim(),
            });
        }
        if truth.len() != queries.len() * top_k.k1 {
            return Err(Error::Logic(format!(
                "ground truth holds {} labels, {} queries need {}",
                truth.len(),
                queries.len(),
                queries.len() * top_k.k1
            )));
        }
        Ok(Self {
            index,
            queries,
            truth,
            top_k,
        })
    }

    /// Load queries and ground truth from vector files.
    pub fn load(index: I, query_path: &Path, truth_path: &Path, top_k: TopK) -> Result<Self> {
        let queries = load_queries(query_path, index.dimension())?;
        let truth = load_ground_truth(truth_path, queries.len(), top_k.k1)?;
        info!(
            queries = queries.len(),
            dim = queries.dim(),
            top_k = %top_k,
            "benchmark inputs loaded"
        );
        Self::new(index, queries, truth, top_k)
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    pub fn queries(&self) -> &Vectors<f32> {
        &self.queries
    }

    /// Apply the case's tuning string, then run it.
    pub fn run(&mut self, case: &TestCase) -> Result<CaseReport> {
        case.validate()?;
        self.index.set_parameters(&case.parameters)?;
        run_case(&self.index, &self.queries, &self.truth, self.top_k, case)
    }

    /// Run every case in order, writing each report before starting the
    /// next. The first failing case stops the run.
    pub fn run_all<W: Write + ?Sized>(
        &mut self,
        cases: &[TestCase],
        percentages: &[Percentage],
        out: &mut W,
    ) -> Result<()> {
        for case in cases {
            info!(case = %case, "running case");
            let mut report = self.run(case)?;
            report.write_to(percentages, out)?;
            out.flush()?;
        }
        Ok(())
    }
}
