//! Concurrent benchmark driver.
//!
//! A run takes one index, one query set and its ground truth, and a list of
//! test cases. Each case fixes the loop count L, batch size B and the worker
//! threads (optionally pinned to CPUs), and produces a [`CaseReport`]:
//!
//! - **Throughput**: logical queries (L x query count) per wall-clock second
//! - **Latency**: microseconds per search call, charged to every query of the
//!   batch
//! - **Recall**: `k1@k2` against the ground truth, per query
//! - **Resources**: CPU utilization, memory bandwidth (NaN when unavailable)
//!
//! Case syntax: `[params]/<loop>x<batch>x<threads>[:<cpu,...>]`, several
//! cases joined by `;`.

pub mod affinity;
pub mod case;
pub mod driver;
pub mod report;

pub use affinity::pin_current_thread;
pub use case::{parse_cases, parse_percentages, Percentage, TestCase, TopK};
pub use driver::{load_ground_truth, load_queries, run_case, Benchmark};
pub use report::CaseReport;
