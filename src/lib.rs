//! annbench: measure approximate nearest neighbor indexes against exact
//! answers.
//!
//! The crate has three jobs:
//!
//! - `groundtruth`: exact top-N neighbors by brute force over a corpus file,
//!   written as `.ivecs` for later scoring
//! - `benchmark`: a multi-threaded load generator that drives a
//!   [`SearchIndex`] through test cases and reports throughput, latency
//!   percentiles, CPU utilization and recall percentiles
//! - `dataset`: random vector files and random subsets for preparing inputs
//!
//! Vector files use the `.bvecs` / `.ivecs` / `.fvecs` layout (see [`vecs`]),
//! optionally gzip-compressed.
//!
//! # Recall
//!
//! Recall is scored as `k1@k2`: the fraction of the first `k1` true
//! neighbors found among the `k2` results the index returned. A plain `k`
//! means `k@k`.
//!
//! # Threads
//!
//! Every parallel phase uses a fixed set of scoped OS threads pulling
//! contiguous blocks from one atomic cursor ([`work`]). Output positions
//! come from the claimed offsets, so results never depend on scheduling.

pub mod benchmark;
pub mod cli;
pub mod dataset;
pub mod distance;
pub mod error;
pub mod groundtruth;
pub mod index;
pub mod monitor;
pub mod percentile;
pub mod recall;
pub mod vecs;
pub mod work;

// Re-exports
pub use distance::Metric;
pub use error::{Error, Result};
pub use index::{FlatIndex, SearchIndex};
pub use percentile::{Order, Percentile};
pub use vecs::{ElementType, Vectors};
