//! Error types for annbench.

use thiserror::Error;

/// Errors that can occur while building ground truth or running benchmarks.
///
/// Every variant is fatal for the operation that produced it; nothing in this
/// crate retries.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration (zero counts, malformed numbers, bad CPU lists).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Malformed vector file (truncated record, unsupported layout).
    #[error("format error: {0}")]
    Format(String),

    /// Vector dimension differs from the dimension fixed for its set.
    #[error("dimension mismatch: expected {expected} dimensions, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Environment failure (CPU affinity, `/proc` counters).
    #[error("resource error: {0}")]
    Resource(String),

    /// I/O error (file open, read, write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Arguments that are individually valid but inconsistent with the data.
    #[error("{0}")]
    Logic(String),

    /// Percentile query on an empty sample set.
    #[error("no data to profile")]
    NoSamples,

    /// Percentage outside `[0, 100]`.
    #[error("percentage {0} should be within [0.0, 100.0]")]
    InvalidPercentage(f64),

    /// Failure reported by a search index.
    #[error("index error: {0}")]
    Index(String),
}

/// Result type for annbench operations.
pub type Result<T> = std::result::Result<T, Error>;
