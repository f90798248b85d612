//! Search-index boundary used by the benchmark driver.
//!
//! The driver treats an index as a black box: it knows the dimension, can
//! forward an opaque tuning string, and can issue batched searches that fill
//! caller-owned distance and label buffers. [`FlatIndex`] is the exact
//! brute-force reference implementation; approximate indexes plug in through
//! the same [`SearchIndex`] trait.

use std::path::Path;

use tracing::debug;

use crate::distance::Metric;
use crate::error::{Error, Result};
use crate::groundtruth::TopN;
use crate::recall::NO_RESULT;
use crate::vecs::{VectorSet, Vectors};

/// Batched k-NN search over a fixed-dimension `f32` index.
///
/// Implementations must be safe to search from many threads at once;
/// `search` takes `&self`.
pub trait SearchIndex: Send + Sync {
    /// Vector dimension.
    fn dimension(&self) -> usize;

    /// Number of indexed vectors.
    fn num_vectors(&self) -> usize;

    /// Train on `vectors` (flat, row-major).
    fn train(&mut self, vectors: &[f32]) -> Result<()>;

    /// Add `vectors` (flat, row-major). Labels are assigned sequentially.
    fn add(&mut self, vectors: &[f32]) -> Result<()>;

    /// Search every query in `queries` (flat, row-major) for `k` neighbors.
    ///
    /// `distances` and `labels` hold `k` slots per query. Unfilled slots
    /// carry label [`NO_RESULT`].
    fn search(
        &self,
        queries: &[f32],
        k: usize,
        distances: &mut [f32],
        labels: &mut [i64],
    ) -> Result<()>;

    /// Apply a tuning string such as `"nprobe=32"`.
    fn set_parameters(&mut self, parameters: &str) -> Result<()>;
}

/// Exact index: scans every stored vector for every query.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimension: usize,
    metric: Metric,
    vectors: Vec<f32>,
}

impl FlatIndex {
    /// Empty index.
    pub fn new(dimension: usize, metric: Metric) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::Config("index dimension must be positive".into()));
        }
        Ok(Self {
            dimension,
            metric,
            vectors: Vec::new(),
        })
    }

    /// Index over an existing vector set.
    pub fn from_vectors(vectors: &Vectors<f32>, metric: Metric) -> Result<Self> {
        let mut index = Self::new(vectors.dim(), metric)?;
        index.add(vectors.as_flat())?;
        Ok(index)
    }

    /// Load stored vectors from any `.bvecs/.ivecs/.fvecs(.gz)` file.
    pub fn load(path: &Path, metric: Metric) -> Result<Self> {
        let set = VectorSet::load(path)?;
        if set.is_empty() {
            return Err(Error::Format(format!(
                "index file '{}' holds no vectors",
                path.display()
            )));
        }
        let index = Self::from_vectors(&set.to_f32(), metric)?;
        debug!(
            path = %path.display(),
            vectors = index.num_vectors(),
            dim = index.dimension,
            "flat index loaded"
        );
        Ok(index)
    }

    /// Store the indexed vectors; the extension picks the element type.
    pub fn save(&self, path: &Path) -> Result<()> {
        Vectors::from_flat(self.dimension, self.vectors.clone())?.save(path)
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    fn check_rows(&self, data: &[f32]) -> Result<usize> {
        if data.len() % self.dimension != 0 {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: data.len() % self.dimension,
            });
        }
        Ok(data.len() / self.dimension)
    }
}

impl SearchIndex for FlatIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn num_vectors(&self) -> usize {
        self.vectors.len() / self.dimension
    }

    fn train(&mut self, vectors: &[f32]) -> Result<()> {
        // Nothing to learn for exact search.
        self.check_rows(vectors).map(|_| ())
    }

    fn add(&mut self, vectors: &[f32]) -> Result<()> {
        self.check_rows(vectors)?;
        self.vectors.extend_from_slice(vectors);
        Ok(())
    }

    fn search(
        &self,
        queries: &[f32],
        k: usize,
        distances: &mut [f32],
        labels: &mut [i64],
    ) -> Result<()> {
        let count = self.check_rows(queries)?;
        if distances.len() < count * k || labels.len() < count * k {
            return Err(Error::Index(format!(
                "output buffers hold {} / {} slots, {} queries need {}",
                distances.len(),
                labels.len(),
                count,
                count * k
            )));
        }

        let kernel = self.metric.kernel::<f32>();
        let mut wide = Vec::with_capacity(self.dimension);
        for q in 0..count {
            wide.clear();
            wide.extend(
                queries[q * self.dimension..(q + 1) * self.dimension]
                    .iter()
                    .map(|&v| v as f64),
            );
            let mut tops = TopN::new(k);
            for (i, row) in self.vectors.chunks_exact(self.dimension).enumerate() {
                tops.push(i as u32, kernel(row, &wide));
            }

            let out_d = &mut distances[q * k..(q + 1) * k];
            let out_l = &mut labels[q * k..(q + 1) * k];
            out_d.fill(f32::INFINITY);
            out_l.fill(NO_RESULT);
            let found = tops.into_sorted_by_distance();
            for (slot, (index, distance)) in found.into_iter().enumerate() {
                out_d[slot] = distance as f32;
                out_l[slot] = index as i64;
            }
        }
        Ok(())
    }

    fn set_parameters(&mut self, parameters: &str) -> Result<()> {
        for item in parameters.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (key, value) = item
                .split_once('=')
                .ok_or_else(|| Error::Config(format!("unrecognizable parameter: '{item}'")))?;
            match key.trim() {
                "metric" => self.metric = value.trim().parse()?,
                other => {
                    return Err(Error::Config(format!(
                        "flat index has no parameter '{other}'"
                    )))
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> FlatIndex {
        let rows: Vec<Vec<f32>> = (0..10).map(|i| vec![i as f32, 0.0]).collect();
        FlatIndex::from_vectors(&Vectors::from_rows(&rows).unwrap(), Metric::SquaredL2).unwrap()
    }

    #[test]
    fn returns_closest_first() {
        let index = grid();
        let mut d = vec![0.0; 6];
        let mut l = vec![0; 6];
        index
            .search(&[2.2, 0.0, 8.9, 0.0], 3, &mut d, &mut l)
            .unwrap();
        assert_eq!(&l[..3], &[2, 3, 1]);
        assert_eq!(&l[3..], &[9, 8, 7]);
        assert!(d[0] <= d[1] && d[1] <= d[2]);
    }

    #[test]
    fn pads_missing_results() {
        let index = grid();
        let mut d = vec![0.0; 12];
        let mut l = vec![0; 12];
        index.search(&[0.0, 0.0], 12, &mut d, &mut l).unwrap();
        assert_eq!(l[10], NO_RESULT);
        assert_eq!(l[11], NO_RESULT);
        assert!(d[11].is_infinite());
    }

    #[test]
    fn parameters() {
        let mut index = grid();
        index.set_parameters("").unwrap();
        index.set_parameters("metric=ip").unwrap();
        assert_eq!(index.metric(), Metric::NegatedInnerProduct);
        assert!(matches!(index.set_parameters("nprobe=32"), Err(Error::Config(_))));
        assert!(matches!(index.set_parameters("metric"), Err(Error::Config(_))));
    }

    #[test]
    fn rejects_ragged_input() {
        let mut index = grid();
        assert!(index.add(&[1.0, 2.0, 3.0]).is_err());
        let mut d = vec![0.0; 1];
        let mut l = vec![0; 1];
        assert!(index.search(&[1.0], 1, &mut d, &mut l).is_err());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.fvecs");
        let index = grid();
        index.save(&path).unwrap();
        let loaded = FlatIndex::load(&path, Metric::SquaredL2).unwrap();
        assert_eq!(loaded.num_vectors(), 10);
        assert_eq!(loaded.dimension(), 2);
    }
}
