//! Online percentile statistics.
//!
//! [`Percentile`] collects scalar samples and answers best / worst / average
//! and nearest-rank percentile queries. Sorting is lazy and memoized: it
//! happens on the first ranked query after an append and is reused until the
//! next append.
//!
//! The rank convention is nearest-rank, rounded up, without interpolation:
//! `percentile(p)` is the sample at 1-indexed rank
//! `clamp(ceil(count * p / 100), 1, count)` in best-to-worst order.
//!
//! The engine is not synchronized. Concurrent producers wrap it in a
//! `Mutex` and hold the lock only for the append.

use std::cmp::Ordering;

use crate::error::{Error, Result};

/// Which end of the value range counts as "best".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Smaller is better (latencies).
    LowerIsBetter,
    /// Larger is better (recall).
    HigherIsBetter,
}

/// Numeric sample types accepted by [`Percentile`].
pub trait Sample: Copy + PartialOrd + Into<f64> {}

impl Sample for u32 {}
impl Sample for f32 {}
impl Sample for f64 {}

/// Append-only sample set with a fixed "better" direction.
#[derive(Debug, Clone)]
pub struct Percentile<T> {
    order: Order,
    sorted: bool,
    samples: Vec<T>,
}

impl<T: Sample> Percentile<T> {
    /// Create an empty sample set.
    pub fn new(order: Order) -> Self {
        Self {
            order,
            sorted: true,
            samples: Vec::new(),
        }
    }

    /// Direction chosen at construction.
    pub fn order(&self) -> Order {
        self.order
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no sample was added yet.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Append one sample.
    pub fn add(&mut self, value: T) {
        self.samples.push(value);
        self.sorted = false;
    }

    /// Append many samples at once.
    pub fn add_slice(&mut self, values: &[T]) {
        self.samples.extend_from_slice(values);
        self.sorted = false;
    }

    /// Best sample.
    pub fn best(&mut self) -> Result<T> {
        self.prepare()?;
        Ok(self.samples[0])
    }

    /// Worst sample.
    pub fn worst(&mut self) -> Result<T> {
        self.prepare()?;
        Ok(self.samples[self.samples.len() - 1])
    }

    /// Arithmetic mean. `NaN` when empty.
    pub fn average(&self) -> f64 {
        let sum: f64 = self.samples.iter().map(|&v| v.into()).sum();
        sum / self.samples.len() as f64
    }

    /// Nearest-rank percentile, `0 <= percentage <= 100`.
    pub fn percentile(&mut self, percentage: f64) -> Result<T> {
        if !(0.0..=100.0).contains(&percentage) {
            return Err(Error::InvalidPercentage(percentage));
        }
        self.prepare()?;
        let count = self.samples.len();
        let rank = ((count as f64 * percentage / 100.0).ceil() as usize).clamp(1, count);
        Ok(self.samples[rank - 1])
    }

    fn prepare(&mut self) -> Result<()> {
        if self.samples.is_empty() {
            return Err(Error::NoSamples);
        }
        if !self.sorted {
            let cmp = |a: &T, b: &T| a.partial_cmp(b).unwrap_or(Ordering::Equal);
            match self.order {
                Order::LowerIsBetter => self.samples.sort_unstable_by(cmp),
                Order::HigherIsBetter => self.samples.sort_unstable_by(|a, b| cmp(b, a)),
            }
            self.sorted = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_set_has_no_profile() {
        let mut p: Percentile<u32> = Percentile::new(Order::LowerIsBetter);
        assert!(matches!(p.best(), Err(Error::NoSamples)));
        assert!(matches!(p.worst(), Err(Error::NoSamples)));
        assert!(matches!(p.percentile(50.0), Err(Error::NoSamples)));
        assert!(p.average().is_nan());
    }

    #[test]
    fn lower_is_better_ranks() {
        let mut p = Percentile::new(Order::LowerIsBetter);
        p.add_slice(&[50u32, 10, 40, 20, 30]);
        assert_eq!(p.best().unwrap(), 10);
        assert_eq!(p.worst().unwrap(), 50);
        assert_eq!(p.percentile(0.0).unwrap(), 10);
        // ceil(5 * 0.5) = 3
        assert_eq!(p.percentile(50.0).unwrap(), 30);
        // ceil(5 * 0.99) = 5
        assert_eq!(p.percentile(99.0).unwrap(), 50);
        assert_eq!(p.percentile(100.0).unwrap(), 50);
        assert!((p.average() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn higher_is_better_ranks() {
        let mut p = Percentile::new(Order::HigherIsBetter);
        for v in [0.2f32, 1.0, 0.6, 0.8] {
            p.add(v);
        }
        assert_eq!(p.best().unwrap(), 1.0);
        assert_eq!(p.worst().unwrap(), 0.2);
        assert_eq!(p.percentile(50.0).unwrap(), 0.8);
        assert_eq!(p.percentile(100.0).unwrap(), p.worst().unwrap());
    }

    #[test]
    fn append_after_query_resorts() {
        let mut p = Percentile::new(Order::LowerIsBetter);
        p.add(5u32);
        assert_eq!(p.best().unwrap(), 5);
        p.add(1);
        assert_eq!(p.best().unwrap(), 1);
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn out_of_range_percentage_fails() {
        let mut p = Percentile::new(Order::LowerIsBetter);
        p.add(1u32);
        assert!(matches!(p.percentile(-0.1), Err(Error::InvalidPercentage(_))));
        assert!(matches!(p.percentile(100.5), Err(Error::InvalidPercentage(_))));
        assert!(matches!(p.percentile(f64::NAN), Err(Error::InvalidPercentage(_))));
    }
}
