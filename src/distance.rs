//! Distance metrics for exact k-NN.
//!
//! Every metric is expressed so that smaller is closer. Inner product is
//! negated for that reason.
//!
//! Kernels accumulate in `f64`. Corpus rows stay in their on-disk element type
//! and queries are widened to `f64` once, so one kernel per corpus element type
//! covers every (corpus, query) type pair.

use std::str::FromStr;

use crate::error::Error;
use crate::vecs::Element;

/// Distance kernel over a corpus row and a widened query.
pub type Kernel<E> = fn(&[E], &[f64]) -> f64;

/// Distance metric for ground truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// Manhattan distance, `sum |a - b|`.
    L1,
    /// Squared Euclidean distance, `sum (a - b)^2`.
    SquaredL2,
    /// Negated inner product, `-sum a * b`.
    NegatedInnerProduct,
}

impl Metric {
    /// Command-line name (`l1`, `l2`, `ip`).
    pub fn name(self) -> &'static str {
        match self {
            Metric::L1 => "l1",
            Metric::SquaredL2 => "l2",
            Metric::NegatedInnerProduct => "ip",
        }
    }

    /// Resolve the kernel for corpus element type `E`.
    ///
    /// Call once per scan and keep the returned function value.
    pub fn kernel<E: Element>(self) -> Kernel<E> {
        match self {
            Metric::L1 => l1::<E>,
            Metric::SquaredL2 => squared_l2::<E>,
            Metric::NegatedInnerProduct => negated_inner_product::<E>,
        }
    }
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "l1" => Ok(Metric::L1),
            "l2" => Ok(Metric::SquaredL2),
            "ip" => Ok(Metric::NegatedInnerProduct),
            other => Err(Error::Config(format!("unsupported metric type: '{other}'"))),
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[inline]
fn l1<E: Element>(a: &[E], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(&x, &y)| (x.to_f64() - y).abs()).sum()
}

#[inline]
fn squared_l2<E: Element>(a: &[E], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = x.to_f64() - y;
            d * d
        })
        .sum()
}

#[inline]
fn negated_inner_product<E: Element>(a: &[E], b: &[f64]) -> f64 {
    -a.iter().zip(b).map(|(&x, &y)| x.to_f64() * y).sum::<f64>()
}
