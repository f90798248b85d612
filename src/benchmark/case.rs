//! Benchmark configuration strings.
//!
//! ```text
//! cases        := case (';' case)*
//! case         := [params] '/' loops 'x' batch 'x' threads [':' cpu (',' cpu)*]
//! percentages  := p (',' p)*
//! top_k        := k | k1 '@' k2
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// One benchmark configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    /// Opaque index tuning string, forwarded to `set_parameters`.
    pub parameters: String,
    /// Passes over the query set (L).
    pub loops: usize,
    /// Queries per search call (B).
    pub batch_size: usize,
    /// One entry per worker thread; `Some(cpu)` pins that worker.
    pub threads: Vec<Option<usize>>,
}

impl TestCase {
    /// Parse `[params]/<loop>x<batch>x<threads>[:<cpu,cpu,...>]`.
    ///
    /// A negative CPU id leaves that worker unpinned.
    pub fn parse(text: &str) -> Result<Self> {
        let bad = || Error::Config(format!("unrecognizable case: '{text}'"));
        let (parameters, shape) = text.split_once('/').ok_or_else(bad)?;
        let (dims, cpus) = match shape.split_once(':') {
            Some((dims, cpus)) => (dims, Some(cpus)),
            None => (shape, None),
        };

        let numbers: Vec<usize> = dims
            .split('x')
            .map(|s| s.trim().parse::<usize>().map_err(|_| bad()))
            .collect::<Result<_>>()?;
        let [loops, batch_size, thread_count] = numbers[..] else {
            return Err(bad());
        };

        let threads = match cpus {
            None => vec![None; thread_count],
            Some(list) => {
                let pins: Vec<Option<usize>> = list
                    .split(',')
                    .map(|s| {
                        s.trim()
                            .parse::<i64>()
                            .map(|cpu| usize::try_from(cpu).ok())
                            .map_err(|_| bad())
                    })
                    .collect::<Result<_>>()?;
                if pins.len() != thread_count {
                    return Err(Error::Config(format!(
                        "length of cpu list is not equal to thread count in case '{text}'"
                    )));
                }
                pins
            }
        };

        Ok(Self {
            parameters: parameters.to_string(),
            loops,
            batch_size,
            threads,
        })
    }

    /// Zero loops, batch size or threads cannot be run.
    pub fn validate(&self) -> Result<()> {
        if self.loops == 0 {
            return Err(Error::Config("<loop> must be positive".into()));
        }
        if self.batch_size == 0 {
            return Err(Error::Config("<batch> must be positive".into()));
        }
        if self.threads.is_empty() {
            return Err(Error::Config("<thread> must be positive".into()));
        }
        Ok(())
    }
}

impl FromStr for TestCase {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}x{}x{}",
            self.parameters,
            self.loops,
            self.batch_size,
            self.threads.len()
        )?;
        if self.threads.iter().any(Option::is_some) {
            let cpus: Vec<String> = self
                .threads
                .iter()
                .map(|c| c.map_or_else(|| "-1".to_string(), |c| c.to_string()))
                .collect();
            write!(f, ":{}", cpus.join(","))?;
        }
        Ok(())
    }
}

/// Split a `;`-separated case list.
pub fn parse_cases(text: &str) -> Result<Vec<TestCase>> {
    text.split(';').map(TestCase::parse).collect()
}

/// A requested percentile; `text` is echoed verbatim in reports.
#[derive(Debug, Clone, PartialEq)]
pub struct Percentage {
    pub text: String,
    pub value: f64,
}

/// Split a `,`-separated percentage list. Every value must lie in `[0, 100]`.
pub fn parse_percentages(text: &str) -> Result<Vec<Percentage>> {
    text.split(',')
        .map(|item| {
            let item = item.trim();
            let value: f64 = item
                .parse()
                .map_err(|_| Error::Config(format!("unrecognizable percentage: '{item}'")))?;
            if !(0.0..=100.0).contains(&value) {
                return Err(Error::InvalidPercentage(value));
            }
            Ok(Percentage {
                text: item.to_string(),
                value,
            })
        })
        .collect()
}

/// Neighbor counts: recall is scored on the first `k1` ground-truth entries
/// against `k2` returned results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopK {
    pub k1: usize,
    pub k2: usize,
}

impl TopK {
    pub fn new(k1: usize, k2: usize) -> Result<Self> {
        if k1 == 0 || k2 == 0 {
            return Err(Error::Config("<top_k> must be positive".into()));
        }
        if k1 > k2 {
            return Err(Error::Config(format!(
                "<top_k> {k1}@{k2}: k1 must not exceed k2"
            )));
        }
        Ok(Self { k1, k2 })
    }

    /// Parse `k` or `k1@k2`.
    pub fn parse(text: &str) -> Result<Self> {
        let num = |s: &str| {
            s.trim()
                .parse::<usize>()
                .map_err(|_| Error::Config(format!("unrecognizable top_k: '{text}'")))
        };
        match text.split_once('@') {
            Some((k1, k2)) => Self::new(num(k1)?, num(k2)?),
            None => {
                let k = num(text)?;
                Self::new(k, k)
            }
        }
    }
}

impl FromStr for TopK {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for TopK {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.k1 == self.k2 {
            write!(f, "{}", self.k1)
        } else {
            write!(f, "{}@{}", self.k1, self.k2)
        }
    }
}
