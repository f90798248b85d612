//! Per-case measurement summary and its text rendering.

use std::io::Write;

use crate::benchmark::case::Percentage;
use crate::error::Result;
use crate::percentile::{Percentile, Sample};

/// Everything measured for one test case.
#[derive(Debug, Clone)]
pub struct CaseReport {
    /// Logical queries per second over the parallel phase.
    pub qps: f64,
    /// CPU utilization (1.0 = one busy core), NaN if unavailable.
    pub cpu_util: f32,
    /// Memory read bandwidth, NaN if unavailable.
    pub mem_read_bw: f32,
    /// Memory write bandwidth, NaN if unavailable.
    pub mem_write_bw: f32,
    /// Per-query latency in microseconds; lower is better.
    pub latency: Percentile<u32>,
    /// Per-query recall; higher is better.
    pub recall: Percentile<f32>,
}

impl CaseReport {
    /// Write the report:
    ///
    /// ```text
    /// qps: 1234.5
    /// cpu-util: 3.9
    /// mem-r-bw: NaN
    /// mem-w-bw: NaN
    /// latency: best=80 worst=410 average=97.2 P(50%)=91 P(99%)=350
    /// recall: best=1 worst=0.8 average=0.97 P(50%)=1 P(99%)=0.8
    /// ```
    pub fn write_to<W: Write + ?Sized>(
        &mut self,
        percentages: &[Percentage],
        out: &mut W,
    ) -> Result<()> {
        writeln!(out, "qps: {}", self.qps)?;
        writeln!(out, "cpu-util: {}", self.cpu_util)?;
        writeln!(out, "mem-r-bw: {}", self.mem_read_bw)?;
        writeln!(out, "mem-w-bw: {}", self.mem_write_bw)?;
        write_distribution(out, "latency", &mut self.latency, percentages)?;
        write_distribution(out, "recall", &mut self.recall, percentages)?;
        Ok(())
    }

    /// [`write_to`](Self::write_to) into a string.
    pub fn render(&mut self, percentages: &[Percentage]) -> Result<String> {
        let mut buf = Vec::new();
        self.write_to(percentages, &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

fn write_distribution<W, T>(
    out: &mut W,
    name: &str,
    samples: &mut Percentile<T>,
    percentages: &[Percentage],
) -> Result<()>
where
    W: Write + ?Sized,
    T: Sample + std::fmt::Display,
{
    write!(
        out,
        "{name}: best={} worst={} average={}",
        samples.best()?,
        samples.worst()?,
        samples.average()
    )?;
    for p in percentages {
        write!(out, " P({}%)={}", p.text, samples.percentile(p.value)?)?;
    }
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::case::parse_percentages;
    use crate::percentile::Order;

    #[test]
    fn renders_all_lines() {
        let mut latency = Percentile::new(Order::LowerIsBetter);
        latency.add_slice(&[10, 20, 30, 40]);
        let mut recall = Percentile::new(Order::HigherIsBetter);
        recall.add_slice(&[1.0, 0.5]);
        let mut report = CaseReport {
            qps: 2000.0,
            cpu_util: 0.5,
            mem_read_bw: f32::NAN,
            mem_write_bw: f32::NAN,
            latency,
            recall,
        };
        let text = report.render(&parse_percentages("50,100").unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "qps: 2000");
        assert_eq!(lines[1], "cpu-util: 0.5");
        assert_eq!(lines[2], "mem-r-bw: NaN");
        assert_eq!(lines[3], "mem-w-bw: NaN");
        assert_eq!(
            lines[4],
            "latency: best=10 worst=40 average=25 P(50%)=20 P(100%)=40"
        );
        assert_eq!(
            lines[5],
            "recall: best=1 worst=0.5 average=0.75 P(50%)=1 P(100%)=0.5"
        );
    }

    #[test]
    fn empty_samples_fail() {
        let mut report = CaseReport {
            qps: 0.0,
            cpu_util: 0.0,
            mem_read_bw: 0.0,
            mem_write_bw: 0.0,
            latency: Percentile::new(Order::LowerIsBetter),
            recall: Percentile::new(Order::HigherIsBetter),
        };
        assert!(report.render(&[]).is_err());
    }
}
