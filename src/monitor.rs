//! Process resource sampling around a measured phase.
//!
//! - CPU utilization: user + kernel ticks from `/proc/self/stat` divided by
//!   wall-clock time. `1.0` means one fully busy core.
//! - Memory bandwidth: needs hardware counters this crate does not read, so it
//!   always reports NaN.
//! - Process memory: `VmSize` / `VmRSS` from `/proc/self/status`.
//!
//! NaN means "unavailable" throughout.

use std::time::Instant;

use crate::error::Result;
#[cfg(target_os = "linux")]
use crate::error::Error;

#[cfg(target_os = "linux")]
const STAT_PATH: &str = "/proc/self/stat";
#[cfg(target_os = "linux")]
const STATUS_PATH: &str = "/proc/self/status";

/// CPU time consumed by this process between `start` and `end`.
#[derive(Debug, Clone)]
pub struct CpuMonitor {
    include_user: bool,
    include_kernel: bool,
    ticks: Option<(u64, u64)>,
    started: Instant,
}

impl CpuMonitor {
    pub fn new(include_user: bool, include_kernel: bool) -> Self {
        Self {
            include_user,
            include_kernel,
            ticks: None,
            started: Instant::now(),
        }
    }

    /// Take the starting sample.
    pub fn start(&mut self) -> Result<()> {
        self.ticks = read_ticks()?;
        self.started = Instant::now();
        Ok(())
    }

    /// Busy fraction since `start`. NaN when the platform has no counters.
    pub fn end(&self) -> Result<f32> {
        let end_ticks = read_ticks()?;
        let wall = self.started.elapsed().as_secs_f64();
        let (Some((u0, k0)), Some((u1, k1))) = (self.ticks, end_ticks) else {
            return Ok(f32::NAN);
        };
        let mut busy = 0u64;
        if self.include_user {
            busy += u1.saturating_sub(u0);
        }
        if self.include_kernel {
            busy += k1.saturating_sub(k0);
        }
        let hz = clock_ticks_per_second();
        if hz <= 0.0 || wall <= 0.0 {
            return Ok(f32::NAN);
        }
        Ok((busy as f64 / hz / wall) as f32)
    }
}

/// Memory read/write bandwidth in bytes per second.
///
/// Always NaN: no hardware counter backend is wired in.
#[derive(Debug, Clone, Default)]
pub struct MemoryBandwidth {
    _private: (),
}

impl MemoryBandwidth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {}

    /// `(read, write)` bandwidth since `start`.
    pub fn end(&self) -> (f32, f32) {
        (f32::NAN, f32::NAN)
    }
}

/// Virtual and resident size of this process, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProcessMemory {
    pub virtual_bytes: usize,
    pub resident_bytes: usize,
}

impl ProcessMemory {
    /// Current sizes, or `None` where `/proc` is not available.
    pub fn sample() -> Option<Self> {
        #[cfg(target_os = "linux")]
        {
            let status = std::fs::read_to_string(STATUS_PATH).ok()?;
            Some(Self {
                virtual_bytes: parse_status_kb(&status, "VmSize:")? * 1024,
                resident_bytes: parse_status_kb(&status, "VmRSS:")? * 1024,
            })
        }
        #[cfg(not(target_os = "linux"))]
        {
            None
        }
    }
}

#[cfg(target_os = "linux")]
fn read_ticks() -> Result<Option<(u64, u64)>> {
    let stat = std::fs::read_to_string(STAT_PATH)
        .map_err(|e| Error::Resource(format!("failed to read from '{STAT_PATH}': {e}")))?;
    parse_stat_ticks(&stat).map(Some)
}

#[cfg(not(target_os = "linux"))]
fn read_ticks() -> Result<Option<(u64, u64)>> {
    Ok(None)
}

#[cfg(target_os = "linux")]
fn clock_ticks_per_second() -> f64 {
    let hz = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    hz as f64
}

#[cfg(not(target_os = "linux"))]
fn clock_ticks_per_second() -> f64 {
    0.0
}

/// `utime` and `stime` (fields 14 and 15) of a `/proc/<pid>/stat` line.
///
/// The command name (field 2) may contain spaces, so fields are counted from
/// the last `)`.
#[cfg(any(target_os = "linux", test))]
fn parse_stat_ticks(stat: &str) -> Result<(u64, u64)> {
    let bad = || crate::error::Error::Resource(format!("unrecognizable stat line: '{}'", stat.trim()));
    let rest = &stat[stat.rfind(')').ok_or_else(bad)? + 1..];
    // rest starts at field 3 (state); utime is field 14.
    let mut fields = rest.split_whitespace().skip(11);
    let user = fields.next().and_then(|s| s.parse().ok()).ok_or_else(bad)?;
    let kernel = fields.next().and_then(|s| s.parse().ok()).ok_or_else(bad)?;
    Ok((user, kernel))
}

#[cfg(any(target_os = "linux", test))]
fn parse_status_kb(status: &str, key: &str) -> Option<usize> {
    status
        .lines()
        .find(|line| line.starts_with(key))?
        .split_whitespace()
        .nth(1)?
        .parse()
        .ok()
}
