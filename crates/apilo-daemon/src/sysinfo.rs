//! Process CPU and memory sampling.
//!
//! Reads `/proc/self` on Linux; other platforms report zeros.

use std::time::Instant;

/// Tracks CPU tick deltas between samples to derive a usage percentage.
pub struct CpuSampler {
    last_ticks: u64,
    last_sample: Instant,
}

impl CpuSampler {
    pub fn new() -> Self {
        Self {
            last_ticks: process_cpu_ticks().unwrap_or(0),
            last_sample: Instant::now(),
        }
    }

    /// CPU usage of this process since the previous sample, in percent.
    /// The first call after construction covers the interval since `new`.
    pub fn sample(&mut self) -> f64 {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_sample).as_secs_f64();
        let ticks = match process_cpu_ticks() {
            Some(ticks) => ticks,
            None => return 0.0,
        };

        let delta_ticks = ticks.saturating_sub(self.last_ticks);
        self.last_ticks = ticks;
        self.last_sample = now;

        if elapsed <= 0.0 {
            return 0.0;
        }
        let ticks_per_sec = clock_ticks_per_second();
        if ticks_per_sec == 0 {
            return 0.0;
        }
        let cpu_seconds = delta_ticks as f64 / ticks_per_sec as f64;
        (cpu_seconds / elapsed * 100.0).max(0.0)
    }
}

impl Default for CpuSampler {
    fn default() -> Self {
        Self::new()
    }
}

/// Resident set size of this process in bytes.
pub fn memory_rss_bytes() -> u64 {
    #[cfg(target_os = "linux")]
    {
        if let Ok(statm) = std::fs::read_to_string("/proc/self/statm") {
            let mut fields = statm.split_whitespace();
            // statm: size resident shared ...
            if let Some(resident) = fields.nth(1).and_then(|f| f.parse::<u64>().ok()) {
                return resident * page_size();
            }
        }
    }
    0
}

/// Sum of user and system CPU time for this process, in clock ticks.
fn process_cpu_ticks() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        let stat = std::fs::read_to_string("/proc/self/stat").ok()?;
        // The comm field is parenthesized and may contain spaces; parse
        // from the closing paren.
        let rest = stat.rsplit_once(')')?.1;
        let fields: Vec<&str> = rest.split_whitespace().collect();
        // Fields after comm: state(0) ... utime(11) stime(12)
        let utime: u64 = fields.get(11)?.parse().ok()?;
        let stime: u64 = fields.get(12)?.parse().ok()?;
        Some(utime + stime)
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

#[cfg(target_os = "linux")]
fn clock_ticks_per_second() -> u64 {
    let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if ticks > 0 {
        ticks as u64
    } else {
        100
    }
}

#[cfg(not(target_os = "linux"))]
fn clock_ticks_per_second() -> u64 {
    0
}

#[cfg(target_os = "linux")]
fn page_size() -> u64 {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as u64
    } else {
        4096
    }
}
