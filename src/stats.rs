//! Allocation statistics.
//!
//! Tracks metrics across the pipeline for verbose output.

use std::time::{Duration, Instant};

/// Metrics for one run of the allocation pipeline.
#[derive(Debug, Default)]
pub struct AllocStats {
    /// Total pipeline time
    pub total_time: Duration,
    /// Time spent parsing
    pub parse_time: Duration,
    /// Time spent in analysis plus the allocation sweep
    pub alloc_time: Duration,
    /// Time spent printing the result
    pub emit_time: Duration,

    /// Instructions before allocation
    pub num_insts_before: usize,
    /// Instructions after allocation (splices included)
    pub num_insts_after: usize,
    /// Virtual registers (live ranges) discovered
    pub num_vrs: usize,
    /// Peak number of simultaneously live values
    pub max_live: usize,
    /// Registers requested on the command line
    pub k_requested: usize,
    /// Registers actually allocated from
    pub k_effective: usize,
    /// Whether a register was reserved for spill addresses
    pub scratch_reserved: bool,
    /// Dirty spills (store/reload pairs paid for)
    pub dirty_spills: usize,
    /// Restores spliced ahead of uses of evicted values
    pub restores: usize,
    /// Output size in bytes
    pub output_size: usize,
}

impl AllocStats {
    /// Create a new stats tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Display statistics.
    pub fn display(&self) {
        eprintln!("\n=== Allocation Statistics ===");
        eprintln!(
            "Instructions: {} → {} ({} spliced)",
            self.num_insts_before,
            self.num_insts_after,
            self.num_insts_after - self.num_insts_before
        );
        eprintln!("Live ranges:  {}", self.num_vrs);
        eprintln!("Peak live:    {}", self.max_live);
        if self.scratch_reserved {
            eprintln!(
                "Registers:    {} requested, {} effective (r{} reserved for spills)",
                self.k_requested, self.k_effective, self.k_effective
            );
        } else {
            eprintln!("Registers:    {} requested", self.k_requested);
        }
        eprintln!("Dirty spills: {}", self.dirty_spills);
        eprintln!("Restores:     {}", self.restores);
        eprintln!("Output size:  {} bytes", self.output_size);
        eprintln!();
        eprintln!("=== Timing ===");
        eprintln!("Parse:        {:?}", self.parse_time);
        eprintln!("Allocation:   {:?}", self.alloc_time);
        eprintln!("Emission:     {:?}", self.emit_time);
        eprintln!("Total:        {:?}", self.total_time);
    }
}

/// Timer helper for measuring phase durations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Stop the timer and return elapsed duration.
    pub fn stop(&self) -> Duration {
        self.start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_stats_default() {
        let stats = AllocStats::new();
        assert_eq!(stats.num_insts_before, 0);
        assert_eq!(stats.num_vrs, 0);
        assert_eq!(stats.dirty_spills, 0);
    }

    #[test]
    fn test_timer() {
        let timer = Timer::start();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let elapsed = timer.stop();
        assert!(elapsed >= std::time::Duration::from_millis(10));
    }
}
