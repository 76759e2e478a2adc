//! Per-worker contraction statistics
//!
//! Each worker owns a collector and bumps plain counters in the hot
//! loop; the only synchronization is a process-wide print lock taken
//! once, when the collector drops and emits its line.

use std::sync::Mutex;

static PRINT_LOCK: Mutex<()> = Mutex::new(());

/// Why a shortcut was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutReason {
    /// The pair itself was the shortest path, or every co-optimal
    /// witness runs through the independent set.
    ShortestPath,
    /// The LP reached a fixed point with the witness not cheaper than
    /// the shortcut under the final weighting.
    RepeatingConfig,
    /// Fixed point with an inconclusive cost comparison; emitted
    /// conservatively.
    UnknownReason,
}

#[derive(Debug, Default)]
pub struct StatisticsCollector {
    active: bool,
    shortest_path: u64,
    repeating_config: u64,
    unknown_reason: u64,
    lp_max: usize,
    constraints_max: usize,
}

impl StatisticsCollector {
    pub fn new(active: bool) -> Self {
        StatisticsCollector {
            active,
            ..Default::default()
        }
    }

    pub fn print_header() {
        println!("| \t\t Reasons for shortcut creation \t\t | \t\t  Max values \t\t|");
        println!("short \t\t repeating \t\t unknown \t\t lp calls \t max constraints");
    }

    pub fn count_shortcut(&mut self, reason: ShortcutReason) {
        match reason {
            ShortcutReason::ShortestPath => self.shortest_path += 1,
            ShortcutReason::RepeatingConfig => self.repeating_config += 1,
            ShortcutReason::UnknownReason => self.unknown_reason += 1,
        }
    }

    pub fn record_max_values(&mut self, lp_calls: usize, constraints: usize) {
        self.lp_max = self.lp_max.max(lp_calls);
        self.constraints_max = self.constraints_max.max(constraints);
    }

    pub fn shortcut_count(&self) -> u64 {
        self.shortest_path + self.repeating_config + self.unknown_reason
    }
}

impl Drop for StatisticsCollector {
    fn drop(&mut self) {
        if !self.active || self.shortcut_count() == 0 {
            return;
        }
        let _guard = PRINT_LOCK.lock().expect("print lock poisoned");
        println!(
            "{} \t\t {} \t\t\t {} \t\t\t {} \t\t {}",
            self.shortest_path,
            self.repeating_config,
            self.unknown_reason,
            self.lp_max,
            self.constraints_max
        );
    }
}
