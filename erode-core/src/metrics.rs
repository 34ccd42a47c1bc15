//! Runtime counters for the decay engine.
//!
//! Lock-free `AtomicU64` counters bumped on the hot paths and snapshotted on
//! demand, plus span names for `tracing` instrumentation.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters for engine events.
#[derive(Debug)]
pub struct EngineCounters {
    /// Memories created since startup.
    pub memories_created: AtomicU64,
    /// Submissions ignored because they were empty.
    pub submissions_rejected: AtomicU64,
    /// Ambient ticks completed.
    pub ticks: AtomicU64,
    /// Accelerate calls that hit a live memory.
    pub accelerations: AtomicU64,
    /// Accelerate calls for unknown ids.
    pub unknown_accelerations: AtomicU64,
    /// Characters lost across all commits.
    pub chars_lost: AtomicU64,
    /// Memories that reached the illegible state.
    pub memories_erased: AtomicU64,
    /// Durable writes that succeeded.
    pub saves_completed: AtomicU64,
    /// Durable writes that failed and were swallowed.
    pub save_failures: AtomicU64,
}

impl EngineCounters {
    /// Create a new set of zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            memories_created: AtomicU64::new(0),
            submissions_rejected: AtomicU64::new(0),
            ticks: AtomicU64::new(0),
            accelerations: AtomicU64::new(0),
            unknown_accelerations: AtomicU64::new(0),
            chars_lost: AtomicU64::new(0),
            memories_erased: AtomicU64::new(0),
            saves_completed: AtomicU64::new(0),
            save_failures: AtomicU64::new(0),
        }
    }

    pub(crate) fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    /// Snapshot all counters.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            memories_created: self.memories_created.load(Ordering::Relaxed),
            submissions_rejected: self.submissions_rejected.load(Ordering::Relaxed),
            ticks: self.ticks.load(Ordering::Relaxed),
            accelerations: self.accelerations.load(Ordering::Relaxed),
            unknown_accelerations: self.unknown_accelerations.load(Ordering::Relaxed),
            chars_lost: self.chars_lost.load(Ordering::Relaxed),
            memories_erased: self.memories_erased.load(Ordering::Relaxed),
            saves_completed: self.saves_completed.load(Ordering::Relaxed),
            save_failures: self.save_failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for EngineCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot of counter values at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CounterSnapshot {
    /// Memories created.
    pub memories_created: u64,
    /// Empty submissions ignored.
    pub submissions_rejected: u64,
    /// Ambient ticks completed.
    pub ticks: u64,
    /// Accelerations applied.
    pub accelerations: u64,
    /// Accelerations for unknown ids.
    pub unknown_accelerations: u64,
    /// Characters lost.
    pub chars_lost: u64,
    /// Memories that became illegible.
    pub memories_erased: u64,
    /// Durable writes completed.
    pub saves_completed: u64,
    /// Durable writes failed.
    pub save_failures: u64,
}

impl CounterSnapshot {
    /// Format as Prometheus-compatible text.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        let rows = [
            ("erode_memories_created_total", "Memories created", self.memories_created),
            (
                "erode_submissions_rejected_total",
                "Empty submissions ignored",
                self.submissions_rejected,
            ),
            ("erode_ticks_total", "Ambient ticks completed", self.ticks),
            ("erode_accelerations_total", "Accelerations applied", self.accelerations),
            (
                "erode_unknown_accelerations_total",
                "Accelerations for unknown ids",
                self.unknown_accelerations,
            ),
            ("erode_chars_lost_total", "Characters lost to decay", self.chars_lost),
            ("erode_memories_erased_total", "Memories that became illegible", self.memories_erased),
            ("erode_saves_completed_total", "Durable writes completed", self.saves_completed),
            ("erode_save_failures_total", "Durable writes failed", self.save_failures),
        ];

        let mut out = String::new();
        for (name, help, value) in rows {
            out.push_str(&format!(
                "# HELP {name} {help}\n# TYPE {name} counter\n{name} {value}\n"
            ));
        }
        out
    }
}

/// Span names used with `tracing::span!`.
pub mod spans {
    /// Memory creation.
    pub const MEMORY_CREATE: &str = "erode::store::create";
    /// Canonical commit of a decay result.
    pub const COMMIT: &str = "erode::store::commit";
    /// Ambient tick over the whole registry.
    pub const TICK: &str = "erode::scheduler::tick";
    /// Consumer-triggered acceleration.
    pub const ACCELERATE: &str = "erode::scheduler::accelerate";
    /// Durable save.
    pub const PERSIST_SAVE: &str = "erode::persist::save";
    /// Durable load.
    pub const PERSIST_LOAD: &str = "erode::persist::load";
}
