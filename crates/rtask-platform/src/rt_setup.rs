//! Real-time setup of a task thread.

use rtask_errors::{MAX_PRIORITY, SysResult};
use serde::{Deserialize, Serialize};

/// OS scheduling class applied to every task thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingClass {
    /// Fixed priority, FIFO among equal priorities (`SCHED_FIFO`).
    Fifo,
    /// Fixed priority, round robin among equal priorities (`SCHED_RR`).
    RoundRobin,
    /// Best-effort time sharing (`SCHED_OTHER`). Priorities are recorded but
    /// not enforced by the OS.
    #[default]
    Other,
}

impl SchedulingClass {
    /// Whether the class needs real-time privileges.
    pub fn is_realtime(self) -> bool {
        matches!(self, SchedulingClass::Fifo | SchedulingClass::RoundRobin)
    }

    /// Stable name used in logs and configuration files.
    pub fn as_str(self) -> &'static str {
        match self {
            SchedulingClass::Fifo => "fifo",
            SchedulingClass::RoundRobin => "round_robin",
            SchedulingClass::Other => "other",
        }
    }
}

impl std::fmt::Display for SchedulingClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduling parameters a task thread applies to itself at start-up.
///
/// `priority` uses the runtime's 0–99 scale (higher is more urgent) and is
/// clamped to the range the OS accepts for the class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadSetup {
    /// Scheduling class.
    pub class: SchedulingClass,

    /// Priority in `[0, 99]`.
    pub priority: u8,

    /// Core to pin the thread to (None = any core).
    pub core: Option<usize>,
}

impl Default for ThreadSetup {
    fn default() -> Self {
        Self {
            class: SchedulingClass::Other,
            priority: 0,
            core: None,
        }
    }
}

impl ThreadSetup {
    /// Create a setup for `class` at `priority`, unpinned.
    pub fn new(class: SchedulingClass, priority: u8) -> Self {
        Self {
            class,
            priority: priority.min(MAX_PRIORITY),
            core: None,
        }
    }

    /// Pin to a core.
    pub fn with_core(mut self, core: usize) -> Self {
        self.core = Some(core);
        self
    }

    /// Set priority.
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority.min(MAX_PRIORITY);
        self
    }

    /// Apply class, priority and affinity to the calling thread.
    ///
    /// # Errors
    ///
    /// Returns the first OS primitive that failed.
    pub fn apply(&self) -> SysResult {
        crate::apply_scheduling(self.class, self.priority)?;
        if self.core.is_some() {
            crate::set_thread_affinity(self.core)?;
        }
        Ok(())
    }
}
