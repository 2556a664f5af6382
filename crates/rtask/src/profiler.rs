//! WCET profiler.

use crate::config::ExecClock;
use crate::tcb::TaskControlBlock;
use rtask_platform::thread_cpu_time;
use std::time::{Duration, Instant};
use tracing::trace;

/// Tracks the longest observed instance of measured tasks.
#[derive(Debug, Clone, Copy, Default)]
pub struct WcetProfiler {
    clock: ExecClock,
}

impl WcetProfiler {
    /// Create a profiler reading `clock`.
    pub fn new(clock: ExecClock) -> Self {
        Self { clock }
    }

    /// Clock in use.
    pub fn clock(&self) -> ExecClock {
        self.clock
    }

    /// Mark the start of an instance. Must run on the task's own thread.
    pub fn start(&self, tcb: &TaskControlBlock) {
        if tcb.is_measured() && self.clock == ExecClock::ThreadCpu {
            if let Ok(cpu) = thread_cpu_time() {
                tcb.set_cpu_mark(cpu);
            }
        }
    }

    /// Measure the instance that completed at `now` and raise the task's WCET
    /// if exceeded. Must run on the task's own thread.
    ///
    /// Returns the measured execution time, or `None` when the task is not
    /// measured.
    pub fn finish(&self, tcb: &TaskControlBlock, now: Instant) -> Option<Duration> {
        if !tcb.is_measured() {
            return None;
        }

        let elapsed = match self.clock {
            ExecClock::Wall => now.saturating_duration_since(tcb.activation_time()),
            ExecClock::ThreadCpu => thread_cpu_time()
                .map(|cpu| cpu.saturating_sub(tcb.cpu_mark()))
                .unwrap_or_else(|_| now.saturating_duration_since(tcb.activation_time())),
        };

        if tcb.raise_wcet(elapsed) {
            trace!(task = tcb.index(), wcet_us = elapsed.as_micros() as u64, "wcet raised");
        }
        Some(elapsed)
    }
}
