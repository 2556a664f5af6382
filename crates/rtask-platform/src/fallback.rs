//! Fallback platform implementation for non-Linux systems.
//!
//! Only best-effort scheduling is available. Affinity requests are accepted
//! and recorded by the runtime but have no OS effect.

use crate::SchedulingClass;
use rtask_errors::{SysError, SysResult};
use std::time::{Duration, Instant};
use tracing::debug;

/// Fallback sleep implementation using standard library.
#[derive(Debug, Clone, Copy)]
pub struct PlatformSleep;

impl PlatformSleep {
    /// Create new platform sleep instance.
    pub fn new() -> Self {
        Self
    }

    /// Fallback sleep using standard thread::sleep.
    pub fn sleep_until(&self, target: Instant) -> SysResult {
        let now = Instant::now();
        if target > now {
            std::thread::sleep(target - now);
        }
        Ok(())
    }
}

impl Default for PlatformSleep {
    fn default() -> Self {
        Self::new()
    }
}

/// Only `SchedulingClass::Other` is available here.
pub fn apply_scheduling(class: SchedulingClass, _priority: u8) -> SysResult {
    if class.is_realtime() {
        return Err(SysError::UnsupportedClass);
    }
    Ok(())
}

/// Accepts any core below the online count; no OS effect.
pub fn set_thread_affinity(core: Option<usize>) -> SysResult {
    if core.is_some_and(|core| core >= crate::num_cores()) {
        return Err(SysError::AffinityRejected);
    }
    debug!(?core, "thread affinity recorded (no OS support)");
    Ok(())
}

/// Per-thread CPU clocks are not available on this platform.
pub fn thread_cpu_time() -> SysResult<Duration> {
    Err(SysError::ClockUnavailable)
}

/// Real-time classes are never available on this platform.
pub fn probe_realtime(class: SchedulingClass) -> SysResult {
    apply_scheduling(class, 0)
}

/// Memory locking is a no-op on this platform.
pub fn lock_memory() -> SysResult {
    Ok(())
}
