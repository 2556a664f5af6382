//! OS primitives for the rtask real-time task runtime.
//!
//! Everything the runtime needs from the operating system goes through this
//! crate:
//!
//! - **PlatformSleep**: absolute-target sleep with a busy-spin tail
//! - **SchedulingClass / ThreadSetup**: scheduling class, priority and core of a task thread
//! - **Thread scheduling**: `pthread_setschedparam` on the calling thread
//! - **Affinity**: `sched_setaffinity` on the calling thread
//! - **Clocks**: per-thread CPU time for execution-time measurement
//!
//! All thread-level calls act on the *calling* thread. A task applies its own
//! setup as the first thing it does, which keeps the OS handle private to the
//! platform layer.
//!
//! # Example
//!
//! ```no_run
//! use rtask_platform::{PlatformSleep, SchedulingClass, ThreadSetup};
//! use std::time::{Duration, Instant};
//!
//! let setup = ThreadSetup::new(SchedulingClass::Fifo, 40).with_core(0);
//! setup.apply().expect("RT setup failed");
//!
//! let sleeper = PlatformSleep::new();
//! let mut next = Instant::now();
//! loop {
//!     next += Duration::from_millis(10);
//!     sleeper.sleep_until(next).expect("clock failure");
//! }
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]
#![deny(static_mut_refs)]
#![deny(unused_must_use)]

pub mod rt_setup;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(not(target_os = "linux"))]
mod fallback;

pub mod prelude;

#[cfg(target_os = "linux")]
pub use linux::{
    PlatformSleep, apply_scheduling, lock_memory, probe_realtime, set_thread_affinity,
    thread_cpu_time,
};

#[cfg(not(target_os = "linux"))]
pub use fallback::{
    PlatformSleep, apply_scheduling, lock_memory, probe_realtime, set_thread_affinity,
    thread_cpu_time,
};

pub use rt_setup::{SchedulingClass, ThreadSetup};

/// Remaining time below which `sleep_until` busy-spins instead of sleeping.
pub const SPIN_THRESHOLD_US: u64 = 100;

/// Margin left to the busy-spin tail after an OS sleep.
pub const SPIN_TAIL_US: u64 = 80;

/// Number of cores tasks can be placed on.
///
/// Cores are logical: on Linux, core `n` is the `n`-th CPU in the process
/// affinity mask, so the count follows a restricted cpuset. Never returns
/// zero.
pub fn num_cores() -> usize {
    #[cfg(target_os = "linux")]
    {
        linux::allowed_cpus().len().max(1)
    }
    #[cfg(not(target_os = "linux"))]
    {
        num_cpus::get().max(1)
    }
}
