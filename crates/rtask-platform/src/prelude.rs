//! Prelude module for common platform types.

pub use crate::rt_setup::{SchedulingClass, ThreadSetup};
pub use crate::{
    PlatformSleep, apply_scheduling, lock_memory, num_cores, probe_realtime,
    set_thread_affinity, thread_cpu_time,
};
