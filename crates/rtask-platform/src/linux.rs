//! Linux-specific platform implementation.

#![allow(unsafe_code, reason = "libc scheduling, affinity and clock calls")]

use crate::SchedulingClass;
use core::time::Duration;
use libc::{
    CLOCK_MONOTONIC, CLOCK_THREAD_CPUTIME_ID, EINTR, ENOSYS, ENOTSUP, EPERM, MCL_CURRENT,
    MCL_FUTURE, SCHED_FIFO, SCHED_OTHER, SCHED_RR, clock_gettime, clock_nanosleep, cpu_set_t,
    mlockall, pthread_self, pthread_setschedparam, sched_get_priority_max,
    sched_get_priority_min, sched_getaffinity, sched_param, sched_setaffinity, timespec,
};
use rtask_errors::{SysError, SysResult};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::debug;

/// Linux-specific sleep implementation.
#[derive(Debug, Clone, Copy)]
pub struct PlatformSleep;

impl PlatformSleep {
    /// Create new platform sleep instance.
    pub fn new() -> Self {
        Self
    }

    /// High-precision sleep until an absolute instant.
    ///
    /// Uses clock_nanosleep for the bulk of the sleep, then busy-spins
    /// for the final ~80 microseconds. Returns immediately if `target`
    /// has already passed.
    pub fn sleep_until(&self, target: Instant) -> SysResult {
        loop {
            let now = Instant::now();
            if target <= now {
                return Ok(());
            }

            let duration = target.duration_since(now);

            // For very short durations, just busy-spin
            if duration < Duration::from_micros(crate::SPIN_THRESHOLD_US) {
                break;
            }

            let sleep_duration = duration.saturating_sub(Duration::from_micros(crate::SPIN_TAIL_US));
            let ts = duration_to_timespec(sleep_duration);

            // SAFETY: `ts` is a valid timespec on our stack and the remaining-time
            // pointer may be null for relative sleeps.
            let result = unsafe { clock_nanosleep(CLOCK_MONOTONIC, 0, &ts, std::ptr::null_mut()) };
            match result {
                0 => break,
                EINTR => continue,
                _ => return Err(SysError::ClockUnavailable),
            }
        }

        // Busy-spin for final precision
        while Instant::now() < target {
            std::hint::spin_loop();
        }

        Ok(())
    }
}

impl Default for PlatformSleep {
    fn default() -> Self {
        Self::new()
    }
}

fn duration_to_timespec(duration: Duration) -> timespec {
    timespec {
        tv_sec: libc::time_t::try_from(duration.as_secs()).unwrap_or(libc::time_t::MAX),
        tv_nsec: duration.subsec_nanos() as libc::c_long,
    }
}

fn map_sched_errno(errno: i32) -> SysError {
    match errno {
        EPERM => SysError::PermissionDenied,
        ENOSYS | ENOTSUP => SysError::UnsupportedClass,
        _ => SysError::SchedulerRejected,
    }
}

fn os_policy(class: SchedulingClass) -> i32 {
    match class {
        SchedulingClass::Fifo => SCHED_FIFO,
        SchedulingClass::RoundRobin => SCHED_RR,
        SchedulingClass::Other => SCHED_OTHER,
    }
}

/// Apply scheduling class and priority to the calling thread.
///
/// Under `Other` the OS priority is always 0; the runtime priority is only
/// recorded.
pub fn apply_scheduling(class: SchedulingClass, priority: u8) -> SysResult {
    let policy = os_policy(class);

    let sched_priority = if class.is_realtime() {
        // SAFETY: both calls only read the policy constant.
        let (min, max) = unsafe { (sched_get_priority_min(policy), sched_get_priority_max(policy)) };
        if min < 0 || max < 0 {
            return Err(SysError::UnsupportedClass);
        }
        i32::from(priority).clamp(min, max)
    } else {
        0
    };

    let param = sched_param { sched_priority };

    // SAFETY: pthread_self() always names the calling thread and `param`
    // outlives the call.
    let result = unsafe { pthread_setschedparam(pthread_self(), policy, &param) };
    if result != 0 {
        return Err(map_sched_errno(result));
    }

    Ok(())
}

/// CPUs the process may run on, ascending, read once from the affinity mask
/// of the first caller.
///
/// Logical core `n` used throughout the runtime is the `n`-th entry, so a
/// process confined to CPUs 2-3 sees cores 0 and 1.
pub(crate) fn allowed_cpus() -> &'static [usize] {
    static CPUS: OnceLock<Vec<usize>> = OnceLock::new();
    CPUS.get_or_init(|| {
        // SAFETY: cpu_set_t is a plain bitmask; all-zero is the empty set.
        let mut set: cpu_set_t = unsafe { std::mem::zeroed() };
        // SAFETY: pid 0 targets the calling thread; the size matches `set`.
        let result = unsafe { sched_getaffinity(0, std::mem::size_of::<cpu_set_t>(), &mut set) };

        let cpus = if result == 0 { cpus_in(&set) } else { Vec::new() };
        if cpus.is_empty() {
            debug!("affinity mask unavailable, assuming contiguous CPUs");
            return (0..num_cpus::get().max(1)).collect();
        }
        debug!(?cpus, "allowed CPUs");
        cpus
    })
}

/// CPU numbers set in `set`, ascending.
fn cpus_in(set: &cpu_set_t) -> Vec<usize> {
    let setsize = usize::try_from(libc::CPU_SETSIZE).unwrap_or(0);
    let mut cpus = Vec::new();
    for cpu in 0..setsize {
        // SAFETY: `cpu` is below CPU_SETSIZE.
        if unsafe { libc::CPU_ISSET(cpu, set) } {
            cpus.push(cpu);
        }
    }
    cpus
}

/// Bind the calling thread to logical `core`, or to every allowed CPU when
/// `None`.
pub fn set_thread_affinity(core: Option<usize>) -> SysResult {
    let cpus = allowed_cpus();

    // SAFETY: cpu_set_t is a plain bitmask; all-zero is the empty set.
    let mut set: cpu_set_t = unsafe { std::mem::zeroed() };

    let targets = match core {
        Some(core) => {
            let cpu = cpus.get(core).ok_or(SysError::AffinityRejected)?;
            std::slice::from_ref(cpu)
        }
        None => cpus,
    };
    for &cpu in targets {
        // SAFETY: `cpu` came from a mask of CPU_SETSIZE bits.
        unsafe { libc::CPU_SET(cpu, &mut set) };
    }

    // SAFETY: pid 0 targets the calling thread; `set` is initialized and its
    // size is passed alongside it.
    let result = unsafe { sched_setaffinity(0, std::mem::size_of::<cpu_set_t>(), &set) };
    if result != 0 {
        return Err(SysError::AffinityRejected);
    }

    debug!(?core, "thread affinity applied");
    Ok(())
}

/// CPU time consumed so far by the calling thread.
pub fn thread_cpu_time() -> SysResult<Duration> {
    let mut ts = timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };

    // SAFETY: `ts` is a valid, writable timespec.
    let result = unsafe { clock_gettime(CLOCK_THREAD_CPUTIME_ID, &mut ts) };
    if result != 0 {
        return Err(SysError::ClockUnavailable);
    }

    let secs = u64::try_from(ts.tv_sec).map_err(|_| SysError::ClockUnavailable)?;
    let nanos = u32::try_from(ts.tv_nsec).map_err(|_| SysError::ClockUnavailable)?;
    Ok(Duration::new(secs, nanos))
}

/// Check that the process may use `class`.
///
/// The probe runs on a throw-away thread so the caller keeps its own
/// scheduling parameters.
pub fn probe_realtime(class: SchedulingClass) -> SysResult {
    if !class.is_realtime() {
        return Ok(());
    }

    std::thread::Builder::new()
        .name("rtask-probe".into())
        .spawn(move || apply_scheduling(class, 1))
        .map_err(|_| SysError::ThreadSpawn)?
        .join()
        .map_err(|_| SysError::StartupAborted)?
}

/// Lock current and future pages in memory.
pub fn lock_memory() -> SysResult {
    // SAFETY: mlockall takes only flags.
    let result = unsafe { mlockall(MCL_CURRENT | MCL_FUTURE) };
    if result != 0 {
        return Err(SysError::MemoryLockFailed);
    }
    Ok(())
}
