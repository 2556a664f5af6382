//! OS primitive failure codes.
//!
//! These are produced by the platform layer on task threads, so they are
//! `Copy`, fixed-size and allocation-free.

use core::fmt;

use crate::common::ErrorSeverity;

/// Failure of an OS thread, scheduling, affinity or clock primitive.
///
/// # Examples
///
/// ```
/// use rtask_errors::{SysError, ErrorSeverity};
///
/// let err = SysError::PermissionDenied;
/// assert_eq!(err.code(), 2);
/// assert_eq!(err.severity(), ErrorSeverity::Critical);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SysError {
    /// The OS could not create a thread
    ThreadSpawn = 1,
    /// Real-time scheduling requires privileges the process lacks
    PermissionDenied = 2,
    /// The scheduling class is not available on this platform
    UnsupportedClass = 3,
    /// The OS rejected the scheduling parameters
    SchedulerRejected = 4,
    /// The OS rejected the CPU affinity request
    AffinityRejected = 5,
    /// A required clock could not be read
    ClockUnavailable = 6,
    /// Memory pages could not be locked
    MemoryLockFailed = 7,
    /// A task thread exited before completing its start-up handshake
    StartupAborted = 8,
}

impl SysError {
    /// Get the numeric error code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Get the error severity.
    ///
    /// Affinity and clock failures leave the task runnable, everything else
    /// leaves scheduling semantics undefined.
    pub fn severity(self) -> ErrorSeverity {
        match self {
            SysError::AffinityRejected => ErrorSeverity::Error,
            SysError::ClockUnavailable => ErrorSeverity::Warning,
            SysError::MemoryLockFailed => ErrorSeverity::Warning,
            SysError::ThreadSpawn
            | SysError::PermissionDenied
            | SysError::UnsupportedClass
            | SysError::SchedulerRejected
            | SysError::StartupAborted => ErrorSeverity::Critical,
        }
    }

    /// Create an error from a code.
    ///
    /// Returns `None` if the code does not correspond to a known error.
    ///
    /// # Examples
    ///
    /// ```
    /// use rtask_errors::SysError;
    ///
    /// assert_eq!(SysError::from_code(1), Some(SysError::ThreadSpawn));
    /// assert_eq!(SysError::from_code(0), None);
    /// ```
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(SysError::ThreadSpawn),
            2 => Some(SysError::PermissionDenied),
            3 => Some(SysError::UnsupportedClass),
            4 => Some(SysError::SchedulerRejected),
            5 => Some(SysError::AffinityRejected),
            6 => Some(SysError::ClockUnavailable),
            7 => Some(SysError::MemoryLockFailed),
            8 => Some(SysError::StartupAborted),
            _ => None,
        }
    }
}

impl fmt::Display for SysError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SysError::ThreadSpawn => write!(f, "Cannot create thread"),
            SysError::PermissionDenied => write!(f, "Insufficient privilege for real-time scheduling"),
            SysError::UnsupportedClass => write!(f, "Scheduling class not supported"),
            SysError::SchedulerRejected => write!(f, "Scheduling parameters rejected"),
            SysError::AffinityRejected => write!(f, "CPU affinity rejected"),
            SysError::ClockUnavailable => write!(f, "Clock unavailable"),
            SysError::MemoryLockFailed => write!(f, "Cannot lock memory"),
            SysError::StartupAborted => write!(f, "Task thread aborted during start-up"),
        }
    }
}

impl std::error::Error for SysError {}
