//! Top-level error type and classification.
//!
//! [`TaskError`] is what every fallible runtime operation returns. Its
//! [`severity`](TaskError::severity) decides whether the process-wide facade
//! reports and terminates or hands the error back to the caller.

use core::fmt;

use crate::SysError;

/// Top-level error for runtime operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    /// Every registry slot holds a live task
    #[error("Task registry full: capacity {capacity}")]
    CapacityExceeded {
        /// Registry capacity
        capacity: usize,
    },

    /// No live or terminated task occupies this index
    #[error("No task with index {0}")]
    InvalidIndex(usize),

    /// Core id outside `[0, num_cores)`
    #[error("Core {core} out of range [0, {num_cores})")]
    InvalidCore {
        /// Requested core
        core: usize,
        /// Number of cores on this machine
        num_cores: usize,
    },

    /// Priority outside `[0, 99]`
    #[error("Priority {0} out of range [0, 99]")]
    InvalidPriority(i32),

    /// Migration requested under partitioned scheduling
    #[error("Migration disallowed under partitioned scheduling")]
    MigrationDisallowed,

    /// A task-only operation was called from a thread that is not a task
    #[error("Calling thread is not a task")]
    NotATask,

    /// The process-wide runtime has not been initialized
    #[error("Runtime not initialized")]
    NotInitialized,

    /// The process-wide runtime was initialized twice
    #[error("Runtime already initialized")]
    AlreadyInitialized,

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An OS primitive failed
    #[error("{operation}: {source}")]
    Sys {
        /// Name of the failing operation
        operation: &'static str,
        /// Underlying OS failure
        #[source]
        source: SysError,
    },
}

impl TaskError {
    /// Wrap an OS failure with the name of the operation that hit it.
    pub fn sys(operation: &'static str, source: SysError) -> Self {
        TaskError::Sys { operation, source }
    }

    /// Create a configuration error with a message.
    pub fn config(msg: impl Into<String>) -> Self {
        TaskError::InvalidConfig(msg.into())
    }

    /// Get the error category for classification.
    pub fn category(&self) -> ErrorCategory {
        match self {
            TaskError::CapacityExceeded { .. } | TaskError::InvalidIndex(_) => {
                ErrorCategory::Registry
            }
            TaskError::InvalidCore { .. } | TaskError::MigrationDisallowed => {
                ErrorCategory::Affinity
            }
            TaskError::InvalidPriority(_) | TaskError::NotATask => ErrorCategory::Usage,
            TaskError::NotInitialized
            | TaskError::AlreadyInitialized
            | TaskError::InvalidConfig(_) => ErrorCategory::Config,
            TaskError::Sys { .. } => ErrorCategory::System,
        }
    }

    /// Get the error severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TaskError::Sys { source, .. } => source.severity(),
            TaskError::NotInitialized | TaskError::AlreadyInitialized => {
                ErrorSeverity::Critical
            }
            TaskError::MigrationDisallowed => ErrorSeverity::Warning,
            TaskError::CapacityExceeded { .. }
            | TaskError::InvalidIndex(_)
            | TaskError::InvalidCore { .. }
            | TaskError::InvalidPriority(_)
            | TaskError::NotATask
            | TaskError::InvalidConfig(_) => ErrorSeverity::Error,
        }
    }

    /// Whether continuing would run tasks with undefined scheduling semantics.
    pub fn is_fatal(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }

    /// Check if the caller can handle this error and carry on.
    pub fn is_recoverable(&self) -> bool {
        !self.is_fatal()
    }
}

/// Error category for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorCategory {
    /// Slot allocation and index lookup
    Registry = 0,
    /// Core assignment and migration
    Affinity = 1,
    /// API misuse by the caller
    Usage = 2,
    /// Runtime configuration
    Config = 3,
    /// OS primitives
    System = 4,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Registry => write!(f, "Registry"),
            ErrorCategory::Affinity => write!(f, "Affinity"),
            ErrorCategory::Usage => write!(f, "Usage"),
            ErrorCategory::Config => write!(f, "Config"),
            ErrorCategory::System => write!(f, "System"),
        }
    }
}

/// Error severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ErrorSeverity {
    /// Informational, no action required
    Info = 0,
    /// Warning, may require attention
    Warning = 1,
    /// Error, operation failed
    Error = 2,
    /// Critical, scheduling semantics are undefined if execution continues
    Critical = 3,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Extension trait for attaching an operation name to OS failures.
pub trait ResultExt<T> {
    /// Turn a raw [`SysError`] into a [`TaskError::Sys`] naming `operation`.
    fn during(self, operation: &'static str) -> Result<T, TaskError>;
}

impl<T> ResultExt<T> for std::result::Result<T, SysError> {
    fn during(self, operation: &'static str) -> Result<T, TaskError> {
        self.map_err(|source| TaskError::sys(operation, source))
    }
}
