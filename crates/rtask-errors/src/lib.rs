//! Error taxonomy for the rtask real-time task runtime
//!
//! Errors fall into three classes:
//!
//! - **Fatal**: the OS refused something the runtime cannot continue without
//!   (thread creation, scheduling class, real-time privilege). These carry
//!   [`ErrorSeverity::Critical`] and the process-wide facade terminates on them.
//! - **Recoverable**: bad arguments or policy rejections (registry full, invalid
//!   core, migration under partitioned scheduling). The caller decides.
//! - **Observational**: deadline misses. These are never errors; they are counted.
//!
//! # Modules
//!
//! - [`common`]: [`TaskError`], severity and category classification
//! - [`sys`]: [`SysError`], `Copy` OS failure codes safe to build on a task thread
//!
//! # Example
//!
//! ```
//! use rtask_errors::prelude::*;
//!
//! fn check_priority(priority: i32) -> TaskResult<u8> {
//!     u8::try_from(priority)
//!         .ok()
//!         .filter(|p| *p <= MAX_PRIORITY)
//!         .ok_or(TaskError::InvalidPriority(priority))
//! }
//!
//! assert!(check_priority(50).is_ok());
//! assert!(check_priority(100).is_err());
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod common;
pub mod prelude;
pub mod sys;

pub use common::{ErrorCategory, ErrorSeverity, ResultExt, TaskError};
pub use sys::SysError;

/// Highest priority a task may request.
pub const MAX_PRIORITY: u8 = 99;

/// A specialized `Result` type for runtime operations.
pub type TaskResult<T = ()> = std::result::Result<T, TaskError>;

/// A specialized `Result` type for raw OS primitives.
pub type SysResult<T = ()> = std::result::Result<T, SysError>;
