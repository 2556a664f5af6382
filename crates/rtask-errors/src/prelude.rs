//! Prelude module for convenient error handling imports.

pub use crate::{
    MAX_PRIORITY, SysResult, TaskResult,
    common::{ErrorCategory, ErrorSeverity, ResultExt, TaskError},
    sys::SysError,
};
