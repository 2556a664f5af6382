//! # rtask
//!
//! Periodic and aperiodic real-time tasks on top of OS threads.
//!
//! Each task is one OS thread scheduled by a fixed-priority (or best-effort)
//! class. A task body loops over *instances*: it does one instance of work,
//! then calls [`wait_for_instance`] to block until its next release. The
//! runtime keeps, per task:
//!
//! - the activation time and absolute deadline of the current instance
//! - a deadline-miss counter, bumped once per late completion
//! - the worst observed execution time, when measurement is enabled
//! - the core the task runs on, fixed under partitioned scheduling and
//!   movable by the task itself under global scheduling
//!
//! ## Architecture
//!
//! - [`config`] - policy triple and runtime tunables
//! - [`Runtime`] - owns the [`Registry`] of [`TaskControlBlock`]s
//! - [`activation`] - instance boundaries and activation signals
//! - [`monitor`] / [`profiler`] - deadline misses and WCET
//! - [`migration`] - core placement
//! - [`modes`] - mode hook consulted at instance boundaries
//! - [`api`] - process-wide `ptask_*` facade
//!
//! ## Blocking
//!
//! Task threads block only in [`wait_for_instance`] and
//! [`wait_for_activation`]. Accessors never block on a task; they read
//! atomics or take the registry lock briefly.
//!
//! ## Example
//!
//! ```no_run
//! use rtask::prelude::*;
//! use std::time::Duration;
//!
//! ptask_init(
//!     SchedulingClass::Fifo,
//!     MultiprocessorPolicy::Partitioned,
//!     SyncProtocol::PriorityInheritance,
//! );
//!
//! let index = ptask_create(
//!     || loop {
//!         // control law
//!         if wait_for_instance().is_err() {
//!             break;
//!         }
//!     },
//!     Duration::from_millis(10),
//!     Duration::from_millis(8),
//!     40,
//!     Activation::Immediate,
//! )?;
//!
//! std::thread::sleep(Duration::from_secs(1));
//! println!("misses: {}", task_dmiss(index)?);
//! # Ok::<(), rtask::TaskError>(())
//! ```

#![deny(
    unsafe_op_in_unsafe_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    missing_docs,
    missing_debug_implementations
)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod activation;
pub mod api;
pub mod config;
mod context;
pub mod migration;
pub mod modes;
pub mod monitor;
pub mod profiler;
pub mod registry;
pub mod runtime;
pub mod task_spec;
pub mod tcb;

pub mod prelude;

/// Stable handle of a task: its registry slot.
pub type TaskIndex = usize;

pub use activation::{
    get_taskindex, set_activation, task_argument, task_migrate_to, wait_for_activation,
    wait_for_instance,
};
pub use api::{
    deadline_miss, get_threadid, ptask_count, ptask_create, ptask_create_ex, ptask_getnumcores,
    ptask_init, ptask_init_with, ptask_runtime, ptask_syserror, set_activation_of, task_absdl,
    task_activate, task_atime, task_core, task_deadline, task_dmiss, task_instances, task_join,
    task_period, task_priority, task_setdeadline, task_setperiod, task_setpriority,
    task_setwcet, task_snapshot, task_state, task_wcet,
};
pub use config::{
    ExecClock, MAX_TASKS, MultiprocessorPolicy, PeriodicActivation, PolicyConfig,
    RuntimeConfig, RuntimeConfigBuilder, SyncProtocol,
};
pub use modes::{ModeId, ModeParameters, ModeProvider, StaticModeTable};
pub use registry::Registry;
pub use rtask_errors::{MAX_PRIORITY, SysError, TaskError, TaskResult};
pub use rtask_platform::SchedulingClass;
pub use runtime::Runtime;
pub use task_spec::{Activation, MAX_MODES, ModeBinding, TaskArgument, TaskBody, TaskKind, TaskSpec};
pub use tcb::{TaskControlBlock, TaskSnapshot, TaskState};
