//! Prelude for rtask.
//!
//! Re-exports what a task program usually needs.
//!
//! ```rust
//! use rtask::prelude::*;
//!
//! let spec = TaskSpec::aperiodic(std::time::Duration::from_millis(5)).with_priority(10);
//! assert_eq!(spec.kind, TaskKind::Aperiodic);
//! ```

pub use crate::{
    Activation, ExecClock, MultiprocessorPolicy, PeriodicActivation, PolicyConfig, Runtime,
    RuntimeConfig, SchedulingClass, SyncProtocol, TaskError, TaskIndex, TaskKind, TaskResult,
    TaskSpec, TaskState,
};
pub use crate::{
    deadline_miss, get_taskindex, get_threadid, ptask_create, ptask_create_ex,
    ptask_getnumcores, ptask_init, ptask_syserror, set_activation, task_absdl, task_activate,
    task_argument, task_atime, task_deadline, task_dmiss, task_migrate_to, task_period,
    task_setdeadline, task_setperiod, task_setwcet, task_wcet, wait_for_activation,
    wait_for_instance,
};
