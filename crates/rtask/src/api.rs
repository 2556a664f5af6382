//! Process-wide facade.
//!
//! One [`Runtime`] lives behind a `OnceLock` and every `ptask_*` / `task_*`
//! function routes through it. Fatal errors (unsupported class, missing
//! privileges, thread creation failure, double init, use before init) are
//! reported with [`ptask_syserror`] and end the process. Everything else is
//! returned to the caller.
//!
//! Code that needs several runtimes, or that wants to observe fatal errors,
//! uses [`Runtime`] directly.

use crate::TaskIndex;
use crate::config::{MultiprocessorPolicy, PolicyConfig, RuntimeConfig, SyncProtocol};
use crate::context;
use crate::runtime::Runtime;
use crate::task_spec::{Activation, TaskSpec};
use crate::tcb::{TaskSnapshot, TaskState};
use rtask_errors::{TaskError, TaskResult};
use rtask_platform::SchedulingClass;
use std::sync::{Arc, OnceLock};
use std::thread::ThreadId;
use std::time::{Duration, Instant};

static RUNTIME: OnceLock<Arc<Runtime>> = OnceLock::new();

/// Report a fatal error and terminate the process with status 1.
#[expect(clippy::exit, reason = "fatal runtime errors end the process")]
pub fn ptask_syserror(function: &str, message: &str) -> ! {
    tracing::error!(function, message, "fatal runtime error");
    eprintln!("{function}: {message}");
    std::process::exit(1);
}

fn fatal_or<T>(operation: &str, result: TaskResult<T>) -> TaskResult<T> {
    match result {
        Err(e) if e.is_fatal() => ptask_syserror(operation, &e.to_string()),
        other => other,
    }
}

fn runtime(operation: &str) -> Arc<Runtime> {
    if let Some(runtime) = context::current_runtime() {
        return runtime;
    }
    match RUNTIME.get() {
        Some(runtime) => Arc::clone(runtime),
        None => ptask_syserror(operation, &TaskError::NotInitialized.to_string()),
    }
}

/// Initialize the process-wide runtime with a policy triple.
///
/// Must be called once, before any task is created.
pub fn ptask_init(class: SchedulingClass, policy: MultiprocessorPolicy, protocol: SyncProtocol) {
    ptask_init_with(RuntimeConfig::with_policy(PolicyConfig::new(
        class, policy, protocol,
    )));
}

/// Initialize the process-wide runtime with a full configuration.
pub fn ptask_init_with(config: RuntimeConfig) {
    if RUNTIME.get().is_some() {
        ptask_syserror("ptask_init", &TaskError::AlreadyInitialized.to_string());
    }

    let runtime = match Runtime::new(config) {
        Ok(runtime) => runtime,
        Err(e) => ptask_syserror("ptask_init", &e.to_string()),
    };

    if RUNTIME.set(runtime).is_err() {
        ptask_syserror("ptask_init", &TaskError::AlreadyInitialized.to_string());
    }
}

/// The process-wide runtime, if initialized.
pub fn ptask_runtime() -> Option<Arc<Runtime>> {
    RUNTIME.get().cloned()
}

/// Number of cores tasks may be placed on.
pub fn ptask_getnumcores() -> usize {
    rtask_platform::num_cores()
}

/// Create a task from explicit parameters.
///
/// # Errors
///
/// Returns recoverable creation errors; fatal ones end the process.
pub fn ptask_create<F>(
    body: F,
    period: Duration,
    deadline: Duration,
    priority: i32,
    activation: Activation,
) -> TaskResult<TaskIndex>
where
    F: FnOnce() + Send + 'static,
{
    let spec = TaskSpec::periodic(period)
        .with_deadline(deadline)
        .with_priority(priority)
        .with_activation(activation);
    ptask_create_ex(body, spec)
}

/// Create a task from a [`TaskSpec`].
///
/// # Errors
///
/// Returns recoverable creation errors; fatal ones end the process.
pub fn ptask_create_ex<F>(body: F, spec: TaskSpec) -> TaskResult<TaskIndex>
where
    F: FnOnce() + Send + 'static,
{
    fatal_or("ptask_create", runtime("ptask_create").create(body, spec))
}

/// Deliver one activation to task `index`.
///
/// Returns `false` when it was coalesced with one already pending.
pub fn task_activate(index: TaskIndex) -> TaskResult<bool> {
    runtime("task_activate").activate(index)
}

/// Stage the next release of task `index` at `now + offset`.
pub fn set_activation_of(index: TaskIndex, offset: Duration) -> TaskResult {
    runtime("set_activation_of").set_activation_of(index, offset)
}

/// Thread executing task `index`.
pub fn get_threadid(index: TaskIndex) -> TaskResult<ThreadId> {
    runtime("get_threadid").thread_id(index)
}

/// Deadline misses of task `index`.
pub fn deadline_miss(index: TaskIndex) -> TaskResult<u64> {
    runtime("deadline_miss").deadline_misses(index)
}

/// Deadline misses of task `index`.
pub fn task_dmiss(index: TaskIndex) -> TaskResult<u64> {
    runtime("task_dmiss").deadline_misses(index)
}

/// Change the relative deadline of task `index`.
pub fn task_setdeadline(index: TaskIndex, deadline: Duration) -> TaskResult {
    runtime("task_setdeadline").set_deadline(index, deadline)
}

/// Relative deadline of task `index`.
pub fn task_deadline(index: TaskIndex) -> TaskResult<Duration> {
    runtime("task_deadline").deadline(index)
}

/// Change the period of task `index`.
pub fn task_setperiod(index: TaskIndex, period: Duration) -> TaskResult {
    runtime("task_setperiod").set_period(index, period)
}

/// Period of task `index`.
pub fn task_period(index: TaskIndex) -> TaskResult<Duration> {
    runtime("task_period").period(index)
}

/// Overwrite the WCET of task `index`.
pub fn task_setwcet(index: TaskIndex, wcet: Duration) -> TaskResult {
    runtime("task_setwcet").set_wcet(index, wcet)
}

/// Longest measured instance of task `index`.
pub fn task_wcet(index: TaskIndex) -> TaskResult<Duration> {
    runtime("task_wcet").wcet(index)
}

/// Activation time of the current instance of task `index`.
pub fn task_atime(index: TaskIndex) -> TaskResult<Instant> {
    runtime("task_atime").activation_time(index)
}

/// Absolute deadline of the current instance of task `index`.
pub fn task_absdl(index: TaskIndex) -> TaskResult<Instant> {
    runtime("task_absdl").absolute_deadline(index)
}

/// Instances completed by task `index`.
pub fn task_instances(index: TaskIndex) -> TaskResult<u64> {
    runtime("task_instances").instances(index)
}

/// Core of task `index`, `None` when unpinned.
pub fn task_core(index: TaskIndex) -> TaskResult<Option<usize>> {
    runtime("task_core").core(index)
}

/// Lifecycle stage of task `index`.
pub fn task_state(index: TaskIndex) -> TaskResult<TaskState> {
    runtime("task_state").state(index)
}

/// Priority of task `index`.
pub fn task_priority(index: TaskIndex) -> TaskResult<u8> {
    runtime("task_priority").priority(index)
}

/// Change the priority of task `index`, applied at its next boundary.
pub fn task_setpriority(index: TaskIndex, priority: i32) -> TaskResult {
    runtime("task_setpriority").set_priority(index, priority)
}

/// Copy of the observable state of task `index`.
pub fn task_snapshot(index: TaskIndex) -> TaskResult<TaskSnapshot> {
    runtime("task_snapshot").snapshot(index)
}

/// Wait for task `index` to terminate.
pub fn task_join(index: TaskIndex) -> TaskResult<bool> {
    runtime("task_join").join(index)
}

/// Number of live tasks.
pub fn ptask_count() -> usize {
    runtime("ptask_count").count()
}
