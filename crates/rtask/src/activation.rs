//! Activation engine.
//!
//! Instance boundaries happen only on the task's own thread, inside
//! [`wait_for_instance`] and [`wait_for_activation`]. Other threads interact
//! with a task through its activation signal.

use crate::TaskIndex;
use crate::config::PeriodicActivation;
use crate::context;
use crate::runtime::Runtime;
use crate::task_spec::TaskKind;
use crate::tcb::{TaskControlBlock, TaskState};
use rtask_errors::{TaskError, TaskResult};
use rtask_platform::apply_scheduling;
use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Periodic releases leave the activation wait this long before the release
/// and finish on the platform's precise sleep.
const PRECISE_TAIL: Duration = Duration::from_micros(500);

/// Block until the first release of a freshly started task and open it.
pub(crate) fn first_release(runtime: &Runtime, tcb: &TaskControlBlock) {
    tcb.set_state(TaskState::WaitingActivation);
    let at = tcb.sync.wait();
    if mode_allows(tcb) {
        open_instance(runtime, tcb, at);
    } else {
        release_loop(runtime, tcb, at);
    }
}

/// Close the current instance and block until the next one is released.
pub(crate) fn next_instance(runtime: &Runtime, tcb: &TaskControlBlock) {
    let now = Instant::now();
    if tcb.instances() > 0 {
        runtime.monitor().check(tcb, now);
    }
    runtime.profiler().finish(tcb, now);
    tcb.complete_instance();
    tcb.set_state(TaskState::WaitingActivation);

    release_loop(runtime, tcb, tcb.activation_time());
}

/// Block until an explicit activation and open an instance at its delivery time.
pub(crate) fn next_activation(runtime: &Runtime, tcb: &TaskControlBlock) {
    tcb.set_state(TaskState::WaitingActivation);
    let at = tcb.sync.wait();
    open_instance(runtime, tcb, at);
}

fn release_loop(runtime: &Runtime, tcb: &TaskControlBlock, mut previous: Instant) {
    loop {
        let at = await_release(runtime, tcb, previous);
        if mode_allows(tcb) {
            open_instance(runtime, tcb, at);
            return;
        }
        trace!(task = tcb.index(), "dormant in current mode");
        previous = at;
    }
}

fn await_release(runtime: &Runtime, tcb: &TaskControlBlock, previous: Instant) -> Instant {
    let at = match tcb.kind() {
        TaskKind::Periodic => await_periodic(runtime, tcb, previous),
        TaskKind::Aperiodic => tcb.sync.wait(),
    };
    at.max(previous)
}

fn await_periodic(runtime: &Runtime, tcb: &TaskControlBlock, previous: Instant) -> Instant {
    let target = previous.checked_add(tcb.period());

    match runtime.config().periodic_activation {
        PeriodicActivation::Pending => {
            let (at, _) = tcb.sync.wait_release(target, false, PRECISE_TAIL);
            if let Err(e) = runtime.sleeper().sleep_until(at) {
                warn!(task = tcb.index(), error = %e, "precise sleep failed");
                std::thread::sleep(at.saturating_duration_since(Instant::now()));
            }
            at
        }
        PeriodicActivation::ResetPhase => {
            let (at, early) = tcb.sync.wait_release(target, true, Duration::ZERO);
            if early {
                debug!(task = tcb.index(), "periodic phase reset by activation");
            }
            at
        }
    }
}

fn mode_allows(tcb: &TaskControlBlock) -> bool {
    let Some(binding) = tcb.modes() else {
        return true;
    };

    let mode = binding.provider.current_mode();
    if let Some(params) = binding.provider.parameters(mode, tcb.index()) {
        if let Some(period) = params.period.filter(|period| !period.is_zero()) {
            tcb.set_period(period);
        }
        if let Some(deadline) = params.deadline {
            tcb.set_deadline(deadline);
        }
        if let Some(priority) = params.priority {
            if priority != tcb.priority() {
                tcb.request_priority(priority.min(rtask_errors::MAX_PRIORITY));
            }
        }
    }
    binding.is_active_in(mode)
}

fn open_instance(runtime: &Runtime, tcb: &TaskControlBlock, at: Instant) {
    if let Some(priority) = tcb.take_priority_change() {
        let class = runtime.config().policy.class;
        match apply_scheduling(class, priority) {
            Ok(()) => debug!(task = tcb.index(), priority, "priority applied"),
            Err(e) => warn!(task = tcb.index(), priority, error = %e, "priority change rejected"),
        }
    }

    tcb.open_instance(at);
    runtime.profiler().start(tcb);
    tcb.set_state(TaskState::Running);
    trace!(task = tcb.index(), instance = tcb.instances(), "instance released");
}

/// End the current instance and block until the next release.
///
/// Periodic tasks wake at the previous activation time plus the period; a
/// task that overran is released immediately and catches up without skipping.
/// Aperiodic tasks wait for [`task_activate`](crate::task_activate). The
/// deadline monitor and WCET profiler run for the instance that just ended.
///
/// # Errors
///
/// Returns [`TaskError::NotATask`](rtask_errors::TaskError::NotATask) outside
/// a task thread.
pub fn wait_for_instance() -> TaskResult {
    let context = context::current()?;
    next_instance(&context.runtime, &context.tcb);
    Ok(())
}

/// Block until an explicit activation, regardless of task kind.
///
/// The new instance starts at the delivery time. The periodic progression is
/// not re-armed and no monitoring happens.
///
/// # Errors
///
/// Returns [`TaskError::NotATask`](rtask_errors::TaskError::NotATask) outside
/// a task thread.
pub fn wait_for_activation() -> TaskResult {
    let context = context::current()?;
    next_activation(&context.runtime, &context.tcb);
    Ok(())
}

/// Stage the calling task's next release at `now + offset`.
///
/// A task already sleeping towards its next periodic release is woken at the
/// staged time instead.
///
/// # Errors
///
/// - [`TaskError::NotATask`] outside a task thread
/// - [`TaskError::InvalidConfig`] when `now + offset` overflows the clock
pub fn set_activation(offset: Duration) -> TaskResult {
    let context = context::current()?;
    context.tcb.sync.stage(release_after(offset)?);
    Ok(())
}

/// Release time `offset` from now.
///
/// # Errors
///
/// Returns [`TaskError::InvalidConfig`] when the offset overflows the clock.
pub(crate) fn release_after(offset: Duration) -> TaskResult<Instant> {
    Instant::now()
        .checked_add(offset)
        .ok_or_else(|| TaskError::config(format!("activation offset {offset:?} overflows the clock")))
}

/// Index of the calling task.
///
/// # Errors
///
/// Returns [`TaskError::NotATask`](rtask_errors::TaskError::NotATask) outside
/// a task thread.
pub fn get_taskindex() -> TaskResult<TaskIndex> {
    context::current().map(|context| context.tcb.index())
}

/// Argument the calling task was created with, if it has type `T`.
pub fn task_argument<T: Any + Send + Sync>() -> Option<Arc<T>> {
    let context = context::current().ok()?;
    Arc::clone(context.tcb.argument()?).downcast::<T>().ok()
}

/// Move the calling task to `core`.
///
/// # Errors
///
/// - [`TaskError::InvalidCore`](rtask_errors::TaskError::InvalidCore) for a
///   core outside `[0, ptask_getnumcores())`
/// - [`TaskError::MigrationDisallowed`](rtask_errors::TaskError::MigrationDisallowed)
///   under partitioned scheduling
/// - [`TaskError::NotATask`](rtask_errors::TaskError::NotATask) outside a
///   task thread
pub fn task_migrate_to(core: usize) -> TaskResult {
    let context = context::current()?;
    context
        .runtime
        .migration()
        .migrate(context.runtime.registry(), &context.tcb, core)
}
