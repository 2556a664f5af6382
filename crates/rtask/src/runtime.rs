//! Runtime: owns the registry and the policy every task runs under.

use crate::TaskIndex;
use crate::activation;
use crate::config::{PolicyConfig, RuntimeConfig};
use crate::context::{self, TaskContext};
use crate::migration::MigrationManager;
use crate::monitor::DeadlineMonitor;
use crate::profiler::WcetProfiler;
use crate::registry::Registry;
use crate::task_spec::{Activation, MAX_MODES, TaskBody, TaskKind, TaskSpec};
use crate::tcb::{TaskControlBlock, TaskSnapshot, TaskState, TcbInit};
use crossbeam::channel;
use rtask_errors::{MAX_PRIORITY, ResultExt, SysError, SysResult, TaskError, TaskResult};
use rtask_platform::{PlatformSleep, ThreadSetup, lock_memory, num_cores, probe_realtime};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Task runtime.
///
/// Created once with a fixed [`RuntimeConfig`]; tasks are addressed by
/// [`TaskIndex`].
///
/// ```no_run
/// use rtask::{Runtime, RuntimeConfig, TaskSpec, wait_for_instance};
/// use std::time::Duration;
///
/// # fn main() -> rtask::TaskResult {
/// let runtime = Runtime::new(RuntimeConfig::default())?;
/// let index = runtime.create(
///     || loop {
///         // one instance of work
///         if wait_for_instance().is_err() {
///             break;
///         }
///     },
///     TaskSpec::periodic(Duration::from_millis(10)).activate_now(),
/// )?;
/// assert_eq!(runtime.count(), 1);
/// # let _ = index;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Runtime {
    config: RuntimeConfig,
    registry: Registry,
    migration: MigrationManager,
    monitor: DeadlineMonitor,
    profiler: WcetProfiler,
    sleeper: PlatformSleep,
    epoch: Instant,
}

/// Marks a task terminated when its thread leaves the body, panics included.
struct TerminationGuard(Arc<TaskControlBlock>);

impl Drop for TerminationGuard {
    fn drop(&mut self) {
        self.0.set_state(TaskState::Terminated);
        context::clear();
        debug!(task = self.0.index(), "task terminated");
    }
}

fn checked_priority(priority: i32) -> TaskResult<u8> {
    u8::try_from(priority)
        .ok()
        .filter(|p| *p <= MAX_PRIORITY)
        .ok_or(TaskError::InvalidPriority(priority))
}

fn checked_period(kind: TaskKind, period: Duration) -> TaskResult {
    if kind == TaskKind::Periodic && period.is_zero() {
        return Err(TaskError::config("periodic task needs a period greater than 0"));
    }
    Ok(())
}

impl Runtime {
    /// Validate `config`, probe the scheduling class and build a runtime.
    ///
    /// # Errors
    ///
    /// - [`TaskError::InvalidConfig`] for an invalid configuration
    /// - [`TaskError::Sys`] when the OS refuses the scheduling class
    pub fn new(config: RuntimeConfig) -> TaskResult<Arc<Self>> {
        config.validate()?;

        let class = config.policy.class;
        probe_realtime(class).during("ptask_init")?;

        if config.lock_memory && class.is_realtime() {
            if let Err(e) = lock_memory() {
                warn!(error = %e, "memory lock failed, continuing unlocked");
            }
        }

        let cores = num_cores();
        info!(
            class = %class,
            multiprocessor = ?config.policy.multiprocessor,
            protocol = ?config.policy.protocol,
            num_cores = cores,
            capacity = config.capacity,
            "runtime initialized"
        );

        Ok(Arc::new(Self {
            registry: Registry::new(config.capacity),
            migration: MigrationManager::new(config.policy.multiprocessor, cores),
            monitor: DeadlineMonitor,
            profiler: WcetProfiler::new(config.exec_clock),
            sleeper: PlatformSleep::new(),
            epoch: Instant::now(),
            config,
        }))
    }

    /// Configuration in effect.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Policy triple in effect.
    pub fn policy(&self) -> PolicyConfig {
        self.config.policy
    }

    /// Number of cores tasks may be placed on.
    pub fn num_cores(&self) -> usize {
        self.migration.num_cores()
    }

    /// Time origin of [`TaskSnapshot`] offsets.
    pub fn epoch(&self) -> Instant {
        self.epoch
    }

    /// Task registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn migration(&self) -> &MigrationManager {
        &self.migration
    }

    pub(crate) fn monitor(&self) -> &DeadlineMonitor {
        &self.monitor
    }

    pub(crate) fn profiler(&self) -> &WcetProfiler {
        &self.profiler
    }

    pub(crate) fn sleeper(&self) -> &PlatformSleep {
        &self.sleeper
    }

    /// Create a task running `body` with parameters `spec`.
    ///
    /// Returns once the task thread has applied its scheduling parameters.
    /// With [`Activation::Immediate`] the first instance is released before
    /// returning.
    ///
    /// # Errors
    ///
    /// - [`TaskError::InvalidPriority`], [`TaskError::InvalidCore`] or
    ///   [`TaskError::InvalidConfig`] for a bad `spec`
    /// - [`TaskError::CapacityExceeded`] when the registry is full
    /// - [`TaskError::Sys`] when the thread cannot be started or set up
    pub fn create<F>(self: &Arc<Self>, body: F, spec: TaskSpec) -> TaskResult<TaskIndex>
    where
        F: FnOnce() + Send + 'static,
    {
        let priority = checked_priority(spec.priority)?;
        checked_period(spec.kind, spec.period)?;

        if let Some(binding) = &spec.modes {
            if binding.modes.is_empty() || binding.modes.len() > MAX_MODES {
                return Err(TaskError::config(format!(
                    "mode list must hold 1 to {MAX_MODES} modes, got {}",
                    binding.modes.len()
                )));
            }
        }

        let core = self.migration.initial_core(spec.processor)?;

        let tcb = self.registry.reserve(|index| {
            Ok(TaskControlBlock::new(TcbInit {
                index,
                kind: spec.kind,
                epoch: self.epoch,
                period: spec.period,
                deadline: spec.deadline,
                priority,
                core,
                measure: spec.measure,
                argument: spec.argument.clone(),
                modes: spec.modes.clone(),
            }))
        })?;
        let index = tcb.index();

        let mut setup = ThreadSetup::new(self.config.policy.class, priority);
        if let Some(core) = core {
            setup = setup.with_core(core);
        }

        if let Err(e) = self.spawn(&tcb, setup, Box::new(body)) {
            self.registry.release(index);
            return Err(e);
        }

        info!(
            task = index,
            kind = ?spec.kind,
            period_us = spec.period.as_micros() as u64,
            deadline_us = spec.deadline.as_micros() as u64,
            priority,
            ?core,
            "task created"
        );

        if spec.activation == Activation::Immediate {
            tcb.sync.signal(Instant::now());
        }

        Ok(index)
    }

    fn spawn(
        self: &Arc<Self>,
        tcb: &Arc<TaskControlBlock>,
        setup: ThreadSetup,
        body: TaskBody,
    ) -> TaskResult {
        let (ready_tx, ready_rx) = channel::bounded::<SysResult>(1);
        let runtime = Arc::clone(self);
        let task = Arc::clone(tcb);

        let handle = thread::Builder::new()
            .name(format!("rtask-{}", tcb.index()))
            .spawn(move || {
                context::install(TaskContext {
                    runtime: Arc::clone(&runtime),
                    tcb: Arc::clone(&task),
                });
                task.bind_thread(thread::current());
                let _guard = TerminationGuard(Arc::clone(&task));

                let setup_result = setup.apply();
                let ready = setup_result.is_ok();
                if ready_tx.send(setup_result).is_err() || !ready {
                    return;
                }
                drop(ready_tx);

                activation::first_release(&runtime, &task);
                body();
            })
            .map_err(|_| TaskError::sys("ptask_create", SysError::ThreadSpawn))?;

        let started = ready_rx
            .recv()
            .unwrap_or(Err(SysError::StartupAborted));

        if let Err(e) = started {
            let _ = handle.join();
            return Err(TaskError::sys("ptask_create", e));
        }

        tcb.store_join_handle(handle);
        Ok(())
    }

    /// Control block of task `index`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidIndex`] for an unknown index.
    pub fn lookup(&self, index: TaskIndex) -> TaskResult<Arc<TaskControlBlock>> {
        self.registry.lookup(index)
    }

    /// Number of live tasks.
    pub fn count(&self) -> usize {
        self.registry.count()
    }

    /// Deliver one activation to task `index`.
    ///
    /// Returns `false` when an activation was already pending and this one
    /// was coalesced with it.
    pub fn activate(&self, index: TaskIndex) -> TaskResult<bool> {
        let tcb = self.lookup(index)?;
        let delivered = tcb.sync.signal(Instant::now());
        if delivered {
            debug!(task = index, "activation delivered");
        } else {
            debug!(task = index, "activation coalesced");
        }
        Ok(delivered)
    }

    /// Stage the next release of task `index` at `now + offset`.
    ///
    /// A periodic task already sleeping towards its next release wakes at the
    /// staged time instead.
    ///
    /// # Errors
    ///
    /// - [`TaskError::InvalidIndex`] for an unknown index
    /// - [`TaskError::InvalidConfig`] when `now + offset` overflows the clock
    pub fn set_activation_of(&self, index: TaskIndex, offset: Duration) -> TaskResult {
        let tcb = self.lookup(index)?;
        tcb.sync.stage(activation::release_after(offset)?);
        Ok(())
    }

    /// Period of task `index`.
    pub fn period(&self, index: TaskIndex) -> TaskResult<Duration> {
        Ok(self.lookup(index)?.period())
    }

    /// Change the period of task `index`. Takes effect at its next boundary.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidConfig`] for a zero period on a periodic
    /// task.
    pub fn set_period(&self, index: TaskIndex, period: Duration) -> TaskResult {
        let tcb = self.lookup(index)?;
        checked_period(tcb.kind(), period)?;
        tcb.set_period(period);
        Ok(())
    }

    /// Relative deadline of task `index`.
    pub fn deadline(&self, index: TaskIndex) -> TaskResult<Duration> {
        Ok(self.lookup(index)?.deadline())
    }

    /// Change the relative deadline of task `index`. Takes effect at its next
    /// boundary.
    pub fn set_deadline(&self, index: TaskIndex, deadline: Duration) -> TaskResult {
        self.lookup(index)?.set_deadline(deadline);
        Ok(())
    }

    /// Longest measured instance of task `index`.
    pub fn wcet(&self, index: TaskIndex) -> TaskResult<Duration> {
        Ok(self.lookup(index)?.wcet())
    }

    /// Overwrite the WCET of task `index`.
    pub fn set_wcet(&self, index: TaskIndex, wcet: Duration) -> TaskResult {
        self.lookup(index)?.set_wcet(wcet);
        Ok(())
    }

    /// Deadline misses of task `index`.
    pub fn deadline_misses(&self, index: TaskIndex) -> TaskResult<u64> {
        Ok(self.lookup(index)?.deadline_misses())
    }

    /// Activation time of the current instance of task `index`.
    pub fn activation_time(&self, index: TaskIndex) -> TaskResult<Instant> {
        Ok(self.lookup(index)?.activation_time())
    }

    /// Absolute deadline of the current instance of task `index`.
    pub fn absolute_deadline(&self, index: TaskIndex) -> TaskResult<Instant> {
        Ok(self.lookup(index)?.absolute_deadline())
    }

    /// Instances completed by task `index`.
    pub fn instances(&self, index: TaskIndex) -> TaskResult<u64> {
        Ok(self.lookup(index)?.instances())
    }

    /// Core of task `index`, `None` when unpinned.
    pub fn core(&self, index: TaskIndex) -> TaskResult<Option<usize>> {
        Ok(self.lookup(index)?.core())
    }

    /// Lifecycle stage of task `index`.
    pub fn state(&self, index: TaskIndex) -> TaskResult<TaskState> {
        Ok(self.lookup(index)?.state())
    }

    /// Priority of task `index`.
    pub fn priority(&self, index: TaskIndex) -> TaskResult<u8> {
        Ok(self.lookup(index)?.priority())
    }

    /// Change the priority of task `index`. The task applies it to its
    /// thread at its next boundary.
    pub fn set_priority(&self, index: TaskIndex, priority: i32) -> TaskResult {
        let priority = checked_priority(priority)?;
        self.lookup(index)?.request_priority(priority);
        Ok(())
    }

    /// Thread executing task `index`.
    pub fn thread_id(&self, index: TaskIndex) -> TaskResult<ThreadId> {
        self.lookup(index)?
            .thread()
            .map(thread::Thread::id)
            .ok_or(TaskError::InvalidIndex(index))
    }

    /// Copy of the observable state of task `index`.
    pub fn snapshot(&self, index: TaskIndex) -> TaskResult<TaskSnapshot> {
        Ok(self.lookup(index)?.snapshot())
    }

    /// Wait for task `index` to terminate.
    ///
    /// Returns `false` if there was nothing to wait for: the task was already
    /// joined, or the caller is the task itself.
    pub fn join(&self, index: TaskIndex) -> TaskResult<bool> {
        let tcb = self.lookup(index)?;
        if tcb.thread().map(thread::Thread::id) == Some(thread::current().id()) {
            return Ok(false);
        }

        let Some(handle) = tcb.take_join_handle() else {
            return Ok(false);
        };
        if handle.join().is_err() {
            warn!(task = index, "task body panicked");
        }
        Ok(true)
    }
}
