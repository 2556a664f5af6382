//! Task control block.
//!
//! Every per-task field another thread may read is an atomic with a single
//! writer. Times are stored as nanoseconds since the owning runtime's epoch so
//! they fit in an `AtomicU64`.

use crate::TaskIndex;
use crate::task_spec::{ModeBinding, TaskArgument, TaskKind};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, AtomicUsize, Ordering};
use std::thread::{JoinHandle, Thread};
use std::time::{Duration, Instant};

const UNPINNED: usize = usize::MAX;

/// Lifecycle stage of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TaskState {
    /// Slot reserved, thread starting.
    Created = 0,
    /// Blocked until the next release.
    WaitingActivation = 1,
    /// Executing an instance.
    Running = 2,
    /// Body returned. The slot may be reused.
    Terminated = 3,
}

impl TaskState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => TaskState::Created,
            1 => TaskState::WaitingActivation,
            2 => TaskState::Running,
            _ => TaskState::Terminated,
        }
    }
}

#[derive(Debug, Default)]
struct SyncState {
    pending: Option<Instant>,
    staged: Option<Instant>,
}

/// Activation signal private to one task.
///
/// Holds at most one pending activation; further signals before the task
/// consumes it are coalesced.
#[derive(Debug, Default)]
pub(crate) struct ActivationSync {
    state: Mutex<SyncState>,
    cond: Condvar,
}

impl ActivationSync {
    /// Deliver an activation at `at`. Returns `false` if one was already pending.
    pub(crate) fn signal(&self, at: Instant) -> bool {
        let mut state = self.state.lock();
        if state.pending.is_some() {
            return false;
        }
        state.pending = Some(at);
        self.cond.notify_one();
        true
    }

    /// Stage the next release at `at`.
    pub(crate) fn stage(&self, at: Instant) {
        let mut state = self.state.lock();
        state.staged = Some(at);
        self.cond.notify_one();
    }

    /// Remove and return a pending activation without blocking.
    #[cfg(test)]
    pub(crate) fn take_pending(&self) -> Option<Instant> {
        self.state.lock().pending.take()
    }

    /// Block until an activation is delivered or a staged release comes due.
    ///
    /// Returns the delivery time or the staged release time.
    pub(crate) fn wait(&self) -> Instant {
        let mut state = self.state.lock();
        loop {
            if let Some(at) = state.pending.take() {
                return at;
            }
            match state.staged {
                Some(at) if Instant::now() >= at => {
                    state.staged = None;
                    return at;
                }
                Some(at) => {
                    self.cond.wait_until(&mut state, at);
                }
                None => self.cond.wait(&mut state),
            }
        }
    }

    /// Block until the next periodic release.
    ///
    /// The release is the staged time if one is set, else `target`; `None`
    /// means the periodic release never comes. The staged time is re-read on
    /// every wake so a later [`stage`](Self::stage) moves a sleeping release.
    /// With `on_signal`, a delivered activation releases early. Returns
    /// `ahead` before the release so the caller can finish with a precise
    /// sleep, together with the release time and whether it was a delivery.
    pub(crate) fn wait_release(
        &self,
        target: Option<Instant>,
        on_signal: bool,
        ahead: Duration,
    ) -> (Instant, bool) {
        let mut state = self.state.lock();
        loop {
            if on_signal {
                if let Some(at) = state.pending.take() {
                    return (at, true);
                }
            }

            let Some(release) = state.staged.or(target) else {
                self.cond.wait(&mut state);
                continue;
            };

            let wake = release.checked_sub(ahead).unwrap_or(release);
            if Instant::now() >= wake {
                if state.staged == Some(release) {
                    state.staged = None;
                }
                return (release, false);
            }
            self.cond.wait_until(&mut state, wake);
        }
    }
}

/// Control block of one task.
#[derive(Debug)]
pub struct TaskControlBlock {
    index: TaskIndex,
    kind: TaskKind,
    epoch: Instant,
    measure: bool,
    period_ns: AtomicU64,
    deadline_ns: AtomicU64,
    priority: AtomicU8,
    priority_dirty: AtomicBool,
    activation_ns: AtomicU64,
    abs_deadline_ns: AtomicU64,
    cpu_mark_ns: AtomicU64,
    dmiss: AtomicU64,
    wcet_ns: AtomicU64,
    instances: AtomicU64,
    core: AtomicUsize,
    state: AtomicU8,
    thread: OnceLock<Thread>,
    join: Mutex<Option<JoinHandle<()>>>,
    argument: Option<TaskArgument>,
    modes: Option<ModeBinding>,
    pub(crate) sync: ActivationSync,
}

fn to_ns(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// Parameters fixed when a slot is filled.
#[derive(Debug)]
pub(crate) struct TcbInit {
    pub index: TaskIndex,
    pub kind: TaskKind,
    pub epoch: Instant,
    pub period: Duration,
    pub deadline: Duration,
    pub priority: u8,
    pub core: Option<usize>,
    pub measure: bool,
    pub argument: Option<TaskArgument>,
    pub modes: Option<ModeBinding>,
}

impl TaskControlBlock {
    pub(crate) fn new(init: TcbInit) -> Self {
        Self {
            index: init.index,
            kind: init.kind,
            epoch: init.epoch,
            measure: init.measure,
            period_ns: AtomicU64::new(to_ns(init.period)),
            deadline_ns: AtomicU64::new(to_ns(init.deadline)),
            priority: AtomicU8::new(init.priority),
            priority_dirty: AtomicBool::new(false),
            activation_ns: AtomicU64::new(0),
            abs_deadline_ns: AtomicU64::new(0),
            cpu_mark_ns: AtomicU64::new(0),
            dmiss: AtomicU64::new(0),
            wcet_ns: AtomicU64::new(0),
            instances: AtomicU64::new(0),
            core: AtomicUsize::new(init.core.unwrap_or(UNPINNED)),
            state: AtomicU8::new(TaskState::Created as u8),
            thread: OnceLock::new(),
            join: Mutex::new(None),
            argument: init.argument,
            modes: init.modes,
            sync: ActivationSync::default(),
        }
    }

    /// Registry index.
    pub fn index(&self) -> TaskIndex {
        self.index
    }

    /// Periodic or aperiodic.
    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    /// Whether WCET measurement is enabled.
    pub fn is_measured(&self) -> bool {
        self.measure
    }

    /// Current period.
    pub fn period(&self) -> Duration {
        Duration::from_nanos(self.period_ns.load(Ordering::Acquire))
    }

    pub(crate) fn set_period(&self, period: Duration) {
        self.period_ns.store(to_ns(period), Ordering::Release);
    }

    /// Current relative deadline.
    pub fn deadline(&self) -> Duration {
        Duration::from_nanos(self.deadline_ns.load(Ordering::Acquire))
    }

    pub(crate) fn set_deadline(&self, deadline: Duration) {
        self.deadline_ns.store(to_ns(deadline), Ordering::Release);
    }

    /// Current priority.
    pub fn priority(&self) -> u8 {
        self.priority.load(Ordering::Acquire)
    }

    /// Record a new priority. The owning thread applies it at its next boundary.
    pub(crate) fn request_priority(&self, priority: u8) {
        self.priority.store(priority, Ordering::Release);
        self.priority_dirty.store(true, Ordering::Release);
    }

    /// Take a pending priority change, if any.
    pub(crate) fn take_priority_change(&self) -> Option<u8> {
        if self.priority_dirty.swap(false, Ordering::AcqRel) {
            Some(self.priority())
        } else {
            None
        }
    }

    /// Activation time of the current instance.
    pub fn activation_time(&self) -> Instant {
        self.epoch + Duration::from_nanos(self.activation_ns.load(Ordering::Acquire))
    }

    /// Absolute deadline of the current instance.
    pub fn absolute_deadline(&self) -> Instant {
        self.epoch + Duration::from_nanos(self.abs_deadline_ns.load(Ordering::Acquire))
    }

    /// Open an instance released at `at`.
    pub(crate) fn open_instance(&self, at: Instant) {
        let at_ns = to_ns(at.saturating_duration_since(self.epoch));
        let deadline_ns = self.deadline_ns.load(Ordering::Acquire);
        self.activation_ns.store(at_ns, Ordering::Release);
        self.abs_deadline_ns
            .store(at_ns.saturating_add(deadline_ns), Ordering::Release);
    }

    pub(crate) fn cpu_mark(&self) -> Duration {
        Duration::from_nanos(self.cpu_mark_ns.load(Ordering::Relaxed))
    }

    pub(crate) fn set_cpu_mark(&self, cpu: Duration) {
        self.cpu_mark_ns.store(to_ns(cpu), Ordering::Relaxed);
    }

    /// Deadline misses so far.
    pub fn deadline_misses(&self) -> u64 {
        self.dmiss.load(Ordering::Acquire)
    }

    pub(crate) fn record_miss(&self) -> u64 {
        self.dmiss.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Longest measured instance.
    pub fn wcet(&self) -> Duration {
        Duration::from_nanos(self.wcet_ns.load(Ordering::Acquire))
    }

    /// Raise the WCET to `observed` if larger. Returns whether it was raised.
    pub(crate) fn raise_wcet(&self, observed: Duration) -> bool {
        let observed = to_ns(observed);
        self.wcet_ns.fetch_max(observed, Ordering::AcqRel) < observed
    }

    /// Overwrite the WCET.
    pub(crate) fn set_wcet(&self, wcet: Duration) {
        self.wcet_ns.store(to_ns(wcet), Ordering::Release);
    }

    /// Instances completed so far.
    pub fn instances(&self) -> u64 {
        self.instances.load(Ordering::Acquire)
    }

    pub(crate) fn complete_instance(&self) {
        self.instances.fetch_add(1, Ordering::AcqRel);
    }

    /// Current core, `None` when unpinned.
    pub fn core(&self) -> Option<usize> {
        match self.core.load(Ordering::Acquire) {
            UNPINNED => None,
            core => Some(core),
        }
    }

    pub(crate) fn set_core(&self, core: usize) {
        self.core.store(core, Ordering::Release);
    }

    /// Lifecycle stage.
    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: TaskState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Whether the body has returned.
    pub fn is_terminated(&self) -> bool {
        self.state() == TaskState::Terminated
    }

    /// The executing thread, once started.
    pub fn thread(&self) -> Option<&Thread> {
        self.thread.get()
    }

    pub(crate) fn bind_thread(&self, thread: Thread) {
        let _ = self.thread.set(thread);
    }

    pub(crate) fn store_join_handle(&self, handle: JoinHandle<()>) {
        *self.join.lock() = Some(handle);
    }

    pub(crate) fn take_join_handle(&self) -> Option<JoinHandle<()>> {
        self.join.lock().take()
    }

    /// Opaque argument given at creation.
    pub fn argument(&self) -> Option<&TaskArgument> {
        self.argument.as_ref()
    }

    /// Mode subsystem binding.
    pub fn modes(&self) -> Option<&ModeBinding> {
        self.modes.as_ref()
    }

    /// Consistent copy of the observable fields.
    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            index: self.index,
            kind: self.kind,
            state: self.state(),
            period: self.period(),
            deadline: self.deadline(),
            priority: self.priority(),
            activation_time: Duration::from_nanos(self.activation_ns.load(Ordering::Acquire)),
            absolute_deadline: Duration::from_nanos(
                self.abs_deadline_ns.load(Ordering::Acquire),
            ),
            deadline_misses: self.deadline_misses(),
            wcet: self.wcet(),
            instances: self.instances(),
            core: self.core(),
        }
    }
}

/// Serializable copy of a task's observable state.
///
/// Times are offsets from the runtime epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    /// Registry index.
    pub index: TaskIndex,
    /// Periodic or aperiodic.
    pub kind: TaskKind,
    /// Lifecycle stage.
    pub state: TaskState,
    /// Period.
    pub period: Duration,
    /// Relative deadline.
    pub deadline: Duration,
    /// Priority.
    pub priority: u8,
    /// Activation time of the current instance.
    pub activation_time: Duration,
    /// Absolute deadline of the current instance.
    pub absolute_deadline: Duration,
    /// Deadline misses.
    pub deadline_misses: u64,
    /// Longest measured instance.
    pub wcet: Duration,
    /// Instances completed.
    pub instances: u64,
    /// Current core.
    pub core: Option<usize>,
}
