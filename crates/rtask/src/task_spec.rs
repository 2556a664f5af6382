//! Task creation parameters.

use crate::modes::{ModeId, ModeProvider};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

/// Code a task thread runs once it is first activated.
///
/// The body owns its loop: it calls [`wait_for_instance`](crate::wait_for_instance)
/// or [`wait_for_activation`](crate::wait_for_activation) between instances and
/// the task terminates when it returns.
pub type TaskBody = Box<dyn FnOnce() + Send + 'static>;

/// Opaque argument readable from inside the body via
/// [`task_argument`](crate::task_argument).
pub type TaskArgument = Arc<dyn Any + Send + Sync>;

/// Upper bound on the number of modes a task can participate in.
pub const MAX_MODES: usize = 10;

/// Periodic or event-driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Released every `period`, on an arithmetic progression.
    #[default]
    Periodic,
    /// Released by explicit activations only.
    Aperiodic,
}

/// When the first instance is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// Release as soon as the thread is ready.
    Immediate,
    /// Wait for `task_activate` or a staged release.
    #[default]
    Deferred,
}

/// Mode subsystem binding of a task.
#[derive(Debug, Clone)]
pub struct ModeBinding {
    /// Mode source consulted at instance boundaries.
    pub provider: Arc<dyn ModeProvider>,
    /// Modes in which the task is released.
    pub modes: Vec<ModeId>,
}

impl ModeBinding {
    /// Whether the task is released in `mode`.
    pub fn is_active_in(&self, mode: ModeId) -> bool {
        self.modes.contains(&mode)
    }
}

/// Parameters of a new task.
///
/// The default value releases a periodic task every second with an implicit
/// deadline, priority 1, deferred activation and no measurement:
///
/// ```
/// use rtask::{Activation, TaskKind, TaskSpec};
/// use std::time::Duration;
///
/// let spec = TaskSpec::periodic(Duration::from_millis(10))
///     .with_deadline(Duration::from_millis(8))
///     .with_priority(30)
///     .on_core(0)
///     .activate_now()
///     .measured();
///
/// assert_eq!(spec.kind, TaskKind::Periodic);
/// assert_eq!(spec.activation, Activation::Immediate);
/// ```
#[derive(Debug, Clone)]
pub struct TaskSpec {
    /// Periodic or aperiodic.
    pub kind: TaskKind,
    /// Release period (ignored by aperiodic tasks except as a mode default).
    pub period: Duration,
    /// Relative deadline.
    pub deadline: Duration,
    /// Priority in `[0, 99]`, higher is more urgent.
    pub priority: i32,
    /// Core to place the task on (None = policy default).
    pub processor: Option<usize>,
    /// First release.
    pub activation: Activation,
    /// Enable WCET measurement.
    pub measure: bool,
    /// Opaque argument.
    pub argument: Option<TaskArgument>,
    /// Mode subsystem binding.
    pub modes: Option<ModeBinding>,
}

impl Default for TaskSpec {
    fn default() -> Self {
        Self {
            kind: TaskKind::Periodic,
            period: Duration::from_secs(1),
            deadline: Duration::from_secs(1),
            priority: 1,
            processor: None,
            activation: Activation::Deferred,
            measure: false,
            argument: None,
            modes: None,
        }
    }
}

impl TaskSpec {
    /// Periodic task with implicit deadline.
    pub fn periodic(period: Duration) -> Self {
        Self {
            kind: TaskKind::Periodic,
            period,
            deadline: period,
            ..Self::default()
        }
    }

    /// Aperiodic task with the given relative deadline.
    pub fn aperiodic(deadline: Duration) -> Self {
        Self {
            kind: TaskKind::Aperiodic,
            period: deadline,
            deadline,
            ..Self::default()
        }
    }

    /// Set the relative deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Set the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Place the task on a core.
    #[must_use]
    pub fn on_core(mut self, core: usize) -> Self {
        self.processor = Some(core);
        self
    }

    /// Release the first instance at creation.
    #[must_use]
    pub fn activate_now(mut self) -> Self {
        self.activation = Activation::Immediate;
        self
    }

    /// Set the first release explicitly.
    #[must_use]
    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    /// Enable WCET measurement.
    #[must_use]
    pub fn measured(mut self) -> Self {
        self.measure = true;
        self
    }

    /// Attach an argument.
    #[must_use]
    pub fn with_argument<T: Any + Send + Sync>(mut self, argument: T) -> Self {
        self.argument = Some(Arc::new(argument));
        self
    }

    /// Bind to a mode provider, released only in `modes`.
    #[must_use]
    pub fn with_modes(mut self, provider: Arc<dyn ModeProvider>, modes: Vec<ModeId>) -> Self {
        self.modes = Some(ModeBinding { provider, modes });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_spec() {
        let spec = TaskSpec::default();
        assert_eq!(spec.kind, TaskKind::Periodic);
        assert_eq!(spec.period, Duration::from_secs(1));
        assert_eq!(spec.deadline, spec.period);
        assert_eq!(spec.priority, 1);
        assert_eq!(spec.activation, Activation::Deferred);
        assert!(!spec.measure);
        assert!(spec.argument.is_none());
        assert!(spec.modes.is_none());
    }

    #[test]
    fn test_aperiodic_spec() {
        let spec = TaskSpec::aperiodic(Duration::from_millis(5));
        assert_eq!(spec.kind, TaskKind::Aperiodic);
        assert_eq!(spec.deadline, Duration::from_millis(5));
    }

    #[test]
    fn test_argument_downcasts() {
        let spec = TaskSpec::default().with_argument(42u32);
        let value = spec
            .argument
            .and_then(|arg| arg.downcast::<u32>().ok())
            .map(|arg| *arg);
        assert_eq!(value, Some(42));
    }
}
