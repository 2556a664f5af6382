//! Runtime configuration.
//!
//! [`PolicyConfig`] is the write-once policy triple every component consults.
//! [`RuntimeConfig`] adds the registry capacity and the tunables that decide
//! how the activation engine resolves the cases the policy triple leaves open.

use rtask_errors::{TaskError, TaskResult};
use rtask_platform::SchedulingClass;
use serde::{Deserialize, Serialize};

/// Default registry capacity.
pub const MAX_TASKS: usize = 50;

/// Upper bound accepted for [`RuntimeConfig::capacity`].
pub const MAX_CAPACITY: usize = 1024;

/// Multiprocessor placement policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiprocessorPolicy {
    /// Each task is bound to one core for its whole life.
    #[default]
    Partitioned,
    /// Tasks may run anywhere and may move themselves at runtime.
    Global,
}

impl MultiprocessorPolicy {
    /// Whether tasks may change core after creation.
    pub fn allows_migration(self) -> bool {
        matches!(self, MultiprocessorPolicy::Global)
    }
}

/// Protocol applied by mutual-exclusion primitives tasks use for shared resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncProtocol {
    /// Priority inheritance.
    PriorityInheritance,
    /// Immediate priority ceiling.
    PriorityCeiling,
    /// Plain mutual exclusion.
    #[default]
    None,
}

/// The policy triple fixed at init.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// OS scheduling class for task threads.
    pub class: SchedulingClass,
    /// Multiprocessor policy.
    pub multiprocessor: MultiprocessorPolicy,
    /// Synchronization protocol.
    pub protocol: SyncProtocol,
}

impl PolicyConfig {
    /// Create a policy triple.
    pub fn new(
        class: SchedulingClass,
        multiprocessor: MultiprocessorPolicy,
        protocol: SyncProtocol,
    ) -> Self {
        Self {
            class,
            multiprocessor,
            protocol,
        }
    }
}

/// What an explicit activation does to a periodic task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodicActivation {
    /// The activation stays pending until the task calls
    /// `wait_for_activation`; the periodic phase is unaffected.
    #[default]
    Pending,
    /// The activation releases the task from `wait_for_instance` early and
    /// the periodic progression restarts from the delivery time.
    ResetPhase,
}

/// Clock used by the WCET profiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecClock {
    /// Wall time from activation to completion (includes preemption).
    #[default]
    Wall,
    /// CPU time consumed by the task thread during the instance.
    ThreadCpu,
}

/// Full runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Policy triple.
    pub policy: PolicyConfig,
    /// Registry capacity.
    pub capacity: usize,
    /// Explicit activation of periodic tasks.
    pub periodic_activation: PeriodicActivation,
    /// WCET clock.
    pub exec_clock: ExecClock,
    /// Lock process memory at init (real-time classes only).
    pub lock_memory: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            policy: PolicyConfig::default(),
            capacity: MAX_TASKS,
            periodic_activation: PeriodicActivation::default(),
            exec_clock: ExecClock::default(),
            lock_memory: false,
        }
    }
}

impl RuntimeConfig {
    /// Configuration with the given policy and defaults elsewhere.
    pub fn with_policy(policy: PolicyConfig) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> TaskResult {
        if self.capacity == 0 {
            return Err(TaskError::config("capacity must be greater than 0"));
        }
        if self.capacity > MAX_CAPACITY {
            return Err(TaskError::config(format!(
                "capacity {} exceeds {MAX_CAPACITY}",
                self.capacity
            )));
        }
        Ok(())
    }

    /// Create a configuration builder.
    #[must_use]
    pub fn builder() -> RuntimeConfigBuilder {
        RuntimeConfigBuilder::default()
    }
}

/// Builder for `RuntimeConfig`.
#[derive(Debug, Default)]
pub struct RuntimeConfigBuilder {
    config: RuntimeConfig,
}

impl RuntimeConfigBuilder {
    /// Set the OS scheduling class.
    #[must_use]
    pub fn class(mut self, class: SchedulingClass) -> Self {
        self.config.policy.class = class;
        self
    }

    /// Set the multiprocessor policy.
    #[must_use]
    pub fn multiprocessor(mut self, policy: MultiprocessorPolicy) -> Self {
        self.config.policy.multiprocessor = policy;
        self
    }

    /// Set the synchronization protocol.
    #[must_use]
    pub fn protocol(mut self, protocol: SyncProtocol) -> Self {
        self.config.policy.protocol = protocol;
        self
    }

    /// Set the registry capacity.
    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    /// Set how explicit activations affect periodic tasks.
    #[must_use]
    pub fn periodic_activation(mut self, mode: PeriodicActivation) -> Self {
        self.config.periodic_activation = mode;
        self
    }

    /// Set the WCET clock.
    #[must_use]
    pub fn exec_clock(mut self, clock: ExecClock) -> Self {
        self.config.exec_clock = clock;
        self
    }

    /// Lock memory at init.
    #[must_use]
    pub fn lock_memory(mut self, enabled: bool) -> Self {
        self.config.lock_memory = enabled;
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> TaskResult<RuntimeConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.capacity, MAX_TASKS);
        assert_eq!(config.policy.class, SchedulingClass::Other);
        assert_eq!(
            config.policy.multiprocessor,
            MultiprocessorPolicy::Partitioned
        );
        assert_eq!(config.policy.protocol, SyncProtocol::None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_rejects_zero_capacity() {
        let result = RuntimeConfig::builder().capacity(0).build();
        assert!(matches!(result, Err(TaskError::InvalidConfig(_))));
    }

    #[test]
    fn test_builder_rejects_huge_capacity() {
        let result = RuntimeConfig::builder().capacity(MAX_CAPACITY + 1).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_sets_everything() -> TaskResult {
        let config = RuntimeConfig::builder()
            .class(SchedulingClass::RoundRobin)
            .multiprocessor(MultiprocessorPolicy::Global)
            .protocol(SyncProtocol::PriorityCeiling)
            .capacity(8)
            .periodic_activation(PeriodicActivation::ResetPhase)
            .exec_clock(ExecClock::ThreadCpu)
            .lock_memory(true)
            .build()?;

        assert_eq!(config.policy.class, SchedulingClass::RoundRobin);
        assert!(config.policy.multiprocessor.allows_migration());
        assert_eq!(config.policy.protocol, SyncProtocol::PriorityCeiling);
        assert_eq!(config.capacity, 8);
        assert_eq!(config.periodic_activation, PeriodicActivation::ResetPhase);
        assert_eq!(config.exec_clock, ExecClock::ThreadCpu);
        assert!(config.lock_memory);
        Ok(())
    }

    #[test]
    fn test_partial_json_uses_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let config: RuntimeConfig =
            serde_json::from_str(r#"{ "policy": { "class": "fifo", "multiprocessor": "global", "protocol": "priority_inheritance" } }"#)?;
        assert_eq!(config.policy.class, SchedulingClass::Fifo);
        assert_eq!(config.policy.multiprocessor, MultiprocessorPolicy::Global);
        assert_eq!(config.capacity, MAX_TASKS);
        Ok(())
    }
}
