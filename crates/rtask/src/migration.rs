//! Core placement and migration.

use crate::config::MultiprocessorPolicy;
use crate::registry::Registry;
use crate::tcb::TaskControlBlock;
use rtask_errors::{ResultExt, TaskError, TaskResult};
use rtask_platform::set_thread_affinity;
use tracing::{debug, warn};

/// Decides where tasks run and whether they may move.
#[derive(Debug, Clone, Copy)]
pub struct MigrationManager {
    policy: MultiprocessorPolicy,
    num_cores: usize,
}

impl MigrationManager {
    /// Create a manager for `num_cores` cores under `policy`.
    pub fn new(policy: MultiprocessorPolicy, num_cores: usize) -> Self {
        Self {
            policy,
            num_cores: num_cores.max(1),
        }
    }

    /// Number of cores tasks may be placed on.
    pub fn num_cores(&self) -> usize {
        self.num_cores
    }

    /// Active policy.
    pub fn policy(&self) -> MultiprocessorPolicy {
        self.policy
    }

    /// Check that `core` names a logical core of this process.
    pub fn check_core(&self, core: usize) -> TaskResult {
        if core >= self.num_cores {
            return Err(TaskError::InvalidCore {
                core,
                num_cores: self.num_cores,
            });
        }
        Ok(())
    }

    /// Core a new task starts on.
    ///
    /// Partitioned tasks are always pinned, to core 0 unless one is requested.
    /// Global tasks are pinned only on request.
    pub fn initial_core(&self, requested: Option<usize>) -> TaskResult<Option<usize>> {
        if let Some(core) = requested {
            self.check_core(core)?;
        }
        Ok(match self.policy {
            MultiprocessorPolicy::Partitioned => Some(requested.unwrap_or(0)),
            MultiprocessorPolicy::Global => requested,
        })
    }

    /// Move the calling task to `core`.
    ///
    /// Must run on the task's own thread: the OS affinity applied is that of
    /// the caller. Serialized with task creation through the registry.
    pub fn migrate(
        &self,
        registry: &Registry,
        tcb: &TaskControlBlock,
        core: usize,
    ) -> TaskResult {
        self.check_core(core)?;

        if !self.policy.allows_migration() {
            warn!(task = tcb.index(), core, "migration rejected under partitioned policy");
            return Err(TaskError::MigrationDisallowed);
        }

        registry.exclusive(|| {
            set_thread_affinity(Some(core)).during("task_migrate_to")?;
            tcb.set_core(core);
            Ok::<(), TaskError>(())
        })?;

        debug!(task = tcb.index(), core, "task migrated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partitioned_pins_to_core_zero_by_default() -> TaskResult {
        let manager = MigrationManager::new(MultiprocessorPolicy::Partitioned, 4);
        assert_eq!(manager.initial_core(None)?, Some(0));
        assert_eq!(manager.initial_core(Some(3))?, Some(3));
        Ok(())
    }

    #[test]
    fn test_global_is_unpinned_by_default() -> TaskResult {
        let manager = MigrationManager::new(MultiprocessorPolicy::Global, 4);
        assert_eq!(manager.initial_core(None)?, None);
        assert_eq!(manager.initial_core(Some(1))?, Some(1));
        Ok(())
    }

    #[test]
    fn test_out_of_range_core() {
        let manager = MigrationManager::new(MultiprocessorPolicy::Global, 2);
        assert_eq!(
            manager.initial_core(Some(2)),
            Err(TaskError::InvalidCore {
                core: 2,
                num_cores: 2
            })
        );
    }
}
