//! Bounded table of task control blocks.
//!
//! Slots are reserved lowest-first. A slot whose task has terminated stays
//! readable until a later creation reuses it.

use crate::TaskIndex;
use crate::tcb::TaskControlBlock;
use parking_lot::RwLock;
use rtask_errors::{TaskError, TaskResult};
use std::sync::Arc;
use tracing::debug;

/// Registry of task control blocks.
#[derive(Debug)]
pub struct Registry {
    slots: RwLock<Vec<Option<Arc<TaskControlBlock>>>>,
    capacity: usize,
}

impl Registry {
    /// Create an empty registry holding at most `capacity` live tasks.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: RwLock::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    /// Maximum number of live tasks.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Reserve the lowest free index and store the block `build` makes for it.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::CapacityExceeded`] when every slot holds a live
    /// task, or whatever `build` returns.
    pub(crate) fn reserve<F>(&self, build: F) -> TaskResult<Arc<TaskControlBlock>>
    where
        F: FnOnce(TaskIndex) -> TaskResult<TaskControlBlock>,
    {
        let mut slots = self.slots.write();

        let free = slots
            .iter()
            .position(|slot| slot.as_ref().is_none_or(|tcb| tcb.is_terminated()));

        let index = match free {
            Some(index) => {
                debug!(index, "reusing task slot");
                index
            }
            None if slots.len() < self.capacity => {
                slots.push(None);
                slots.len() - 1
            }
            None => {
                return Err(TaskError::CapacityExceeded {
                    capacity: self.capacity,
                });
            }
        };

        let tcb = Arc::new(build(index)?);
        if let Some(slot) = slots.get_mut(index) {
            *slot = Some(Arc::clone(&tcb));
        }
        Ok(tcb)
    }

    /// Give back a slot whose task never started.
    pub(crate) fn release(&self, index: TaskIndex) {
        if let Some(slot) = self.slots.write().get_mut(index) {
            *slot = None;
        }
    }

    /// Control block at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidIndex`] if the slot was never filled.
    pub fn lookup(&self, index: TaskIndex) -> TaskResult<Arc<TaskControlBlock>> {
        self.slots
            .read()
            .get(index)
            .and_then(Option::clone)
            .ok_or(TaskError::InvalidIndex(index))
    }

    /// Number of live (not terminated) tasks.
    pub fn count(&self) -> usize {
        self.slots
            .read()
            .iter()
            .flatten()
            .filter(|tcb| !tcb.is_terminated())
            .count()
    }

    /// Control blocks of every filled slot, terminated ones included.
    pub fn tasks(&self) -> Vec<Arc<TaskControlBlock>> {
        self.slots.read().iter().flatten().cloned().collect()
    }

    /// Run `f` while holding the registry exclusively, serializing it with
    /// slot allocation.
    pub(crate) fn exclusive<R>(&self, f: impl FnOnce() -> R) -> R {
        let _slots = self.slots.write();
        f()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tcb::{TaskState, TcbInit};
    use crate::task_spec::TaskKind;
    use std::time::{Duration, Instant};

    fn block(index: TaskIndex) -> TaskResult<TaskControlBlock> {
        Ok(TaskControlBlock::new(TcbInit {
            index,
            kind: TaskKind::Aperiodic,
            epoch: Instant::now(),
            period: Duration::from_millis(1),
            deadline: Duration::from_millis(1),
            priority: 1,
            core: None,
            measure: false,
            argument: None,
            modes: None,
        }))
    }

    #[test]
    fn test_indices_are_lowest_first() -> TaskResult {
        let registry = Registry::new(4);
        for expected in 0..4 {
            assert_eq!(registry.reserve(block)?.index(), expected);
        }
        assert_eq!(registry.count(), 4);
        Ok(())
    }

    #[test]
    fn test_capacity_exceeded() -> TaskResult {
        let registry = Registry::new(2);
        registry.reserve(block)?;
        registry.reserve(block)?;
        assert_eq!(
            registry.reserve(block).map(|tcb| tcb.index()),
            Err(TaskError::CapacityExceeded { capacity: 2 })
        );
        Ok(())
    }

    #[test]
    fn test_terminated_slot_is_reused() -> TaskResult {
        let registry = Registry::new(3);
        let first = registry.reserve(block)?;
        registry.reserve(block)?;
        first.set_state(TaskState::Terminated);

        assert_eq!(registry.count(), 1);
        assert_eq!(registry.reserve(block)?.index(), 0);
        assert_eq!(registry.reserve(block)?.index(), 2);
        Ok(())
    }

    #[test]
    fn test_released_slot_is_reused() -> TaskResult {
        let registry = Registry::new(2);
        let tcb = registry.reserve(block)?;
        registry.release(tcb.index());
        assert!(registry.lookup(0).is_err());
        assert_eq!(registry.reserve(block)?.index(), 0);
        Ok(())
    }

    #[test]
    fn test_failed_build_leaves_no_slot() {
        let registry = Registry::new(2);
        let result = registry.reserve(|_| Err(TaskError::InvalidPriority(200)));
        assert!(result.is_err());
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_lookup_unknown_index() {
        let registry = Registry::new(2);
        assert_eq!(
            registry.lookup(7).map(|tcb| tcb.index()),
            Err(TaskError::InvalidIndex(7))
        );
    }
}
