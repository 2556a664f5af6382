//! Mode subsystem hook.
//!
//! A task bound to a [`ModeProvider`] consults it at every instance boundary.
//! When the current mode is not in the task's mode list the task stays
//! dormant: it keeps its periodic phase but its body is not released. A mode
//! may also override the task's timing parameters.

use crate::TaskIndex;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Identifier of an operating mode.
pub type ModeId = usize;

/// Per-mode overrides of a task's timing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModeParameters {
    /// Period in this mode.
    pub period: Option<Duration>,
    /// Relative deadline in this mode.
    pub deadline: Option<Duration>,
    /// Priority in this mode.
    pub priority: Option<u8>,
}

/// Source of the system's current mode.
pub trait ModeProvider: Send + Sync + std::fmt::Debug {
    /// Mode the system is in right now.
    fn current_mode(&self) -> ModeId;

    /// Overrides for `task` in `mode`, if any.
    fn parameters(&self, _mode: ModeId, _task: TaskIndex) -> Option<ModeParameters> {
        None
    }
}

/// Mode provider backed by a mode variable and a parameter table.
#[derive(Debug, Default)]
pub struct StaticModeTable {
    current: AtomicUsize,
    table: RwLock<HashMap<(ModeId, TaskIndex), ModeParameters>>,
}

impl StaticModeTable {
    /// Create a table starting in `initial`.
    pub fn new(initial: ModeId) -> Self {
        Self {
            current: AtomicUsize::new(initial),
            table: RwLock::new(HashMap::new()),
        }
    }

    /// Switch mode. Tasks observe the change at their next boundary.
    pub fn set_mode(&self, mode: ModeId) {
        let previous = self.current.swap(mode, Ordering::AcqRel);
        if previous != mode {
            tracing::debug!(previous, mode, "mode change requested");
        }
    }

    /// Register overrides for `task` in `mode`.
    pub fn set_parameters(&self, mode: ModeId, task: TaskIndex, params: ModeParameters) {
        self.table.write().insert((mode, task), params);
    }
}

impl ModeProvider for StaticModeTable {
    fn current_mode(&self) -> ModeId {
        self.current.load(Ordering::Acquire)
    }

    fn parameters(&self, mode: ModeId, task: TaskIndex) -> Option<ModeParameters> {
        self.table.read().get(&(mode, task)).copied()
    }
}
