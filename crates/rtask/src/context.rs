//! Association between a task thread and its control block.

use crate::runtime::Runtime;
use crate::tcb::TaskControlBlock;
use rtask_errors::{TaskError, TaskResult};
use std::cell::RefCell;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub(crate) struct TaskContext {
    pub runtime: Arc<Runtime>,
    pub tcb: Arc<TaskControlBlock>,
}

thread_local! {
    static CURRENT: RefCell<Option<TaskContext>> = const { RefCell::new(None) };
}

/// Install the calling thread's task context. Must be the first thing a task
/// thread does.
pub(crate) fn install(context: TaskContext) {
    CURRENT.with(|current| *current.borrow_mut() = Some(context));
}

pub(crate) fn clear() {
    CURRENT.with(|current| current.borrow_mut().take());
}

/// Context of the calling task thread.
pub(crate) fn current() -> TaskResult<TaskContext> {
    CURRENT
        .with(|current| current.borrow().clone())
        .ok_or(TaskError::NotATask)
}

/// Runtime owning the calling task, if the caller is a task.
pub(crate) fn current_runtime() -> Option<Arc<Runtime>> {
    CURRENT.with(|current| {
        current
            .borrow()
            .as_ref()
            .map(|context| Arc::clone(&context.runtime))
    })
}
