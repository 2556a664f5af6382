//! Demo workload: a set of periodic tasks with staggered phases.

use rtask::{
    TaskIndex, TaskSpec, ptask_create_ex, set_activation_of, task_join, task_snapshot,
    wait_for_instance,
};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::error::DemoError;

/// Workload parameters.
#[derive(Debug, Clone, Copy)]
pub struct Workload {
    pub tasks: usize,
    pub period: Duration,
    pub duration: Duration,
    /// Busy fraction of each period, in percent.
    pub load_percent: u8,
}

/// Per-task outcome.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TaskReport {
    pub index: TaskIndex,
    pub instances: u64,
    pub deadline_misses: u64,
    pub wcet_us: u64,
    pub core: Option<usize>,
}

fn busy_for(budget: Duration) {
    let start = Instant::now();
    while start.elapsed() < budget {
        std::hint::spin_loop();
    }
}

/// Run the workload on the process-wide runtime and report every task.
pub fn run(workload: &Workload) -> Result<Vec<TaskReport>, DemoError> {
    if workload.tasks == 0 {
        return Err(DemoError::InvalidArguments("at least one task is required".into()));
    }
    if workload.period.is_zero() {
        return Err(DemoError::InvalidArguments("period must be greater than 0".into()));
    }

    let stop = Arc::new(AtomicBool::new(false));
    let budget = workload.period * u32::from(workload.load_percent.min(100)) / 100;
    let stagger = workload.period / u32::try_from(workload.tasks).unwrap_or(u32::MAX);

    let mut indices = Vec::with_capacity(workload.tasks);
    for slot in 0..workload.tasks {
        let stop = Arc::clone(&stop);
        let priority = i32::try_from(slot % 99 + 1).unwrap_or(1);
        let index = ptask_create_ex(
            move || {
                while !stop.load(Ordering::Acquire) {
                    busy_for(budget);
                    if wait_for_instance().is_err() {
                        break;
                    }
                }
            },
            TaskSpec::periodic(workload.period)
                .with_priority(priority)
                .measured(),
        )?;
        indices.push(index);
    }

    for (slot, index) in indices.iter().enumerate() {
        let offset = stagger * u32::try_from(slot).unwrap_or(0);
        set_activation_of(*index, offset)?;
        debug!(task = index, offset_us = offset.as_micros() as u64, "first release staged");
    }

    info!(tasks = indices.len(), period_ms = workload.period.as_millis() as u64, "workload running");
    std::thread::sleep(workload.duration);
    stop.store(true, Ordering::Release);

    let mut reports = Vec::with_capacity(indices.len());
    for index in indices {
        task_join(index)?;
        let snapshot = task_snapshot(index)?;
        reports.push(TaskReport {
            index,
            instances: snapshot.instances,
            deadline_misses: snapshot.deadline_misses,
            wcet_us: snapshot.wcet.as_micros() as u64,
            core: snapshot.core,
        });
    }
    Ok(reports)
}
