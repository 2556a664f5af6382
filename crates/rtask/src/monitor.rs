//! Deadline monitor.

use crate::tcb::TaskControlBlock;
use std::time::Instant;
use tracing::warn;

/// Counts completed instances that finished past their absolute deadline.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeadlineMonitor;

impl DeadlineMonitor {
    /// Check the instance that just completed at `now`.
    ///
    /// Returns `true` and bumps the miss counter by one if the instance
    /// finished after its absolute deadline. The overrun magnitude is not
    /// accumulated.
    pub fn check(&self, tcb: &TaskControlBlock, now: Instant) -> bool {
        let deadline = tcb.absolute_deadline();
        if now <= deadline {
            return false;
        }

        let misses = tcb.record_miss();
        warn!(
            task = tcb.index(),
            overrun_us = now.duration_since(deadline).as_micros() as u64,
            misses,
            "deadline miss"
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task_spec::TaskKind;
    use crate::tcb::TcbInit;
    use std::time::Duration;

    fn tcb(epoch: Instant) -> TaskControlBlock {
        TaskControlBlock::new(TcbInit {
            index: 0,
            kind: TaskKind::Periodic,
            epoch,
            period: Duration::from_millis(10),
            deadline: Duration::from_millis(5),
            priority: 1,
            core: None,
            measure: false,
            argument: None,
            modes: None,
        })
    }

    #[test]
    fn test_on_time_instance_is_not_counted() {
        let epoch = Instant::now();
        let tcb = tcb(epoch);
        tcb.open_instance(epoch);
        assert!(!DeadlineMonitor.check(&tcb, epoch + Duration::from_millis(5)));
        assert_eq!(tcb.deadline_misses(), 0);
    }

    #[test]
    fn test_late_instance_counts_once_regardless_of_overrun() {
        let epoch = Instant::now();
        let tcb = tcb(epoch);
        tcb.open_instance(epoch);
        assert!(DeadlineMonitor.check(&tcb, epoch + Duration::from_millis(500)));
        assert_eq!(tcb.deadline_misses(), 1);

        tcb.open_instance(epoch + Duration::from_millis(10));
        assert!(DeadlineMonitor.check(&tcb, epoch + Duration::from_millis(16)));
        assert_eq!(tcb.deadline_misses(), 2);
    }
}
