//! Property-based tests for parameter validation and accessors.

use proptest::prelude::*;
use rtask::migration::MigrationManager;
use rtask::prelude::*;
use rtask::{ModeParameters, ModeProvider, StaticModeTable};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// One parked task shared by every case.
fn shared_task() -> Option<&'static (Arc<Runtime>, TaskIndex)> {
    static TASK: OnceLock<Option<(Arc<Runtime>, TaskIndex)>> = OnceLock::new();
    TASK.get_or_init(|| {
        let runtime = Runtime::new(RuntimeConfig::default()).ok()?;
        let index = runtime
            .create(|| {}, TaskSpec::aperiodic(Duration::from_millis(1)))
            .ok()?;
        Some((runtime, index))
    })
    .as_ref()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_period_round_trips(nanos in 1u64..10_000_000_000) {
        let (runtime, index) = shared_task().ok_or_else(|| TestCaseError::fail("no runtime"))?;
        let period = Duration::from_nanos(nanos);
        prop_assert_eq!(runtime.set_period(*index, period), Ok(()));
        prop_assert_eq!(runtime.period(*index), Ok(period));
    }

    #[test]
    fn prop_deadline_round_trips(nanos in 1u64..10_000_000_000) {
        let (runtime, index) = shared_task().ok_or_else(|| TestCaseError::fail("no runtime"))?;
        let deadline = Duration::from_nanos(nanos);
        prop_assert_eq!(runtime.set_deadline(*index, deadline), Ok(()));
        prop_assert_eq!(runtime.deadline(*index), Ok(deadline));
    }

    #[test]
    fn prop_setwcet_always_stores(nanos in 0u64..10_000_000_000) {
        let (runtime, index) = shared_task().ok_or_else(|| TestCaseError::fail("no runtime"))?;
        let wcet = Duration::from_nanos(nanos);
        prop_assert_eq!(runtime.set_wcet(*index, wcet), Ok(()));
        prop_assert_eq!(runtime.wcet(*index), Ok(wcet));
    }

    #[test]
    fn prop_priority_accepted_only_in_range(priority in -1000i32..1000) {
        let (runtime, index) = shared_task().ok_or_else(|| TestCaseError::fail("no runtime"))?;
        let result = runtime.set_priority(*index, priority);
        if (0..=99).contains(&priority) {
            prop_assert_eq!(result, Ok(()));
            prop_assert_eq!(runtime.priority(*index), Ok(priority as u8));
        } else {
            prop_assert_eq!(result, Err(TaskError::InvalidPriority(priority)));
        }
    }

    #[test]
    fn prop_capacity_validation(capacity in 0usize..4096) {
        let config = RuntimeConfig { capacity, ..RuntimeConfig::default() };
        let valid = (1..=rtask::config::MAX_CAPACITY).contains(&capacity);
        prop_assert_eq!(config.validate().is_ok(), valid);
    }

    #[test]
    fn prop_initial_core_is_in_range(
        cores in 1usize..64,
        requested in proptest::option::of(0usize..128),
        global in any::<bool>(),
    ) {
        let policy = if global { MultiprocessorPolicy::Global } else { MultiprocessorPolicy::Partitioned };
        let manager = MigrationManager::new(policy, cores);
        match manager.initial_core(requested) {
            Ok(Some(core)) => prop_assert!(core < cores),
            Ok(None) => prop_assert!(global && requested.is_none()),
            Err(e) => {
                prop_assert!(requested.is_some_and(|core| core >= cores));
                let is_invalid_core = matches!(e, TaskError::InvalidCore { .. });
                prop_assert!(is_invalid_core);
            }
        }
    }

    #[test]
    fn prop_mode_table_returns_what_was_set(
        mode in 0usize..16,
        task in 0usize..64,
        period_ms in proptest::option::of(1u64..1000),
        priority in proptest::option::of(0u8..100),
    ) {
        let table = StaticModeTable::new(mode);
        let params = ModeParameters {
            period: period_ms.map(Duration::from_millis),
            deadline: None,
            priority,
        };
        table.set_parameters(mode, task, params);
        prop_assert_eq!(table.current_mode(), mode);
        prop_assert_eq!(table.parameters(mode, task), Some(params));
        prop_assert_eq!(table.parameters(mode + 1, task), None);
    }
}
