//! Deadline monitor and WCET profiler tests.

use crossbeam::channel;
use rtask::prelude::*;
use std::sync::Arc;
use std::time::Duration;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn runtime() -> Result<Arc<Runtime>, TaskError> {
    Runtime::new(RuntimeConfig::default())
}

#[test]
fn test_each_late_completion_counts_once() -> TestResult {
    let runtime = runtime()?;
    let index = runtime.create(
        || {
            for instance in 0..6 {
                if instance % 2 == 0 {
                    std::thread::sleep(Duration::from_millis(15));
                }
                if wait_for_instance().is_err() {
                    break;
                }
            }
        },
        TaskSpec::periodic(Duration::from_millis(30))
            .with_deadline(Duration::from_millis(8))
            .activate_now(),
    )?;

    runtime.join(index)?;

    // Instances 2 and 4 overran; instance 0 is never counted.
    assert_eq!(runtime.deadline_misses(index)?, 2);
    assert_eq!(runtime.instances(index)?, 6);
    Ok(())
}

#[test]
fn test_on_time_task_has_no_misses() -> TestResult {
    let runtime = runtime()?;
    let index = runtime.create(
        || {
            for _ in 0..5 {
                if wait_for_instance().is_err() {
                    break;
                }
            }
        },
        TaskSpec::periodic(Duration::from_millis(10)).activate_now(),
    )?;

    runtime.join(index)?;
    assert_eq!(runtime.deadline_misses(index)?, 0);
    Ok(())
}

#[test]
fn test_absolute_deadline_follows_activation() -> TestResult {
    let runtime = runtime()?;
    let deadline = Duration::from_millis(7);
    let (tx, rx) = channel::unbounded();
    let observer = Arc::clone(&runtime);

    let index = runtime.create(
        move || {
            for _ in 0..4 {
                if let Ok(index) = get_taskindex() {
                    let pair = observer
                        .activation_time(index)
                        .and_then(|at| Ok((at, observer.absolute_deadline(index)?)));
                    let _ = tx.send(pair);
                }
                if wait_for_instance().is_err() {
                    break;
                }
            }
        },
        TaskSpec::periodic(Duration::from_millis(10))
            .with_deadline(deadline)
            .activate_now(),
    )?;
    runtime.join(index)?;

    let mut seen = 0;
    while let Ok(pair) = rx.try_recv() {
        let (at, absdl) = pair?;
        assert_eq!(absdl.duration_since(at), deadline);
        seen += 1;
    }
    assert_eq!(seen, 4);
    Ok(())
}

#[test]
fn test_measured_task_records_longest_instance() -> TestResult {
    let runtime = runtime()?;
    let index = runtime.create(
        || {
            for instance in 0..4 {
                if instance == 1 {
                    std::thread::sleep(Duration::from_millis(6));
                }
                if wait_for_instance().is_err() {
                    break;
                }
            }
        },
        TaskSpec::periodic(Duration::from_millis(20))
            .measured()
            .activate_now(),
    )?;
    runtime.join(index)?;

    let wcet = runtime.wcet(index)?;
    assert!(wcet >= Duration::from_millis(6), "wcet {wcet:?}");
    assert!(wcet < Duration::from_millis(20), "wcet {wcet:?}");
    Ok(())
}

#[test]
fn test_unmeasured_task_keeps_zero_wcet() -> TestResult {
    let runtime = runtime()?;
    let index = runtime.create(
        || {
            std::thread::sleep(Duration::from_millis(3));
            let _ = wait_for_instance();
        },
        TaskSpec::periodic(Duration::from_millis(5)).activate_now(),
    )?;
    runtime.join(index)?;
    assert_eq!(runtime.wcet(index)?, Duration::ZERO);
    Ok(())
}

#[test]
fn test_setwcet_overwrites_and_profiler_only_raises() -> TestResult {
    let runtime = runtime()?;
    let (go_tx, go_rx) = channel::bounded::<()>(1);
    let index = runtime.create(
        move || {
            let _ = go_rx.recv();
            std::thread::sleep(Duration::from_millis(2));
            let _ = wait_for_instance();
        },
        TaskSpec::periodic(Duration::from_millis(10))
            .measured()
            .activate_now(),
    )?;

    runtime.set_wcet(index, Duration::from_secs(1))?;
    assert_eq!(runtime.wcet(index)?, Duration::from_secs(1));
    go_tx.send(())?;
    runtime.join(index)?;
    assert_eq!(runtime.wcet(index)?, Duration::from_secs(1));

    runtime.set_wcet(index, Duration::from_micros(1))?;
    assert_eq!(runtime.wcet(index)?, Duration::from_micros(1));
    Ok(())
}

#[test]
fn test_thread_cpu_clock_ignores_sleep() -> TestResult {
    let config = RuntimeConfig::builder()
        .exec_clock(ExecClock::ThreadCpu)
        .build()?;
    let runtime = Runtime::new(config)?;
    let index = runtime.create(
        || {
            std::thread::sleep(Duration::from_millis(20));
            let _ = wait_for_instance();
        },
        TaskSpec::periodic(Duration::from_millis(50))
            .measured()
            .activate_now(),
    )?;
    runtime.join(index)?;

    let wcet = runtime.wcet(index)?;
    if cfg!(target_os = "linux") {
        assert!(wcet < Duration::from_millis(20), "cpu time {wcet:?}");
    }
    Ok(())
}
