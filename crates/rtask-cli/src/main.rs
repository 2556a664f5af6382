//! rtask-demo - drive the rtask runtime with a periodic workload
//!
//! Spawns a set of periodic tasks with staggered first releases, lets them
//! run for a while and prints instances, deadline misses, WCET and core per
//! task.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

mod demo;
mod error;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use rtask::{MultiprocessorPolicy, RuntimeConfig, SchedulingClass, ptask_init_with};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::demo::Workload;
use crate::error::DemoError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PolicyArg {
    Partitioned,
    Global,
}

impl From<PolicyArg> for MultiprocessorPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Partitioned => MultiprocessorPolicy::Partitioned,
            PolicyArg::Global => MultiprocessorPolicy::Global,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ClassArg {
    Fifo,
    Rr,
    Other,
}

impl From<ClassArg> for SchedulingClass {
    fn from(arg: ClassArg) -> Self {
        match arg {
            ClassArg::Fifo => SchedulingClass::Fifo,
            ClassArg::Rr => SchedulingClass::RoundRobin,
            ClassArg::Other => SchedulingClass::Other,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "rtask-demo")]
#[command(about = "Run a periodic workload on the rtask runtime and report timing")]
#[command(version)]
struct Cli {
    /// Number of periodic tasks
    #[arg(long, default_value_t = 4)]
    tasks: usize,

    /// Task period in milliseconds
    #[arg(long, default_value_t = 10)]
    period_ms: u64,

    /// How long to run the workload, in milliseconds
    #[arg(long, default_value_t = 1000)]
    duration_ms: u64,

    /// Busy fraction of each period, in percent
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u8).range(0..=100))]
    load: u8,

    /// Multiprocessor policy (overrides the config file)
    #[arg(long, value_enum)]
    policy: Option<PolicyArg>,

    /// Scheduling class (overrides the config file)
    #[arg(long, value_enum)]
    class: Option<ClassArg>,

    /// Runtime configuration file (JSON)
    #[arg(long, env = "RTASK_CONFIG")]
    config: Option<PathBuf>,

    /// Output in JSON format for machine parsing
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn load_config(cli: &Cli) -> Result<RuntimeConfig, DemoError> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            serde_json::from_str::<RuntimeConfig>(&text)?
        }
        None => RuntimeConfig::default(),
    };

    if let Some(policy) = cli.policy {
        config.policy.multiprocessor = policy.into();
    }
    if let Some(class) = cli.class {
        config.policy.class = class.into();
    }
    config.validate()?;
    Ok(config)
}

#[expect(clippy::exit, reason = "exit codes classify the failure")]
fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("rtask={log_level},rtask_demo={log_level}").into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let result = execute(&cli);

    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            if cli.json {
                output::print_error_json(&e);
            } else {
                output::print_error_human(&e);
            }

            let exit_code = match e.downcast_ref::<DemoError>() {
                Some(DemoError::InvalidArguments(_)) => 2,
                Some(DemoError::IoError(_)) | Some(DemoError::JsonError(_)) => 3,
                Some(DemoError::Runtime(_)) => 4,
                None => 1,
            };
            std::process::exit(exit_code);
        }
    }
}

fn execute(cli: &Cli) -> Result<()> {
    let config = load_config(cli).context("loading runtime configuration")?;
    ptask_init_with(config);

    let workload = Workload {
        tasks: cli.tasks,
        period: Duration::from_millis(cli.period_ms),
        duration: Duration::from_millis(cli.duration_ms),
        load_percent: cli.load,
    };
    let reports = demo::run(&workload)?;
    output::print_reports(&reports, cli.json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn parse_defaults() -> TestResult {
        let cli = Cli::try_parse_from(["rtask-demo"])?;
        assert_eq!(cli.tasks, 4);
        assert_eq!(cli.period_ms, 10);
        assert_eq!(cli.duration_ms, 1000);
        assert!(!cli.json);
        assert!(cli.policy.is_none());
        Ok(())
    }

    #[test]
    fn parse_policy_and_class() -> TestResult {
        let cli = Cli::try_parse_from(["rtask-demo", "--policy", "global", "--class", "rr", "-vv"])?;
        assert_eq!(cli.policy, Some(PolicyArg::Global));
        assert_eq!(cli.class, Some(ClassArg::Rr));
        assert_eq!(cli.verbose, 2);
        Ok(())
    }

    #[test]
    fn load_above_hundred_is_rejected() {
        assert!(Cli::try_parse_from(["rtask-demo", "--load", "150"]).is_err());
    }

    #[test]
    fn flags_override_config() -> TestResult {
        let cli = Cli::try_parse_from(["rtask-demo", "--policy", "global", "--class", "other"])?;
        let config = load_config(&cli)?;
        assert_eq!(config.policy.multiprocessor, MultiprocessorPolicy::Global);
        assert_eq!(config.policy.class, SchedulingClass::Other);
        Ok(())
    }
}
