//! Output formatting for demo results

use anyhow::Error;
use colored::*;
use serde_json::json;

use crate::demo::TaskReport;

/// Print error in JSON format
pub fn print_error_json(error: &Error) {
    let error_json = json!({
        "success": false,
        "error": {
            "message": error.to_string(),
        }
    });
    match serde_json::to_string_pretty(&error_json) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("Failed to format error as JSON: {}", e),
    }
}

/// Print error in human-readable format
pub fn print_error_human(error: &Error) {
    eprintln!("{} {}", "Error:".red().bold(), error);

    let mut source = error.source();
    while let Some(err) = source {
        eprintln!("  {} {}", "Caused by:".yellow(), err);
        source = err.source();
    }
}

/// Print the per-task report in the requested format
pub fn print_reports(reports: &[TaskReport], json: bool) {
    if json {
        let output = json!({
            "success": true,
            "tasks": reports
        });
        match serde_json::to_string_pretty(&output) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("Failed to format report as JSON: {}", e),
        }
        return;
    }

    println!(
        "{}",
        format!(
            "{:>5} {:>10} {:>8} {:>10} {:>6}",
            "task", "instances", "misses", "wcet_us", "core"
        )
        .bold()
    );
    for report in reports {
        let misses = if report.deadline_misses == 0 {
            report.deadline_misses.to_string().green()
        } else {
            report.deadline_misses.to_string().red()
        };
        let core = report
            .core
            .map_or_else(|| "-".to_string(), |core| core.to_string());
        println!(
            "{:>5} {:>10} {:>8} {:>10} {:>6}",
            report.index, report.instances, misses, report.wcet_us, core
        );
    }
}
