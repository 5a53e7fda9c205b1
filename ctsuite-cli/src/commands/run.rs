//! Suite run command

use anyhow::{Result, bail};
use colored::*;
use std::sync::Arc;

use ctsuite_client::RemoteClient;
use ctsuite_core::domain::outcome::Outcome;
use ctsuite_runner::{ExperimentLog, ExperimentReport, SuiteReport, SuiteRunner};

use crate::config::Config;

/// Runs the whole matrix and prints the report
///
/// Fails when any check failed so the exit code reflects the run.
pub async fn run_suite(config: &Config, json: bool) -> Result<()> {
    let suite = config.load_suite()?;
    let expected = config.load_expected()?;
    let client: Arc<dyn RemoteClient> = Arc::new(config.connect(&suite).await?);
    let store: Arc<dyn ExperimentLog> = Arc::new(config.store());

    let runner = SuiteRunner::new(suite, expected, client, store);
    let report = runner.run().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if !report.is_success() {
        bail!("{} check(s) failed", report.summary().failed);
    }
    Ok(())
}

fn print_report(report: &SuiteReport) {
    println!(
        "{}",
        format!("Ran {} experiment(s):", report.experiments.len()).bold()
    );
    println!();

    for experiment in &report.experiments {
        print_experiment(experiment);
    }

    let summary = report.summary();
    let duration = report
        .finished_at
        .signed_duration_since(report.started_at)
        .num_seconds();

    println!("{}", "─".repeat(80).dimmed());
    println!(
        "{} passed, {} failed, {} skipped, {} xfailed in {}s",
        summary.passed.to_string().green(),
        summary.failed.to_string().red(),
        summary.skipped.to_string().yellow(),
        summary.xfailed.to_string().cyan(),
        duration
    );
}

fn print_experiment(report: &ExperimentReport) {
    let marker = if report.has_failures() {
        "✗".red()
    } else {
        "✓".green()
    };

    println!("  {} {}", marker, report.experiment.key().bold());
    if let Some(job_id) = &report.job_id {
        let origin = if report.reused { " (from log)" } else { "" };
        println!("    Job:    {}{}", job_id.dimmed(), origin.dimmed());
    }
    if let Some(status) = &report.final_status {
        println!("    Status: {}", status);
    }

    for check in &report.checks {
        println!("    {:<12} {}", check.name.to_string(), colorize_outcome(&check.outcome));
    }
    println!();
}

fn colorize_outcome(outcome: &Outcome) -> ColoredString {
    let text = outcome.to_string();
    match outcome {
        Outcome::Pass => text.green(),
        Outcome::Fail(_) => text.red(),
        Outcome::Skip(_) => text.yellow(),
        Outcome::XFail(_) => text.cyan(),
    }
}
