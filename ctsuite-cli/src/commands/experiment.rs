//! Experiment command handlers
//!
//! Inspection commands over the experiment matrix and its log. Only
//! `status` talks to the platform.

use anyhow::{Context, Result, anyhow};
use colored::*;

use ctsuite_core::domain::experiment::Experiment;
use ctsuite_core::domain::job::JobStatus;
use ctsuite_runner::submission::{AdvancedVars, SubmissionBuilder};
use ctsuite_runner::{ExperimentLog, SuiteConfig};

use crate::config::Config;

/// List the experiment matrix
pub async fn list_experiments(config: &Config) -> Result<()> {
    let suite = config.load_suite()?;
    let store = config.store();
    let experiments = suite.experiments();

    println!(
        "{}",
        format!("Found {} experiment(s):", experiments.len()).bold()
    );
    println!();

    for experiment in experiments {
        let key = experiment.key();
        let logged = store
            .lookup(&key)
            .await
            .with_context(|| format!("Failed to read log record for {}", key))?;

        println!("  {} {}", "▸".cyan(), key.bold());
        println!(
            "    Model: {}  Device: {}  Site: {}  Dataset: {}",
            experiment.model_id, experiment.device, experiment.site, experiment.dataset
        );
        match logged {
            Some(entry) => println!("    Job:   {}", entry.job_id.dimmed()),
            None => println!("    Job:   {}", "not submitted".yellow()),
        }
        println!();
    }

    Ok(())
}

/// Show the logged job of an experiment and query its current status
pub async fn show_status(config: &Config, key: &str) -> Result<()> {
    let suite = config.load_suite()?;
    let experiment = find_experiment(&suite, key)?;
    let store = config.store();

    let Some(entry) = store.lookup(key).await? else {
        println!(
            "{}",
            format!("No job logged for {} in {}.", key, config.log_dir.display()).yellow()
        );
        return Ok(());
    };

    let client = config.connect(&suite).await?;
    let job = client
        .get_job(&entry.job_id)
        .await
        .with_context(|| format!("Failed to fetch job {}", entry.job_id))?;

    println!("{}", "Experiment Details:".bold());
    println!("  Key:       {}", key.cyan());
    println!("  Model:     {}", experiment.model_id);
    println!("  Device:    {} @ {}", experiment.device, experiment.site);
    println!("  Dataset:   {}", experiment.dataset);
    println!("  Job:       {}", job.id);
    println!("  Status:    {}", colorize_status(&job.status));
    if let Some(submitted) = entry.submitted_at {
        println!("  Submitted: {}", submitted.format("%Y-%m-%d %H:%M:%S"));
    }
    if !job.archive_dir.is_empty() {
        println!("  Archive:   {}", job.archive_dir.dimmed());
    }
    if let Some(message) = &job.last_message {
        println!("\n{}", "Last Message:".bold());
        println!("{}", message);
    }

    Ok(())
}

/// Print the submission descriptor for an experiment
pub fn show_submission(config: &Config, key: &str) -> Result<()> {
    let suite = config.load_suite()?;
    let experiment = find_experiment(&suite, key)?;

    let submission = SubmissionBuilder::from_config(&suite)
        .build(&experiment, &AdvancedVars::for_experiment(&suite, &experiment));
    println!("{}", serde_json::to_string_pretty(&submission)?);

    Ok(())
}

fn find_experiment(suite: &SuiteConfig, key: &str) -> Result<Experiment> {
    suite
        .find_experiment(key)
        .ok_or_else(|| anyhow!("No experiment with key '{}'; see `ctsuite list`", key))
}

/// Colorize job status for display
fn colorize_status(status: &JobStatus) -> ColoredString {
    let text = status.as_str().to_string();
    match status {
        JobStatus::Finished => text.green(),
        JobStatus::Failed => text.red(),
        JobStatus::Cancelled | JobStatus::Other(_) => text.dimmed(),
        status if status.is_in_progress() => text.cyan(),
        _ => text.yellow(),
    }
}
