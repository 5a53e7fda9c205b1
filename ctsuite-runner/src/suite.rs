//! Suite runner
//!
//! Drives every experiment of the matrix through submission, polling and
//! validation. Experiments run concurrently up to `max_parallel`; each one
//! performs its own sequential sleep-then-check loop.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use ctsuite_client::RemoteClient;
use ctsuite_core::domain::expected::ExpectedValues;
use ctsuite_core::domain::experiment::Experiment;
use ctsuite_core::domain::job::{Job, JobStatus};
use ctsuite_core::domain::outcome::Outcome;

use crate::config::SuiteConfig;
use crate::scheduler::{CompletionPoller, PollOutcome};
use crate::store::ExperimentLog;
use crate::submission::{AdvancedVars, SubmissionBuilder, enable_gpu};
use crate::validation::{ProvisioningValidator, ResultValidator};

/// Named checks reported per experiment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckName {
    Completes,
    ImageFiles,
    ScoreFiles,
    PowerData,
    CknEvents,
}

impl CheckName {
    pub const ARTIFACT_CHECKS: [CheckName; 4] = [
        CheckName::ImageFiles,
        CheckName::ScoreFiles,
        CheckName::PowerData,
        CheckName::CknEvents,
    ];
}

impl fmt::Display for CheckName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CheckName::Completes => "completes",
            CheckName::ImageFiles => "image_files",
            CheckName::ScoreFiles => "score_files",
            CheckName::PowerData => "power_data",
            CheckName::CknEvents => "ckn_events",
        };
        f.write_str(name)
    }
}

/// One check and its outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub name: CheckName,
    pub outcome: Outcome,
}

/// Everything learned about one experiment
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentReport {
    pub experiment: Experiment,
    pub job_id: Option<String>,
    /// True when the job came from an earlier run's log
    pub reused: bool,
    pub final_status: Option<JobStatus>,
    pub checks: Vec<CheckResult>,
}

impl ExperimentReport {
    fn new(experiment: Experiment) -> Self {
        Self {
            experiment,
            job_id: None,
            reused: false,
            final_status: None,
            checks: Vec::new(),
        }
    }

    /// Report for an experiment that could not be run at all
    fn errored(experiment: Experiment, job_id: Option<String>, err: &anyhow::Error) -> Self {
        let mut report = Self::new(experiment);
        report.job_id = job_id;
        report.record(CheckName::Completes, Outcome::fail(format!("{:#}", err)));
        for name in CheckName::ARTIFACT_CHECKS {
            report.record(name, Outcome::skip("experiment did not run"));
        }
        report
    }

    fn record(&mut self, name: CheckName, outcome: Outcome) {
        self.checks.push(CheckResult { name, outcome });
    }

    pub fn outcome(&self, name: CheckName) -> Option<&Outcome> {
        self.checks
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.outcome)
    }

    pub fn has_failures(&self) -> bool {
        self.checks.iter().any(|c| c.outcome.is_fail())
    }
}

/// Tally of outcomes across a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub xfailed: usize,
}

/// Result of a full suite run
#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub experiments: Vec<ExperimentReport>,
}

impl SuiteReport {
    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        for check in self.experiments.iter().flat_map(|e| &e.checks) {
            match check.outcome {
                Outcome::Pass => summary.passed += 1,
                Outcome::Fail(_) => summary.failed += 1,
                Outcome::Skip(_) => summary.skipped += 1,
                Outcome::XFail(_) => summary.xfailed += 1,
            }
        }
        summary
    }

    pub fn is_success(&self) -> bool {
        !self.experiments.iter().any(ExperimentReport::has_failures)
    }
}

/// Runs experiments against the platform
#[derive(Clone)]
pub struct SuiteRunner {
    config: Arc<SuiteConfig>,
    expected: Arc<ExpectedValues>,
    client: Arc<dyn RemoteClient>,
    store: Arc<dyn ExperimentLog>,
    builder: Arc<SubmissionBuilder>,
    poller: CompletionPoller,
}

impl SuiteRunner {
    /// Creates a new suite runner
    pub fn new(
        config: SuiteConfig,
        expected: ExpectedValues,
        client: Arc<dyn RemoteClient>,
        store: Arc<dyn ExperimentLog>,
    ) -> Self {
        let builder = SubmissionBuilder::from_config(&config);
        let poller = CompletionPoller::new(config.polling.settings());
        Self {
            config: Arc::new(config),
            expected: Arc::new(expected),
            client,
            store,
            builder: Arc::new(builder),
            poller,
        }
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    /// Runs the whole experiment matrix
    pub async fn run(&self) -> SuiteReport {
        let started_at = Utc::now();
        let experiments = self.config.experiments();
        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel));

        info!(
            "Running {} experiment(s), at most {} at a time",
            experiments.len(),
            self.config.max_parallel
        );

        let mut handles = Vec::new();
        for experiment in experiments {
            let runner = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let fallback = experiment.clone();

            let handle = tokio::spawn(async move {
                // the semaphore is never closed
                let _permit = semaphore.acquire_owned().await.ok();
                runner.run_experiment(experiment).await
            });
            handles.push((fallback, handle));
        }

        let mut reports = Vec::new();
        for (experiment, handle) in handles {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    error!("Experiment task for {} panicked: {}", experiment.key(), e);
                    let err = anyhow::anyhow!("experiment task panicked: {}", e);
                    reports.push(ExperimentReport::errored(experiment, None, &err));
                }
            }
        }

        SuiteReport {
            started_at,
            finished_at: Utc::now(),
            experiments: reports,
        }
    }

    /// Runs a single experiment end to end
    ///
    /// Never fails: errors become a failed `completes` check.
    pub async fn run_experiment(&self, experiment: Experiment) -> ExperimentReport {
        let key = experiment.key();
        info!("Starting experiment {}", key);

        let submission = self
            .builder
            .build(&experiment, &AdvancedVars::for_experiment(&self.config, &experiment));

        let logged = match self
            .store
            .get_or_submit(&experiment, &submission, self.client.as_ref())
            .await
            .context("Failed to resolve job")
        {
            Ok(logged) => logged,
            Err(e) => {
                error!("Experiment {}: {:#}", key, e);
                return ExperimentReport::errored(experiment, None, &e);
            }
        };

        match self.follow_job(&experiment, &logged.job_id).await {
            Ok(mut report) => {
                report.reused = logged.reused;
                report
            }
            Err(e) => {
                error!("Experiment {}: {:#}", key, e);
                let mut report = ExperimentReport::errored(experiment, Some(logged.job_id), &e);
                report.reused = logged.reused;
                report
            }
        }
    }

    /// Waits for the job and validates whatever it produced
    async fn follow_job(&self, experiment: &Experiment, job_id: &str) -> Result<ExperimentReport> {
        let outcome = self
            .poller
            .wait(self.client.as_ref(), job_id)
            .await
            .with_context(|| format!("Failed to poll job {}", job_id))?;

        let job = self
            .client
            .get_job(job_id)
            .await
            .with_context(|| format!("Failed to fetch job {}", job_id))?;

        let mut report = ExperimentReport::new(experiment.clone());
        report.job_id = Some(job_id.to_string());
        report.final_status = Some(job.status.clone());

        let completes = self.completion_outcome(&outcome, &job).await;
        let finished = completes.is_pass();
        report.record(CheckName::Completes, completes);

        if !finished {
            warn!("Job {} did not finish, skipping artifact checks", job_id);
            for name in CheckName::ARTIFACT_CHECKS {
                report.record(name, Outcome::skip(format!("job ended in {}", job.status)));
            }
            return Ok(report);
        }

        self.validate_artifacts(experiment, &job, &mut report).await;
        Ok(report)
    }

    async fn completion_outcome(&self, outcome: &PollOutcome, job: &Job) -> Outcome {
        match outcome {
            PollOutcome::TimedOut { waited, .. } if job.status.is_in_progress() => {
                Outcome::fail(format!(
                    "job {} still {} after {:?}",
                    job.id, job.status, waited
                ))
            }
            _ => {
                let validation = &self.config.validation;
                ProvisioningValidator::new(
                    self.client.as_ref(),
                    &validation.job_output_log,
                    &validation.transient_failure_marker,
                )
                .check(job)
                .await
            }
        }
    }

    async fn validate_artifacts(
        &self,
        experiment: &Experiment,
        job: &Job,
        report: &mut ExperimentReport,
    ) {
        let validator = ResultValidator::new(self.client.as_ref(), &self.config.validation);
        let expected = self.expected.get(&experiment.model_id, &experiment.dataset);
        if expected.is_none() {
            warn!(
                "No expected values for model {} on dataset {}",
                experiment.model_id, experiment.dataset
            );
        }

        let (images, scores) = validator.check_outputs(&job.archive_dir, expected).await;
        report.record(CheckName::ImageFiles, images);
        report.record(CheckName::ScoreFiles, scores);

        let power = validator
            .check_power(
                &job.archive_dir,
                enable_gpu(&experiment.device),
                self.config.is_fast_device(&experiment.device),
            )
            .await;
        report.record(CheckName::PowerData, power);

        let events = validator.check_ckn_events(&job.archive_dir, expected).await;
        report.record(CheckName::CknEvents, events);
    }
}
