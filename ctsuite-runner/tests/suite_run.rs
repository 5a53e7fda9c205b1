//! End-to-end runs of the suite against an in-memory platform

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ctsuite_client::{ClientError, RemoteClient};
use ctsuite_core::domain::expected::{ExpectedCounts, ExpectedValues};
use ctsuite_core::domain::experiment::Experiment;
use ctsuite_core::domain::job::{Job, JobStatus};
use ctsuite_core::domain::outcome::Outcome;
use ctsuite_core::dto::files::RemoteFile;
use ctsuite_core::dto::submission::JobSubmission;
use ctsuite_runner::submission::{AdvancedVars, SubmissionBuilder};
use ctsuite_runner::{CheckName, ExperimentLog, FileLogStore, SuiteConfig, SuiteRunner};

const ARCHIVE: &str = "/archive";
const MODEL: &str = "41d3ed40-b836-4a62-b3fb-67cee79f33d9-model";

/// Platform double: every job walks through the same status script and
/// shares one archive directory
struct MockRemote {
    script: Vec<JobStatus>,
    last_message: Option<String>,
    files: HashMap<String, Vec<u8>>,
    listings: HashMap<String, Vec<RemoteFile>>,
    submits: AtomicUsize,
    polls: Mutex<HashMap<String, usize>>,
}

impl MockRemote {
    fn new(script: Vec<JobStatus>) -> Self {
        Self {
            script,
            last_message: None,
            files: HashMap::new(),
            listings: HashMap::new(),
            submits: AtomicUsize::new(0),
            polls: Mutex::new(HashMap::new()),
        }
    }

    /// A job that finishes with every artifact in place
    fn finishing() -> Self {
        Self::new(vec![JobStatus::Pending, JobStatus::Running, JobStatus::Finished])
            .with_outputs(6, 6)
            .with_file(
                "ct_run/power_output_dir/power_summary_report.json",
                r#"{
                    "image_scoring_plugin": {"cpu_power_consumption": 12.5, "gpu_power_consumption": 0.0},
                    "image_generating_plugin": {"cpu_power_consumption": 3.1}
                }"#,
            )
            .with_file(
                "ct_run/ckn_output_dir/events.log",
                &"CKN_EVENT image scored\n".repeat(6),
            )
    }

    fn with_outputs(mut self, images: usize, scores: usize) -> Self {
        let mut files: Vec<_> = (0..images)
            .map(|i| RemoteFile::file(format!("img_{i}.jpg")))
            .collect();
        files.extend((0..scores).map(|i| RemoteFile::file(format!("img_{i}.jpg.score"))));
        self.listings
            .insert(format!("{ARCHIVE}/ct_run/images_output_dir"), files);
        self
    }

    fn with_file(mut self, relative: &str, content: &str) -> Self {
        self.files
            .insert(format!("{ARCHIVE}/{relative}"), content.as_bytes().to_vec());
        self
    }

    fn with_last_message(mut self, message: &str) -> Self {
        self.last_message = Some(message.to_string());
        self
    }

    fn submits(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteClient for MockRemote {
    async fn submit(&self, _submission: &JobSubmission) -> ctsuite_client::Result<String> {
        let n = self.submits.fetch_add(1, Ordering::SeqCst);
        Ok(format!("job-{}", n + 1))
    }

    async fn get_job(&self, job_id: &str) -> ctsuite_client::Result<Job> {
        let mut polls = self.polls.lock().unwrap();
        let n = polls.entry(job_id.to_string()).or_insert(0);
        let status = self.script[(*n).min(self.script.len() - 1)].clone();
        *n += 1;

        Ok(Job {
            id: job_id.to_string(),
            status,
            archive_dir: ARCHIVE.to_string(),
            last_message: self.last_message.clone(),
        })
    }

    async fn list_files(&self, path: &str) -> ctsuite_client::Result<Vec<RemoteFile>> {
        self.listings
            .get(path)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(path.to_string()))
    }

    async fn read_file(&self, path: &str) -> ctsuite_client::Result<Vec<u8>> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(path.to_string()))
    }
}

fn config(device: &str, site: &str) -> SuiteConfig {
    let mut config = SuiteConfig::new(MODEL, device, site);
    config.polling.interval_secs = 10;
    config.polling.max_wait_secs = 3600;
    config
}

fn expected() -> ExpectedValues {
    ExpectedValues::default().with_entry(
        MODEL,
        "default",
        ExpectedCounts {
            image_count: 6,
            score_count: 6,
            ckn_event_count: Some(6),
        },
    )
}

fn runner(
    config: SuiteConfig,
    expected: ExpectedValues,
    remote: &Arc<MockRemote>,
    dir: &std::path::Path,
) -> SuiteRunner {
    let client: Arc<dyn RemoteClient> = remote.clone();
    SuiteRunner::new(config, expected, client, Arc::new(FileLogStore::new(dir)))
}

#[tokio::test(start_paused = true)]
async fn test_finished_job_passes_every_check() {
    let dir = tempfile::tempdir().unwrap();
    let remote = Arc::new(MockRemote::finishing());

    let report = runner(config("x86", "TACC"), expected(), &remote, dir.path())
        .run()
        .await;

    assert_eq!(report.experiments.len(), 1);
    let experiment = &report.experiments[0];
    assert_eq!(experiment.final_status, Some(JobStatus::Finished));
    assert!(!experiment.reused);
    for check in &experiment.checks {
        assert_eq!(check.outcome, Outcome::Pass, "{} did not pass", check.name);
    }
    assert_eq!(report.summary().passed, 5);
    assert!(report.is_success());
    assert_eq!(remote.submits(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rerun_reuses_logged_job() {
    let dir = tempfile::tempdir().unwrap();
    let remote = Arc::new(MockRemote::finishing());

    let first = runner(config("x86", "TACC"), expected(), &remote, dir.path())
        .run()
        .await;
    let second = runner(config("x86", "TACC"), expected(), &remote, dir.path())
        .run()
        .await;

    assert_eq!(remote.submits(), 1);
    assert!(!first.experiments[0].reused);
    assert!(second.experiments[0].reused);
    assert_eq!(first.experiments[0].job_id, second.experiments[0].job_id);
    assert!(second.is_success());
}

#[tokio::test]
async fn test_concurrent_get_or_submit_submits_once() {
    let dir = tempfile::tempdir().unwrap();
    let remote = MockRemote::finishing();
    let store = FileLogStore::new(dir.path());

    let config = config("x86", "TACC");
    let experiment = Experiment::new(MODEL, "x86", "TACC", "default");
    let submission = SubmissionBuilder::from_config(&config)
        .build(&experiment, &AdvancedVars::for_experiment(&config, &experiment));

    let (a, b, c) = tokio::join!(
        store.get_or_submit(&experiment, &submission, &remote),
        store.get_or_submit(&experiment, &submission, &remote),
        store.get_or_submit(&experiment, &submission, &remote),
    );
    let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());

    assert_eq!(remote.submits(), 1);
    assert_eq!(a.job_id, b.job_id);
    assert_eq!(b.job_id, c.job_id);
    assert_eq!([a.reused, b.reused, c.reused].iter().filter(|r| !**r).count(), 1);

    let entry = store.lookup(&experiment.key()).await.unwrap().unwrap();
    assert_eq!(entry.job_id, a.job_id);
    assert_eq!(entry.submission.as_ref(), Some(&submission));
    assert_eq!(entry.experiment.as_ref(), Some(&experiment));
}

#[tokio::test(start_paused = true)]
async fn test_preexisting_record_is_resumed_without_submitting() {
    let dir = tempfile::tempdir().unwrap();
    let key = Experiment::new(MODEL, "x86", "TACC", "default").key();
    std::fs::write(dir.path().join(format!("{key}.out")), "job-from-last-week").unwrap();

    let remote = Arc::new(MockRemote::finishing());
    let report = runner(config("x86", "TACC"), expected(), &remote, dir.path())
        .run()
        .await;

    assert_eq!(remote.submits(), 0);
    assert_eq!(
        report.experiments[0].job_id.as_deref(),
        Some("job-from-last-week")
    );
    assert!(report.experiments[0].reused);
}

#[tokio::test(start_paused = true)]
async fn test_transient_provisioning_failure_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let remote = Arc::new(
        MockRemote::new(vec![JobStatus::Queued, JobStatus::Failed])
            .with_last_message("No resources available at CHI@TACC, try again later"),
    );

    let report = runner(config("gpu_k80", "CHI@TACC"), expected(), &remote, dir.path())
        .run()
        .await;

    let experiment = &report.experiments[0];
    assert!(matches!(
        experiment.outcome(CheckName::Completes),
        Some(Outcome::Skip(_))
    ));
    for name in CheckName::ARTIFACT_CHECKS {
        assert!(matches!(experiment.outcome(name), Some(Outcome::Skip(_))));
    }
    assert!(report.is_success());
}

#[tokio::test(start_paused = true)]
async fn test_transient_marker_found_in_output_log() {
    let dir = tempfile::tempdir().unwrap();
    let remote = Arc::new(
        MockRemote::new(vec![JobStatus::Failed])
            .with_file("tapisjob.out", "lease request rejected\nTry again later.\n"),
    );

    let report = runner(config("x86", "TACC"), expected(), &remote, dir.path())
        .run()
        .await;

    assert!(matches!(
        report.experiments[0].outcome(CheckName::Completes),
        Some(Outcome::Skip(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_permanent_failure_fails_the_suite() {
    let dir = tempfile::tempdir().unwrap();
    let remote = Arc::new(
        MockRemote::new(vec![JobStatus::Running, JobStatus::Failed])
            .with_file("tapisjob.out", "Traceback (most recent call last):\nKeyError: 'model'\n"),
    );

    let report = runner(config("x86", "TACC"), expected(), &remote, dir.path())
        .run()
        .await;

    let experiment = &report.experiments[0];
    assert_eq!(experiment.final_status, Some(JobStatus::Failed));
    assert!(experiment.outcome(CheckName::Completes).unwrap().is_fail());
    assert!(!report.is_success());
}

#[tokio::test(start_paused = true)]
async fn test_timeout_fails_completion_check() {
    let dir = tempfile::tempdir().unwrap();
    let remote = Arc::new(MockRemote::new(vec![JobStatus::Running]));
    let mut config = config("x86", "TACC");
    config.polling.max_wait_secs = 30;

    let report = runner(config, expected(), &remote, dir.path()).run().await;

    let experiment = &report.experiments[0];
    let completes = experiment.outcome(CheckName::Completes).unwrap();
    assert!(completes.is_fail());
    assert!(completes.reason().unwrap().contains("RUNNING"));
    assert_eq!(experiment.final_status, Some(JobStatus::Running));
    for name in CheckName::ARTIFACT_CHECKS {
        assert!(matches!(experiment.outcome(name), Some(Outcome::Skip(_))));
    }
}

#[tokio::test(start_paused = true)]
async fn test_wrong_counts_fail_artifact_checks() {
    let dir = tempfile::tempdir().unwrap();
    let remote = Arc::new(MockRemote::finishing().with_outputs(5, 7));

    let report = runner(config("x86", "TACC"), expected(), &remote, dir.path())
        .run()
        .await;

    let experiment = &report.experiments[0];
    assert!(experiment.outcome(CheckName::Completes).unwrap().is_pass());
    assert!(experiment.outcome(CheckName::ImageFiles).unwrap().is_fail());
    assert!(experiment.outcome(CheckName::ScoreFiles).unwrap().is_fail());
    assert!(experiment.outcome(CheckName::PowerData).unwrap().is_pass());
    assert_eq!(report.summary().failed, 2);
}

#[tokio::test(start_paused = true)]
async fn test_power_failure_on_fast_device_is_xfail() {
    let dir = tempfile::tempdir().unwrap();
    let remote = Arc::new(MockRemote::finishing().with_file(
        "ct_run/power_output_dir/power_summary_report.json",
        r#"{"image_scoring_plugin": {"cpu_power_consumption": 0.0, "gpu_power_consumption": 0.0}}"#,
    ));
    let mut config = config("x86", "TACC");
    config.validation.fast_devices = vec!["x86".to_string()];

    let report = runner(config, expected(), &remote, dir.path()).run().await;

    assert!(matches!(
        report.experiments[0].outcome(CheckName::PowerData),
        Some(Outcome::XFail(_))
    ));
    assert_eq!(report.summary().xfailed, 1);
    assert!(report.is_success());
}

#[tokio::test(start_paused = true)]
async fn test_missing_expected_values_skip_count_checks() {
    let dir = tempfile::tempdir().unwrap();
    let remote = Arc::new(MockRemote::finishing());

    let report = runner(
        config("x86", "TACC"),
        ExpectedValues::default(),
        &remote,
        dir.path(),
    )
    .run()
    .await;

    let experiment = &report.experiments[0];
    for name in [CheckName::ImageFiles, CheckName::ScoreFiles, CheckName::CknEvents] {
        assert!(matches!(experiment.outcome(name), Some(Outcome::Skip(_))));
    }
    assert!(experiment.outcome(CheckName::PowerData).unwrap().is_pass());
}

#[tokio::test(start_paused = true)]
async fn test_matrix_submits_each_experiment_once() {
    let dir = tempfile::tempdir().unwrap();
    let remote = Arc::new(MockRemote::finishing());
    let config = SuiteConfig::from_yaml(&format!(
        r#"
models: ["{MODEL}", "other-model"]
devices:
  x86: [TACC, CHI@UC]
max_parallel: 1
"#
    ))
    .unwrap();

    let report = runner(config, expected(), &remote, dir.path()).run().await;

    assert_eq!(report.experiments.len(), 4);
    assert_eq!(remote.submits(), 4);

    let mut job_ids: Vec<_> = report
        .experiments
        .iter()
        .filter_map(|e| e.job_id.clone())
        .collect();
    job_ids.sort();
    job_ids.dedup();
    assert_eq!(job_ids.len(), 4);

    // other-model has no expected values
    let other = report
        .experiments
        .iter()
        .find(|e| e.experiment.model_id == "other-model")
        .unwrap();
    assert!(matches!(
        other.outcome(CheckName::ImageFiles),
        Some(Outcome::Skip(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_rerun_after_descriptor_failure_submits_once() {
    let dir = tempfile::tempdir().unwrap();
    let key = Experiment::new(MODEL, "x86", "TACC", "default").key();
    std::fs::create_dir(dir.path().join(format!("{key}.json"))).unwrap();
    let remote = Arc::new(MockRemote::finishing());

    for _ in 0..3 {
        let report = runner(config("x86", "TACC"), expected(), &remote, dir.path())
            .run()
            .await;
        assert!(report.is_success());
    }

    assert_eq!(remote.submits(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_missing_ckn_count_skips_event_check() {
    let dir = tempfile::tempdir().unwrap();
    let remote = Arc::new(MockRemote::finishing());
    let expected = ExpectedValues::from_json(&format!(
        r#"{{"{MODEL}": {{"default": {{"images": 6, "scores": 6}}}}}}"#
    ))
    .unwrap();

    let report = runner(config("x86", "TACC"), expected, &remote, dir.path())
        .run()
        .await;

    let experiment = &report.experiments[0];
    assert!(experiment.outcome(CheckName::ImageFiles).unwrap().is_pass());
    assert!(matches!(
        experiment.outcome(CheckName::CknEvents),
        Some(Outcome::Skip(_))
    ));
}
