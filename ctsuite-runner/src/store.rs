//! Experiment log store
//!
//! Remembers which job was submitted for which experiment so a rerun against
//! the same log directory resumes the earlier job instead of submitting a
//! new one. For each experiment key the store keeps two files:
//!
//! - `<key>.out`: the raw job id (the record itself)
//! - `<key>.json`: the submission descriptor and submission time
//!
//! The `.out` file is written first and alone decides whether a record
//! exists; the descriptor is informational. An existing record is never
//! overwritten.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use ctsuite_client::{ClientError, RemoteClient};
use ctsuite_core::domain::experiment::Experiment;
use ctsuite_core::dto::submission::JobSubmission;

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors raised by the log store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Log store I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed log record {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Submission failed: {0}")]
    Submit(#[from] ClientError),
}

/// Persisted record for one experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentLogEntry {
    pub key: String,
    pub job_id: String,
    #[serde(default)]
    pub experiment: Option<Experiment>,
    #[serde(default)]
    pub submission: Option<JobSubmission>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Job resolved by [`ExperimentLog::get_or_submit`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedJob {
    pub job_id: String,
    /// True when the id came from an existing record
    pub reused: bool,
}

/// Idempotency store mapping experiments to submitted jobs
#[async_trait]
pub trait ExperimentLog: Send + Sync {
    /// Reads the record for `key`, if any
    async fn lookup(&self, key: &str) -> StoreResult<Option<ExperimentLogEntry>>;

    /// Returns the logged job for `experiment`, submitting `submission` only
    /// when no record exists
    ///
    /// Concurrent calls for the same experiment submit at most once.
    async fn get_or_submit(
        &self,
        experiment: &Experiment,
        submission: &JobSubmission,
        client: &dyn RemoteClient,
    ) -> StoreResult<LoggedJob>;
}

/// File-backed experiment log rooted at one directory
#[derive(Debug)]
pub struct FileLogStore {
    dir: PathBuf,
    /// Per-key locks serializing get-or-submit
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FileLogStore {
    /// Creates a store rooted at `dir`; the directory is created on first write
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the raw job id file for `key`
    pub fn id_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.out", key))
    }

    /// Path of the submission descriptor file for `key`
    pub fn descriptor_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    async fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(key.to_string()).or_default())
    }

    async fn ensure_dir(&self) -> StoreResult<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StoreError::Io {
                path: self.dir.clone(),
                source,
            })
    }

    /// Persists the raw job id, the record itself
    async fn write_id(&self, key: &str, job_id: &str) -> StoreResult<()> {
        atomic_write(&self.id_path(key), job_id.as_bytes()).await
    }

    /// Persists the submission descriptor
    async fn write_descriptor(&self, entry: &ExperimentLogEntry) -> StoreResult<()> {
        let path = self.descriptor_path(&entry.key);
        let descriptor = serde_json::to_vec_pretty(entry).map_err(|source| {
            StoreError::Malformed {
                path: path.clone(),
                source,
            }
        })?;
        atomic_write(&path, &descriptor).await
    }

    /// Reads the submission descriptor, if present
    async fn read_descriptor(&self, key: &str) -> StoreResult<Option<ExperimentLogEntry>> {
        let path = self.descriptor_path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|source| StoreError::Malformed { path, source }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }
}

#[async_trait]
impl ExperimentLog for FileLogStore {
    async fn lookup(&self, key: &str) -> StoreResult<Option<ExperimentLogEntry>> {
        let id_path = self.id_path(key);
        let raw_id = match tokio::fs::read_to_string(&id_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Io {
                    path: id_path,
                    source,
                });
            }
        };

        let job_id = raw_id.lines().next().unwrap_or_default().trim().to_string();
        if job_id.is_empty() {
            debug!("Ignoring empty log record {}", id_path.display());
            return Ok(None);
        }

        let descriptor = match self.read_descriptor(key).await {
            Ok(descriptor) => descriptor,
            Err(e) => {
                warn!("Ignoring descriptor of {}: {}", key, e);
                None
            }
        };

        // the raw id file is authoritative
        let mut entry = descriptor.unwrap_or_else(|| ExperimentLogEntry {
            key: key.to_string(),
            job_id: String::new(),
            experiment: None,
            submission: None,
            submitted_at: None,
        });
        entry.job_id = job_id;
        Ok(Some(entry))
    }

    async fn get_or_submit(
        &self,
        experiment: &Experiment,
        submission: &JobSubmission,
        client: &dyn RemoteClient,
    ) -> StoreResult<LoggedJob> {
        let key = experiment.key();
        let lock = self.key_lock(&key).await;
        let _guard = lock.lock().await;

        if let Some(entry) = self.lookup(&key).await? {
            info!("Reusing job {} for {}", entry.job_id, key);
            return Ok(LoggedJob {
                job_id: entry.job_id,
                reused: true,
            });
        }

        // fail before submitting when the log cannot hold a record
        self.ensure_dir().await?;

        let job_id = client.submit(submission).await?;
        info!("Submitted job {} for {}", job_id, key);

        if let Err(e) = self.write_id(&key, &job_id).await {
            error!(
                "Job {} for {} could not be logged, a rerun will submit again: {}",
                job_id, key, e
            );
            return Ok(LoggedJob {
                job_id,
                reused: false,
            });
        }

        let entry = ExperimentLogEntry {
            key,
            job_id: job_id.clone(),
            experiment: Some(experiment.clone()),
            submission: Some(submission.clone()),
            submitted_at: Some(Utc::now()),
        };
        if let Err(e) = self.write_descriptor(&entry).await {
            warn!("Descriptor for {} not written: {}", entry.key, e);
        }

        Ok(LoggedJob {
            job_id,
            reused: false,
        })
    }
}

/// Writes `bytes` to a sibling temp file, then renames it over `path`
async fn atomic_write(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    let tmp = path.with_extension(format!(
        "{}.tmp",
        path.extension().and_then(|e| e.to_str()).unwrap_or_default()
    ));
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    tokio::fs::write(&tmp, bytes).await.map_err(io_err)?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(io_err(e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctsuite_core::domain::job::Job;
    use ctsuite_core::dto::files::RemoteFile;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts submissions; nothing else is called by the store
    #[derive(Default)]
    struct CountingClient {
        submits: AtomicUsize,
    }

    #[async_trait]
    impl RemoteClient for CountingClient {
        async fn submit(&self, _submission: &JobSubmission) -> ctsuite_client::Result<String> {
            let n = self.submits.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("job-{n}"))
        }

        async fn get_job(&self, _job_id: &str) -> ctsuite_client::Result<Job> {
            unreachable!("the store never reads jobs")
        }

        async fn list_files(&self, _path: &str) -> ctsuite_client::Result<Vec<RemoteFile>> {
            unreachable!("the store never lists files")
        }

        async fn read_file(&self, _path: &str) -> ctsuite_client::Result<Vec<u8>> {
            unreachable!("the store never reads files")
        }
    }

    fn sample_submission() -> JobSubmission {
        JobSubmission {
            name: "testsuite_TACC_x86_m".to_string(),
            description: "Invoke ctcontroller to run camera-traps on TACC x86".to_string(),
            app_id: "cameratraps-test".to_string(),
            app_version: "0.1".to_string(),
            parameter_set: Default::default(),
            archive_filter: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_unwritable_descriptor_still_records_job() {
        let dir = tempfile::tempdir().unwrap();
        let experiment = Experiment::new("m", "x86", "TACC", "default");
        std::fs::create_dir(dir.path().join(format!("{}.json", experiment.key()))).unwrap();

        let store = FileLogStore::new(dir.path());
        let client = CountingClient::default();
        let submission = sample_submission();

        let first = store
            .get_or_submit(&experiment, &submission, &client)
            .await
            .unwrap();
        assert!(!first.reused);

        for _ in 0..2 {
            let again = store
                .get_or_submit(&experiment, &submission, &client)
                .await
                .unwrap();
            assert!(again.reused);
            assert_eq!(again.job_id, first.job_id);
        }
        assert_eq!(client.submits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unwritable_record_returns_submitted_job() {
        let dir = tempfile::tempdir().unwrap();
        let experiment = Experiment::new("m", "x86", "TACC", "default");
        std::fs::create_dir(dir.path().join(format!("{}.out.tmp", experiment.key()))).unwrap();

        let store = FileLogStore::new(dir.path());
        let client = CountingClient::default();

        let logged = store
            .get_or_submit(&experiment, &sample_submission(), &client)
            .await
            .unwrap();
        assert_eq!(logged.job_id, "job-1");
        assert!(!logged.reused);
        assert!(store.lookup(&experiment.key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_log_dir_is_created_before_submitting() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("logs");
        std::fs::write(&blocker, "not a directory").unwrap();

        let store = FileLogStore::new(&blocker);
        let client = CountingClient::default();
        let experiment = Experiment::new("m", "x86", "TACC", "default");

        let result = store.get_or_submit(&experiment, &sample_submission(), &client).await;
        assert!(matches!(result, Err(StoreError::Io { .. })));
        assert_eq!(client.submits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_lookup_missing_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLogStore::new(dir.path());
        assert!(store.lookup("nothing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lookup_reads_bare_out_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("mxx86xTACCxdefault.out"), "job-123\n").unwrap();

        let store = FileLogStore::new(dir.path());
        let entry = store.lookup("mxx86xTACCxdefault").await.unwrap().unwrap();
        assert_eq!(entry.job_id, "job-123");
        assert!(entry.submission.is_none());
    }

    #[tokio::test]
    async fn test_empty_out_file_is_not_a_record() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("k.out"), "  \n").unwrap();

        let store = FileLogStore::new(dir.path());
        assert!(store.lookup("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_descriptor_does_not_hide_record() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("k.out"), "job-1").unwrap();
        std::fs::write(dir.path().join("k.json"), "{not json").unwrap();

        let store = FileLogStore::new(dir.path());
        assert!(matches!(
            store.read_descriptor("k").await,
            Err(StoreError::Malformed { .. })
        ));

        let entry = store.lookup("k").await.unwrap().unwrap();
        assert_eq!(entry.job_id, "job-1");
        assert!(entry.submission.is_none());
    }

    #[test]
    fn test_paths() {
        let store = FileLogStore::new("/tmp/logs");
        assert_eq!(store.id_path("k"), PathBuf::from("/tmp/logs/k.out"));
        assert_eq!(store.descriptor_path("k"), PathBuf::from("/tmp/logs/k.json"));
    }
}
