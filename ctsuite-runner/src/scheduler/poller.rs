//! Completion poller
//!
//! Polls a remote job at a fixed interval until it leaves the in-progress
//! status set or the wait budget runs out. Running out of budget is not an
//! error: the caller gets [`PollOutcome::TimedOut`] and the status check
//! downstream fails on the non-terminal status.

use tokio::time::{self, Duration, Instant};
use tracing::{debug, info, warn};

use ctsuite_client::{ClientError, RemoteClient};
use ctsuite_core::domain::job::JobStatus;

use crate::config::PollSettings;

/// How a polling sequence ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The job reached a terminal status
    Terminal(JobStatus),
    /// The wait budget ran out first
    TimedOut {
        /// Last status successfully observed, if any
        last_status: Option<JobStatus>,
        waited: Duration,
    },
}

impl PollOutcome {
    /// Last status known to the poller
    pub fn status(&self) -> Option<&JobStatus> {
        match self {
            PollOutcome::Terminal(status) => Some(status),
            PollOutcome::TimedOut { last_status, .. } => last_status.as_ref(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PollOutcome::Terminal(_))
    }
}

/// Bounded fixed-interval poller
#[derive(Debug, Clone, Copy)]
pub struct CompletionPoller {
    settings: PollSettings,
}

impl CompletionPoller {
    /// Creates a new poller
    pub fn new(settings: PollSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> PollSettings {
        self.settings
    }

    /// Waits for `job_id` to reach a terminal status
    ///
    /// Transient query failures (transport errors, 5xx) count as one more
    /// in-progress tick; any other client error is returned immediately.
    pub async fn wait(
        &self,
        client: &dyn RemoteClient,
        job_id: &str,
    ) -> Result<PollOutcome, ClientError> {
        let PollSettings { interval, max_wait } = self.settings;
        let start = Instant::now();
        let mut last_status = None;
        let mut polls: u32 = 0;

        info!(
            "Waiting for job {} (interval: {:?}, max wait: {:?})",
            job_id, interval, max_wait
        );

        loop {
            polls += 1;

            match client.status(job_id).await {
                Ok(status) if status.is_terminal() => {
                    info!(
                        "Job {} reached {} after {} poll(s)",
                        job_id, status, polls
                    );
                    return Ok(PollOutcome::Terminal(status));
                }
                Ok(status) => {
                    debug!("Job {} is {}", job_id, status);
                    last_status = Some(status);
                }
                Err(e) if e.is_transient() => {
                    warn!("Transient error polling job {}: {}", job_id, e);
                }
                Err(e) => return Err(e),
            }

            let elapsed = start.elapsed();
            if elapsed >= max_wait {
                warn!(
                    "Job {} still not terminal after {:?} ({} poll(s)), giving up",
                    job_id, elapsed, polls
                );
                return Ok(PollOutcome::TimedOut {
                    last_status,
                    waited: elapsed,
                });
            }

            time::sleep(interval.min(max_wait - elapsed)).await;
        }
    }
}
