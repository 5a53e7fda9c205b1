//! Result validator
//!
//! Independent checks over the artifacts of a FINISHED job. Each check
//! yields its own [`Outcome`] so one bad artifact does not hide the others.

use tracing::{debug, warn};

use ctsuite_client::RemoteClient;
use ctsuite_core::domain::expected::ExpectedCounts;
use ctsuite_core::domain::outcome::Outcome;
use ctsuite_core::domain::power::PowerReport;
use ctsuite_core::dto::files::RemoteFile;

use super::archive_path;
use crate::config::ValidationConfig;

/// Suffix of score files in the images output directory
pub const SCORE_SUFFIX: &str = ".score";

/// Plugins allowed to read zero GPU power while the GPU is enabled
pub const GPU_ZERO_ALLOWANCE: usize = 1;

/// Image and score file counts of an output listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputCounts {
    pub images: usize,
    pub scores: usize,
}

/// Splits a listing into score files and everything else
pub fn count_outputs(files: &[RemoteFile]) -> OutputCounts {
    let scores = files
        .iter()
        .filter(|f| f.name.ends_with(SCORE_SUFFIX))
        .count();
    OutputCounts {
        images: files.len() - scores,
        scores,
    }
}

pub fn check_image_count(counts: OutputCounts, expected: &ExpectedCounts) -> Outcome {
    Outcome::check(counts.images == expected.image_count, || {
        format!(
            "expected {} image files, found {}",
            expected.image_count, counts.images
        )
    })
}

pub fn check_score_count(counts: OutputCounts, expected: &ExpectedCounts) -> Outcome {
    Outcome::check(counts.scores == expected.score_count, || {
        format!(
            "expected {} score files, found {}",
            expected.score_count, counts.scores
        )
    })
}

/// Checks per-plugin power draw
///
/// CPU draw must be positive for every plugin. With the GPU enabled, GPU
/// draw must be positive for every plugin but at most
/// [`GPU_ZERO_ALLOWANCE`]; with the GPU disabled it must be zero
/// everywhere. On a `fast_device` a failure is downgraded to `XFail`.
pub fn check_power(report: &PowerReport, gpu_enabled: bool, fast_device: bool) -> Outcome {
    let outcome = power_outcome(report, gpu_enabled);

    match outcome {
        Outcome::Fail(reason) if fast_device => {
            Outcome::xfail(format!("device too fast to sample power: {}", reason))
        }
        other => other,
    }
}

fn power_outcome(report: &PowerReport, gpu_enabled: bool) -> Outcome {
    if report.is_empty() {
        return Outcome::fail("power report lists no plugins");
    }

    let no_cpu: Vec<&str> = report
        .iter()
        .filter(|(_, p)| p.cpu_power_consumption <= 0.0)
        .map(|(name, _)| name)
        .collect();
    if !no_cpu.is_empty() {
        return Outcome::fail(format!("no CPU power recorded for {}", no_cpu.join(", ")));
    }

    if gpu_enabled {
        let no_gpu: Vec<&str> = report
            .iter()
            .filter(|(_, p)| p.gpu_power_consumption <= 0.0)
            .map(|(name, _)| name)
            .collect();
        if no_gpu.len() > GPU_ZERO_ALLOWANCE {
            return Outcome::fail(format!(
                "no GPU power recorded for {} with GPU enabled",
                no_gpu.join(", ")
            ));
        }
    } else {
        let with_gpu: Vec<&str> = report
            .iter()
            .filter(|(_, p)| p.gpu_power_consumption != 0.0)
            .map(|(name, _)| name)
            .collect();
        if !with_gpu.is_empty() {
            return Outcome::fail(format!(
                "GPU power recorded for {} with GPU disabled",
                with_gpu.join(", ")
            ));
        }
    }

    Outcome::Pass
}

/// Counts the lines of `log` containing `marker`
pub fn count_events(log: &str, marker: &str) -> usize {
    log.lines().filter(|line| line.contains(marker)).count()
}

/// Compares the marker count against the expected event count
///
/// Skipped when the expected values carry no event count.
pub fn check_ckn_events(log: &str, marker: &str, expected: &ExpectedCounts) -> Outcome {
    let Some(want) = expected.ckn_event_count else {
        return Outcome::skip("no expected CKN event count");
    };

    let found = count_events(log, marker);
    Outcome::check(found == want, || {
        format!("expected {} CKN events, found {}", want, found)
    })
}

/// Fetches artifacts of a finished job and runs the checks above
pub struct ResultValidator<'a> {
    client: &'a dyn RemoteClient,
    config: &'a ValidationConfig,
}

impl<'a> ResultValidator<'a> {
    pub fn new(client: &'a dyn RemoteClient, config: &'a ValidationConfig) -> Self {
        Self { client, config }
    }

    /// Image and score count checks, in that order
    pub async fn check_outputs(
        &self,
        archive_dir: &str,
        expected: Option<&ExpectedCounts>,
    ) -> (Outcome, Outcome) {
        let Some(expected) = expected else {
            let skip = Outcome::skip("no expected values for this model and dataset");
            return (skip.clone(), skip);
        };

        let path = archive_path(archive_dir, &self.config.images_dir);
        match self.client.list_files(&path).await {
            Ok(files) => {
                let counts = count_outputs(&files);
                debug!(
                    "{} holds {} image(s) and {} score file(s)",
                    path, counts.images, counts.scores
                );
                (
                    check_image_count(counts, expected),
                    check_score_count(counts, expected),
                )
            }
            Err(e) => {
                warn!("Could not list {}: {}", path, e);
                let fail = Outcome::fail(format!("could not list {}: {}", path, e));
                (fail.clone(), fail)
            }
        }
    }

    /// Power telemetry check
    pub async fn check_power(
        &self,
        archive_dir: &str,
        gpu_enabled: bool,
        fast_device: bool,
    ) -> Outcome {
        let path = archive_path(archive_dir, &self.config.power_report);
        let bytes = match self.client.read_file(&path).await {
            Ok(bytes) => bytes,
            Err(e) => return Outcome::fail(format!("could not read {}: {}", path, e)),
        };

        match PowerReport::from_slice(&bytes) {
            Ok(report) => check_power(&report, gpu_enabled, fast_device),
            Err(e) => Outcome::fail(format!("malformed power report {}: {}", path, e)),
        }
    }

    /// CKN event count check
    pub async fn check_ckn_events(
        &self,
        archive_dir: &str,
        expected: Option<&ExpectedCounts>,
    ) -> Outcome {
        let Some(expected) = expected else {
            return Outcome::skip("no expected values for this model and dataset");
        };
        if expected.ckn_event_count.is_none() {
            return Outcome::skip("no expected CKN event count");
        }

        let path = archive_path(archive_dir, &self.config.ckn_event_log);
        match self.client.read_file(&path).await {
            Ok(bytes) => check_ckn_events(
                &String::from_utf8_lossy(&bytes),
                &self.config.ckn_event_marker,
                expected,
            ),
            Err(e) => Outcome::fail(format!("could not read {}: {}", path, e)),
        }
    }
}
