//! Validation layer
//!
//! Checks run against a job once it reaches a terminal status:
//! - Provisioning: tells transient infrastructure failures apart from real
//!   failures when a job ends in FAILED
//! - Results: artifact counts, power telemetry and CKN events of a
//!   FINISHED job
//!
//! Every check is a pure function over data already fetched, wrapped by a
//! thin async layer that reads the data through a [`RemoteClient`].
//!
//! [`RemoteClient`]: ctsuite_client::RemoteClient

pub mod provisioning;
pub mod results;

pub use provisioning::{FailureClass, ProvisioningValidator, classify_failure};
pub use results::ResultValidator;

/// Joins a path relative to a job's archive directory
pub(crate) fn archive_path(archive_dir: &str, relative: &str) -> String {
    format!(
        "{}/{}",
        archive_dir.trim_end_matches('/'),
        relative.trim_start_matches('/')
    )
}
