//! CT Suite Runner
//!
//! Drives end-to-end test experiments of the camera-trap application on a
//! remote job platform.
//!
//! Architecture:
//! - Configuration: suite matrix, polling budget and validation settings
//! - Submission: builds the job request for one experiment
//! - Store: experiment log that makes submission idempotent across runs
//! - Scheduler: bounded completion polling
//! - Validation: provisioning classification and artifact checks
//! - Suite: runs the matrix and collects per-check outcomes

pub mod config;
pub mod scheduler;
pub mod store;
pub mod submission;
pub mod suite;
pub mod validation;

pub use config::{ConfigError, Credentials, SuiteConfig};
pub use store::{ExperimentLog, FileLogStore, LoggedJob};
pub use suite::{CheckName, ExperimentReport, SuiteReport, SuiteRunner};
