//! Scheduler layer for the runner
//!
//! This layer waits on remote jobs: it drives the bounded polling loop from
//! submission to a terminal status.

pub mod poller;

pub use poller::{CompletionPoller, PollOutcome};
