//! Core domain types
//!
//! These types describe what the suite tests (experiments), what it observes
//! on the remote platform (jobs) and what it expects to find there
//! (expected values, power reports). They are shared by the client, the
//! runner and the CLI.

pub mod expected;
pub mod experiment;
pub mod job;
pub mod outcome;
pub mod power;
