//! ctsuite Core
//!
//! Core types shared by the camera-traps integration suite.
//!
//! This crate contains:
//! - Domain types: experiments, remote jobs, expected artifact counts,
//!   power reports and check outcomes
//! - DTOs: the job submission descriptor and remote file listings exchanged
//!   with the job-submission platform

pub mod domain;
pub mod dto;
