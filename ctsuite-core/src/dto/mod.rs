//! Data Transfer Objects exchanged with the job-submission platform
//!
//! DTOs mirror the platform's wire shapes (camelCase field names) so they can
//! be posted and persisted as-is.

pub mod files;
pub mod submission;
