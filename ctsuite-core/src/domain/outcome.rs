//! Check outcomes

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of a single check against one experiment
///
/// `Skip` marks an inconclusive run (infrastructure flakiness, missing
/// reference data). `XFail` marks a failure that is expected under a narrow,
/// documented condition and does not count against the suite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail(String),
    Skip(String),
    XFail(String),
}

impl Outcome {
    pub fn fail(reason: impl Into<String>) -> Self {
        Outcome::Fail(reason.into())
    }

    pub fn skip(reason: impl Into<String>) -> Self {
        Outcome::Skip(reason.into())
    }

    pub fn xfail(reason: impl Into<String>) -> Self {
        Outcome::XFail(reason.into())
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Outcome::Pass)
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, Outcome::Fail(_))
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Outcome::Pass => None,
            Outcome::Fail(r) | Outcome::Skip(r) | Outcome::XFail(r) => Some(r),
        }
    }

    /// Builds `Pass` when `ok`, otherwise `Fail` with the lazily built reason
    pub fn check(ok: bool, reason: impl FnOnce() -> String) -> Self {
        if ok { Outcome::Pass } else { Outcome::Fail(reason()) }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Pass => write!(f, "PASS"),
            Outcome::Fail(r) => write!(f, "FAIL: {}", r),
            Outcome::Skip(r) => write!(f, "SKIP: {}", r),
            Outcome::XFail(r) => write!(f, "XFAIL: {}", r),
        }
    }
}
