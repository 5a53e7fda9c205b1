//! Experiment domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// One test scenario: a model run on a device at a site against a dataset
///
/// The tuple is the identity of the scenario. Its [`key`](Experiment::key) is
/// used as the experiment-log key and as the stem of the persisted files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Experiment {
    pub model_id: String,
    pub device: String,
    pub site: String,
    pub dataset: String,
}

impl Experiment {
    pub fn new(
        model_id: impl Into<String>,
        device: impl Into<String>,
        site: impl Into<String>,
        dataset: impl Into<String>,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            device: device.into(),
            site: site.into(),
            dataset: dataset.into(),
        }
    }

    /// Stable string key, `{model}x{device}x{site}x{dataset}`
    ///
    /// The separator is not escaped, so distinct tuples can share a key when
    /// a field contains `x` (`modelx`/`x86` and `model`/`xx86`). Suite
    /// configs reject a matrix with colliding keys.
    pub fn key(&self) -> String {
        format!(
            "{}x{}x{}x{}",
            self.model_id, self.device, self.site, self.dataset
        )
    }
}

impl fmt::Display for Experiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {} at {} ({})",
            self.model_id, self.device, self.site, self.dataset
        )
    }
}
