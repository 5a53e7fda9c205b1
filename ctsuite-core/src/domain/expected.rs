//! Expected artifact counts per (model, dataset)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Artifact counts a successful run is expected to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedCounts {
    #[serde(alias = "images")]
    pub image_count: usize,
    #[serde(alias = "scores")]
    pub score_count: usize,
    /// Unset when the reference data has no event count
    #[serde(alias = "ckn_events", default)]
    pub ckn_event_count: Option<usize>,
}

/// Reference table of expected values, keyed by model then dataset
///
/// Loaded once per run and never mutated afterwards. On disk it is a nested
/// JSON object:
///
/// ```json
/// { "<model>": { "<dataset>": { "image_count": 6, "score_count": 6, "ckn_event_count": 6 } } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpectedValues {
    entries: HashMap<String, HashMap<String, ExpectedCounts>>,
}

impl ExpectedValues {
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    /// Looks up the counts for a (model, dataset) pair
    pub fn get(&self, model_id: &str, dataset: &str) -> Option<&ExpectedCounts> {
        self.entries.get(model_id).and_then(|d| d.get(dataset))
    }

    /// Adds or replaces an entry; used while building a table in code
    pub fn with_entry(
        mut self,
        model_id: impl Into<String>,
        dataset: impl Into<String>,
        counts: ExpectedCounts,
    ) -> Self {
        self.entries
            .entry(model_id.into())
            .or_default()
            .insert(dataset.into(), counts);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
