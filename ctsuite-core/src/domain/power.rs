//! Power telemetry report produced by a camera-traps run

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Power draw measured for one plugin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PluginPower {
    pub cpu_power_consumption: f64,
    #[serde(default)]
    pub gpu_power_consumption: f64,
}

/// Contents of `power_summary_report.json`: plugin name to power draw
///
/// Plugins are kept in name order so reports and failure messages are
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PowerReport {
    pub plugins: BTreeMap<String, PluginPower>,
}

impl PowerReport {
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PluginPower)> {
        self.plugins.iter().map(|(name, power)| (name.as_str(), power))
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
