//! Remote file listing entries

use serde::{Deserialize, Serialize};

/// One entry returned by the platform's file listing endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub name: String,
    #[serde(default)]
    pub path: String,
    /// `file` or `dir`
    #[serde(rename = "type", default)]
    pub file_type: String,
    #[serde(default)]
    pub size: u64,
}

impl RemoteFile {
    /// Convenience constructor for a plain file entry
    pub fn file(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            path: name.clone(),
            name,
            file_type: "file".to_string(),
            size: 0,
        }
    }
}
