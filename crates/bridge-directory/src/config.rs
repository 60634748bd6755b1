use serde::{Deserialize, Serialize};

/// Configuration for a search-index directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Store path under which the index files live.
    pub root: String,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            root: "/index".to_string(),
        }
    }
}
