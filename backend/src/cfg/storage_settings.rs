use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StorageSettings {
    /// Directory photos are written to
    #[serde(default)]
    pub directory: String,

    /// Prefix of the URLs handed back for stored photos
    #[serde(default)]
    pub public_base_url: String,

    #[serde(default)]
    pub timeout_secs: u64,

    #[serde(default)]
    pub max_upload_bytes: usize,
}

impl StorageSettings {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            directory: "uploads".to_string(),
            public_base_url: "http://127.0.0.1:3000/photos".to_string(),
            timeout_secs: 10,
            max_upload_bytes: 5 * 1024 * 1024,
        }
    }
}
