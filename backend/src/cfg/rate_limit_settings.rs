use serde::{Deserialize, Serialize};

/// Fixed-window limit applied per client on the unauthenticated routes
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RateLimitSettings {
    #[serde(default)]
    pub max_requests: u32,

    #[serde(default)]
    pub window_secs: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: 30,
            window_secs: 60,
        }
    }
}
