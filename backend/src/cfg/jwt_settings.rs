use serde::{Deserialize, Serialize};

/// Lifetimes (seconds) and optional secrets for the three token kinds.
/// A secret shorter than 32 characters is replaced by a generated one persisted
/// next to the config files.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct JwtSettings {
    #[serde(default)]
    pub access_token_expiry: i64,

    #[serde(default)]
    pub refresh_token_expiry: i64,

    #[serde(default)]
    pub location_token_expiry: i64,

    #[serde(default)]
    pub access_token_secret: String,

    #[serde(default)]
    pub refresh_token_secret: String,

    #[serde(default)]
    pub location_token_secret: String,
}

impl Default for JwtSettings {
    fn default() -> Self {
        Self {
            access_token_expiry: 15 * 60,             // 15 minutes
            refresh_token_expiry: 7 * 24 * 60 * 60,   // 7 days
            location_token_expiry: 5 * 60,            // 5 minutes
            access_token_secret: String::new(),
            refresh_token_secret: String::new(),
            location_token_secret: String::new(),
        }
    }
}
