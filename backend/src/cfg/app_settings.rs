use std::{env, fs, path::Path, path::PathBuf};

use config::{ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::cfg;

/// Process-wide settings, built once at startup and shared read-only through the context
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct AppSettings {
    #[serde(default)]
    pub server: cfg::ServerSettings,

    #[serde(default)]
    pub database: cfg::DatabaseSettings,

    #[serde(default)]
    pub jwt: cfg::JwtSettings,

    #[serde(default)]
    pub checkin: cfg::CheckInSettings,

    #[serde(default)]
    pub face_oracle: cfg::FaceOracleSettings,

    #[serde(default)]
    pub storage: cfg::StorageSettings,

    #[serde(default)]
    pub rate_limit: cfg::RateLimitSettings,
}

impl AppSettings {
    /// Loads settings from, lowest precedence first: built-in defaults,
    /// `configs.default.toml`, `configs.{APP_RUN_ENV}.toml`, `configs.local.toml`
    /// and `APP_*` environment variables (`APP_CHECKIN__OFFICE_RADIUS_METERS=150`).
    pub fn new() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let run_env = Self::get_app_run_env();
        let config_dir = Self::get_config_path();
        let env_file = config_dir.join(format!("configs.{run_env}.toml"));

        let defaults = toml::to_string(&Self::default())
            .map_err(|e| ConfigError::Message(format!("Failed to serialize defaults: {e}")))?;
        let mut builder = config::Config::builder().add_source(File::from_str(&defaults, FileFormat::Toml));
        for layer in Self::layer_files(config_dir, &env_file) {
            builder = builder.add_source(File::from(layer));
        }
        builder = builder.add_source(Environment::with_prefix("APP").prefix_separator("_").separator("__"));

        let settings = builder.build()?.try_deserialize::<Self>()?;
        settings.validate()?;

        // production deployments get an editable copy of the effective settings
        if run_env == "production" && !env_file.exists() {
            let contents = toml::to_string(&settings)
                .map_err(|e| ConfigError::Message(format!("Failed to serialize config: {e}")))?;
            fs::write(&env_file, contents)
                .map_err(|e| ConfigError::Message(format!("Failed to write config file: {e}")))?;
            println!("Created default config file at {}", env_file.to_string_lossy());
        }

        Ok(settings)
    }

    fn layer_files(config_dir: &Path, env_file: &Path) -> Vec<PathBuf> {
        [
            config_dir.join("configs.default.toml"),
            env_file.to_path_buf(),
            config_dir.join("configs.local.toml"),
        ]
        .into_iter()
        .filter(|path| path.exists())
        .collect()
    }

    /// Rejects values the check-in protocol cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| Err(ConfigError::Message(message.to_string()));

        if !(self.checkin.office_radius_meters.is_finite() && self.checkin.office_radius_meters > 0.0) {
            return invalid("checkin.office_radius_meters must be a positive number");
        }
        if !(0.0..=100.0).contains(&self.checkin.face_similarity_threshold) {
            return invalid("checkin.face_similarity_threshold must be between 0 and 100");
        }
        let expiries = [
            self.jwt.access_token_expiry,
            self.jwt.refresh_token_expiry,
            self.jwt.location_token_expiry,
        ];
        if expiries.iter().any(|expiry| *expiry <= 0) {
            return invalid("jwt token expiries must be positive");
        }
        if self.storage.max_upload_bytes == 0 {
            return invalid("storage.max_upload_bytes must be positive");
        }
        if self.rate_limit.max_requests == 0 || self.rate_limit.window_secs == 0 {
            return invalid("rate_limit.max_requests and rate_limit.window_secs must be positive");
        }
        Ok(())
    }

    #[must_use]
    pub fn get_server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    #[must_use]
    pub fn get_app_run_env() -> String {
        env::var("APP_RUN_ENV").unwrap_or_else(|_| "production".to_string())
    }

    /// Directory holding the config files and generated token secrets
    #[must_use]
    pub fn get_config_path() -> &'static Path {
        Path::new(".")
    }

    #[must_use]
    pub fn get_config_full_path() -> String {
        let config_path = Self::get_config_path();
        config_path
            .canonicalize()
            .unwrap_or_else(|_| config_path.to_path_buf())
            .to_string_lossy()
            .to_string()
    }
}
