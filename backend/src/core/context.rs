use std::sync::Arc;

use crate::auth;
use crate::cfg;
use crate::core;
use crate::middleware::RateLimiter;
use crate::services::{FaceOracle, ObjectStore};

pub type ArcContext = Arc<Context>;

/// Everything a request handler needs, built once at startup
#[derive(Clone)]
pub struct Context {
    pub db: core::Database,
    pub tokens: auth::TokenCodec,
    pub settings: cfg::AppSettings,
    pub face_oracle: Arc<dyn FaceOracle>,
    pub object_store: Arc<dyn ObjectStore>,
    pub rate_limiter: RateLimiter,
}

impl Context {
    #[must_use]
    pub fn new(
        db: core::Database,
        tokens: auth::TokenCodec,
        settings: cfg::AppSettings,
        face_oracle: Arc<dyn FaceOracle>,
        object_store: Arc<dyn ObjectStore>,
    ) -> ArcContext {
        let rate_limiter = RateLimiter::new(&settings.rate_limit);
        Self {
            db,
            tokens,
            settings,
            face_oracle,
            object_store,
            rate_limiter,
        }
        .into()
    }
}
