use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Json;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tokio::sync::RwLock;

use crate::cfg;
use crate::core;
use crate::services::extract_client_ip;

/// Rate limiting entry for tracking requests
#[derive(Debug, Clone)]
struct RateLimitEntry {
    count: u32,
    window_start: Instant,
}

/// In-memory fixed-window limiter keyed by client address
#[derive(Clone, Debug)]
pub struct RateLimiter {
    entries: Arc<RwLock<HashMap<String, RateLimitEntry>>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    #[must_use]
    pub fn new(settings: &cfg::RateLimitSettings) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            max_requests: settings.max_requests,
            window: Duration::from_secs(settings.window_secs),
        }
    }

    /// Counts one request for `client` and reports whether it is within the limit
    pub async fn check(&self, client: &str) -> bool {
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        // Clean up expired entries
        entries.retain(|_, entry| now.duration_since(entry.window_start) <= self.window);

        let entry = entries.entry(client.to_string()).or_insert_with(|| RateLimitEntry {
            count: 0,
            window_start: now,
        });
        entry.count += 1;
        entry.count <= self.max_requests
    }
}

/// Rejects clients that exceed the configured request rate with 429
pub async fn rate_limit_middleware(State(context): State<core::ArcContext>, req: Request, next: Next) -> Response {
    let client_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .or_else(|| extract_client_ip(req.headers()))
        .unwrap_or_else(|| "unknown".to_string());

    if !context.rate_limiter.check(&client_ip).await {
        tracing::warn!(client_ip = %client_ip, path = %req.uri().path(), "Rate limit exceeded");
        let body = Json(json!({
            "result": "error",
            "message": "Too many requests"
        }));
        return (StatusCode::TOO_MANY_REQUESTS, body).into_response();
    }

    next.run(req).await
}
