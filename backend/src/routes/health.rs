use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;

use crate::core;

/// Reports whether the database answers a trivial query
pub async fn health_check(State(context): State<core::ArcContext>) -> Result<impl IntoResponse, axum::response::Response> {
    sqlx::query("SELECT 1").execute(context.db.pool()).await.map_err(|e| {
        tracing::error!("Health check failed to reach the database: {}", e);
        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"result": "error", "message": "Database unavailable"}))).into_response()
    })?;

    Ok((StatusCode::OK, Json(json!({"result": "ok", "database": "up"}))))
}
