use axum::extract::State;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde_json::json;

use crate::auth::AccessTokenClaims;
use crate::checkin::GeoPoint;
use crate::core;
use crate::routes::api::ApiError;
use crate::store::TenantUpdate;

pub async fn get_profile(
    State(context): State<core::ArcContext>,
    Extension(claims): Extension<AccessTokenClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant = context.db.tenants.get_by_id(claims.tenant_id).await?;
    Ok(Json(json!({"result": "ok", "tenant": tenant})))
}

/// Updates name, address and office coordinates; omitted fields are kept
pub async fn update_profile(
    State(context): State<core::ArcContext>,
    Extension(claims): Extension<AccessTokenClaims>,
    Json(update): Json<TenantUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    if update.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
        return Err(ApiError::InvalidInput("name must not be empty".to_string()));
    }
    if update.latitude.is_some() || update.longitude.is_some() {
        let current = context.db.tenants.get_by_id(claims.tenant_id).await?;
        GeoPoint::new(
            update.latitude.unwrap_or(current.latitude),
            update.longitude.unwrap_or(current.longitude),
        )
        .map_err(|e| ApiError::InvalidInput(e.to_string()))?;
    }

    let tenant = context.db.tenants.update_profile(claims.tenant_id, &update).await?;
    tracing::info!(tenant_id = tenant.id, "Tenant profile updated");
    Ok(Json(json!({"result": "ok", "tenant": tenant})))
}
