use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde_json::json;

use crate::auth::AccessTokenClaims;
use crate::core;
use crate::routes::api::ApiError;
use crate::services::put_with_timeout;

/// Name of the multipart field that carries the image
pub const PHOTO_FIELD: &str = "photo";

/// Reads the `photo` field and hands it to the object store; returns its URL
pub async fn receive_photo(context: &core::Context, mut multipart: Multipart) -> Result<String, ApiError> {
    let max_bytes = context.settings.storage.max_upload_bytes;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(PHOTO_FIELD) {
            continue;
        }
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        if bytes.is_empty() {
            return Err(ApiError::MissingPhoto);
        }
        if bytes.len() > max_bytes {
            return Err(ApiError::PhotoTooLarge(max_bytes));
        }

        let url = put_with_timeout(
            context.object_store.as_ref(),
            bytes.to_vec(),
            &content_type,
            context.settings.storage.timeout(),
        )
        .await?;
        tracing::info!(size = bytes.len(), content_type = %content_type, "Photo stored");
        return Ok(url);
    }

    Err(ApiError::MissingPhoto)
}

/// Uploads an employee reference photo
pub async fn upload_photo(
    State(context): State<core::ArcContext>,
    Extension(claims): Extension<AccessTokenClaims>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let url = receive_photo(&context, multipart).await?;
    tracing::debug!(tenant_id = claims.tenant_id, url = %url, "Reference photo uploaded");
    Ok((StatusCode::CREATED, Json(json!({"result": "ok", "url": url}))))
}
