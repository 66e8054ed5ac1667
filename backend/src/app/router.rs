use axum::Router;
use axum::extract::{DefaultBodyLimit, Request, State};
use axum::middleware;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::core;
use crate::middleware::rate_limit_middleware;
use crate::routes;

/// Room for multipart framing on top of the photo itself
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Back end server built from routes that are either public, rate limited, or require a tenant access token
pub fn create_router(context: core::ArcContext) -> Router {
    let upload_limit = DefaultBodyLimit::max(context.settings.storage.max_upload_bytes + MULTIPART_OVERHEAD_BYTES);

    // Tenant routes, all behind the access token middleware
    let api_routes = Router::new()
        .route("/api/tenant", get(routes::tenant::get_profile).put(routes::tenant::update_profile))
        .route("/api/employees", post(routes::employees::create).get(routes::employees::list))
        .route(
            "/api/employees/{id}",
            get(routes::employees::get)
                .put(routes::employees::update)
                .delete(routes::employees::delete),
        )
        .route("/api/uploads", post(routes::uploads::upload_photo).layer(upload_limit))
        .route("/api/attendance", get(routes::attendance::list))
        .route("/api/attendance/{id}", get(routes::attendance::get))
        .route("/auth/logout", post(routes::auth::logout)) // revokes the named refresh session
        .layer(middleware::from_fn_with_state(context.clone(), auth_middleware))
        .with_state(context.clone());

    // Unauthenticated routes, rate limited per client
    let public_routes = Router::new()
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/refresh", post(routes::auth::refresh))
        .route("/checkin/location", post(routes::checkin::check_location))
        .route("/checkin/photo", post(routes::checkin::upload_photo).layer(upload_limit))
        .route("/checkin", post(routes::checkin::check_in))
        .layer(middleware::from_fn_with_state(context.clone(), rate_limit_middleware))
        .with_state(context.clone());

    let photos = ServeDir::new(&context.settings.storage.directory);

    let health_routes = Router::new()
        .route("/health", get(routes::health::health_check))
        .with_state(context);

    Router::new()
        .merge(api_routes)
        .merge(public_routes)
        .merge(health_routes)
        .nest_service("/photos", photos)
        .layer(TraceLayer::new_for_http())
}

/// Verifies the access token and makes its claims available to the handlers
async fn auth_middleware(State(context): State<core::ArcContext>, mut req: Request, next: Next) -> Response {
    match context.tokens.decode_access_token_from_headers(req.headers()) {
        Ok(claims) => {
            tracing::debug!(
                tenant_id = claims.tenant_id,
                username = %claims.username,
                "Authenticated tenant accessing API"
            );
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(e) => {
            tracing::warn!("Unauthorized access attempt: {}", e);
            e.into_response()
        }
    }
}
