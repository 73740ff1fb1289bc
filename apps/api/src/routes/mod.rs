pub mod health;

use axum::{
    body::{to_bytes, Body},
    http::{header::CONTENT_LENGTH, StatusCode},
    middleware::map_response,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};

use crate::applications::handlers as applications;
use crate::auth::handlers as auth;
use crate::errors::InternalDetail;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let expose_detail = !state.config.is_production();

    let router = Router::new()
        .route("/health", get(health::health_handler))
        // Applications
        .route(
            "/api/applications",
            get(applications::handle_list).post(applications::handle_create),
        )
        .route("/api/applications/export", get(applications::handle_export))
        .route(
            "/api/applications/:id",
            get(applications::handle_get)
                .put(applications::handle_update)
                .delete(applications::handle_delete),
        )
        // Auth
        .route("/api/auth/google", get(auth::handle_google_login))
        .route("/api/auth/google/callback", get(auth::handle_google_callback))
        .route("/api/auth/me", get(auth::handle_me))
        .route("/api/auth/token", get(auth::handle_token))
        .route("/api/auth/logout", post(auth::handle_logout))
        .with_state(state);

    if expose_detail {
        router.layer(map_response(expose_internal_detail))
    } else {
        router
    }
}

/// Development only: replaces the generic 500 message with the real cause.
async fn expose_internal_detail(response: Response) -> Response {
    let Some(InternalDetail(detail)) = response.extensions().get::<InternalDetail>().cloned() else {
        return response;
    };

    let (mut parts, body) = response.into_parts();
    let Ok(bytes) = to_bytes(body, usize::MAX).await else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    let mut envelope: Value =
        serde_json::from_slice(&bytes).unwrap_or_else(|_| json!({ "success": false }));
    envelope["error"] = json!(detail);

    parts.headers.remove(CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(envelope.to_string()))
}
