use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::applications::dedup::{create_guarded, update_guarded};
use crate::applications::export::render_csv;
use crate::applications::validation::{validate_new, validate_patch, ApplicationPayload};
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::extract::JsonBody;
use crate::models::application::Application;
use crate::response::ApiResponse;
use crate::state::AppState;

/// A malformed id cannot name any record, so it is reported like a missing one.
fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound("Application not found".to_string()))
}

/// GET /api/applications
pub async fn handle_list(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<Vec<Application>>>, AppError> {
    let applications = state.applications.list(auth.user.id).await?;
    Ok(Json(ApiResponse::list(applications)))
}

/// GET /api/applications/export
pub async fn handle_export(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let applications = state.applications.list(auth.user.id).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"applications.csv\"",
            ),
        ],
        render_csv(&applications),
    ))
}

/// GET /api/applications/:id
pub async fn handle_get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Application>>, AppError> {
    let id = parse_id(&id)?;
    let application = state
        .applications
        .get(auth.user.id, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Application not found".to_string()))?;
    Ok(Json(ApiResponse::ok(application)))
}

/// POST /api/applications
pub async fn handle_create(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(payload): JsonBody<ApplicationPayload>,
) -> Result<(StatusCode, Json<ApiResponse<Application>>), AppError> {
    let new = validate_new(&payload)?;
    let created = create_guarded(state.applications.as_ref(), auth.user.id, &new).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(created))))
}

/// PUT /api/applications/:id
pub async fn handle_update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    JsonBody(payload): JsonBody<ApplicationPayload>,
) -> Result<Json<ApiResponse<Application>>, AppError> {
    let id = parse_id(&id)?;
    let patch = validate_patch(&payload)?;
    let updated = update_guarded(state.applications.as_ref(), auth.user.id, id, &patch).await?;
    Ok(Json(ApiResponse::ok(updated)))
}

/// DELETE /api/applications/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let id = parse_id(&id)?;
    if !state.applications.delete(auth.user.id, id).await? {
        return Err(AppError::NotFound("Application not found".to_string()));
    }
    info!("Deleted application {id} for user {}", auth.user.id);
    Ok(Json(ApiResponse::ok(json!({}))))
}
