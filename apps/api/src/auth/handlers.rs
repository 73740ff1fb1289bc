use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::{header::SET_COOKIE, HeaderMap, HeaderValue},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::auth::credential::read_cookie;
use crate::auth::oauth_state::{random_hex, STATE_TTL};
use crate::auth::token::IssuedToken;
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::user::User;
use crate::response::ApiResponse;
use crate::state::AppState;

/// Cookie binding the browser to its pending OAuth state.
pub const OAUTH_SESSION_COOKIE: &str = "oauth_session";

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// GET /api/auth/google
pub async fn handle_google_login(State(state): State<AppState>) -> Result<Response, AppError> {
    let session_id = random_hex(16);
    let csrf_state = random_hex(32);
    state.oauth_states.put(&session_id, &csrf_state).await?;

    let cookie = state.cookies.oauth_session_cookie(
        OAUTH_SESSION_COOKIE,
        &session_id,
        STATE_TTL.as_secs() as i64,
    )?;
    let target = state.identity.authorize_url(&csrf_state);

    Ok((AppendHeaders([(SET_COOKIE, cookie)]), Redirect::to(&target)).into_response())
}

/// GET /api/auth/google/callback
///
/// Always answers with a redirect to the dashboard: `/auth-success` with the
/// credential cookie set, or `/login?error=...` without one.
pub async fn handle_google_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let clear_session = state
        .cookies
        .oauth_session_cookie(OAUTH_SESSION_COOKIE, "", 0)?;

    let expected = match read_cookie(&headers, OAUTH_SESSION_COOKIE) {
        Some(session_id) => state.oauth_states.take(&session_id).await?,
        None => None,
    };

    let state_matches = matches!(
        (expected.as_deref(), params.state.as_deref()),
        (Some(stored), Some(received)) if stored == received
    );
    if !state_matches {
        warn!("OAuth callback rejected: missing or mismatched state");
        return Ok(login_error(&state, "invalid_state", clear_session));
    }

    match complete_login(&state, &params).await {
        Ok((user, issued)) => {
            info!("User {} signed in", user.id);
            let credential = state.cookies.credential_cookie(&issued)?;
            let target = format!("{}/auth-success", state.config.client_url);
            Ok((
                AppendHeaders([(SET_COOKIE, clear_session), (SET_COOKIE, credential)]),
                Redirect::to(&target),
            )
                .into_response())
        }
        Err(e) => {
            warn!("OAuth callback failed: {e:#}");
            Ok(login_error(&state, "auth_failed", clear_session))
        }
    }
}

async fn complete_login(
    state: &AppState,
    params: &CallbackParams,
) -> anyhow::Result<(User, IssuedToken)> {
    if let Some(error) = &params.error {
        anyhow::bail!("provider returned error '{error}'");
    }
    let code = params
        .code
        .as_deref()
        .filter(|c| !c.is_empty())
        .context("callback carried no authorization code")?;

    let identity = state
        .identity
        .exchange(code)
        .await
        .context("identity exchange failed")?;
    let user = state
        .users
        .upsert_identity(&identity)
        .await
        .context("user upsert failed")?;
    let issued = state.tokens.issue(user.id)?;

    Ok((user, issued))
}

fn login_error(state: &AppState, reason: &str, clear_session: HeaderValue) -> Response {
    let target = format!("{}/login?error={reason}", state.config.client_url);
    (AppendHeaders([(SET_COOKIE, clear_session)]), Redirect::to(&target)).into_response()
}

/// GET /api/auth/me
pub async fn handle_me(auth: AuthUser) -> Json<ApiResponse<User>> {
    Json(ApiResponse::ok(auth.user))
}

/// GET /api/auth/token
///
/// Hands the credential the request was authenticated with to the caller,
/// so the extension can present it as a bearer token.
pub async fn handle_token(auth: AuthUser) -> Json<ApiResponse<IssuedToken>> {
    debug!(
        "Handing bearer token to user {} (presented via {:?})",
        auth.user.id, auth.credential.source
    );
    Json(ApiResponse::ok(IssuedToken {
        token: auth.credential.token,
        expires_at: auth.credential.verified.expires_at,
    }))
}

/// POST /api/auth/logout
pub async fn handle_logout(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let cleared = state.cookies.clear_credential_cookie()?;
    Ok((
        AppendHeaders([(SET_COOKIE, cleared)]),
        Json(json!({ "success": true, "message": "Logged out successfully" })),
    ))
}
