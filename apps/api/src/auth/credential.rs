use anyhow::Context;
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
        HeaderMap, HeaderValue,
    },
};
use tracing::debug;

use crate::auth::token::{IssuedToken, VerifiedToken};
use crate::config::{Config, SameSite};
use crate::errors::AppError;
use crate::models::user::User;
use crate::state::AppState;

pub const AUTH_COOKIE: &str = "auth_token";

/// Where a credential may be presented, in lookup order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Cookie,
    BearerHeader,
}

/// Cookie first, then `Authorization: Bearer`. Existing clients rely on
/// this order; do not change it.
pub const CREDENTIAL_SOURCES: [CredentialSource; 2] =
    [CredentialSource::Cookie, CredentialSource::BearerHeader];

impl CredentialSource {
    fn read(self, headers: &HeaderMap) -> Option<String> {
        match self {
            CredentialSource::Cookie => read_cookie(headers, AUTH_COOKIE),
            CredentialSource::BearerHeader => read_bearer(headers),
        }
    }
}

/// Returns the first credential present across `CREDENTIAL_SOURCES`.
pub fn resolve_credential(headers: &HeaderMap) -> Option<(CredentialSource, String)> {
    CREDENTIAL_SOURCES
        .into_iter()
        .find_map(|source| source.read(headers).map(|token| (source, token)))
}

/// Finds a cookie by name across every `Cookie` header on the request.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

fn read_bearer(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Attributes for cookies the server sets, fixed per deployment.
#[derive(Debug, Clone, Copy)]
pub struct CookiePolicy {
    pub same_site: SameSite,
    pub secure: bool,
}

impl CookiePolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            same_site: config.cookie_same_site,
            secure: config.secure_cookies(),
        }
    }

    fn build(&self, name: &str, value: &str, same_site: SameSite, max_age: i64) -> Result<HeaderValue, AppError> {
        let cookie = format!(
            "{}={}; HttpOnly; SameSite={}; Path=/; Max-Age={}{}",
            name,
            value,
            same_site.as_str(),
            max_age,
            if self.secure { "; Secure" } else { "" }
        );
        Ok(HeaderValue::from_str(&cookie).context("cookie value is not a valid header")?)
    }

    /// `Set-Cookie` carrying the credential until it expires.
    pub fn credential_cookie(&self, issued: &IssuedToken) -> Result<HeaderValue, AppError> {
        let max_age = (issued.expires_at - chrono::Utc::now()).num_seconds().max(0);
        self.build(AUTH_COOKIE, &issued.token, self.same_site, max_age)
    }

    pub fn clear_credential_cookie(&self) -> Result<HeaderValue, AppError> {
        self.build(AUTH_COOKIE, "", self.same_site, 0)
    }

    /// Short-lived cookie binding the browser to its pending OAuth state.
    /// Always `Lax` so it survives the top-level redirect back from the provider.
    pub fn oauth_session_cookie(&self, name: &str, session_id: &str, max_age: i64) -> Result<HeaderValue, AppError> {
        self.build(name, session_id, SameSite::Lax, max_age)
    }
}

/// Extractor for authenticated users. Rejects with 401 when the credential
/// is missing, expired, tampered with, or names a user that no longer exists.
pub struct AuthUser {
    pub user: User,
    pub credential: PresentedCredential,
}

/// The verified credential the request arrived with.
#[derive(Debug, Clone)]
pub struct PresentedCredential {
    pub source: CredentialSource,
    pub token: String,
    pub verified: VerifiedToken,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let (source, token) = resolve_credential(&parts.headers).ok_or(AppError::Unauthorized)?;

        let verified = state.tokens.verify(&token).map_err(|e| {
            debug!("Rejected credential from {source:?}: {e}");
            AppError::Unauthorized
        })?;

        let user = state
            .users
            .find_by_id(verified.user_id)
            .await?
            .ok_or_else(|| {
                debug!("Credential names unknown user {}", verified.user_id);
                AppError::Unauthorized
            })?;

        Ok(AuthUser {
            user,
            credential: PresentedCredential {
                source,
                token,
                verified,
            },
        })
    }
}
