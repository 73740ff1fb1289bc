//! External identity provider (Google OAuth 2.0 authorization-code flow).
//!
//! The rest of the crate only sees `IdentityProvider`; `AppState` carries an
//! `Arc<dyn IdentityProvider>` so tests can substitute a fake.
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";
const SCOPES: &str = "openid email profile";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Identity asserted by the provider after a successful exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalIdentity {
    pub provider_id: String,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider error (status {status}): {message}")]
    Provider { status: u16, message: String },

    #[error("Provider response missing '{0}'")]
    MissingField(&'static str),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// URL the browser is redirected to, carrying the CSRF `state`.
    fn authorize_url(&self, state: &str) -> String;

    /// Redeems an authorization code for the user's identity.
    async fn exchange(&self, code: &str) -> Result<ExternalIdentity, IdentityError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: Option<String>,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

pub struct GoogleProvider {
    client: Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl GoogleProvider {
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            client_id,
            client_secret,
            redirect_uri,
        })
    }
}

async fn error_from(response: reqwest::Response) -> IdentityError {
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    IdentityError::Provider { status, message }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            AUTHORIZE_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(SCOPES),
            urlencoding::encode(state),
        )
    }

    async fn exchange(&self, code: &str) -> Result<ExternalIdentity, IdentityError> {
        let response = self
            .client
            .post(TOKEN_URL)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let err = error_from(response).await;
            warn!("Google token exchange failed: {err}");
            return Err(err);
        }
        let token: TokenResponse = response.json().await?;

        let response = self
            .client
            .get(USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let err = error_from(response).await;
            warn!("Google userinfo lookup failed: {err}");
            return Err(err);
        }
        let info: UserInfo = response.json().await?;
        debug!("Google userinfo received for subject {:?}", info.sub);

        identity_from(info)
    }
}

fn identity_from(info: UserInfo) -> Result<ExternalIdentity, IdentityError> {
    let provider_id = info.sub.ok_or(IdentityError::MissingField("sub"))?;
    let email = info.email.ok_or(IdentityError::MissingField("email"))?;
    // Accounts without a display name fall back to the mailbox name.
    let name = info
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| email.split('@').next().unwrap_or(&email).to_string());

    Ok(ExternalIdentity {
        provider_id,
        email,
        name,
        picture: info.picture,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GoogleProvider {
        GoogleProvider::new(
            "client id".to_string(),
            "secret".to_string(),
            "http://localhost:5000/api/auth/google/callback".to_string(),
        )
        .unwrap()
    }

    #[test]
    fn test_authorize_url_encodes_parameters() {
        let url = provider().authorize_url("abc123");
        assert!(url.starts_with(AUTHORIZE_URL));
        assert!(url.contains("client_id=client%20id"));
        assert!(url.contains(
            "redirect_uri=http%3A%2F%2Flocalhost%3A5000%2Fapi%2Fauth%2Fgoogle%2Fcallback"
        ));
        assert!(url.contains("scope=openid%20email%20profile"));
        assert!(url.ends_with("&state=abc123"));
    }

    #[test]
    fn test_identity_requires_subject_and_email() {
        let missing_sub = UserInfo {
            sub: None,
            email: Some("a@example.com".to_string()),
            name: None,
            picture: None,
        };
        assert!(matches!(
            identity_from(missing_sub),
            Err(IdentityError::MissingField("sub"))
        ));

        let missing_email = UserInfo {
            sub: Some("123".to_string()),
            email: None,
            name: Some("A".to_string()),
            picture: None,
        };
        assert!(matches!(
            identity_from(missing_email),
            Err(IdentityError::MissingField("email"))
        ));
    }

    #[test]
    fn test_name_falls_back_to_mailbox() {
        let info = UserInfo {
            sub: Some("123".to_string()),
            email: Some("jane.doe@example.com".to_string()),
            name: Some("  ".to_string()),
            picture: None,
        };
        assert_eq!(identity_from(info).unwrap().name, "jane.doe");
    }
}
