//! Credential storage for the capture client, and the window-message
//! channel the dashboard uses to hand it a login or tell it to log out.
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::client::{ClientError, TrackerClient};

/// `source` the dashboard stamps on its logout messages.
pub const DASHBOARD_SOURCE: &str = "job-tracker-dashboard";

/// Messages posted by the dashboard page to its own window.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum WindowMessage {
    #[serde(rename = "JOB_TRACKER_LOGIN")]
    Login { token: Option<String> },
    #[serde(rename = "JOB_TRACKER_LOGOUT")]
    Logout { source: Option<String> },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageEffect {
    TokenStored,
    LoggedOut,
    Ignored,
}

/// Outcome of checking the stored credential against `/api/auth/me`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCheck {
    SignedIn { name: String },
    SignedOut,
    /// The credential now belongs to someone else; the session was cleared.
    UserChanged,
    /// The server refused the credential; the session was cleared.
    Expired,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionSession {
    pub token: Option<String>,
    pub user_id: Option<Uuid>,
    pub user_name: Option<String>,
}

impl ExtensionSession {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading session file {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing session file {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw).with_context(|| format!("writing session file {}", path.display()))
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Applies a window message. Only messages from the page's own window
    /// are considered, and a logout must carry the dashboard's source tag.
    pub fn handle_message(&mut self, message: &serde_json::Value, same_window: bool) -> MessageEffect {
        if !same_window {
            return MessageEffect::Ignored;
        }
        let Ok(message) = WindowMessage::deserialize(message) else {
            return MessageEffect::Ignored;
        };

        match message {
            WindowMessage::Login { token: Some(token) } if !token.is_empty() => {
                debug!("Received login token from dashboard");
                // The owner is unknown until the next verification.
                *self = ExtensionSession {
                    token: Some(token),
                    user_id: None,
                    user_name: None,
                };
                MessageEffect::TokenStored
            }
            WindowMessage::Logout { source: Some(source) } if source == DASHBOARD_SOURCE => {
                info!("Dashboard logged out; clearing session");
                self.clear();
                MessageEffect::LoggedOut
            }
            _ => MessageEffect::Ignored,
        }
    }

    /// Signs in with a credential pasted from the dashboard: the tracker
    /// confirms it and hands back the bearer token to keep, which is then
    /// verified like any stored credential.
    pub async fn sign_in(&mut self, client: &TrackerClient, credential: &str) -> Result<SessionCheck, ClientError> {
        let issued = match client.clone().with_token(credential).issue_token().await {
            Ok(issued) => issued,
            Err(ClientError::Unauthenticated) => {
                self.clear();
                return Ok(SessionCheck::Expired);
            }
            Err(e) => return Err(e),
        };
        debug!("Tracker issued a token valid until {}", issued.expires_at);

        *self = ExtensionSession {
            token: Some(issued.token),
            user_id: None,
            user_name: None,
        };
        self.verify(client).await
    }

    /// Confirms the stored credential still names the stored user.
    /// Connectivity failures leave the session untouched.
    pub async fn verify(&mut self, client: &TrackerClient) -> Result<SessionCheck, ClientError> {
        let Some(token) = self.token.clone() else {
            return Ok(SessionCheck::SignedOut);
        };

        match client.clone().with_token(token).me().await {
            Ok(user) => match self.user_id {
                Some(stored) if stored != user.id => {
                    info!("Credential belongs to a different user; clearing session");
                    self.clear();
                    Ok(SessionCheck::UserChanged)
                }
                _ => {
                    self.user_id = Some(user.id);
                    self.user_name = Some(user.name.clone());
                    Ok(SessionCheck::SignedIn { name: user.name })
                }
            },
            Err(ClientError::Unauthenticated) => {
                self.clear();
                Ok(SessionCheck::Expired)
            }
            Err(e) => Err(e),
        }
    }
}
