use std::sync::Arc;

use crate::applications::store::ApplicationStore;
use crate::auth::credential::CookiePolicy;
use crate::auth::google::IdentityProvider;
use crate::auth::oauth_state::OAuthStateStore;
use crate::auth::token::TokenSigner;
use crate::auth::users::UserStore;
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub applications: Arc<dyn ApplicationStore>,
    pub users: Arc<dyn UserStore>,
    /// Redis when `REDIS_URL` is set, in-process otherwise.
    pub oauth_states: Arc<dyn OAuthStateStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub tokens: TokenSigner,
    pub cookies: CookiePolicy,
    pub config: Config,
}
