//! In-memory stand-ins for the stores and identity provider, plus a harness
//! that drives the real router without a database.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use crate::applications::store::ApplicationStore;
use crate::auth::credential::CookiePolicy;
use crate::auth::google::{ExternalIdentity, IdentityError, IdentityProvider};
use crate::auth::oauth_state::MemoryStateStore;
use crate::auth::token::TokenSigner;
use crate::auth::users::UserStore;
use crate::config::{Config, Environment, SameSite};
use crate::errors::AppError;
use crate::models::application::{Application, ApplicationPatch, NewApplication};
use crate::models::user::User;
use crate::routes::build_router;
use crate::state::AppState;

pub const TEST_SECRET: &str = "test-secret-test-secret-test-secret!";

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/jobtracker_test".to_string(),
        redis_url: None,
        jwt_secret: TEST_SECRET.to_string(),
        google_client_id: "client-id".to_string(),
        google_client_secret: "client-secret".to_string(),
        google_callback_url: "http://localhost:5000/api/auth/google/callback".to_string(),
        client_url: "http://localhost:3000".to_string(),
        environment: Environment::Development,
        cookie_same_site: SameSite::Lax,
        token_ttl_hours: 168,
        cors_origins: Vec::new(),
        port: 5000,
        rust_log: "debug".to_string(),
    }
}

/// Trimmed, case-folded key shared by the pair lookup and the unique check.
fn pair_key(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Mirrors `PgApplicationStore`, including the per-user unique index on the
/// folded (company, title) pair.
#[derive(Default)]
pub struct MemoryApplicationStore {
    records: Mutex<Vec<Application>>,
    skip_pair_lookup: AtomicBool,
}

impl MemoryApplicationStore {
    /// Makes the next `find_by_pair` miss, as if a concurrent insert landed
    /// between the pre-check and the insert.
    pub fn skip_next_pair_lookup(&self) {
        self.skip_pair_lookup.store(true, Ordering::SeqCst);
    }

    fn pair_taken(records: &[Application], user_id: Uuid, company: &str, title: &str, except: Option<Uuid>) -> bool {
        let (company, title) = (pair_key(company), pair_key(title));
        records.iter().any(|a| {
            a.user_id == user_id
                && Some(a.id) != except
                && pair_key(&a.company_name) == company
                && pair_key(&a.job_title) == title
        })
    }
}

#[async_trait]
impl ApplicationStore for MemoryApplicationStore {
    async fn list(&self, user_id: Uuid) -> Result<Vec<Application>, AppError> {
        let mut mine: Vec<Application> = self
            .records
            .lock()
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        mine.sort_by(|a, b| {
            b.date_applied
                .cmp(&a.date_applied)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(mine)
    }

    async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Option<Application>, AppError> {
        Ok(self
            .records
            .lock()
            .iter()
            .find(|a| a.id == id && a.user_id == user_id)
            .cloned())
    }

    async fn find_by_pair(
        &self,
        user_id: Uuid,
        company: &str,
        title: &str,
    ) -> Result<Option<Application>, AppError> {
        if self.skip_pair_lookup.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        let (company, title) = (pair_key(company), pair_key(title));
        Ok(self
            .records
            .lock()
            .iter()
            .find(|a| {
                a.user_id == user_id
                    && pair_key(&a.company_name) == company
                    && pair_key(&a.job_title) == title
            })
            .cloned())
    }

    async fn insert(&self, user_id: Uuid, new: &NewApplication) -> Result<Application, AppError> {
        let mut records = self.records.lock();
        if Self::pair_taken(&records, user_id, &new.company_name, &new.job_title, None) {
            return Err(AppError::Duplicate(None));
        }
        let now = Utc::now();
        let application = Application {
            id: Uuid::new_v4(),
            user_id,
            company_name: new.company_name.clone(),
            job_title: new.job_title.clone(),
            location: new.location.clone(),
            url: new.url.clone(),
            date_applied: new.date_applied.unwrap_or(now),
            source: new.source,
            status: new.status,
            notes: new.notes.clone(),
            created_at: now,
            updated_at: now,
        };
        records.push(application.clone());
        Ok(application)
    }

    async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: &ApplicationPatch,
    ) -> Result<Option<Application>, AppError> {
        let mut records = self.records.lock();
        let Some(index) = records.iter().position(|a| a.id == id && a.user_id == user_id) else {
            return Ok(None);
        };

        let mut next = records[index].clone();
        if let Some(v) = &patch.company_name {
            next.company_name = v.clone();
        }
        if let Some(v) = &patch.job_title {
            next.job_title = v.clone();
        }
        if let Some(v) = &patch.location {
            next.location = v.clone();
        }
        if let Some(v) = &patch.url {
            next.url = v.clone();
        }
        if let Some(v) = patch.date_applied {
            next.date_applied = v;
        }
        if let Some(v) = patch.source {
            next.source = v;
        }
        if let Some(v) = patch.status {
            next.status = v;
        }
        if let Some(v) = &patch.notes {
            next.notes = v.clone();
        }

        if Self::pair_taken(&records, user_id, &next.company_name, &next.job_title, Some(id)) {
            return Err(AppError::Duplicate(None));
        }

        // Clock resolution can repeat a timestamp; updated_at must still advance.
        next.updated_at = Utc::now().max(next.updated_at + Duration::microseconds(1));
        records[index] = next.clone();
        Ok(Some(next))
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|a| !(a.id == id && a.user_id == user_id));
        Ok(records.len() < before)
    }
}

#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<Vec<User>>,
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn upsert_identity(&self, identity: &ExternalIdentity) -> Result<User, AppError> {
        let mut users = self.users.lock();
        let now = Utc::now();
        if let Some(existing) = users.iter_mut().find(|u| u.google_id == identity.provider_id) {
            existing.email = identity.email.clone();
            existing.name = identity.name.clone();
            existing.picture = identity.picture.clone();
            existing.updated_at = now;
            return Ok(existing.clone());
        }
        let user = User {
            id: Uuid::new_v4(),
            google_id: identity.provider_id.clone(),
            email: identity.email.clone(),
            name: identity.name.clone(),
            picture: identity.picture.clone(),
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.users.lock().iter().find(|u| u.id == id).cloned())
    }
}

/// Accepts only the authorization code `"good"`.
pub struct FakeIdentityProvider;

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    fn authorize_url(&self, state: &str) -> String {
        format!("https://provider.test/authorize?state={state}")
    }

    async fn exchange(&self, code: &str) -> Result<ExternalIdentity, IdentityError> {
        if code != "good" {
            return Err(IdentityError::Provider {
                status: 400,
                message: "invalid_grant".to_string(),
            });
        }
        Ok(ExternalIdentity {
            provider_id: "fake-subject".to_string(),
            email: "fake@example.com".to_string(),
            name: "Fake User".to_string(),
            picture: None,
        })
    }
}

pub struct TestApp {
    state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        let config = test_config();
        let state = AppState {
            applications: Arc::new(MemoryApplicationStore::default()),
            users: Arc::new(MemoryUserStore::default()),
            oauth_states: Arc::new(MemoryStateStore::default()),
            identity: Arc::new(FakeIdentityProvider),
            tokens: TokenSigner::new(
                config.jwt_secret.as_bytes(),
                Duration::hours(config.token_ttl_hours),
            ),
            cookies: CookiePolicy::from_config(&config),
            config,
        };
        Self { state }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub fn tokens(&self) -> &TokenSigner {
        &self.state.tokens
    }

    /// Registers a user as if they had completed the OAuth flow.
    pub async fn user(&self, email: &str) -> User {
        self.state
            .users
            .upsert_identity(&ExternalIdentity {
                provider_id: format!("google-{email}"),
                email: email.to_string(),
                name: email.split('@').next().unwrap_or(email).to_string(),
                picture: None,
            })
            .await
            .unwrap()
    }

    pub fn token_for(&self, user: &User) -> String {
        self.state.tokens.issue(user.id).unwrap().token
    }

    pub fn expired_token_for(&self, user: &User) -> String {
        TokenSigner::new(self.state.config.jwt_secret.as_bytes(), Duration::hours(-1))
            .issue(user.id)
            .unwrap()
            .token
    }

    /// JSON request, authenticated with a bearer token when one is given.
    pub fn request(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let body = body.map(|b| b.to_string()).unwrap_or_default();
        self.raw_request(method, uri, token, &body)
    }

    pub fn raw_request(&self, method: Method, uri: &str, token: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        if !body.is_empty() {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// `Value::Null` when the body is not JSON.
    pub json: Value,
    pub body: String,
}

pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    let json = serde_json::from_str(&body).unwrap_or(Value::Null);
    TestResponse {
        status,
        headers,
        json,
        body,
    }
}
