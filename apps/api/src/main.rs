mod applications;
mod auth;
mod config;
mod db;
mod errors;
mod extract;
mod models;
mod response;
mod routes;
mod state;
#[cfg(test)]
mod test_support;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::http::{header, HeaderValue, Method};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::applications::store::PgApplicationStore;
use crate::auth::credential::CookiePolicy;
use crate::auth::google::GoogleProvider;
use crate::auth::oauth_state::{MemoryStateStore, OAuthStateStore, RedisStateStore};
use crate::auth::token::TokenSigner;
use crate::auth::users::PgUserStore;
use crate::config::Config;
use crate::db::create_pool;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting Job Tracker API v{} ({:?})",
        env!("CARGO_PKG_VERSION"),
        config.environment
    );

    // Initialize PostgreSQL (runs migrations)
    let db = create_pool(&config.database_url).await?;

    // OAuth state store
    let oauth_states: Arc<dyn OAuthStateStore> = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str())?;
            info!("OAuth state store: Redis");
            Arc::new(RedisStateStore::new(client))
        }
        None => {
            info!("OAuth state store: in-process (REDIS_URL not set)");
            Arc::new(MemoryStateStore::default())
        }
    };

    let identity = GoogleProvider::new(
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
        config.google_callback_url.clone(),
    )?;

    let tokens = TokenSigner::new(
        config.jwt_secret.as_bytes(),
        chrono::Duration::hours(config.token_ttl_hours),
    );
    info!("Credentials expire after {}h", tokens.ttl().num_hours());

    let state = AppState {
        applications: Arc::new(PgApplicationStore::new(db.clone())),
        users: Arc::new(PgUserStore::new(db)),
        oauth_states,
        identity: Arc::new(identity),
        tokens,
        cookies: CookiePolicy::from_config(&config),
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(build_cors(&config)?);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Permissive when no origins are configured; otherwise only the listed
/// origins, with credentials so the dashboard cookie is sent.
fn build_cors(config: &Config) -> Result<CorsLayer> {
    if config.cors_origins.is_empty() {
        return Ok(CorsLayer::permissive());
    }

    let origins = config
        .cors_origins
        .iter()
        .map(|origin| HeaderValue::from_str(origin))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]))
}
