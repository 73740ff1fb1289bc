use std::str::FromStr;

use anyhow::{bail, Context, Result};

/// Deployment environment. Controls cookie security and how much detail
/// internal errors expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => bail!("APP_ENV must be 'development' or 'production', got '{other}'"),
        }
    }
}

/// SameSite policy applied to the credential cookie. Picked per deployment:
/// `none` when the dashboard and API live on different sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Lax,
    Strict,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Lax => "Lax",
            SameSite::Strict => "Strict",
            SameSite::None => "None",
        }
    }
}

impl FromStr for SameSite {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "lax" => Ok(SameSite::Lax),
            "strict" => Ok(SameSite::Strict),
            "none" => Ok(SameSite::None),
            other => bail!("COOKIE_SAME_SITE must be lax, strict or none, got '{other}'"),
        }
    }
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub jwt_secret: String,
    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_callback_url: String,
    /// Dashboard origin; OAuth redirects land here.
    pub client_url: String,
    pub environment: Environment,
    pub cookie_same_site: SameSite,
    pub token_ttl_hours: i64,
    pub cors_origins: Vec<String>,
    pub port: u16,
    pub rust_log: String,
}

const MIN_JWT_SECRET_LEN: usize = 32;
/// One year.
const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let jwt_secret = require_env("JWT_SECRET")?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            bail!("JWT_SECRET must be at least {MIN_JWT_SECRET_LEN} bytes");
        }

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: optional_env("REDIS_URL"),
            jwt_secret,
            google_client_id: require_env("GOOGLE_CLIENT_ID")?,
            google_client_secret: require_env("GOOGLE_CLIENT_SECRET")?,
            google_callback_url: require_env("GOOGLE_CALLBACK_URL")?,
            client_url: optional_env("CLIENT_URL")
                .unwrap_or_else(|| "http://localhost:3000".to_string())
                .trim_end_matches('/')
                .to_string(),
            environment: optional_env("APP_ENV")
                .map(|v| v.parse())
                .transpose()?
                .unwrap_or(Environment::Development),
            cookie_same_site: optional_env("COOKIE_SAME_SITE")
                .map(|v| v.parse())
                .transpose()?
                .unwrap_or(SameSite::Lax),
            token_ttl_hours: parse_token_ttl(
                &std::env::var("TOKEN_TTL_HOURS").unwrap_or_else(|_| "168".to_string()),
            )?,
            cors_origins: parse_list(&optional_env("CORS_ORIGINS").unwrap_or_default()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Cookies must be `Secure` in production, and browsers reject
    /// `SameSite=None` without it.
    pub fn secure_cookies(&self) -> bool {
        self.is_production() || self.cookie_same_site == SameSite::None
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_token_ttl(raw: &str) -> Result<i64> {
    let hours = raw
        .trim()
        .parse::<i64>()
        .context("TOKEN_TTL_HOURS must be a whole number of hours")?;
    if !(1..=MAX_TOKEN_TTL_HOURS).contains(&hours) {
        bail!("TOKEN_TTL_HOURS must be between 1 and {MAX_TOKEN_TTL_HOURS}, got {hours}");
    }
    Ok(hours)
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
