use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::RngCore;

use crate::errors::AppError;

/// How long a minted OAuth state stays redeemable.
pub const STATE_TTL: Duration = Duration::from_secs(600);

const REDIS_KEY_PREFIX: &str = "oauth_state:";

/// Server-side storage for OAuth CSRF state, keyed by the browser's
/// `oauth_session` id. `take` removes the entry, so a state can be redeemed once.
#[async_trait]
pub trait OAuthStateStore: Send + Sync {
    async fn put(&self, session_id: &str, state: &str) -> Result<(), AppError>;

    async fn take(&self, session_id: &str) -> Result<Option<String>, AppError>;
}

/// Hex-encoded random bytes from the thread-local CSPRNG.
pub fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

/// Redis-backed store for multi-instance deployments. Expiry is delegated
/// to Redis; `GETDEL` makes redemption atomic.
pub struct RedisStateStore {
    client: redis::Client,
}

impl RedisStateStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl OAuthStateStore for RedisStateStore {
    async fn put(&self, session_id: &str, state: &str) -> Result<(), AppError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("SET")
            .arg(format!("{REDIS_KEY_PREFIX}{session_id}"))
            .arg(state)
            .arg("EX")
            .arg(STATE_TTL.as_secs())
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn take(&self, session_id: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let state = redis::cmd("GETDEL")
            .arg(format!("{REDIS_KEY_PREFIX}{session_id}"))
            .query_async::<_, Option<String>>(&mut conn)
            .await?;
        Ok(state)
    }
}

/// In-process store for single-instance deployments and development.
pub struct MemoryStateStore {
    ttl: Duration,
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryStateStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new(STATE_TTL)
    }
}

#[async_trait]
impl OAuthStateStore for MemoryStateStore {
    async fn put(&self, session_id: &str, state: &str) -> Result<(), AppError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        // Abandoned logins would otherwise accumulate forever.
        entries.retain(|_, (_, minted)| now.duration_since(*minted) < self.ttl);
        entries.insert(session_id.to_string(), (state.to_string(), now));
        Ok(())
    }

    async fn take(&self, session_id: &str) -> Result<Option<String>, AppError> {
        let entry = self.entries.lock().remove(session_id);
        Ok(entry
            .filter(|(_, minted)| minted.elapsed() < self.ttl)
            .map(|(state, _)| state))
    }
}
