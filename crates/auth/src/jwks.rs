//! Remote JSON Web Key Set cache for the asymmetric trust path.
//!
//! Process-scoped state with an explicit init-at-startup (`prime`) and a
//! refresh lifecycle: the set is re-fetched when older than
//! [`REFRESH_INTERVAL`], and an unknown key id forces one out-of-band
//! refresh, floor-limited by [`REFRESH_RATE_LIMIT`]. Fetches are bounded by
//! [`FETCH_TIMEOUT`].

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};

use jsonwebtoken::DecodingKey;
use jsonwebtoken::jwk::JwkSet;
use thiserror::Error;

pub const REFRESH_INTERVAL: Duration = Duration::from_secs(60 * 60);
pub const REFRESH_RATE_LIMIT: Duration = Duration::from_secs(5 * 60);
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum JwksError {
    #[error("key-set fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),
}

/// Cached verification keys, indexed by key id.
pub struct JwksCache {
    url: String,
    client: reqwest::Client,
    keys: RwLock<HashMap<String, DecodingKey>>,
    /// When the last fetch was attempted (successful or not); drives both
    /// the staleness check and the forced-refresh floor.
    last_attempt: Mutex<Option<Instant>>,
}

impl JwksCache {
    pub fn new(url: impl Into<String>) -> Result<Self, JwksError> {
        let client = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
        Ok(Self {
            url: url.into(),
            client,
            keys: RwLock::new(HashMap::new()),
            last_attempt: Mutex::new(None),
        })
    }

    /// Lazy startup fetch.
    ///
    /// Failure is non-fatal: the shared-secret path may be the only one in
    /// use, so a dead key-set endpoint must not stop the process.
    pub async fn prime(&self) {
        if let Ok(mut last) = self.last_attempt.lock() {
            *last = Some(Instant::now());
        }
        if let Err(e) = self.fetch_and_store().await {
            tracing::warn!("initial key-set fetch failed (expected when only the shared-secret path is in use): {e}");
        }
    }

    /// Resolve a verification key by key id.
    ///
    /// A stale cache is refreshed first; an unknown kid triggers one forced
    /// refresh before giving up.
    pub async fn key_for(&self, kid: &str) -> Option<DecodingKey> {
        if self.is_stale() {
            self.try_refresh().await;
        }
        if let Some(key) = self.lookup(kid) {
            return Some(key);
        }
        self.try_refresh().await;
        self.lookup(kid)
    }

    fn lookup(&self, kid: &str) -> Option<DecodingKey> {
        self.keys.read().ok()?.get(kid).cloned()
    }

    fn is_stale(&self) -> bool {
        match self.last_attempt.lock() {
            Ok(guard) => guard.is_none_or(|at| at.elapsed() >= REFRESH_INTERVAL),
            Err(_) => false,
        }
    }

    async fn try_refresh(&self) {
        if !self.claim_refresh_slot() {
            return;
        }
        if let Err(e) = self.fetch_and_store().await {
            tracing::warn!("key-set refresh failed: {e}");
        }
    }

    /// Reserve a refresh attempt, enforcing the floor between attempts.
    fn claim_refresh_slot(&self) -> bool {
        let Ok(mut last) = self.last_attempt.lock() else {
            return false;
        };
        let now = Instant::now();
        match *last {
            Some(at) if now.duration_since(at) < REFRESH_RATE_LIMIT => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    async fn fetch_and_store(&self) -> Result<(), JwksError> {
        let set: JwkSet = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut fresh = HashMap::new();
        for jwk in &set.keys {
            let Some(kid) = jwk.common.key_id.clone() else {
                tracing::debug!("skipping key-set entry without a kid");
                continue;
            };
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => {
                    fresh.insert(kid, key);
                }
                Err(e) => tracing::warn!(%kid, "unusable key-set entry: {e}"),
            }
        }

        tracing::debug!(keys = fresh.len(), "verification key set refreshed");
        if let Ok(mut keys) = self.keys.write() {
            *keys = fresh;
        }
        Ok(())
    }
}
