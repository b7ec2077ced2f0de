//! Purpose-scoped, single-use user tokens.
//!
//! A token is only valid for the (account, provider, purpose) triple it was
//! issued for. The issuer keeps SHA-256 digests, never the tokens themselves.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use idlink_core::config::TokenConfig;
use idlink_core::{LinkError, Result};

use crate::account::Account;

/// Random bytes per token before encoding.
const TOKEN_BYTES: usize = 32;

/// Upper bound on a configured lifespan (ten years).
const MAX_LIFESPAN_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Issues and verifies secrets bound to an account and a purpose.
#[async_trait]
pub trait UserTokenIssuer: Send + Sync {
    async fn issue(&self, account: &Account, provider: &str, purpose: &str) -> Result<String>;

    /// `Ok(false)` for unknown, expired, consumed or malformed tokens.
    async fn verify(
        &self,
        account: &Account,
        provider: &str,
        purpose: &str,
        token: &str,
    ) -> Result<bool>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TokenKey {
    tenant_id: Option<Uuid>,
    user_id: Uuid,
    provider: String,
    purpose: String,
}

impl TokenKey {
    fn new(account: &Account, provider: &str, purpose: &str) -> Self {
        Self {
            tenant_id: account.tenant_id,
            user_id: account.id,
            provider: provider.to_string(),
            purpose: purpose.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct IssuedToken {
    digest: Vec<u8>,
    security_stamp: String,
    expires_at: DateTime<Utc>,
}

/// In-process [`UserTokenIssuer`]: random tokens, hashed at rest, consumed
/// on first successful verification, expiring after a fixed lifespan.
pub struct SecretTokenIssuer {
    lifespan: Duration,
    clock: Arc<dyn Clock>,
    issued: tokio::sync::Mutex<HashMap<TokenKey, Vec<IssuedToken>>>,
}

impl SecretTokenIssuer {
    pub fn new(lifespan_secs: u64) -> Self {
        Self::with_clock(lifespan_secs, Arc::new(SystemClock))
    }

    /// Build from the `[tokens]` config section.
    pub fn from_config(config: &TokenConfig) -> Self {
        Self::new(config.lifespan_secs)
    }

    pub fn with_clock(lifespan_secs: u64, clock: Arc<dyn Clock>) -> Self {
        let secs = lifespan_secs.min(MAX_LIFESPAN_SECS) as i64;
        Self {
            lifespan: Duration::seconds(secs),
            clock,
            issued: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Tokens currently held (issued, unexpired, unconsumed).
    pub async fn outstanding(&self) -> usize {
        let now = self.clock.now();
        let issued = self.issued.lock().await;
        issued
            .values()
            .flatten()
            .filter(|t| t.expires_at > now)
            .count()
    }
}

fn digest(raw: &[u8]) -> Vec<u8> {
    Sha256::digest(raw).to_vec()
}

#[async_trait]
impl UserTokenIssuer for SecretTokenIssuer {
    async fn issue(&self, account: &Account, provider: &str, purpose: &str) -> Result<String> {
        let mut raw = [0u8; TOKEN_BYTES];
        rand::thread_rng()
            .try_fill_bytes(&mut raw)
            .map_err(|e| LinkError::Token(format!("entropy unavailable: {e}")))?;

        let now = self.clock.now();
        let record = IssuedToken {
            digest: digest(&raw),
            security_stamp: account.security_stamp.clone(),
            expires_at: now + self.lifespan,
        };

        let mut issued = self.issued.lock().await;
        issued.retain(|_, slot| {
            slot.retain(|t| t.expires_at > now);
            !slot.is_empty()
        });
        issued
            .entry(TokenKey::new(account, provider, purpose))
            .or_default()
            .push(record);

        tracing::debug!(user = %account.id, provider, purpose, "issued user token");
        Ok(URL_SAFE_NO_PAD.encode(raw))
    }

    async fn verify(
        &self,
        account: &Account,
        provider: &str,
        purpose: &str,
        token: &str,
    ) -> Result<bool> {
        let Ok(raw) = URL_SAFE_NO_PAD.decode(token.trim()) else {
            return Ok(false);
        };
        if raw.len() != TOKEN_BYTES {
            return Ok(false);
        }
        let presented = digest(&raw);
        let now = self.clock.now();

        let key = TokenKey::new(account, provider, purpose);
        let mut issued = self.issued.lock().await;
        let Some(slot) = issued.get_mut(&key) else {
            return Ok(false);
        };
        slot.retain(|t| t.expires_at > now);

        let position = slot
            .iter()
            .position(|t| t.digest == presented && t.security_stamp == account.security_stamp);
        if let Some(i) = position {
            slot.swap_remove(i);
        }
        if slot.is_empty() {
            issued.remove(&key);
        }
        Ok(position.is_some())
    }
}
