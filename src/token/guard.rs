use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use super::{Identity, IssuedToken, TokenCodec, TokenError, TokenPayload};

/// Well-known key the encoded token is kept under.
pub const TOKEN_STORAGE_KEY: &str = "admin_token";

/// Client-side key/value storage holding the token between navigations.
pub trait ClientStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
    fn remove(&self, key: &str);
}

#[derive(Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl ClientStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.remove(key);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("please log in again")]
pub struct Unauthenticated;

/// Gate in front of protected navigation: the stored token must decode, and
/// any rejection throws it away.
pub struct RouteGuard<S> {
    codec: Arc<TokenCodec>,
    storage: S,
    ttl_secs: u64,
}

impl<S: ClientStorage> RouteGuard<S> {
    pub fn new(codec: Arc<TokenCodec>, storage: S, ttl_secs: u64) -> Self {
        Self {
            codec,
            storage,
            ttl_secs,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Issues a token for `identity` and keeps it.
    pub fn login(&self, identity: &Identity) -> Result<IssuedToken, TokenError> {
        let issued = self.codec.encode(identity, self.ttl_secs)?;
        self.storage.set(TOKEN_STORAGE_KEY, issued.token.clone());
        tracing::info!("stored session token for {}", identity.email);
        Ok(issued)
    }

    pub fn check(&self) -> Result<TokenPayload, Unauthenticated> {
        let Some(token) = self.storage.get(TOKEN_STORAGE_KEY) else {
            return Err(Unauthenticated);
        };
        match self.codec.decode(&token) {
            Ok(payload) => Ok(payload),
            Err(rejection) => {
                tracing::warn!("discarding stored token: {}", rejection);
                self.storage.remove(TOKEN_STORAGE_KEY);
                Err(Unauthenticated)
            }
        }
    }

    pub fn logout(&self) {
        self.storage.remove(TOKEN_STORAGE_KEY);
    }
}
