//! Self-contained, time-limited admin credentials.
//!
//! A token is the AES-256-GCM encryption of the JSON payload under a key
//! derived from the configured secret, base64url encoded as
//! `nonce || ciphertext`. Anyone holding the secret can mint tokens; there is
//! no revocation, a token is accepted until its `exp` passes.

mod guard;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub use guard::{ClientStorage, MemoryStorage, RouteGuard, TOKEN_STORAGE_KEY, Unauthenticated};

const NONCE_LEN: usize = 12;

/// Identity claims carried by a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub email: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub is_superadmin: bool,
}

/// Decoded token: the identity plus `exp`, absolute expiry in Unix millis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    #[serde(flatten)]
    pub identity: Identity,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub exp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("failed to serialize token payload: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to encrypt token payload")]
    Encrypt,
}

/// Why a token was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenRejection {
    #[error("token is malformed or was not issued with this secret")]
    Invalid,
    #[error("token has expired")]
    Expired,
}

#[derive(Clone)]
pub struct TokenCodec {
    cipher: Aes256Gcm,
}

impl TokenCodec {
    pub fn new(secret: &str) -> Self {
        let digest: [u8; 32] = Sha256::digest(secret.as_bytes()).into();
        Self {
            cipher: Aes256Gcm::new(&Key::<Aes256Gcm>::from(digest)),
        }
    }

    /// Issues a token for `identity` that stays valid for `ttl_secs`.
    pub fn encode(&self, identity: &Identity, ttl_secs: u64) -> Result<IssuedToken, TokenError> {
        self.encode_at(identity, ttl_secs, Utc::now().timestamp_millis())
    }

    pub fn decode(&self, token: &str) -> Result<TokenPayload, TokenRejection> {
        self.decode_at(token, Utc::now().timestamp_millis())
    }

    pub(crate) fn encode_at(
        &self,
        identity: &Identity,
        ttl_secs: u64,
        now_millis: i64,
    ) -> Result<IssuedToken, TokenError> {
        let ttl_millis = i64::try_from(ttl_secs)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000);
        let payload = TokenPayload {
            identity: identity.clone(),
            exp: now_millis.saturating_add(ttl_millis),
        };
        let plaintext = serde_json::to_vec(&payload)?;

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_slice())
            .map_err(|_| TokenError::Encrypt)?;

        let mut raw = nonce.to_vec();
        raw.extend_from_slice(&ciphertext);
        Ok(IssuedToken {
            token: URL_SAFE_NO_PAD.encode(raw),
            exp: payload.exp,
        })
    }

    pub(crate) fn decode_at(
        &self,
        token: &str,
        now_millis: i64,
    ) -> Result<TokenPayload, TokenRejection> {
        let raw = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|_| TokenRejection::Invalid)?;
        if raw.len() <= NONCE_LEN {
            return Err(TokenRejection::Invalid);
        }
        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| TokenRejection::Invalid)?;
        let payload: TokenPayload =
            serde_json::from_slice(&plaintext).map_err(|_| TokenRejection::Invalid)?;

        if now_millis > payload.exp {
            return Err(TokenRejection::Expired);
        }
        Ok(payload)
    }
}
