//! Payload codec: shared-link parsing and the default encrypted format.
//!
//! A shared link carries the configuration bundle in its URL fragment
//! (`#share=<blob>`), so the payload is never sent to a server on
//! navigation. The pipeline itself only depends on the [`PayloadCodec`]
//! trait; [`AesGcmCodec`] is the default wire format:
//!
//! ```text
//! cfg1.<hex salt>.<base64url(nonce || ciphertext)>
//! ```
//!
//! The key is derived from the user's passphrase with PBKDF2-HMAC-SHA256
//! and the per-link salt; the body is AES-256-GCM. An authentication
//! failure is indistinguishable from a wrong passphrase by design, and is
//! reported as [`CodecError::Decrypt`] so the caller can re-prompt.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;
use url::Url;

use crate::payload::SharedPayload;

/// Fragment parameter carrying the encoded payload.
const FRAGMENT_PARAM: &str = "share";

/// Wire format version tag.
const FORMAT_VERSION: &str = "cfg1";

/// Key length in bytes (256 bits for AES-256).
const KEY_LENGTH: usize = 32;

/// Nonce length in bytes (96 bits for AES-GCM).
const NONCE_LENGTH: usize = 12;

/// Salt length in bytes for key derivation.
const SALT_LENGTH: usize = 16;

/// Default PBKDF2 iteration count.
const DEFAULT_ITERATIONS: u32 = 120_000;

/// Error from encoding or decoding a shared payload.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed shared payload: {0}")]
    Malformed(String),

    #[error("unsupported share format version: {0}")]
    UnsupportedVersion(String),

    #[error("invalid payload encoding: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid salt encoding: {0}")]
    Hex(#[from] hex::FromHexError),

    /// Wrong passphrase or corrupted data; AES-GCM cannot tell them apart.
    #[error("decryption failed: incorrect secret or corrupted payload")]
    Decrypt,

    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl CodecError {
    /// Whether this failure should be treated as a wrong secret (retryable)
    /// rather than a malformed link.
    pub fn is_incorrect_secret(&self) -> bool {
        matches!(self, CodecError::Decrypt)
    }
}

/// Turns an opaque encrypted blob plus a passphrase into a [`SharedPayload`].
pub trait PayloadCodec: Send + Sync {
    fn decode(&self, blob: &str, secret: &str) -> Result<SharedPayload, CodecError>;

    fn encode(&self, payload: &SharedPayload, secret: &str) -> Result<String, CodecError>;
}

/// Whether a URL carries a shared configuration payload.
pub fn has_shared_config(url: &str) -> bool {
    extract_fragment_payload(url).is_some()
}

/// Extract the opaque payload blob from a URL fragment.
///
/// Accepts both `#share=<blob>` (possibly among other fragment params) and a
/// bare `#cfg1.…` fragment produced by older sharing clients.
pub fn extract_fragment_payload(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let fragment = parsed.fragment()?;

    if fragment.starts_with(FORMAT_VERSION) {
        return Some(fragment.to_string());
    }

    for pair in fragment.split('&') {
        if let Some(value) = pair.strip_prefix(&format!("{FRAGMENT_PARAM}=")) {
            let decoded = urlencoding::decode(value).ok()?;
            if decoded.is_empty() {
                return None;
            }
            return Some(decoded.into_owned());
        }
    }

    None
}

/// Append a payload blob to a base URL as a share fragment.
pub fn build_share_link(base_url: &str, blob: &str) -> String {
    format!(
        "{base_url}#{FRAGMENT_PARAM}={}",
        urlencoding::encode(blob)
    )
}

/// Default codec: PBKDF2-derived AES-256-GCM.
pub struct AesGcmCodec {
    iterations: u32,
}

impl Default for AesGcmCodec {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl AesGcmCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lower iteration counts are for tests only.
    pub fn with_iterations(iterations: u32) -> Self {
        Self { iterations }
    }

    fn derive_key(&self, secret: &str, salt: &[u8]) -> [u8; KEY_LENGTH] {
        let mut key = [0u8; KEY_LENGTH];
        pbkdf2::pbkdf2_hmac::<Sha256>(secret.as_bytes(), salt, self.iterations, &mut key);
        key
    }
}

impl PayloadCodec for AesGcmCodec {
    fn decode(&self, blob: &str, secret: &str) -> Result<SharedPayload, CodecError> {
        let mut parts = blob.trim().splitn(3, '.');
        let version = parts
            .next()
            .ok_or_else(|| CodecError::Malformed("empty payload".into()))?;
        if version != FORMAT_VERSION {
            return Err(CodecError::UnsupportedVersion(version.to_string()));
        }

        let salt_hex = parts
            .next()
            .ok_or_else(|| CodecError::Malformed("missing salt".into()))?;
        let body = parts
            .next()
            .ok_or_else(|| CodecError::Malformed("missing ciphertext".into()))?;

        let salt = hex::decode(salt_hex)?;
        let combined = URL_SAFE_NO_PAD.decode(body)?;
        if combined.len() < NONCE_LENGTH {
            return Err(CodecError::Malformed("ciphertext too short".into()));
        }
        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LENGTH);

        let key = self.derive_key(secret, &salt);
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| CodecError::Malformed(format!("cipher init: {e}")))?;
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CodecError::Decrypt)?;

        Ok(serde_json::from_slice(&plaintext)?)
    }

    fn encode(&self, payload: &SharedPayload, secret: &str) -> Result<String, CodecError> {
        let mut salt = [0u8; SALT_LENGTH];
        rand::thread_rng().fill_bytes(&mut salt);
        let mut nonce_bytes = [0u8; NONCE_LENGTH];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);

        let key = self.derive_key(secret, &salt);
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| CodecError::Malformed(format!("cipher init: {e}")))?;
        let nonce = Nonce::from_slice(&nonce_bytes);

        let plaintext = serde_json::to_vec(payload)?;
        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_ref())
            .map_err(|_| CodecError::Malformed("encryption failed".into()))?;

        let mut combined = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(format!(
            "{FORMAT_VERSION}.{}.{}",
            hex::encode(salt),
            URL_SAFE_NO_PAD.encode(&combined)
        ))
    }
}
