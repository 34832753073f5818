//! Blob store collaborator: pre-signed download links for purchased files.
//!
//! Uploads and the storage backend itself live elsewhere; this side only needs
//! `presign(file_key) -> url`. The shipped implementation signs URLs for a
//! download edge that verifies `HMAC-SHA256(secret, "{key}:{expires}")`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

pub trait BlobStore: Send + Sync {
    /// Produce a time-limited URL for downloading the blob at `file_key`.
    fn presign(&self, file_key: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct SignedUrlStore {
    base_url: String,
    secret: String,
    ttl_secs: i64,
}

impl SignedUrlStore {
    pub fn new(base_url: &str, secret: &str, ttl_secs: i64) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            secret: secret.to_string(),
            ttl_secs,
        }
    }

    fn sign(&self, file_key: &str, expires: i64) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| AppError::Internal("Invalid download signing secret".into()))?;
        mac.update(format!("{}:{}", file_key, expires).as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Presign relative to an explicit clock, so expiry can be tested.
    pub fn presign_at(&self, file_key: &str, now: i64) -> Result<String> {
        let expires = now + self.ttl_secs;
        let signature = self.sign(file_key, expires)?;
        Ok(format!(
            "{}/{}?expires={}&signature={}",
            self.base_url,
            encode_key(file_key),
            expires,
            signature
        ))
    }

    /// Check a signature produced by [`presign`](BlobStore::presign).
    pub fn verify(&self, file_key: &str, expires: i64, signature: &str, now: i64) -> bool {
        if expires < now {
            return false;
        }
        let Ok(expected) = self.sign(file_key, expires) else {
            return false;
        };
        expected.len() == signature.len()
            && bool::from(expected.as_bytes().ct_eq(signature.as_bytes()))
    }
}

impl BlobStore for SignedUrlStore {
    fn presign(&self, file_key: &str) -> Result<String> {
        self.presign_at(file_key, chrono::Utc::now().timestamp())
    }
}

/// Percent-encode each path segment of a blob key.
fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
