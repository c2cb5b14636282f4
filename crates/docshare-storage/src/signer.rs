//! Expiring download URLs.
//!
//! [`UrlSigner`] is the only way the service produces a download URL. The S3
//! backend presigns natively. The local backend pairs with [`HmacUrlSigner`],
//! whose URLs point at the service's own `/blob/...` route and carry
//! `expires` (unix seconds) and `signature` (hex HMAC-SHA256 over
//! `"{storage_key}\n{expires}"`).

use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

/// Characters escaped in the key part of a blob URL. `/` is kept.
const KEY_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Produces time-limited GET URLs for stored objects.
#[async_trait]
pub trait UrlSigner: Send + Sync {
    async fn sign(&self, storage_key: &str, expires_in: Duration) -> StorageResult<String>;
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Malformed signature")]
    Malformed,
    #[error("Signature mismatch")]
    Mismatch,
    #[error("Link expired")]
    Expired,
}

/// HMAC-SHA256 signer for links served by the service itself.
#[derive(Clone)]
pub struct HmacUrlSigner {
    secret: Vec<u8>,
    base_url: String,
}

impl std::fmt::Debug for HmacUrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacUrlSigner")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HmacUrlSigner {
    pub fn new(secret: impl Into<Vec<u8>>, base_url: impl Into<String>) -> StorageResult<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(StorageError::ConfigError(
                "URL signing secret cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            secret,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn mac(&self, storage_key: &str, expires: i64) -> Option<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).ok()?;
        mac.update(storage_key.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        Some(mac)
    }

    /// Sign a URL valid until the unix timestamp `expires`.
    pub fn sign_until(&self, storage_key: &str, expires: i64) -> StorageResult<String> {
        let signature = self
            .mac(storage_key, expires)
            .ok_or_else(|| StorageError::ConfigError("Invalid URL signing key".to_string()))?
            .finalize()
            .into_bytes();

        Ok(format!(
            "{}/blob/{}?expires={}&signature={}",
            self.base_url,
            utf8_percent_encode(storage_key, KEY_ENCODE_SET),
            expires,
            hex::encode(signature)
        ))
    }

    pub fn verify(
        &self,
        storage_key: &str,
        expires: i64,
        signature: &str,
    ) -> Result<(), SignatureError> {
        self.verify_at(storage_key, expires, signature, Utc::now().timestamp())
    }

    /// Check the signature first so a tampered expiry reports as a mismatch.
    pub fn verify_at(
        &self,
        storage_key: &str,
        expires: i64,
        signature: &str,
        now: i64,
    ) -> Result<(), SignatureError> {
        let tag = hex::decode(signature).map_err(|_| SignatureError::Malformed)?;
        let mac = self
            .mac(storage_key, expires)
            .ok_or(SignatureError::Malformed)?;
        mac.verify_slice(&tag)
            .map_err(|_| SignatureError::Mismatch)?;

        if now > expires {
            return Err(SignatureError::Expired);
        }
        Ok(())
    }
}

#[async_trait]
impl UrlSigner for HmacUrlSigner {
    async fn sign(&self, storage_key: &str, expires_in: Duration) -> StorageResult<String> {
        let expires = Utc::now().timestamp() + expires_in.as_secs() as i64;
        self.sign_until(storage_key, expires)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> HmacUrlSigner {
        HmacUrlSigner::new(b"0123456789abcdef0123456789abcdef".to_vec(), "http://docs.test/").unwrap()
    }

    fn signature_of(url: &str) -> String {
        url.split("signature=").nth(1).unwrap().to_string()
    }

    #[test]
    fn test_signed_url_shape() {
        let url = signer().sign_until("files/u1/a b.pdf", 1_700_000_000).unwrap();
        assert!(url.starts_with("http://docs.test/blob/files/u1/a%20b.pdf?expires=1700000000&signature="));
        assert_eq!(signature_of(&url).len(), 64);
    }

    #[test]
    fn test_verify_accepts_untampered_link() {
        let s = signer();
        let url = s.sign_until("files/u1/a.pdf", 1000).unwrap();
        assert_eq!(s.verify_at("files/u1/a.pdf", 1000, &signature_of(&url), 999), Ok(()));
    }

    #[test]
    fn test_verify_rejects_tampering() {
        let s = signer();
        let sig = signature_of(&s.sign_until("files/u1/a.pdf", 1000).unwrap());
        assert_eq!(
            s.verify_at("files/u2/a.pdf", 1000, &sig, 0),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            s.verify_at("files/u1/a.pdf", 5000, &sig, 0),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            s.verify_at("files/u1/a.pdf", 1000, "zz", 0),
            Err(SignatureError::Malformed)
        );
    }

    #[test]
    fn test_verify_rejects_expired_link() {
        let s = signer();
        let sig = signature_of(&s.sign_until("files/u1/a.pdf", 1000).unwrap());
        assert_eq!(
            s.verify_at("files/u1/a.pdf", 1000, &sig, 1001),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn test_other_secret_does_not_verify() {
        let sig = signature_of(&signer().sign_until("k", 10).unwrap());
        let other = HmacUrlSigner::new(b"another-secret".to_vec(), "http://docs.test").unwrap();
        assert_eq!(other.verify_at("k", 10, &sig, 0), Err(SignatureError::Mismatch));
    }

    #[tokio::test]
    async fn test_sign_uses_relative_ttl() {
        let url = signer()
            .sign("files/u1/a.pdf", Duration::from_secs(3600))
            .await
            .unwrap();
        let expires: i64 = url
            .split("expires=")
            .nth(1)
            .and_then(|rest| rest.split('&').next())
            .unwrap()
            .parse()
            .unwrap();
        let delta = expires - Utc::now().timestamp();
        assert!((3595..=3600).contains(&delta));
    }
}
