/*
[INPUT]:  API secret and canonical request strings
[OUTPUT]: Hex-encoded HMAC-SHA256 signatures and websocket auth arguments
[POS]:    Auth layer - cryptographic signing for stream authentication
[UPDATE]: When changing signing algorithm or auth frame arguments
*/

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{BybitError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Prefix of the canonical string signed for websocket authentication
pub const REALTIME_AUTH_PREFIX: &str = "GET/realtime";

/// Sign `canonical` with `secret` and return the lowercase hex digest.
pub fn sign(secret: &str, canonical: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|err| BybitError::Signature(err.to_string()))?;
    mac.update(canonical.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// API key pair for private streams
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// Arguments of a websocket auth frame, in wire order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthArgs {
    pub api_key: String,
    pub expires: String,
    pub signature: String,
}

/// Signs websocket auth requests for a credential pair
#[derive(Debug, Clone)]
pub struct StreamSigner {
    credentials: Credentials,
    auth_window: Duration,
}

impl StreamSigner {
    pub fn new(credentials: Credentials, auth_window: Duration) -> Self {
        Self {
            credentials,
            auth_window,
        }
    }

    pub fn api_key(&self) -> &str {
        &self.credentials.api_key
    }

    /// Build auth arguments expiring `auth_window` after `now_millis`.
    pub fn auth_args_at(&self, now_millis: i64) -> Result<AuthArgs> {
        let expires = (now_millis + self.auth_window.as_millis() as i64).to_string();
        let canonical = format!("{REALTIME_AUTH_PREFIX}{expires}");
        let signature = sign(&self.credentials.api_secret, &canonical)?;
        Ok(AuthArgs {
            api_key: self.credentials.api_key.clone(),
            expires,
            signature,
        })
    }

    /// Build auth arguments expiring relative to the current wall clock.
    ///
    /// Call immediately before sending: the expiry is fixed at call time.
    pub fn auth_args(&self) -> Result<AuthArgs> {
        self.auth_args_at(Utc::now().timestamp_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_is_deterministic() {
        let first = sign("secret", "GET/realtime1000").unwrap();
        let second = sign("secret", "GET/realtime1000").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_sign_is_fixed_length_hex() {
        let signature = sign("secret", "GET/realtime1000").unwrap();
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_sign_changes_with_secret_or_input() {
        let base = sign("secret", "GET/realtime1000").unwrap();
        assert_ne!(base, sign("secreT", "GET/realtime1000").unwrap());
        assert_ne!(base, sign("secret", "GET/realtime1001").unwrap());
        assert_ne!(base, sign("", "GET/realtime1000").unwrap());
    }

    #[test]
    fn test_sign_matches_known_vector() {
        // RFC 4231 test case 2
        let signature = sign("Jefe", "what do ya want for nothing?").unwrap();
        assert_eq!(
            signature,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_auth_args_expiry_window() {
        let signer = StreamSigner::new(
            Credentials::new("key", "secret"),
            Duration::from_millis(1000),
        );
        let args = signer.auth_args_at(1_700_000_000_000).unwrap();
        assert_eq!(args.api_key, "key");
        assert_eq!(args.expires, "1700000000001000");
        assert_eq!(
            args.signature,
            sign("secret", "GET/realtime1700000000001000").unwrap()
        );
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let rendered = format!("{:?}", Credentials::new("key", "very-secret"));
        assert!(rendered.contains("key"));
        assert!(!rendered.contains("very-secret"));
    }
}
