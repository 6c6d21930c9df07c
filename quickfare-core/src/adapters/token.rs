//! HMAC-signed bearer tokens
//!
//! Token format: `base64url(claims json) "." base64url(HMAC-SHA256(claims part))`.
//! Claims carry the account handle (`sub`) and expiry (`exp`, unix seconds).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::domain::result::{Error, Result};
use crate::domain::KEY_LEN;
use crate::ports::Authenticator;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// Token handed back by a successful login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies bearer tokens with a shared secret
pub struct HmacTokenAuthenticator {
    secret: [u8; KEY_LEN],
    ttl: Duration,
}

impl HmacTokenAuthenticator {
    pub fn new(secret: [u8; KEY_LEN], ttl: Duration) -> Self {
        Self { secret, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a token for `handle` valid for the configured lifetime
    ///
    /// Does not check that the handle exists; callers do that first.
    pub fn issue(&self, handle: &str) -> Result<IssuedToken> {
        self.issue_at(handle, Utc::now())
    }

    fn issue_at(&self, handle: &str, now: DateTime<Utc>) -> Result<IssuedToken> {
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| Error::Config(format!("Token lifetime {} overflows expiry", self.ttl)))?;
        let claims = Claims {
            sub: handle.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
        let signature = URL_SAFE_NO_PAD.encode(self.sign(payload.as_bytes())?);

        Ok(IssuedToken {
            access_token: format!("{}.{}", payload, signature),
            token_type: "bearer".to_string(),
            expires_at,
        })
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| Error::Config(format!("Invalid token secret: {}", e)))
    }

    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let mut mac = self.mac()?;
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    fn verify_at(&self, credential: &str, now: DateTime<Utc>) -> Result<String> {
        let (payload, signature) = credential
            .trim()
            .split_once('.')
            .ok_or_else(|| Error::authentication("Malformed token"))?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| Error::authentication("Malformed token signature"))?;
        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| Error::authentication("Invalid token signature"))?;

        let claims: Claims = URL_SAFE_NO_PAD
            .decode(payload)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .ok_or_else(|| Error::authentication("Malformed token claims"))?;

        if claims.exp <= now.timestamp() {
            return Err(Error::authentication("Token expired"));
        }
        Ok(claims.sub)
    }
}

impl Authenticator for HmacTokenAuthenticator {
    fn authenticate(&self, credential: &str) -> Result<String> {
        self.verify_at(credential, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authenticator() -> HmacTokenAuthenticator {
        HmacTokenAuthenticator::new([7u8; KEY_LEN], Duration::minutes(15))
    }

    #[test]
    fn test_issued_token_authenticates() {
        let auth = authenticator();
        let token = auth.issue("alice").unwrap();
        assert_eq!(token.token_type, "bearer");
        assert_eq!(auth.authenticate(&token.access_token).unwrap(), "alice");
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let auth = authenticator();
        let issued_at = Utc::now() - Duration::minutes(16);
        let token = auth.issue_at("alice", issued_at).unwrap();

        let err = auth.authenticate(&token.access_token).unwrap_err();
        assert!(matches!(err, Error::Authentication(ref msg) if msg.contains("expired")));
    }

    #[test]
    fn test_tampered_claims_are_rejected() {
        let auth = authenticator();
        let token = auth.issue("alice").unwrap().access_token;
        let (_, signature) = token.split_once('.').unwrap();

        let forged_claims = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&Claims {
                sub: "mallory".to_string(),
                iat: 0,
                exp: i64::MAX,
            })
            .unwrap(),
        );
        let forged = format!("{}.{}", forged_claims, signature);
        assert!(matches!(auth.authenticate(&forged), Err(Error::Authentication(_))));
    }

    #[test]
    fn test_unrepresentable_expiry_is_an_error() {
        let auth = HmacTokenAuthenticator::new([7u8; KEY_LEN], Duration::MAX);
        assert!(matches!(auth.issue("alice"), Err(Error::Config(_))));
    }

    #[test]
    fn test_foreign_secret_and_garbage_are_rejected() {
        let token = authenticator().issue("alice").unwrap().access_token;
        let other = HmacTokenAuthenticator::new([9u8; KEY_LEN], Duration::minutes(15));

        assert!(matches!(other.authenticate(&token), Err(Error::Authentication(_))));
        assert!(matches!(other.authenticate("not-a-token"), Err(Error::Authentication(_))));
        assert!(matches!(other.authenticate("a.b"), Err(Error::Authentication(_))));
    }
}
