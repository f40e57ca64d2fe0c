//! Bearer token signing and verification (HS256 JWT)
//!
//! Expiry is checked against the injected [`Clock`] rather than the JWT
//! library's own wall clock, so tests can move time explicitly.

use cdss_common::time::Clock;
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Signed claims; display fields are deliberately absent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Account id
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error, PartialEq)]
pub enum TokenError {
    #[error("token could not be decoded: {0}")]
    Malformed(String),

    #[error("token expired")]
    Expired,

    #[error("token subject is not an account id")]
    BadSubject,

    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Issued token with its expiry
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenSigner {
    pub fn new(secret: &str, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is compared against `clock` in verify()
        validation.validate_exp = false;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn sign(&self, account_id: i64) -> Result<IssuedToken, TokenError> {
        let now = self.clock.now();
        let expires_at = now + self.ttl;
        let claims = Claims {
            sub: account_id.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        // Report the second-truncated expiry actually encoded
        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .unwrap_or(expires_at);

        Ok(IssuedToken { token, expires_at })
    }

    /// Check signature and expiry, returning the subject account id
    pub fn verify(&self, token: &str) -> Result<i64, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| TokenError::Malformed(e.to_string()))?;

        if self.clock.now().timestamp() >= data.claims.exp {
            return Err(TokenError::Expired);
        }

        data.claims.sub.parse::<i64>().map_err(|_| TokenError::BadSubject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdss_common::time::FixedClock;

    fn signer_at(clock: Arc<FixedClock>) -> TokenSigner {
        TokenSigner::new("test-secret", Duration::minutes(60), clock)
    }

    #[test]
    fn test_valid_until_expiry() {
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()));
        let signer = signer_at(clock.clone());

        let issued = signer.sign(42).unwrap();
        assert_eq!(issued.expires_at, Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap());
        assert_eq!(signer.verify(&issued.token), Ok(42));

        clock.advance(Duration::minutes(59));
        assert_eq!(signer.verify(&issued.token), Ok(42));

        clock.advance(Duration::minutes(1));
        assert_eq!(signer.verify(&issued.token), Err(TokenError::Expired));
    }

    #[test]
    fn test_other_secret_rejected() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let issued = signer_at(clock.clone()).sign(1).unwrap();

        let other = TokenSigner::new("different", Duration::minutes(60), clock);
        assert!(matches!(other.verify(&issued.token), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn test_garbage_rejected() {
        let signer = signer_at(Arc::new(FixedClock::new(Utc::now())));
        assert!(matches!(signer.verify("abc.def.ghi"), Err(TokenError::Malformed(_))));
        assert!(matches!(signer.verify(""), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn test_claims_are_minimal() {
        let signer = signer_at(Arc::new(FixedClock::new(Utc::now())));
        let issued = signer.sign(7).unwrap();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        let raw = decode::<serde_json::Value>(
            &issued.token,
            &DecodingKey::from_secret(b"test-secret"),
            &validation,
        )
        .unwrap();
        let keys: Vec<&String> = raw.claims.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 3);
        assert_eq!(raw.claims["sub"], "7");
    }
}
