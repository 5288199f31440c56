use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use sabueso_core::UserId;

use crate::{Principal, Role};

/// Session claims carried by the bearer token.
///
/// Timestamps are unix seconds (`iat` / `exp`, as JWT registered claims).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject: the acting user.
    pub sub: UserId,
    pub role: Role,
    pub email_verified: bool,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    pub fn for_principal(principal: &Principal, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            sub: principal.user_id,
            role: principal.role,
            email_verified: principal.email_verified,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }

    pub fn principal(&self) -> Principal {
        Principal::new(self.sub, self.role, self.email_verified)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (iat is in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("failed to sign token: {0}")]
    Encode(String),
}

/// Deterministically validate session claims against `now`.
///
/// Signature verification happens in the codec; this checks the time window only.
pub fn validate_claims(claims: &SessionClaims, now: DateTime<Utc>) -> Result<(), TokenError> {
    let now = now.timestamp();
    if claims.exp <= claims.iat {
        return Err(TokenError::InvalidTimeWindow);
    }
    if now < claims.iat {
        return Err(TokenError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenError::Expired);
    }
    Ok(())
}

/// Verifies bearer tokens and yields their claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, TokenError>;
}

/// HS256 session token codec (issue + validate) over a shared secret.
#[derive(Clone)]
pub struct Hs256TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Hs256TokenCodec {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let secret = secret.as_ref();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    pub fn issue(&self, claims: &SessionClaims) -> Result<String, TokenError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| TokenError::Encode(e.to_string()))
    }
}

impl JwtValidator for Hs256TokenCodec {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, TokenError> {
        // Time checks are done by `validate_claims` against the caller's clock.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let data = jsonwebtoken::decode::<SessionClaims>(token, &self.decoding, &validation)
            .map_err(|e| TokenError::Malformed(e.to_string()))?;

        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(now: DateTime<Utc>) -> SessionClaims {
        SessionClaims::for_principal(
            &Principal::new(UserId::from_raw(3), Role::DepositManager, true),
            now,
            Duration::minutes(10),
        )
    }

    #[test]
    fn issued_token_validates_with_same_secret() {
        let codec = Hs256TokenCodec::new("secret");
        let now = Utc::now();
        let token = codec.issue(&claims(now)).unwrap();

        let decoded = codec.validate(&token, now).unwrap();
        assert_eq!(decoded.sub, UserId::from_raw(3));
        assert_eq!(decoded.role, Role::DepositManager);
        assert!(decoded.email_verified);
    }

    #[test]
    fn token_signed_with_other_secret_is_malformed() {
        let now = Utc::now();
        let token = Hs256TokenCodec::new("a").issue(&claims(now)).unwrap();
        let err = Hs256TokenCodec::new("b").validate(&token, now).unwrap_err();
        assert!(matches!(err, TokenError::Malformed(_)));
    }

    #[test]
    fn expired_and_future_tokens_are_rejected() {
        let now = Utc::now();
        let c = claims(now);
        assert_eq!(
            validate_claims(&c, now + Duration::minutes(11)),
            Err(TokenError::Expired)
        );
        assert_eq!(
            validate_claims(&c, now - Duration::minutes(1)),
            Err(TokenError::NotYetValid)
        );

        let mut inverted = c.clone();
        inverted.exp = inverted.iat;
        assert_eq!(validate_claims(&inverted, now), Err(TokenError::InvalidTimeWindow));
    }
}
