//! Signed identity tokens.
//!
//! Tokens are HS256 JWTs carrying the user's id (`sub`), role, issue time
//! and an expiry exactly seven days later. Expiry is checked against an
//! injected clock at verification time, with no leeway.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use mockable::Clock;
use serde::{Deserialize, Serialize};

use crate::domain::{Role, UserId};

/// How long an issued token stays valid: seven days.
pub const TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Secret used when running in development without `JWT_SECRET`.
pub const DEVELOPMENT_SECRET: &str = "dev-secret";

/// The process-wide token signing secret.
///
/// Its `Debug` output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningSecret(String);

impl SigningSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The insecure fallback secret for local development.
    pub fn development() -> Self {
        Self::new(DEVELOPMENT_SECRET)
    }

    pub fn is_development_fallback(&self) -> bool {
        self.0 == DEVELOPMENT_SECRET
    }

    fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningSecret(<redacted>)")
    }
}

/// A verified principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject: UserId,
    pub role: Role,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Why a token was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// Signature does not match the payload
    #[error("invalid token signature")]
    InvalidSignature,

    /// Token is past its expiry
    #[error("token expired")]
    Expired,

    /// Token could not be decoded or is missing claims
    #[error("malformed token: {0}")]
    Malformed(String),

    /// Token could not be signed
    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed(err.to_string()),
        }
    }
}

/// Claims carried in the token payload.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    role: Role,
    iat: i64,
    exp: i64,
}

/// Issues and verifies identity tokens.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl TokenService {
    /// Create a token service signing with `secret` and reading time from
    /// `clock`.
    pub fn new(secret: &SigningSecret, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against our own clock in `verify_token`.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["sub", "exp"]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            clock,
        }
    }

    /// Issue a token for `subject` with `role`, valid for seven days.
    pub fn issue_token(&self, subject: UserId, role: Role) -> Result<String, TokenError> {
        let now = self.clock.utc().timestamp();
        let claims = Claims {
            sub: subject.to_string(),
            role,
            iat: now,
            exp: now + TOKEN_TTL_SECS,
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify a token's signature and expiry.
    ///
    /// A token is valid up to and including the second of its expiry.
    pub fn verify_token(&self, token: &str) -> Result<Identity, TokenError> {
        let claims = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)?.claims;

        if self.clock.utc().timestamp() > claims.exp {
            return Err(TokenError::Expired);
        }

        let subject =
            UserId::parse(&claims.sub).map_err(|e| TokenError::Malformed(e.to_string()))?;
        let issued_at = DateTime::from_timestamp(claims.iat, 0)
            .ok_or_else(|| TokenError::Malformed("iat out of range".to_string()))?;
        let expires_at = DateTime::from_timestamp(claims.exp, 0)
            .ok_or_else(|| TokenError::Malformed("exp out of range".to_string()))?;

        Ok(Identity {
            subject,
            role: claims.role,
            issued_at,
            expires_at,
        })
    }
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService").finish_non_exhaustive()
    }
}
