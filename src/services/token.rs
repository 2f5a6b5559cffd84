//! Signed, time-limited identity tokens.
//!
//! Tokens are HS256 JWTs carrying an [`IdentityClaim`]. Nothing is stored
//! server-side: a token is valid purely by virtue of its signature and expiry.
//!
//! # Expiry
//!
//! The JWT library's own `exp` validation is switched off and replaced by a
//! single comparison against an explicit clock value, so there is exactly one
//! expiry rule: a claim is valid only while `now < expires_at`.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Lifetime of every issued token.
pub const TOKEN_TTL_SECS: i64 = 5 * 60;

/// Optional scheme prefix accepted in front of a token.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Human-readable expiry format returned to callers.
const EXPIRY_DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Token issuance and verification failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("No token supplied")]
    MissingToken,

    #[error("Token signature or encoding invalid: {0}")]
    InvalidSignature(String),

    #[error("Token expired")]
    Expired,

    #[error("Unrecognized subject")]
    InvalidCredentials,

    #[error("Malformed login payload: {0}")]
    MalformedInput(String),

    #[error("Failed to sign token: {0}")]
    Signing(String),
}

/// The signed payload: who the token represents and when it stops being valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaim {
    #[serde(rename = "sub")]
    pub subject: String,
    /// Unix timestamp (seconds), always set by the issuer
    #[serde(rename = "exp")]
    pub expires_at: i64,
}

/// A freshly issued token with its expiry in machine and human form.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at_unix: i64,
    pub expires_at_utc: String,
}

/// Issues and verifies identity tokens with a secret fixed at construction.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    recognized_subject: String,
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("recognized_subject", &self.recognized_subject)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Create a token service.
    ///
    /// # Arguments
    ///
    /// * `secret` - HS256 signing secret
    /// * `recognized_subject` - the single subject allowed to obtain a token
    pub fn new(secret: &[u8], recognized_subject: impl Into<String>) -> Self {
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.validate_exp = false;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            recognized_subject: recognized_subject.into(),
        }
    }

    /// Issue a token for `subject`, valid for [`TOKEN_TTL_SECS`] from now.
    ///
    /// # Errors
    ///
    /// - `InvalidCredentials` if `subject` is not the recognized subject
    /// - `Signing` if the token cannot be encoded
    pub fn issue(&self, subject: &str) -> Result<IssuedToken, TokenError> {
        self.issue_at(subject, Utc::now())
    }

    /// Issue a token as if the current time were `now`.
    pub fn issue_at(&self, subject: &str, now: DateTime<Utc>) -> Result<IssuedToken, TokenError> {
        if !self.is_recognized(subject) {
            return Err(TokenError::InvalidCredentials);
        }

        let expires = now + Duration::seconds(TOKEN_TTL_SECS);
        let claim = IdentityClaim {
            subject: subject.to_string(),
            expires_at: expires.timestamp(),
        };

        let token = encode(&Header::new(SIGNING_ALGORITHM), &claim, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(IssuedToken {
            token,
            expires_at_unix: claim.expires_at,
            expires_at_utc: expires.format(EXPIRY_DISPLAY_FORMAT).to_string(),
        })
    }

    /// Verify a token, typically the raw `Authorization` header value.
    ///
    /// # Errors
    ///
    /// - `MissingToken` if nothing was supplied
    /// - `InvalidSignature` if the encoding is malformed or the signature does not match
    /// - `Expired` if `expires_at <= now`
    pub fn verify(&self, raw: Option<&str>) -> Result<IdentityClaim, TokenError> {
        self.verify_at(raw, Utc::now())
    }

    /// Verify a token as if the current time were `now`.
    pub fn verify_at(
        &self,
        raw: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<IdentityClaim, TokenError> {
        let raw = raw
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(TokenError::MissingToken)?;
        let token = raw.strip_prefix(BEARER_PREFIX).unwrap_or(raw);

        let claim = decode::<IdentityClaim>(token, &self.decoding_key, &self.validation)
            .map_err(|e| TokenError::InvalidSignature(e.to_string()))?
            .claims;

        if claim.expires_at <= now.timestamp() {
            return Err(TokenError::Expired);
        }

        Ok(claim)
    }

    /// Constant-time comparison against the recognized subject.
    fn is_recognized(&self, subject: &str) -> bool {
        subject
            .as_bytes()
            .ct_eq(self.recognized_subject.as_bytes())
            .into()
    }
}
