//! Manage signed bearer tokens.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Validity of the intermediate password-verified token, in seconds.
pub const INTERMEDIATE_VALIDITY: u64 = 60 * 60; // 1 hour.
/// Validity of the final session token, in seconds.
pub const SESSION_VALIDITY: u64 = 60 * 60 * 24; // 24 hours.

/// Login progress asserted by an intermediate token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Password accepted, MFA still pending.
    PasswordVerified,
}

/// Pieces of information asserted on a bearer token.
///
/// Tokens are self-contained: nothing is tracked server-side beyond
/// signature and expiry checks.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// User the token was issued to.
    pub username: String,
    /// Millisecond timestamp of the password verification.
    pub login_time: u64,
    /// Identifies the time at which the token was issued.
    pub iat: u64,
    /// Identifies the expiration time on or after which the token must not
    /// be accepted for processing.
    pub exp: u64,
    /// Present on intermediate tokens only.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub step: Option<Step>,
    /// Whether the full login flow completed.
    #[serde(default)]
    pub authenticated: bool,
    /// Whether the MFA challenge was passed.
    #[serde(default)]
    pub mfa_verified: bool,
}

/// Mint and check bearer tokens.
#[derive(Clone)]
pub struct TokenManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenManager {
    /// Create a new [`TokenManager`] instance around a shared secret.
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Mint the intermediate token asserting "password verified, MFA
    /// pending", valid one hour.
    pub fn intermediate(&self, username: &str, now_ms: u64) -> Result<String> {
        self.mint(Claims {
            username: username.to_owned(),
            login_time: now_ms,
            iat: now_ms / 1000,
            exp: now_ms / 1000 + INTERMEDIATE_VALIDITY,
            step: Some(Step::PasswordVerified),
            authenticated: false,
            mfa_verified: false,
        })
    }

    /// Mint the final session token, valid 24 hours.
    pub fn session(&self, username: &str, now_ms: u64) -> Result<String> {
        self.mint(Claims {
            username: username.to_owned(),
            login_time: now_ms,
            iat: now_ms / 1000,
            exp: now_ms / 1000 + SESSION_VALIDITY,
            step: None,
            authenticated: true,
            mfa_verified: true,
        })
    }

    fn mint(&self, claims: Claims) -> Result<String> {
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    /// Decode and check a token.
    pub fn decode(&self, token: &str) -> Result<Claims> {
        Ok(decode::<Claims>(token, &self.decoding, &self.validation)?.claims)
    }
}
