//! Time-windowed one-time code derivation and challenge state.

use std::time::Duration;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{Result, ServerError};

/// Failed attempts after which a username is locked out.
pub const MAX_ATTEMPTS: u8 = 3;
/// Lifetime of a stored challenge, measured from its generation time.
pub const CHALLENGE_TTL: Duration = Duration::from_secs(5 * 60);
/// Codes are tied to a 30-second time bucket, approximating one-time-code
/// behavior without RFC 6238 compliance.
pub const CODE_WINDOW_MS: u64 = 30_000;

const CODE_LENGTH: usize = 6;

/// Per-username challenge: `NO_CHALLENGE -> CHALLENGED -> (VERIFIED | LOCKED)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MfaChallenge {
    pub username: String,
    pub code: String,
    pub generated_at: u64,
    pub attempts: u8,
}

impl MfaChallenge {
    pub fn new(username: &str, code: String, now_ms: u64) -> Self {
        Self {
            username: username.to_owned(),
            code,
            generated_at: now_ms,
            attempts: 0,
        }
    }

    /// Whether further attempts must be rejected regardless of the
    /// submitted code.
    pub fn locked(&self) -> bool {
        self.attempts >= MAX_ATTEMPTS
    }
}

/// Derive the code for the current 30-second window.
///
/// Six hex characters sliced out of HMAC-SHA256 at an offset keyed on the
/// digest's last nibble. Not HOTP dynamic truncation; the scheme matches the
/// demonstration flow this service implements.
pub fn derive_code(secret: &str, username: &str, now_ms: u64) -> Result<String> {
    let window = now_ms / CODE_WINDOW_MS;
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|err| ServerError::Internal { details: err.to_string() })?;
    mac.update(username.as_bytes());
    mac.update(window.to_string().as_bytes());

    let hash = hex::encode(mac.finalize().into_bytes());
    let last = hash.as_bytes()[hash.len() - 1] as char;
    let offset = last.to_digit(16).unwrap_or(0) as usize % (hash.len() - CODE_LENGTH);

    Ok(hash[offset..offset + CODE_LENGTH].to_uppercase())
}
