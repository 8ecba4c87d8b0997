//! Secure-word challenge derivation.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{Result, ServerError};

/// Lifetime of an issued word, in seconds.
pub const WORD_VALIDITY_SECS: u64 = 60;
/// Minimum delay between two issuances for the same username, in
/// milliseconds.
pub const REQUEST_INTERVAL_MS: u64 = 10_000;

const WORD_LENGTH: usize = 8;

/// An issued challenge, stored until consumed or expired.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecureWordChallenge {
    pub username: String,
    pub word: String,
    pub issued_at: u64,
    pub expires_at: u64,
}

/// Derive a challenge word from a keyed hash of username and timestamp.
///
/// First 8 hex characters of HMAC-SHA256, uppercased for readability.
pub fn derive_word(secret: &str, username: &str, now_ms: u64) -> Result<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|err| ServerError::Internal { details: err.to_string() })?;
    mac.update(username.as_bytes());
    mac.update(now_ms.to_string().as_bytes());

    let hash = hex::encode(mac.finalize().into_bytes());
    Ok(hash[..WORD_LENGTH].to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_is_deterministic_per_username_and_timestamp() {
        let word = derive_word("demo-secret-key", "alice", 1_700_000_000_000).unwrap();

        assert_eq!(word, derive_word("demo-secret-key", "alice", 1_700_000_000_000).unwrap());
        assert_eq!(word.len(), WORD_LENGTH);
        assert!(word.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn word_depends_on_every_input() {
        let word = derive_word("demo-secret-key", "alice", 1_700_000_000_000).unwrap();

        assert_ne!(word, derive_word("demo-secret-key", "bob", 1_700_000_000_000).unwrap());
        assert_ne!(word, derive_word("demo-secret-key", "alice", 1_700_000_000_001).unwrap());
        assert_ne!(word, derive_word("other-secret", "alice", 1_700_000_000_000).unwrap());
    }
}
