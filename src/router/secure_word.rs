//! Secure-word issuance.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::{Result, ServerError};
use crate::router::Valid;
use crate::secure_word::{self, SecureWordChallenge};
use crate::store::{self, Lookup};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub secure_word: String,
    /// Seconds until the word expires.
    pub expires_in: u64,
    /// Absolute expiry for client-side countdown display.
    pub expires_at_timestamp: u64,
}

/// Handler to issue a challenge word.
pub async fn handler(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<Json<Response>> {
    let now = store::unix_ms()?;

    if let Lookup::Hit(last_request_at) = state.rate.get(&body.username, now) {
        let elapsed = now.saturating_sub(last_request_at);
        if elapsed < secure_word::REQUEST_INTERVAL_MS {
            let wait = (secure_word::REQUEST_INTERVAL_MS - elapsed).div_ceil(1000);
            return Err(ServerError::RateLimited(wait));
        }
    }

    let word = secure_word::derive_word(&state.keys.secure_word, &body.username, now)?;
    let expires_at = now + secure_word::WORD_VALIDITY_SECS * 1000;

    // one active challenge per username: a new word replaces the old one.
    state.secure_words.insert(
        &body.username,
        SecureWordChallenge {
            username: body.username.clone(),
            word: word.clone(),
            issued_at: now,
            expires_at,
        },
        now,
    );
    state.rate.insert(&body.username, now, now);

    tracing::debug!(username = %body.username, "secure word issued");

    Ok(Json(Response {
        secure_word: word,
        expires_in: secure_word::WORD_VALIDITY_SECS,
        expires_at_timestamp: expires_at,
    }))
}
