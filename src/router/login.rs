//! Password and secure-word verification.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::{Result, ServerError};
use crate::router::Valid;
use crate::store::{self, Lookup};

/// Minimum length of the client-side hashed password. Placeholder check
/// standing in for a credential store the demo does not have.
const MIN_HASHED_PASSWORD_LEN: usize = 10;

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Body {
    #[validate(length(min = 1, message = "All fields are required"))]
    pub username: String,
    #[validate(length(min = 1, message = "All fields are required"))]
    pub hashed_password: String,
    #[validate(length(min = 1, message = "All fields are required"))]
    pub secure_word: String,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub token: String,
    pub message: String,
    pub requires_mfa: bool,
}

/// Handler to verify the echoed secure word and the password.
pub async fn handler(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<Json<Response>> {
    let now = store::unix_ms()?;

    let challenge = match state.secure_words.get(&body.username, now) {
        Lookup::Hit(challenge) => challenge,
        Lookup::Expired => {
            state.secure_words.remove(&body.username);
            return Err(ServerError::ChallengeExpired);
        }
        Lookup::Missing => return Err(ServerError::MissingChallenge),
    };

    if challenge.word != body.secure_word {
        // left in place so the user may retry within the window.
        return Err(ServerError::WrongSecureWord);
    }

    if body.hashed_password.len() < MIN_HASHED_PASSWORD_LEN {
        return Err(ServerError::WrongPassword);
    }

    // single use: a verified word cannot be replayed.
    state.secure_words.remove(&body.username);
    let token = state.token.intermediate(&body.username, now)?;

    tracing::info!(username = %body.username, "password verified, MFA pending");

    Ok(Json(Response {
        token,
        message: "Password verified. Please complete MFA.".to_owned(),
        requires_mfa: true,
    }))
}
