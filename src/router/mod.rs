//! HTTP route handlers.

pub mod login;
pub mod mfa;
pub mod secure_word;
pub mod status;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use validator::Validate;

use crate::ServerError;

/// JSON body extractor running `validator` checks before the handler.
pub struct Valid<T>(pub T);

impl<S, T> FromRequest<S> for Valid<T>
where
    S: Send + Sync,
    T: Validate,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(body) = Json::<T>::from_request(req, state).await?;
        body.validate()?;
        Ok(Self(body))
    }
}

#[cfg(test)]
pub(crate) fn state() -> crate::AppState {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::config::{Configuration, Keyring};
    use crate::store::{ExpiringStore, RATE_RECORD_TTL};
    use crate::token::TokenManager;

    let keys = Keyring {
        token: "demo-jwt-secret".into(),
        secure_word: "demo-secret-key".into(),
        mfa: "demo-mfa-secret".into(),
    };

    crate::AppState {
        config: Arc::new(Configuration::default()),
        token: TokenManager::new(&keys.token),
        keys: Arc::new(keys),
        secure_words: ExpiringStore::new(Duration::from_secs(
            crate::secure_word::WORD_VALIDITY_SECS,
        )),
        mfa: ExpiringStore::new(crate::mfa::CHALLENGE_TTL),
        rate: ExpiringStore::new(RATE_RECORD_TTL),
    }
}
