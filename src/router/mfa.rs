//! MFA code verification, plus the demo-only code retrieval endpoint.

use axum::Json;
use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::{Result, ServerError};
use crate::mfa::{self, MfaChallenge};
use crate::router::Valid;
use crate::store::{self, Lookup};

const REDIRECT_TO: &str = "/dashboard";

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct VerifyBody {
    #[validate(length(min = 1, message = "Username, code, and token are required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Username, code, and token are required"))]
    pub code: String,
    #[validate(length(min = 1, message = "Username, code, and token are required"))]
    pub token: String,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub session_token: String,
    pub message: String,
    pub redirect_to: String,
}

/// Handler to verify a one-time code against the per-username challenge.
pub async fn verify(
    State(state): State<AppState>,
    Valid(body): Valid<VerifyBody>,
) -> Result<Json<VerifyResponse>> {
    let now = store::unix_ms()?;

    let claims = state.token.decode(&body.token)?;
    if claims.username != body.username {
        return Err(ServerError::TokenMismatch);
    }

    // first attempt derives the challenge lazily.
    let mut challenge = match state.mfa.get(&body.username, now) {
        Lookup::Hit(challenge) => challenge,
        Lookup::Expired | Lookup::Missing => {
            let code = mfa::derive_code(&state.keys.mfa, &body.username, now)?;
            let challenge = MfaChallenge::new(&body.username, code, now);
            state.mfa.insert(&body.username, challenge.clone(), now);
            challenge
        }
    };

    if challenge.locked() {
        return Err(ServerError::Locked);
    }

    if body.code.to_uppercase() != challenge.code {
        challenge.attempts += 1;
        // keep the original generation time so the TTL is not extended.
        state
            .mfa
            .insert(&body.username, challenge.clone(), challenge.generated_at);

        if challenge.locked() {
            tracing::warn!(username = %body.username, "locked out after repeated MFA failures");
            return Err(ServerError::Locked);
        }
        return Err(ServerError::WrongCode(mfa::MAX_ATTEMPTS - challenge.attempts));
    }

    // success: the challenge is consumed.
    state.mfa.remove(&body.username);
    let session_token = state.token.session(&body.username, now)?;

    tracing::info!(username = %body.username, "login complete");

    Ok(Json(VerifyResponse {
        session_token,
        message: "Login successful".to_owned(),
        redirect_to: REDIRECT_TO.to_owned(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct CodeQuery {
    pub username: Option<String>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct CodeResponse {
    pub code: String,
    pub message: String,
}

/// Demo-only handler reporting the currently valid code.
///
/// Stores the derived code with a reset attempt counter; this is the one
/// way out of a lockout.
pub async fn code(
    State(state): State<AppState>,
    Query(query): Query<CodeQuery>,
) -> Result<Json<CodeResponse>> {
    let username = query
        .username
        .filter(|username| !username.is_empty())
        .ok_or(ServerError::MissingUsername)?;

    let now = store::unix_ms()?;
    let code = mfa::derive_code(&state.keys.mfa, &username, now)?;
    state
        .mfa
        .insert(&username, MfaChallenge::new(&username, code.clone(), now), now);

    Ok(Json(CodeResponse {
        code,
        message: "MFA code generated for demo purposes".to_owned(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::*;
    use axum::http::{Method, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::json;

    async fn fetch_code(state: &AppState, username: &str) -> String {
        let response = make_request(
            app(state.clone()),
            Method::GET,
            &format!("/mfa/code?username={username}"),
            String::new(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: CodeResponse = serde_json::from_slice(&body).unwrap();
        body.code
    }

    async fn verify_code(
        state: &AppState,
        username: &str,
        code: &str,
        token: &str,
    ) -> axum::http::Response<axum::body::Body> {
        make_request(
            app(state.clone()),
            Method::POST,
            "/mfa/verify",
            json!({ "username": username, "code": code, "token": token }).to_string(),
        )
        .await
    }

    fn intermediate_token(state: &AppState, username: &str) -> String {
        state
            .token
            .intermediate(username, store::unix_ms().unwrap())
            .unwrap()
    }

    #[tokio::test]
    async fn test_correct_code_mints_session_token() {
        let state = router::state();
        let token = intermediate_token(&state, "bob");
        let code = fetch_code(&state, "bob").await;

        let response = verify_code(&state, "bob", &code, &token).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: VerifyResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.message, "Login successful");
        assert_eq!(body.redirect_to, "/dashboard");

        let claims = state.token.decode(&body.session_token).unwrap();
        assert_eq!(claims.username, "bob");
        assert!(claims.authenticated);
        assert!(claims.mfa_verified);

        // the challenge was consumed.
        let now = store::unix_ms().unwrap();
        assert_eq!(state.mfa.get("bob", now).found(), None);
    }

    #[tokio::test]
    async fn test_code_comparison_ignores_case() {
        let state = router::state();
        let token = intermediate_token(&state, "bob");
        let code = fetch_code(&state, "bob").await;

        let response = verify_code(&state, "bob", &code.to_lowercase(), &token).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_invalid_token_is_unauthorized() {
        let state = router::state();

        let response = verify_code(&state, "bob", "000000", "not-a-token").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], "Invalid token");
    }

    #[tokio::test]
    async fn test_token_for_another_username_is_rejected() {
        let state = router::state();
        let token = intermediate_token(&state, "alice");

        let response = verify_code(&state, "bob", "000000", &token).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], "Token username mismatch");
    }

    #[tokio::test]
    async fn test_third_failure_locks_the_account() {
        let state = router::state();
        let token = intermediate_token(&state, "bob");
        let code = fetch_code(&state, "bob").await;
        let wrong = if code == "000000" { "111111" } else { "000000" };

        let response = verify_code(&state, "bob", wrong, &token).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], "Invalid MFA code. 2 attempts remaining.");
        assert_eq!(body["remainingAttempts"], 2);

        let response = verify_code(&state, "bob", wrong, &token).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["remainingAttempts"], 1);

        let response = verify_code(&state, "bob", wrong, &token).await;
        assert_eq!(response.status(), StatusCode::LOCKED);

        // even the correct code is rejected once locked.
        let response = verify_code(&state, "bob", &code, &token).await;
        assert_eq!(response.status(), StatusCode::LOCKED);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], "Account locked due to too many failed attempts");
    }

    #[tokio::test]
    async fn test_regenerating_the_code_clears_a_lockout() {
        let state = router::state();
        let token = intermediate_token(&state, "bob");
        fetch_code(&state, "bob").await;

        for _ in 0..3 {
            verify_code(&state, "bob", "WRONG0", &token).await;
        }
        let response = verify_code(&state, "bob", "WRONG0", &token).await;
        assert_eq!(response.status(), StatusCode::LOCKED);

        // the demo endpoint resets the attempt counter.
        let code = fetch_code(&state, "bob").await;
        let response = verify_code(&state, "bob", &code, &token).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_code_endpoint_requires_username() {
        // absent and empty parameters are both rejected.
        for path in ["/mfa/code", "/mfa/code?username="] {
            let response =
                make_request(app(router::state()), Method::GET, path, String::new()).await;

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);

            let body = response.into_body().collect().await.unwrap().to_bytes();
            let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(body["error"], "Username required");
        }
    }

    #[tokio::test]
    async fn test_missing_fields_are_rejected() {
        let state = router::state();

        let response = make_request(
            app(state),
            Method::POST,
            "/mfa/verify",
            json!({ "username": "bob", "code": "", "token": "" }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], "Username, code, and token are required");
    }
}
