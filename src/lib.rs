//! Passgate is a demonstration multi-step login service: secure-word
//! challenge, password verification, then a time-boxed MFA code.

#![forbid(unsafe_code)]

mod mfa;
mod router;
mod secure_word;
mod token;

pub mod config;
pub mod error;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{Method, StatusCode, header};
use axum::routing::{get, post};
use axum::Router;
use error::ServerError;
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer,
};

/// MUST NEVER be used in production.
#[cfg(test)]
pub async fn make_request(
    app: Router,
    method: Method,
    path: &str,
    body: String,
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;
    use tower::util::ServiceExt;

    app.oneshot(
        Request::builder()
            .method(method)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from(body))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Configuration>,
    pub keys: Arc<config::Keyring>,
    pub token: token::TokenManager,
    /// Issued challenge words, one per username, 60-second lifetime.
    pub secure_words: store::ExpiringStore<secure_word::SecureWordChallenge>,
    /// Pending MFA challenges with their attempt counters.
    pub mfa: store::ExpiringStore<mfa::MfaChallenge>,
    /// Last issuance timestamp per username, gating new challenge words.
    pub rate: store::ExpiringStore<u64>,
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .on_body_chunk(|chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                    tracing::trace!(size_bytes = chunk.len(), latency = ?latency, "sending body chunk")
                })
                .make_span_with(DefaultMakeSpan::new().include_headers(true).level(tracing::Level::INFO))
                .on_request(DefaultOnRequest::new())
                .on_response(DefaultOnResponse::new().include_headers(true).latency_unit(LatencyUnit::Micros)),
        )
        // Set a timeout.
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(10)))
        // Remove sensitive headers from trace.
        .layer(SetSensitiveHeadersLayer::new([header::AUTHORIZATION, header::COOKIE]))
        // Add CORS preflight support.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers(Any),
        );

    Router::new()
        // `GET /status.json` goes to `status`.
        .route("/status.json", get(router::status::status))
        // `POST /secure-word` issues a challenge word.
        .route("/secure-word", post(router::secure_word::handler))
        // `POST /login` verifies word and password, mints the intermediate token.
        .route("/login", post(router::login::handler))
        // `POST /mfa/verify` checks the one-time code, mints the session token.
        .route("/mfa/verify", post(router::mfa::verify))
        // `GET /mfa/code` is demo-only.
        .route("/mfa/code", get(router::mfa::code))
        .with_state(state)
        .layer(middleware)
}

/// Initialize the application state.
pub fn initialize_state() -> AppState {
    // read configuration file. let it in memory.
    let config = config::Configuration::default().read();

    let keys = Arc::new(config.keyring());
    let token = token::TokenManager::new(&keys.token);

    AppState {
        config,
        keys,
        token,
        secure_words: store::ExpiringStore::new(Duration::from_secs(
            secure_word::WORD_VALIDITY_SECS,
        )),
        mfa: store::ExpiringStore::new(mfa::CHALLENGE_TTL),
        rate: store::ExpiringStore::new(store::RATE_RECORD_TTL),
    }
}

/// Spawn the background sweep reclaiming expired store entries.
///
/// The sweep only frees memory; every lookup re-checks expiry on its own.
pub fn spawn_sweeper(state: &AppState) {
    let state = state.clone();

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(store::SWEEP_INTERVAL);
        loop {
            interval.tick().await;

            match store::unix_ms() {
                Ok(now) => {
                    state.secure_words.sweep(now);
                    state.mfa.sweep(now);
                    state.rate.sweep(now);
                }
                Err(err) => {
                    tracing::error!(error = %err, "system clock unavailable, sweep skipped")
                }
            }
        }
    });
}
