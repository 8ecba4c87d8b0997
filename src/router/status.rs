//! Public configuration page for front-end identification.

use std::env::var;

use axum::Json;
use serde::Serialize;

/// Structured configuration.
#[derive(Serialize)]
pub struct Status {
    version: String,
    name: String,
}

/// Public server status (configuration).
pub async fn status() -> Json<Status> {
    Json(Status {
        version: env!("CARGO_PKG_VERSION").into(),
        name: var("SERVER_NAME").unwrap_or_else(|_| env!("CARGO_CRATE_NAME").into()),
    })
}
