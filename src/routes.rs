//! Demo application routes with the security layer applied.
//!
//! # Middleware Stack
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │  Security Policy │ ← 301/302 to https, security headers, cookie flags
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │     Tracing      │ ← HTTP request/response logging
//! └────────┬─────────┘
//!          │
//!          ▼
//!      Handler
//! ```
//!
//! # Routes
//!
//! - `/` - Plain text, sets two cookies
//! - `/nonce` - Echoes the request's CSP nonce, if any
//! - `/health` - Liveness check

use std::sync::Arc;

use axum::Router;
use axum::extract::Extension;
use axum::http::header::SET_COOKIE;
use axum::response::{AppendHeaders, IntoResponse};
use axum::routing::get;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::middleware::SageLayer;
use crate::policy::{CspNonce, SecurityPolicy};

/// Build the demo router with the security layer outermost.
pub fn build_router(policy: Arc<SecurityPolicy>) -> Router {
    info!(
        force_https = policy.forces_https(),
        frame_options = ?policy.frame_options(),
        csp_nonce = policy.uses_nonce(),
        "Security policy layer configured"
    );

    Router::new()
        .route("/", get(index))
        .route("/nonce", get(nonce))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(SageLayer::from_policy(policy))
}

async fn index() -> impl IntoResponse {
    (
        AppendHeaders([
            (SET_COOKIE, "key=value; Path=/; SameSite=lax"),
            (SET_COOKIE, "key2=value2; Path=/; SameSite=lax"),
        ]),
        "ok",
    )
}

async fn nonce(nonce: Option<Extension<CspNonce>>) -> String {
    nonce.map(|Extension(n)| n.to_string()).unwrap_or_default()
}

async fn health() -> &'static str {
    "healthy"
}
