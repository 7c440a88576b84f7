//! # Sage Headers
//!
//! Tower middleware that hardens HTTP responses:
//!
//! - **Transport**: redirects plaintext requests to https (`301`/`302`)
//! - **Headers**: Feature-Policy, X-Frame-Options, Strict-Transport-Security,
//!   Referrer-Policy, Content-Security-Policy, X-Content-Type-Options
//! - **Cookies**: appends `secure` / `httponly` to every `Set-Cookie`
//! - **CSP nonces**: optional per-request nonce, exposed to handlers
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  PolicyOptions (plain data, serde, env via Config)          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  SecurityPolicy (validated once, header values pre-encoded) │
//! ├─────────────────────────────────────────────────────────────┤
//! │  SageLayer / SageService (tower, shares Arc<SecurityPolicy>)│
//! ├─────────────────────────────────────────────────────────────┤
//! │  Inner service (axum Router, any Service<Request<Body>>)    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use axum::{Router, routing::get};
//! use sage_headers::{DirectiveMap, PolicyOptions, SageLayer};
//!
//! # fn main() -> anyhow::Result<()> {
//! let layer = SageLayer::new(PolicyOptions {
//!     frame_options: Some("DENY".to_string()),
//!     content_security_policy: DirectiveMap::new()
//!         .with("default-src", "'self'")
//!         .with("img-src", ["'self'", "data:"]),
//!     ..PolicyOptions::default()
//! })?;
//!
//! let app: Router = Router::new()
//!     .route("/", get(|| async { "ok" }))
//!     .layer(layer);
//! # Ok(())
//! # }
//! ```
//!
//! Invalid options (for example `frame_options: Some("ALL")`) fail in
//! `SageLayer::new`, never on a request.

pub mod config;
pub mod error;
pub mod middleware;
pub mod policy;
pub mod routes;
pub mod utils;
pub mod validation;

// Re-exports for convenience
pub use config::Config;
pub use error::{SageError, SageResult};
pub use middleware::{RequestScheme, SageLayer, SageService};
pub use policy::{
    Allowlist, ContentSecurityPolicy, CspNonce, DirectiveMap, FrameOptions, PolicyOptions,
    SecurityPolicy,
};
pub use routes::build_router;
