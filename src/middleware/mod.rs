//! Security header middleware.
//!
//! # Architecture
//!
//! ```text
//! Request ─▶ classify ──WebSocket──────────────────────────▶ inner ─▶ Response (untouched)
//!               │
//!             HTTP
//!               │
//!               ├─ force_https && !secure ─▶ 301/302 Location: https://...   (inner never runs)
//!               │
//!               └─▶ [CspNonce ext] ─▶ inner ─▶ SecurityPolicy::apply ─▶ Response
//! ```
//!
//! Only the response head is touched: headers are applied once the inner
//! service has produced status and headers, before any body bytes are polled.
//!
//! # Sharing
//!
//! The layer holds the policy behind an `Arc`; every service clone and every
//! request reads the same immutable instance. No locks are involved.

pub mod headers;
pub mod https;
pub mod protocol;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, Response};
use axum::response::IntoResponse;
use tower::{Layer, Service};
use tracing::debug;

use crate::error::SageResult;
use crate::policy::{CspNonce, PolicyOptions, SecurityPolicy};

pub use headers::{FEATURE_POLICY, X_CONTENT_SECURITY_POLICY, X_DOWNLOAD_OPTIONS};
pub use https::{RequestScheme, X_FORWARDED_PROTO, redirect_location, resolve_scheme};
pub use protocol::{ProtocolClass, classify};

/// Security header layer for Tower middleware stack.
///
/// # Example
///
/// ```rust,ignore
/// let layer = SageLayer::new(PolicyOptions {
///     frame_options: Some("DENY".to_string()),
///     ..PolicyOptions::default()
/// })?;
/// let app = Router::new()
///     .route("/", get(handler))
///     .layer(layer);
/// ```
///
/// # TLS Listeners
///
/// A server that terminates TLS itself receives origin-form URIs with no
/// scheme. With `force_https` enabled, every such request is redirected to
/// itself unless the listener marks it secure before this layer runs:
///
/// ```rust,ignore
/// let app = Router::new()
///     .route("/", get(handler))
///     .layer(layer)
///     .layer(MapRequestLayer::new(|mut req: Request<Body>| {
///         req.extensions_mut().insert(RequestScheme::Https);
///         req
///     }));
/// ```
///
/// Behind a proxy that terminates TLS, set `trust_forwarded_proto` instead.
#[derive(Debug, Clone)]
pub struct SageLayer {
    policy: Arc<SecurityPolicy>,
}

impl SageLayer {
    /// Validate options and create the layer.
    ///
    /// # Errors
    ///
    /// Returns `SageError::InvalidConfiguration` if the options are invalid;
    /// no layer exists in that case.
    pub fn new(options: PolicyOptions) -> SageResult<Self> {
        Ok(Self::from_policy(Arc::new(SecurityPolicy::new(options)?)))
    }

    /// Create a layer sharing an already built policy.
    pub fn from_policy(policy: Arc<SecurityPolicy>) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &SecurityPolicy {
        &self.policy
    }
}

impl<S> Layer<S> for SageLayer {
    type Service = SageService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SageService {
            inner,
            policy: self.policy.clone(),
        }
    }
}

/// Security header service wrapper.
#[derive(Debug, Clone)]
pub struct SageService<S> {
    inner: S,
    policy: Arc<SecurityPolicy>,
}

impl<S> Service<Request<Body>> for SageService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        if classify(&req) != ProtocolClass::Http {
            debug!(path = %req.uri().path(), "Passing WebSocket handshake through");
            return Box::pin(self.inner.call(req));
        }

        let policy = self.policy.clone();

        if policy.force_https && !resolve_scheme(&req, policy.trust_forwarded_proto).is_secure() {
            let response = match https::redirect_response(&req, policy.force_https_permanent) {
                Ok(response) => {
                    debug!(
                        path = %req.uri().path(),
                        status = %response.status(),
                        "Redirecting plaintext request to https"
                    );
                    response
                }
                Err(e) => e.into_response(),
            };
            return Box::pin(async move { Ok(response) });
        }

        let nonce = policy.uses_nonce().then(CspNonce::generate);
        if let Some(nonce) = &nonce {
            req.extensions_mut().insert(nonce.clone());
        }

        let future = self.inner.call(req);

        Box::pin(async move {
            let mut response = future.await?;
            policy.apply_with_nonce(response.headers_mut(), nonce.as_ref());
            Ok(response)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::SageError;

    #[test]
    fn test_layer_rejects_invalid_frame_options() {
        let result = SageLayer::new(PolicyOptions {
            frame_options: Some("ALL".to_string()),
            ..PolicyOptions::default()
        });
        assert!(matches!(result, Err(SageError::InvalidConfiguration { .. })));
    }

    #[test]
    fn test_layer_shares_policy() {
        let layer = SageLayer::new(PolicyOptions::default()).unwrap();
        let a = layer.layer(());
        let b = layer.layer(());
        assert!(Arc::ptr_eq(&a.policy, &b.policy));
    }
}
