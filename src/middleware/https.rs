//! HTTPS enforcement: scheme resolution and redirect construction.
//!
//! # Scheme Resolution
//!
//! Servers rarely see a scheme on the request URI, so the scheme is resolved
//! in this order:
//!
//! 1. A [`RequestScheme`] extension, inserted by whatever terminates TLS
//! 2. The request URI's scheme (absolute-form requests, HTTP/2 `:scheme`)
//! 3. `X-Forwarded-Proto`, only when the policy trusts it
//! 4. Otherwise plain `http`
//!
//! # Redirect Target
//!
//! `https://{host}{path}?{query}`. The host comes from the `Host` header, or
//! the URI authority for HTTP/2. The query string is preserved.

use axum::body::Body;
use axum::http::header::{HOST, LOCATION};
use axum::http::uri::Scheme;
use axum::http::{HeaderValue, Request, Response, StatusCode};

use crate::error::{SageError, SageResult};

/// Header set by TLS-terminating proxies with the client-facing scheme.
pub const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Scheme of the connection a request arrived on.
///
/// Insert as a request extension from a TLS listener to mark requests as
/// secure without relying on headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestScheme {
    Http,
    Https,
}

impl RequestScheme {
    pub fn is_secure(self) -> bool {
        self == RequestScheme::Https
    }

    fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("https") {
            RequestScheme::Https
        } else {
            RequestScheme::Http
        }
    }
}

/// Resolve the scheme a request was made with.
pub fn resolve_scheme<B>(req: &Request<B>, trust_forwarded_proto: bool) -> RequestScheme {
    if let Some(scheme) = req.extensions().get::<RequestScheme>() {
        return *scheme;
    }

    if let Some(scheme) = req.uri().scheme() {
        return if *scheme == Scheme::HTTPS {
            RequestScheme::Https
        } else {
            RequestScheme::Http
        };
    }

    if trust_forwarded_proto
        && let Some(proto) = req.headers().get(X_FORWARDED_PROTO)
        && let Ok(proto) = proto.to_str()
    {
        // A proxy chain may append; the first entry is the client-facing hop.
        let first = proto.split(',').next().unwrap_or_default();
        return RequestScheme::from_name(first);
    }

    RequestScheme::Http
}

/// Build the `https://` URL a plaintext request is redirected to.
///
/// # Errors
///
/// Returns `SageError::MissingHostForRedirect` if the request has neither a
/// usable `Host` header nor a URI authority.
pub fn redirect_location<B>(req: &Request<B>) -> SageResult<String> {
    let host = req
        .headers()
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .or_else(|| req.uri().authority().map(|a| a.as_str()))
        .ok_or_else(|| SageError::MissingHostForRedirect {
            path: req.uri().path().to_string(),
        })?;

    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    Ok(format!("https://{host}{path_and_query}"))
}

/// Build the redirect response: `301` if `permanent`, else `302`.
///
/// # Errors
///
/// Returns `SageError::MissingHostForRedirect` if no host is available or the
/// resulting location cannot be sent as a header.
pub fn redirect_response<B>(req: &Request<B>, permanent: bool) -> SageResult<Response<Body>> {
    let location = redirect_location(req)?;
    let location = HeaderValue::try_from(location).map_err(|_| {
        SageError::MissingHostForRedirect {
            path: req.uri().path().to_string(),
        }
    })?;

    let mut response = Response::new(Body::empty());
    *response.status_mut() = if permanent {
        StatusCode::MOVED_PERMANENTLY
    } else {
        StatusCode::FOUND
    };
    response.headers_mut().insert(LOCATION, location);

    Ok(response)
}
