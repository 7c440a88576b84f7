//! Response-head transform: applies a [`SecurityPolicy`] to one response's
//! headers.
//!
//! # Order
//!
//! Headers are applied in a fixed order so responses are byte-for-byte
//! reproducible:
//!
//! ```text
//! 1. Feature-Policy
//! 2. X-Frame-Options
//! 3. Strict-Transport-Security
//! 4. Referrer-Policy
//! 5. Content-Security-Policy (+ X-Content-Security-Policy)
//! 6. Set-Cookie rewrite
//! 7. X-Content-Type-Options
//! 8. X-Download-Options
//! ```
//!
//! # Append Semantics
//!
//! Policy headers are appended, never inserted: a value already set by the
//! application stays and the policy value is added next to it. `Set-Cookie`
//! is the only header rewritten in place, and only ever by appending
//! attributes.

use axum::http::header::{
    Entry, REFERRER_POLICY, SET_COOKIE, STRICT_TRANSPORT_SECURITY, X_CONTENT_TYPE_OPTIONS,
    X_FRAME_OPTIONS,
};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use tracing::warn;

use crate::policy::{CspNonce, SecurityPolicy};

/// `Feature-Policy` (not among the `http` crate constants).
pub const FEATURE_POLICY: HeaderName = HeaderName::from_static("feature-policy");

/// Pre-standard CSP header still read by some older browsers.
pub const X_CONTENT_SECURITY_POLICY: HeaderName =
    HeaderName::from_static("x-content-security-policy");

/// Stops older Internet Explorer versions from opening downloads in-site.
pub const X_DOWNLOAD_OPTIONS: HeaderName = HeaderName::from_static("x-download-options");

static NOSNIFF: HeaderValue = HeaderValue::from_static("nosniff");
static NOOPEN: HeaderValue = HeaderValue::from_static("noopen");

impl SecurityPolicy {
    /// Apply the policy to a response's headers without a CSP nonce.
    pub fn apply(&self, headers: &mut HeaderMap) {
        self.apply_with_nonce(headers, None);
    }

    /// Apply the policy to a response's headers.
    ///
    /// `nonce` is the value handed to the request's handlers; it is only used
    /// when the policy has nonce directives. Never fails: a cookie that can no
    /// longer be encoded after rewriting is logged and left as it was.
    pub fn apply_with_nonce(&self, headers: &mut HeaderMap, nonce: Option<&CspNonce>) {
        if let Some(value) = &self.feature_policy {
            headers.append(FEATURE_POLICY, value.clone());
        }

        if let Some(frame_options) = self.frame_options {
            headers.append(X_FRAME_OPTIONS, frame_options.header_value());
        }

        if let Some(value) = &self.strict_transport_security {
            headers.append(STRICT_TRANSPORT_SECURITY, value.clone());
        }

        if let Some(value) = &self.referrer_policy {
            headers.append(REFERRER_POLICY, value.clone());
        }

        if let Some(csp) = &self.content_security_policy {
            let value = csp.header_value(nonce);
            if csp.emits_legacy_header() {
                headers.append(X_CONTENT_SECURITY_POLICY, value.clone());
            }
            headers.append(csp.header_name().clone(), value);
        }

        if let Some(suffix) = &self.cookie_suffix {
            secure_cookies(headers, suffix);
        }

        if self.content_type_nosniff {
            headers.append(X_CONTENT_TYPE_OPTIONS, NOSNIFF.clone());
        }

        if self.force_file_save {
            headers.append(X_DOWNLOAD_OPTIONS, NOOPEN.clone());
        }
    }
}

/// Append `suffix` to every `Set-Cookie` value, in place.
fn secure_cookies(headers: &mut HeaderMap, suffix: &[u8]) {
    let Entry::Occupied(mut cookies) = headers.entry(SET_COOKIE) else {
        return;
    };

    for cookie in cookies.iter_mut() {
        let mut bytes = Vec::with_capacity(cookie.len() + suffix.len());
        bytes.extend_from_slice(cookie.as_bytes());
        bytes.extend_from_slice(suffix);

        match HeaderValue::from_bytes(&bytes) {
            Ok(mut rewritten) => {
                rewritten.set_sensitive(cookie.is_sensitive());
                *cookie = rewritten;
            }
            Err(e) => warn!(error = %e, "Could not append attributes to Set-Cookie"),
        }
    }
}
