//! Security policy: raw options and the validated, immutable policy built
//! from them.
//!
//! # Lifecycle
//!
//! ```text
//! PolicyOptions ──SecurityPolicy::new──▶ SecurityPolicy ──Arc──▶ SageLayer
//!   (plain data,        (validates,         (pre-rendered        (shared by
//!    serde, Default)     fails fast)          header values)       every request)
//! ```
//!
//! All header values are rendered and encoded once at construction; a request
//! only copies them into the response.

mod csp;
mod directives;
mod frame_options;

use axum::http::HeaderValue;
use serde::Deserialize;
use tracing::debug;

use crate::error::{SageError, SageResult};
use crate::validation::validate_header_text;

pub use csp::{ContentSecurityPolicy, CspNonce};
pub use directives::{Allowlist, DirectiveMap};
pub use frame_options::FrameOptions;

/// One year, the default `Strict-Transport-Security` max-age.
pub const ONE_YEAR_IN_SECS: u64 = 31_536_000;

/// Raw policy options, as supplied by the embedding application.
///
/// Every field is independently defaultable. `Default` returns a fresh value
/// on each call; the defaults are secure (HTTPS enforced, framing restricted,
/// cookies locked down).
///
/// # Example
///
/// ```rust
/// use sage_headers::{DirectiveMap, PolicyOptions, SecurityPolicy};
///
/// let options = PolicyOptions {
///     force_https: false,
///     feature_policy: DirectiveMap::new()
///         .with("geolocation", "*")
///         .with("usb", "'self'"),
///     ..PolicyOptions::default()
/// };
/// let policy = SecurityPolicy::new(options)?;
/// # Ok::<(), sage_headers::SageError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PolicyOptions {
    // =========================================================================
    // Transport
    // =========================================================================
    /// Redirect plaintext requests to https (default: true)
    pub force_https: bool,

    /// Use `301` instead of `302` for the https redirect (default: false)
    pub force_https_permanent: bool,

    /// Treat `X-Forwarded-Proto: https` as a secure request (default: false).
    /// Only enable behind a proxy that overwrites this header.
    pub trust_forwarded_proto: bool,

    // =========================================================================
    // Framing
    // =========================================================================
    /// `X-Frame-Options` value, `SAMEORIGIN` or `DENY` (default: `SAMEORIGIN`).
    /// `None` disables the header.
    pub frame_options: Option<String>,

    // =========================================================================
    // Strict-Transport-Security
    // =========================================================================
    /// Emit `Strict-Transport-Security` (default: true)
    pub strict_transport_security: bool,

    /// Append `; preload` (default: false)
    pub strict_transport_security_preload: bool,

    /// Append `; includeSubDomains` (default: false)
    pub strict_transport_security_include_subdomains: bool,

    /// max-age in seconds (default: one year)
    pub strict_transport_security_max_age: u64,

    /// Render max-age as `max_age:{n}` instead of `max-age={n}` (default: false).
    /// Only for clients pinned to the legacy wire format.
    pub strict_transport_security_legacy_token: bool,

    // =========================================================================
    // Policies
    // =========================================================================
    /// `Referrer-Policy` value (default: `strict-origin-when-cross-origin`)
    pub referrer_policy: Option<String>,

    /// `Feature-Policy` directives (default: empty, header omitted)
    pub feature_policy: DirectiveMap,

    /// `Content-Security-Policy` directives (default: `default-src 'self'`)
    pub content_security_policy: DirectiveMap,

    /// Directives that receive a per-request `'nonce-...'` source (default: none).
    /// Repeats are ignored; reporting directives are rejected.
    pub content_security_policy_nonce_in: Vec<String>,

    /// Emit `Content-Security-Policy-Report-Only` instead (default: false)
    pub content_security_policy_report_only: bool,

    /// Appended as a `report-uri` directive (default: none)
    pub content_security_policy_report_uri: Option<String>,

    /// Also emit the policy as `X-Content-Security-Policy` (default: true)
    pub legacy_content_security_policy_header: bool,

    // =========================================================================
    // Cookies and content handling
    // =========================================================================
    /// Append `; secure` to every `Set-Cookie` (default: true)
    pub session_cookie_secure: bool,

    /// Append `; httponly` to every `Set-Cookie` (default: true)
    pub session_cookie_http_only: bool,

    /// Emit `X-Content-Type-Options: nosniff` (default: true)
    pub content_type_nosniff: bool,

    /// Emit `X-Download-Options: noopen` (default: false)
    pub force_file_save: bool,
}

impl Default for PolicyOptions {
    fn default() -> Self {
        Self {
            // Transport
            force_https: true,
            force_https_permanent: false,
            trust_forwarded_proto: false,
            // Framing
            frame_options: Some(FrameOptions::SameOrigin.as_str().to_string()),
            // HSTS
            strict_transport_security: true,
            strict_transport_security_preload: false,
            strict_transport_security_include_subdomains: false,
            strict_transport_security_max_age: ONE_YEAR_IN_SECS,
            strict_transport_security_legacy_token: false,
            // Policies
            referrer_policy: Some("strict-origin-when-cross-origin".to_string()),
            feature_policy: DirectiveMap::new(),
            content_security_policy: DirectiveMap::new().with("default-src", "'self'"),
            content_security_policy_nonce_in: Vec::new(),
            content_security_policy_report_only: false,
            content_security_policy_report_uri: None,
            legacy_content_security_policy_header: true,
            // Cookies and content handling
            session_cookie_secure: true,
            session_cookie_http_only: true,
            content_type_nosniff: true,
            force_file_save: false,
        }
    }
}

impl PolicyOptions {
    /// Options with every header and redirect turned off.
    ///
    /// Useful as a base when only one or two headers are wanted.
    pub fn disabled() -> Self {
        Self {
            force_https: false,
            frame_options: None,
            strict_transport_security: false,
            referrer_policy: None,
            content_security_policy: DirectiveMap::new(),
            legacy_content_security_policy_header: false,
            session_cookie_secure: false,
            session_cookie_http_only: false,
            content_type_nosniff: false,
            ..Self::default()
        }
    }
}

/// Validated, immutable security policy.
///
/// Built once per layer and shared read-only across all requests.
#[derive(Debug, Clone)]
pub struct SecurityPolicy {
    pub(crate) force_https: bool,
    pub(crate) force_https_permanent: bool,
    pub(crate) trust_forwarded_proto: bool,
    pub(crate) feature_policy: Option<HeaderValue>,
    pub(crate) frame_options: Option<FrameOptions>,
    pub(crate) strict_transport_security: Option<HeaderValue>,
    pub(crate) referrer_policy: Option<HeaderValue>,
    pub(crate) content_security_policy: Option<ContentSecurityPolicy>,
    /// Pre-encoded `; secure; httponly` suffix, `None` when both are off.
    pub(crate) cookie_suffix: Option<Vec<u8>>,
    pub(crate) content_type_nosniff: bool,
    pub(crate) force_file_save: bool,
}

impl SecurityPolicy {
    /// Validate options and pre-render every header value.
    ///
    /// # Errors
    ///
    /// Returns `SageError::InvalidConfiguration` if:
    /// - `frame_options` is not `SAMEORIGIN` or `DENY`
    /// - a directive name or source is malformed
    /// - `content_security_policy_nonce_in` names `report-uri` or `report-to`
    /// - `referrer_policy` or `content_security_policy_report_uri` cannot be
    ///   sent as a header value
    pub fn new(options: PolicyOptions) -> SageResult<Self> {
        let frame_options = options
            .frame_options
            .as_deref()
            .map(str::parse::<FrameOptions>)
            .transpose()?;

        options.feature_policy.validate("feature_policy")?;
        let feature_policy = if options.feature_policy.is_empty() {
            None
        } else {
            Some(encode("feature_policy", options.feature_policy.render())?)
        };

        let strict_transport_security = options
            .strict_transport_security
            .then(|| encode("strict_transport_security", render_hsts(&options)))
            .transpose()?;

        let referrer_policy = match options.referrer_policy.as_deref() {
            Some(policy) => {
                validate_header_text("referrer_policy", policy)?;
                Some(encode("referrer_policy", policy.to_string())?)
            }
            None => None,
        };

        let content_security_policy = ContentSecurityPolicy::new(&options)?;

        let mut cookie_suffix = Vec::new();
        if options.session_cookie_secure {
            cookie_suffix.extend_from_slice(b"; secure");
        }
        if options.session_cookie_http_only {
            cookie_suffix.extend_from_slice(b"; httponly");
        }

        let policy = Self {
            force_https: options.force_https,
            force_https_permanent: options.force_https_permanent,
            trust_forwarded_proto: options.trust_forwarded_proto,
            feature_policy,
            frame_options,
            strict_transport_security,
            referrer_policy,
            content_security_policy,
            cookie_suffix: (!cookie_suffix.is_empty()).then_some(cookie_suffix),
            content_type_nosniff: options.content_type_nosniff,
            force_file_save: options.force_file_save,
        };

        debug!(?policy, "Security policy built");
        Ok(policy)
    }

    /// Whether plaintext requests are redirected to https.
    pub fn forces_https(&self) -> bool {
        self.force_https
    }

    pub fn frame_options(&self) -> Option<FrameOptions> {
        self.frame_options
    }

    pub fn content_security_policy(&self) -> Option<&ContentSecurityPolicy> {
        self.content_security_policy.as_ref()
    }

    /// Whether requests need a fresh CSP nonce.
    pub fn uses_nonce(&self) -> bool {
        self.content_security_policy
            .as_ref()
            .is_some_and(ContentSecurityPolicy::uses_nonce)
    }
}

impl TryFrom<PolicyOptions> for SecurityPolicy {
    type Error = SageError;

    fn try_from(options: PolicyOptions) -> SageResult<Self> {
        Self::new(options)
    }
}

fn render_hsts(options: &PolicyOptions) -> String {
    let max_age = options.strict_transport_security_max_age;
    let mut value = if options.strict_transport_security_legacy_token {
        format!("max_age:{max_age}")
    } else {
        format!("max-age={max_age}")
    };
    if options.strict_transport_security_preload {
        value.push_str("; preload");
    }
    if options.strict_transport_security_include_subdomains {
        value.push_str("; includeSubDomains");
    }
    value
}

/// Encode a rendered value, reporting failures against `field`.
pub(crate) fn encode(field: &'static str, value: String) -> SageResult<HeaderValue> {
    HeaderValue::try_from(value.as_str())
        .map_err(|e| SageError::invalid(field, value, format!("is not a valid header value: {e}")))
}
