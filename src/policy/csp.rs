//! Content-Security-Policy rendering, including per-request nonces.

use std::borrow::Cow;
use std::fmt;

use axum::http::header::{CONTENT_SECURITY_POLICY, CONTENT_SECURITY_POLICY_REPORT_ONLY};
use axum::http::{HeaderName, HeaderValue};
use rand::RngCore;
use tracing::warn;

use super::directives::join_directives;
use super::{PolicyOptions, encode};
use crate::error::{SageError, SageResult};
use crate::validation::{validate_directive_name, validate_source};

/// Number of random bytes in a nonce (hex encoded to twice as many chars).
const NONCE_BYTES: usize = 16;

/// Per-request CSP nonce.
///
/// Inserted into request extensions before the inner service runs, so
/// handlers can stamp it on inline `<script nonce="...">` tags:
///
/// ```rust,ignore
/// async fn page(nonce: Option<Extension<CspNonce>>) -> Html<String> {
///     let nonce = nonce.map(|Extension(n)| n.to_string()).unwrap_or_default();
///     Html(format!(r#"<script nonce="{nonce}">boot()</script>"#))
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CspNonce(String);

impl CspNonce {
    /// Generate a fresh nonce from the thread-local CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        Self(bytes.iter().map(|b| format!("{b:02x}")).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Same shape as a generated nonce, used to size-check the policy.
    fn placeholder() -> Self {
        Self("0".repeat(NONCE_BYTES * 2))
    }
}

impl fmt::Display for CspNonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pre-rendered Content-Security-Policy.
#[derive(Debug, Clone)]
pub struct ContentSecurityPolicy {
    header_name: HeaderName,
    legacy_header: bool,
    /// `(directive, rendered allowlist)` in configuration order.
    directives: Vec<(String, String)>,
    nonce_in: Vec<String>,
    report_uri: Option<String>,
    /// The policy without nonces.
    rendered: HeaderValue,
}

impl ContentSecurityPolicy {
    /// Build from options. `Ok(None)` when no directives are configured.
    pub(crate) fn new(options: &PolicyOptions) -> SageResult<Option<Self>> {
        let map = &options.content_security_policy;
        map.validate("content_security_policy")?;
        let nonce_in = nonce_directives(&options.content_security_policy_nonce_in)?;
        if let Some(uri) = &options.content_security_policy_report_uri {
            validate_source("content_security_policy_report_uri", uri)?;
        }

        if map.is_empty() {
            return Ok(None);
        }

        let header_name = if options.content_security_policy_report_only {
            CONTENT_SECURITY_POLICY_REPORT_ONLY
        } else {
            CONTENT_SECURITY_POLICY
        };

        let mut csp = Self {
            header_name,
            legacy_header: options.legacy_content_security_policy_header,
            directives: map.render_directives(),
            nonce_in,
            report_uri: options.content_security_policy_report_uri.clone(),
            rendered: HeaderValue::from_static(""),
        };
        csp.rendered = encode("content_security_policy", csp.render(None))?;
        if csp.uses_nonce() {
            encode(
                "content_security_policy",
                csp.render(Some(&CspNonce::placeholder())),
            )?;
        }

        Ok(Some(csp))
    }

    /// `Content-Security-Policy`, or the report-only variant.
    pub fn header_name(&self) -> &HeaderName {
        &self.header_name
    }

    /// Whether the value is repeated under `X-Content-Security-Policy`.
    pub fn emits_legacy_header(&self) -> bool {
        self.legacy_header
    }

    pub fn uses_nonce(&self) -> bool {
        !self.nonce_in.is_empty()
    }

    /// Render the policy, adding `'nonce-{nonce}'` to every nonce directive.
    ///
    /// Nonce directives missing from the configured map are appended with the
    /// nonce as their only source. `report-uri` always comes last.
    pub fn render(&self, nonce: Option<&CspNonce>) -> String {
        let nonce_source = nonce
            .filter(|_| self.uses_nonce())
            .map(|n| format!("'nonce-{n}'"));

        let mut directives: Vec<(&str, Cow<'_, str>)> = self
            .directives
            .iter()
            .map(|(name, allowlist)| {
                let value = match &nonce_source {
                    Some(source) if self.nonce_in.contains(name) => {
                        if allowlist.is_empty() {
                            Cow::Borrowed(source.as_str())
                        } else {
                            Cow::Owned(format!("{allowlist} {source}"))
                        }
                    }
                    _ => Cow::Borrowed(allowlist.as_str()),
                };
                (name.as_str(), value)
            })
            .collect();

        if let Some(source) = &nonce_source {
            for directive in &self.nonce_in {
                if !self.directives.iter().any(|(name, _)| name == directive) {
                    directives.push((directive.as_str(), Cow::Borrowed(source.as_str())));
                }
            }
        }

        if let Some(uri) = &self.report_uri {
            directives.push(("report-uri", Cow::Borrowed(uri.as_str())));
        }

        join_directives(directives)
    }

    /// Header value for one response.
    pub(crate) fn header_value(&self, nonce: Option<&CspNonce>) -> HeaderValue {
        match nonce {
            Some(nonce) if self.uses_nonce() => HeaderValue::try_from(self.render(Some(nonce)))
                .unwrap_or_else(|e| {
                    warn!(error = %e, "CSP with nonce is not a valid header value, sending it without");
                    self.rendered.clone()
                }),
            _ => self.rendered.clone(),
        }
    }
}

/// Directives whose values are reporting endpoints, not source lists.
const REPORTING_DIRECTIVES: [&str; 2] = ["report-uri", "report-to"];

/// Validate nonce directive names and drop repeats, keeping first-seen order.
fn nonce_directives(directives: &[String]) -> SageResult<Vec<String>> {
    let mut unique: Vec<String> = Vec::with_capacity(directives.len());
    for directive in directives {
        validate_directive_name("content_security_policy_nonce_in", directive)?;
        if REPORTING_DIRECTIVES
            .iter()
            .any(|reporting| directive.eq_ignore_ascii_case(reporting))
        {
            return Err(SageError::invalid(
                "content_security_policy_nonce_in",
                directive.as_str(),
                "is a reporting directive and cannot carry a nonce",
            ));
        }
        if !unique.iter().any(|seen| seen.eq_ignore_ascii_case(directive)) {
            unique.push(directive.clone());
        }
    }
    Ok(unique)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::policy::DirectiveMap;

    fn build(options: PolicyOptions) -> ContentSecurityPolicy {
        ContentSecurityPolicy::new(&options).unwrap().unwrap()
    }

    #[test]
    fn test_empty_map_has_no_policy() {
        let options = PolicyOptions {
            content_security_policy: DirectiveMap::new(),
            ..PolicyOptions::default()
        };
        assert!(ContentSecurityPolicy::new(&options).unwrap().is_none());
    }

    #[test]
    fn test_render_without_nonce() {
        let csp = build(PolicyOptions {
            content_security_policy: DirectiveMap::new()
                .with("default-src", "*")
                .with("media-src", ["a.com", "b.com"]),
            ..PolicyOptions::default()
        });

        assert_eq!(csp.header_name(), CONTENT_SECURITY_POLICY);
        assert_eq!(
            csp.header_value(None),
            "default-src *; media-src a.com b.com"
        );
    }

    #[test]
    fn test_report_only_and_report_uri() {
        let csp = build(PolicyOptions {
            content_security_policy_report_only: true,
            content_security_policy_report_uri: Some("/csp-report".to_string()),
            ..PolicyOptions::default()
        });

        assert_eq!(csp.header_name(), CONTENT_SECURITY_POLICY_REPORT_ONLY);
        assert_eq!(
            csp.header_value(None),
            "default-src 'self'; report-uri /csp-report"
        );
    }

    #[test]
    fn test_render_with_nonce() {
        let csp = build(PolicyOptions {
            content_security_policy: DirectiveMap::new()
                .with("default-src", "'self'")
                .with("script-src", "'self'"),
            content_security_policy_nonce_in: vec!["script-src".to_string(), "style-src".to_string()],
            ..PolicyOptions::default()
        });
        let nonce = CspNonce("abc123".to_string());

        assert_eq!(
            csp.render(Some(&nonce)),
            "default-src 'self'; script-src 'self' 'nonce-abc123'; style-src 'nonce-abc123'"
        );
        // Without a nonce the extra directives are not added.
        assert_eq!(csp.render(None), "default-src 'self'; script-src 'self'");
    }

    #[test]
    fn test_nonce_ignored_without_nonce_directives() {
        let csp = build(PolicyOptions::default());
        let nonce = CspNonce::generate();
        assert_eq!(csp.header_value(Some(&nonce)), "default-src 'self'");
    }

    #[test]
    fn test_invalid_nonce_directive_rejected() {
        let options = PolicyOptions {
            content_security_policy_nonce_in: vec!["script src".to_string()],
            ..PolicyOptions::default()
        };
        assert!(ContentSecurityPolicy::new(&options).is_err());
    }

    #[test]
    fn test_repeated_nonce_directive_rendered_once() {
        let csp = build(PolicyOptions {
            content_security_policy_nonce_in: vec![
                "style-src".to_string(),
                "script-src".to_string(),
                "style-src".to_string(),
            ],
            ..PolicyOptions::default()
        });
        let nonce = CspNonce("abc123".to_string());

        assert_eq!(
            csp.render(Some(&nonce)),
            "default-src 'self'; style-src 'nonce-abc123'; script-src 'nonce-abc123'"
        );
    }

    #[test]
    fn test_reporting_directive_cannot_carry_nonce() {
        for directive in ["report-uri", "report-to", "Report-URI"] {
            let options = PolicyOptions {
                content_security_policy_nonce_in: vec![directive.to_string()],
                content_security_policy_report_uri: Some("/r".to_string()),
                ..PolicyOptions::default()
            };

            match ContentSecurityPolicy::new(&options) {
                Err(SageError::InvalidConfiguration { field, value, .. }) => {
                    assert_eq!(field, "content_security_policy_nonce_in");
                    assert_eq!(value, directive);
                }
                other => panic!("expected InvalidConfiguration for {directive}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_generated_nonces_differ() {
        let a = CspNonce::generate();
        let b = CspNonce::generate();

        assert_eq!(a.as_str().len(), NONCE_BYTES * 2);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
