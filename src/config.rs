//! Server configuration loaded from environment variables.
//!
//! The middleware itself is configured in code through [`PolicyOptions`];
//! this module only serves the bundled demo server, which maps environment
//! variables onto those options.
//!
//! # Server
//!
//! - `HOST` (default: `0.0.0.0`), `PORT` (default: `3000`)
//! - `RUST_LOG`: log filter (default: `info`)
//!
//! # Policy
//!
//! Booleans accept `true`/`false`. Directive maps are JSON objects.
//!
//! - `SAGE_FORCE_HTTPS` (default: `false` for local development)
//! - `SAGE_FORCE_HTTPS_PERMANENT`, `SAGE_TRUST_FORWARDED_PROTO`
//! - `SAGE_FRAME_OPTIONS`: `SAMEORIGIN`, `DENY`, or empty to disable
//! - `SAGE_HSTS`, `SAGE_HSTS_PRELOAD`, `SAGE_HSTS_INCLUDE_SUBDOMAINS`,
//!   `SAGE_HSTS_MAX_AGE`, `SAGE_HSTS_LEGACY_TOKEN`
//! - `SAGE_REFERRER_POLICY`: empty to disable
//! - `SAGE_FEATURE_POLICY`: e.g. `{"geolocation": "*", "usb": "'self'"}`
//! - `SAGE_CONTENT_SECURITY_POLICY`: e.g. `{"default-src": "'self'"}`
//! - `SAGE_CSP_NONCE_IN`: comma-separated directives, e.g. `script-src,style-src`
//! - `SAGE_CSP_REPORT_ONLY`, `SAGE_CSP_REPORT_URI`, `SAGE_LEGACY_CSP_HEADER`
//! - `SAGE_SESSION_COOKIE_SECURE`, `SAGE_SESSION_COOKIE_HTTP_ONLY`
//! - `SAGE_CONTENT_TYPE_NOSNIFF`, `SAGE_FORCE_FILE_SAVE`

use std::env;

use serde::de::DeserializeOwned;

use crate::error::{SageError, SageResult};
use crate::policy::PolicyOptions;

/// Demo server configuration.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.server_addr());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 3000)
    pub port: u16,

    /// Log level (e.g., "info", "debug", "trace")
    pub log_level: String,

    /// Options for the security policy applied to every route
    pub policy: PolicyOptions,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// # Errors
    ///
    /// Returns `SageError::Config` if any variable is set but unparseable
    /// (e.g., non-numeric PORT value, malformed JSON directive map).
    pub fn from_env() -> SageResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_source(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_source<F>(var: F) -> SageResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Source(var);
        let defaults = PolicyOptions::default();

        let policy = PolicyOptions {
            // Transport
            force_https: env.parse("SAGE_FORCE_HTTPS", false)?,
            force_https_permanent: env
                .parse("SAGE_FORCE_HTTPS_PERMANENT", defaults.force_https_permanent)?,
            trust_forwarded_proto: env
                .parse("SAGE_TRUST_FORWARDED_PROTO", defaults.trust_forwarded_proto)?,

            // Framing
            frame_options: env.optional("SAGE_FRAME_OPTIONS", defaults.frame_options),

            // HSTS
            strict_transport_security: env
                .parse("SAGE_HSTS", defaults.strict_transport_security)?,
            strict_transport_security_preload: env.parse(
                "SAGE_HSTS_PRELOAD",
                defaults.strict_transport_security_preload,
            )?,
            strict_transport_security_include_subdomains: env.parse(
                "SAGE_HSTS_INCLUDE_SUBDOMAINS",
                defaults.strict_transport_security_include_subdomains,
            )?,
            strict_transport_security_max_age: env.parse(
                "SAGE_HSTS_MAX_AGE",
                defaults.strict_transport_security_max_age,
            )?,
            strict_transport_security_legacy_token: env.parse(
                "SAGE_HSTS_LEGACY_TOKEN",
                defaults.strict_transport_security_legacy_token,
            )?,

            // Policies
            referrer_policy: env.optional("SAGE_REFERRER_POLICY", defaults.referrer_policy),
            feature_policy: env.json("SAGE_FEATURE_POLICY", defaults.feature_policy)?,
            content_security_policy: env
                .json("SAGE_CONTENT_SECURITY_POLICY", defaults.content_security_policy)?,
            content_security_policy_nonce_in: env
                .list("SAGE_CSP_NONCE_IN")
                .unwrap_or(defaults.content_security_policy_nonce_in),
            content_security_policy_report_only: env.parse(
                "SAGE_CSP_REPORT_ONLY",
                defaults.content_security_policy_report_only,
            )?,
            content_security_policy_report_uri: env.optional(
                "SAGE_CSP_REPORT_URI",
                defaults.content_security_policy_report_uri,
            ),
            legacy_content_security_policy_header: env.parse(
                "SAGE_LEGACY_CSP_HEADER",
                defaults.legacy_content_security_policy_header,
            )?,

            // Cookies and content handling
            session_cookie_secure: env
                .parse("SAGE_SESSION_COOKIE_SECURE", defaults.session_cookie_secure)?,
            session_cookie_http_only: env.parse(
                "SAGE_SESSION_COOKIE_HTTP_ONLY",
                defaults.session_cookie_http_only,
            )?,
            content_type_nosniff: env
                .parse("SAGE_CONTENT_TYPE_NOSNIFF", defaults.content_type_nosniff)?,
            force_file_save: env.parse("SAGE_FORCE_FILE_SAVE", defaults.force_file_save)?,
        };

        Ok(Self {
            host: env.get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: env.parse("PORT", 3000)?,
            log_level: env.get("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            policy,
        })
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Default configuration for testing and development.
///
/// HTTPS is not enforced so the server is usable on plain localhost.
impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            policy: PolicyOptions {
                force_https: false,
                ..PolicyOptions::default()
            },
        }
    }
}

/// Typed lookups over a variable source.
struct Source<F>(F);

impl<F> Source<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name)
    }

    /// Parse a variable into the specified type with a default value.
    fn parse<T>(&self, name: &str, default: T) -> SageResult<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(name) {
            Some(val) => val
                .trim()
                .parse()
                .map_err(|e| SageError::Config(format!("Invalid {name}: {e}"))),
            None => Ok(default),
        }
    }

    /// Unset keeps the default; set-but-empty disables.
    fn optional(&self, name: &str, default: Option<String>) -> Option<String> {
        match self.get(name) {
            Some(val) if val.trim().is_empty() => None,
            Some(val) => Some(val.trim().to_string()),
            None => default,
        }
    }

    /// Parse a JSON-valued variable.
    fn json<T: DeserializeOwned>(&self, name: &str, default: T) -> SageResult<T> {
        match self.get(name) {
            Some(val) if val.trim().is_empty() => Ok(default),
            Some(val) => serde_json::from_str(&val)
                .map_err(|e| SageError::Config(format!("Invalid {name}: {e}"))),
            None => Ok(default),
        }
    }

    /// Parse a comma-separated list, dropping empty elements.
    fn list(&self, name: &str) -> Option<Vec<String>> {
        self.get(name).map(|val| {
            val.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::policy::DirectiveMap;

    fn load(vars: &[(&str, &str)]) -> SageResult<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_source(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_empty_source_matches_default() {
        let config = load(&[]).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_server_addr_format() {
        let config = Config {
            host: "localhost".to_string(),
            port: 3000,
            ..Config::default()
        };

        assert_eq!(config.server_addr(), "localhost:3000");
    }

    #[test]
    fn test_invalid_port() {
        let result = load(&[("PORT", "not-a-port")]);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("PORT"));
    }

    #[test]
    fn test_policy_booleans() {
        let config = load(&[
            ("SAGE_FORCE_HTTPS", "true"),
            ("SAGE_FORCE_HTTPS_PERMANENT", "true"),
            ("SAGE_HSTS_PRELOAD", "true"),
            ("SAGE_CONTENT_TYPE_NOSNIFF", "false"),
        ])
        .unwrap();

        assert!(config.policy.force_https);
        assert!(config.policy.force_https_permanent);
        assert!(config.policy.strict_transport_security_preload);
        assert!(!config.policy.content_type_nosniff);
    }

    #[test]
    fn test_invalid_boolean() {
        let result = load(&[("SAGE_HSTS", "yes")]);
        assert!(result.unwrap_err().to_string().contains("SAGE_HSTS"));
    }

    #[test]
    fn test_empty_frame_options_disables() {
        let config = load(&[("SAGE_FRAME_OPTIONS", "")]).unwrap();
        assert!(config.policy.frame_options.is_none());

        let config = load(&[("SAGE_FRAME_OPTIONS", "DENY")]).unwrap();
        assert_eq!(config.policy.frame_options.as_deref(), Some("DENY"));
    }

    #[test]
    fn test_json_directive_maps() {
        let config = load(&[
            ("SAGE_FEATURE_POLICY", r#"{"geolocation": "*", "usb": "'self'"}"#),
            (
                "SAGE_CONTENT_SECURITY_POLICY",
                r#"{"default-src": "*", "media-src": ["a.com", "b.com"]}"#,
            ),
        ])
        .unwrap();

        assert_eq!(
            config.policy.feature_policy,
            DirectiveMap::new().with("geolocation", "*").with("usb", "'self'")
        );
        assert_eq!(
            config.policy.content_security_policy.render(),
            "default-src *; media-src a.com b.com"
        );
    }

    #[test]
    fn test_invalid_json_directive_map() {
        let result = load(&[("SAGE_CONTENT_SECURITY_POLICY", r#"{"default-src": 1}"#)]);
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("SAGE_CONTENT_SECURITY_POLICY")
        );
    }

    #[test]
    fn test_nonce_list() {
        let config = load(&[("SAGE_CSP_NONCE_IN", "script-src, style-src,")]).unwrap();
        assert_eq!(
            config.policy.content_security_policy_nonce_in,
            vec!["script-src".to_string(), "style-src".to_string()]
        );
    }
}
