//! Construction-time validation of policy strings.
//!
//! Everything that ends up inside a response header is checked here, once,
//! when a [`SecurityPolicy`](crate::SecurityPolicy) is built. Requests never
//! re-validate.

use crate::error::{SageError, SageResult};

// =============================================================================
// Validation Constants
// =============================================================================

/// Maximum length for a directive name (`default-src`, `geolocation`, ...).
pub const MAX_DIRECTIVE_NAME_LENGTH: usize = 64;

/// Maximum length for a single rendered header value.
///
/// Proxies commonly reject header lines above 8KB.
pub const MAX_HEADER_VALUE_LENGTH: usize = 8 * 1024;

/// Validate a Feature-Policy or Content-Security-Policy directive name.
///
/// Rules:
/// - Must be between 1 and 64 characters
/// - Must start with an ASCII letter
/// - Can contain ASCII letters, digits and hyphens
pub fn validate_directive_name(field: &'static str, name: &str) -> SageResult<()> {
    if name.is_empty() {
        return Err(SageError::invalid(field, name, "directive name cannot be empty"));
    }

    if name.len() > MAX_DIRECTIVE_NAME_LENGTH {
        return Err(SageError::invalid(
            field,
            name,
            format!("directive name cannot exceed {MAX_DIRECTIVE_NAME_LENGTH} characters"),
        ));
    }

    if !name.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
        return Err(SageError::invalid(
            field,
            name,
            "directive name must start with an ASCII letter",
        ));
    }

    if let Some((pos, c)) = name
        .char_indices()
        .find(|(_, c)| !c.is_ascii_alphanumeric() && *c != '-')
    {
        return Err(SageError::invalid(
            field,
            name,
            format!(
                "directive name contains invalid character {c:?} at position {pos}. \
                 Only ASCII letters, digits and hyphens are allowed"
            ),
        ));
    }

    Ok(())
}

/// Validate one allowlist source of a directive.
///
/// Sources are rendered verbatim after the directive name, so they may not
/// contain the directive separator `;` or `,`, nor anything that cannot appear
/// in a header value.
pub fn validate_source(field: &'static str, source: &str) -> SageResult<()> {
    if let Some(c) = source.chars().find(|c| *c == ';' || *c == ',') {
        return Err(SageError::invalid(
            field,
            source,
            format!("allowlist source cannot contain {c:?}"),
        ));
    }

    validate_header_text(field, source)
}

/// Validate free text that is emitted as (part of) a header value.
///
/// Rules:
/// - At most 8KB
/// - Visible ASCII and spaces only (no control characters, no tabs)
pub fn validate_header_text(field: &'static str, value: &str) -> SageResult<()> {
    if value.len() > MAX_HEADER_VALUE_LENGTH {
        return Err(SageError::invalid(
            field,
            truncate_for_display(value),
            format!("value cannot exceed {MAX_HEADER_VALUE_LENGTH} bytes"),
        ));
    }

    if let Some(pos) = value.chars().position(|c| !(c == ' ' || c.is_ascii_graphic())) {
        return Err(SageError::invalid(
            field,
            value,
            format!("value contains a non-printable or non-ASCII character at position {pos}"),
        ));
    }

    Ok(())
}

fn truncate_for_display(value: &str) -> String {
    value.chars().take(32).chain("...".chars()).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_directive_names() {
        assert!(validate_directive_name("csp", "default-src").is_ok());
        assert!(validate_directive_name("csp", "upgrade-insecure-requests").is_ok());
        assert!(validate_directive_name("feature_policy", "geolocation").is_ok());
        assert!(validate_directive_name("feature_policy", "usb").is_ok());
    }

    #[test]
    fn test_empty_directive_name() {
        let result = validate_directive_name("csp", "");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("cannot be empty"));
    }

    #[test]
    fn test_directive_name_too_long() {
        let long_name = "a".repeat(65);
        let result = validate_directive_name("csp", &long_name);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("cannot exceed"));
    }

    #[test]
    fn test_directive_name_with_colon() {
        // "default-src:" is a common typo carried over from other config formats.
        let result = validate_directive_name("csp", "default-src:");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("invalid character"));
    }

    #[test]
    fn test_directive_name_must_start_with_letter() {
        let result = validate_directive_name("csp", "-src");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("must start with"));
    }

    #[test]
    fn test_valid_sources() {
        assert!(validate_source("csp", "'self'").is_ok());
        assert!(validate_source("csp", "*").is_ok());
        assert!(validate_source("csp", "https://cdn.example.com").is_ok());
        assert!(validate_source("csp", "'self' data:").is_ok());
        assert!(validate_source("csp", "").is_ok());
    }

    #[test]
    fn test_source_with_separator() {
        let result = validate_source("csp", "'self'; script-src *");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("cannot contain"));

        assert!(validate_source("csp", "a.com,b.com").is_err());
    }

    #[test]
    fn test_header_text_control_characters() {
        let result = validate_header_text("referrer_policy", "no-referrer\r\nX-Evil: 1");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("non-printable"));
    }

    #[test]
    fn test_header_text_non_ascii() {
        assert!(validate_header_text("referrer_policy", "no-référrer").is_err());
    }

    #[test]
    fn test_header_text_too_long() {
        let long_value = "a".repeat(MAX_HEADER_VALUE_LENGTH + 1);
        let result = validate_header_text("csp", &long_value);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("cannot exceed"));
    }
}
