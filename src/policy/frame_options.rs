use std::fmt;
use std::str::FromStr;

use axum::http::HeaderValue;

use crate::error::SageError;

/// Allowed `X-Frame-Options` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOptions {
    SameOrigin,
    Deny,
}

impl FrameOptions {
    /// Every accepted spelling, in the order reported by errors.
    pub const ALLOWED: [&'static str; 2] = ["SAMEORIGIN", "DENY"];

    pub fn as_str(self) -> &'static str {
        match self {
            FrameOptions::SameOrigin => "SAMEORIGIN",
            FrameOptions::Deny => "DENY",
        }
    }

    pub fn header_value(self) -> HeaderValue {
        HeaderValue::from_static(self.as_str())
    }
}

impl fmt::Display for FrameOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Matching is exact: `sameorigin` is rejected like any other unknown value.
impl FromStr for FrameOptions {
    type Err = SageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SAMEORIGIN" => Ok(FrameOptions::SameOrigin),
            "DENY" => Ok(FrameOptions::Deny),
            other => Err(SageError::invalid(
                "frame_options",
                other,
                format!("is invalid. Possible values: {:?}", Self::ALLOWED),
            )),
        }
    }
}
