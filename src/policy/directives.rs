//! Ordered directive maps for Feature-Policy and Content-Security-Policy.
//!
//! A directive maps a name (`default-src`, `geolocation`) to an [`Allowlist`],
//! which is either a bare string rendered as-is or a list of sources rendered
//! space-separated:
//!
//! ```text
//! {"default-src": "*", "media-src": ["a.com", "b.com"]}
//!     → default-src *; media-src a.com b.com
//! ```
//!
//! Maps keep insertion order, including when deserialized, so the rendered
//! header is deterministic.

use std::borrow::Cow;
use std::fmt;

use serde::Deserialize;
use serde::de::{MapAccess, Visitor};

use crate::error::SageResult;
use crate::validation::{validate_directive_name, validate_source};

/// Sources allowed for a single directive.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Allowlist {
    /// Rendered verbatim, e.g. `"'self' data:"`.
    Single(String),
    /// Rendered joined with a single space.
    Many(Vec<String>),
}

impl Allowlist {
    /// Render the allowlist as it appears after the directive name.
    pub fn render(&self) -> Cow<'_, str> {
        match self {
            Allowlist::Single(source) => Cow::Borrowed(source.as_str()),
            Allowlist::Many(sources) => Cow::Owned(sources.join(" ")),
        }
    }

    fn sources(&self) -> impl Iterator<Item = &str> {
        let (single, many) = match self {
            Allowlist::Single(source) => (Some(source.as_str()), &[][..]),
            Allowlist::Many(sources) => (None, sources.as_slice()),
        };
        single.into_iter().chain(many.iter().map(String::as_str))
    }
}

impl From<&str> for Allowlist {
    fn from(source: &str) -> Self {
        Allowlist::Single(source.to_string())
    }
}

impl From<String> for Allowlist {
    fn from(source: String) -> Self {
        Allowlist::Single(source)
    }
}

impl From<Vec<String>> for Allowlist {
    fn from(sources: Vec<String>) -> Self {
        Allowlist::Many(sources)
    }
}

impl From<Vec<&str>> for Allowlist {
    fn from(sources: Vec<&str>) -> Self {
        Allowlist::Many(sources.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Allowlist {
    fn from(sources: [&str; N]) -> Self {
        Allowlist::Many(sources.iter().map(|s| (*s).to_string()).collect())
    }
}

/// Insertion-ordered mapping of directive name to [`Allowlist`].
///
/// An empty map is the "no policy" value: the corresponding header is omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectiveMap {
    entries: Vec<(String, Allowlist)>,
}

impl DirectiveMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directive, builder style.
    ///
    /// ```
    /// use sage_headers::DirectiveMap;
    ///
    /// let csp = DirectiveMap::new()
    ///     .with("default-src", "'self'")
    ///     .with("img-src", ["'self'", "data:"]);
    /// assert_eq!(csp.len(), 2);
    /// ```
    pub fn with(mut self, directive: impl Into<String>, allowlist: impl Into<Allowlist>) -> Self {
        self.insert(directive, allowlist);
        self
    }

    /// Insert a directive. An existing directive of the same name keeps its
    /// position and has its allowlist replaced.
    pub fn insert(&mut self, directive: impl Into<String>, allowlist: impl Into<Allowlist>) {
        let directive = directive.into();
        let allowlist = allowlist.into();

        match self.entries.iter_mut().find(|(name, _)| *name == directive) {
            Some((_, existing)) => *existing = allowlist,
            None => self.entries.push((directive, allowlist)),
        }
    }

    /// Look up a directive's allowlist.
    pub fn get(&self, directive: &str) -> Option<&Allowlist> {
        self.entries
            .iter()
            .find(|(name, _)| name == directive)
            .map(|(_, allowlist)| allowlist)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterate directives in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Allowlist)> {
        self.entries
            .iter()
            .map(|(name, allowlist)| (name.as_str(), allowlist))
    }

    /// Check every directive name and source.
    ///
    /// # Errors
    ///
    /// Returns `SageError::InvalidConfiguration` tagged with `field` on the
    /// first invalid name or source.
    pub fn validate(&self, field: &'static str) -> SageResult<()> {
        for (name, allowlist) in &self.entries {
            validate_directive_name(field, name)?;
            for source in allowlist.sources() {
                validate_source(field, source)?;
            }
        }
        Ok(())
    }

    /// Render each directive as `"{name} {allowlist}"`, in order.
    ///
    /// A directive with an empty allowlist renders as its bare name
    /// (`upgrade-insecure-requests`).
    pub fn render_directives(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .map(|(name, allowlist)| (name.clone(), allowlist.render().into_owned()))
            .collect()
    }

    /// Render the whole map as a header value, directives joined with `"; "`.
    pub fn render(&self) -> String {
        join_directives(
            self.entries
                .iter()
                .map(|(name, allowlist)| (name.as_str(), allowlist.render())),
        )
    }
}

/// Join `(name, allowlist)` pairs into `name allowlist; name allowlist`.
pub(crate) fn join_directives<'a, I, S>(directives: I) -> String
where
    I: IntoIterator<Item = (&'a str, S)>,
    S: AsRef<str>,
{
    let mut out = String::new();
    for (name, allowlist) in directives {
        if !out.is_empty() {
            out.push_str("; ");
        }
        out.push_str(name);
        let allowlist = allowlist.as_ref();
        if !allowlist.is_empty() {
            out.push(' ');
            out.push_str(allowlist);
        }
    }
    out
}

impl<K, V> FromIterator<(K, V)> for DirectiveMap
where
    K: Into<String>,
    V: Into<Allowlist>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = DirectiveMap::new();
        for (directive, allowlist) in iter {
            map.insert(directive, allowlist);
        }
        map
    }
}

impl<'de> Deserialize<'de> for DirectiveMap {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct DirectiveMapVisitor;

        impl<'de> Visitor<'de> for DirectiveMapVisitor {
            type Value = DirectiveMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of directive names to a string or a list of strings")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut map = DirectiveMap::new();
                while let Some((directive, allowlist)) =
                    access.next_entry::<String, Allowlist>()?
                {
                    map.insert(directive, allowlist);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(DirectiveMapVisitor)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_render_single_and_many() {
        let map = DirectiveMap::new()
            .with("default-src", "*")
            .with("media-src", ["a.com", "b.com"]);

        assert_eq!(map.render(), "default-src *; media-src a.com b.com");
    }

    #[test]
    fn test_render_empty_allowlist() {
        let map = DirectiveMap::new()
            .with("default-src", "'self'")
            .with("upgrade-insecure-requests", "");

        assert_eq!(map.render(), "default-src 'self'; upgrade-insecure-requests");
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut map = DirectiveMap::new().with("a-src", "1").with("b-src", "2");
        map.insert("a-src", "3");

        assert_eq!(map.len(), 2);
        assert_eq!(map.render(), "a-src 3; b-src 2");
    }

    #[test]
    fn test_deserialize_preserves_order() {
        let map: DirectiveMap =
            serde_json::from_str(r#"{"usb": "'self'", "geolocation": "*", "camera": ["a", "b"]}"#)
                .unwrap();

        let names: Vec<&str> = map.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["usb", "geolocation", "camera"]);
        assert_eq!(
            map.get("camera"),
            Some(&Allowlist::Many(vec!["a".to_string(), "b".to_string()]))
        );
    }

    #[test]
    fn test_deserialize_rejects_other_shapes() {
        assert!(serde_json::from_str::<DirectiveMap>(r#"{"usb": 1}"#).is_err());
        assert!(serde_json::from_str::<DirectiveMap>(r#"{"usb": {"a": "b"}}"#).is_err());
        assert!(serde_json::from_str::<DirectiveMap>(r#"{"usb": [1, 2]}"#).is_err());
        assert!(serde_json::from_str::<DirectiveMap>(r#"["usb"]"#).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_source() {
        let map = DirectiveMap::new().with("script-src", ["'self'", "evil; default-src *"]);
        let err = map.validate("content_security_policy").unwrap_err();
        assert!(err.to_string().contains("content_security_policy"));
    }

    #[test]
    fn test_from_iterator() {
        let map: DirectiveMap = [("geolocation", "*"), ("usb", "'self'")].into_iter().collect();
        assert_eq!(map.render(), "geolocation *; usb 'self'");
    }
}
