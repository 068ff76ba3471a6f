//! Dotted field paths.

use std::fmt;

use gcp_snippets_core::error::{GcpError, GcpResult};

/// A path to a field, possibly nested inside maps.
///
/// `favorites.color` addresses the `color` key of the `favorites` map. On the
/// wire, segments that are not simple identifiers are back-quoted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Build a path from literal segments; dots inside a segment are kept.
    pub fn new<I, S>(segments: I) -> GcpResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() || segments.iter().any(String::is_empty) {
            return Err(GcpError::Builder(
                "field path segments must be non-empty".into(),
            ));
        }
        Ok(Self { segments })
    }

    /// Parse a dotted path such as `address.city`.
    pub fn parse(dotted: &str) -> GcpResult<Self> {
        Self::new(dotted.split('.')).map_err(|_| {
            GcpError::Builder(format!("invalid field path '{dotted}'"))
        })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Path extended by one segment.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    /// Whether `self` equals `other` or addresses a field nested inside it.
    pub fn starts_with(&self, other: &FieldPath) -> bool {
        self.segments.len() >= other.segments.len()
            && self.segments[..other.segments.len()] == other.segments[..]
    }

    /// Wire form, with non-identifier segments quoted in back-quotes.
    pub fn to_wire(&self) -> String {
        self.segments
            .iter()
            .map(|s| quote_segment(s))
            .collect::<Vec<_>>()
            .join(".")
    }
}

fn is_simple_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn quote_segment(segment: &str) -> String {
    if is_simple_segment(segment) {
        return segment.to_string();
    }
    let escaped = segment.replace('\\', "\\\\").replace('`', "\\`");
    format!("`{escaped}`")
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

impl TryFrom<&str> for FieldPath {
    type Error = GcpError;

    fn try_from(dotted: &str) -> GcpResult<Self> {
        Self::parse(dotted)
    }
}
