//! RFC 6901 JSON pointers used to address nodes of a data model tree.

use std::fmt;
use std::str::FromStr;

use crate::error::WorkflowError;

/// A parsed JSON pointer (`/a/b/0/c`).
///
/// The empty string addresses the document root. Segments are stored
/// unescaped (`~1` becomes `/`, `~0` becomes `~`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct JsonPointer {
    segments: Vec<String>,
}

impl JsonPointer {
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a pointer expression.
    pub fn compile(path: &str) -> Result<Self, WorkflowError> {
        if path.is_empty() {
            return Ok(Self::root());
        }
        let Some(rest) = path.strip_prefix('/') else {
            return Err(WorkflowError::InvalidPath {
                path: path.to_string(),
                reason: "pointer must be empty or start with '/'".to_string(),
            });
        };
        let segments = rest
            .split('/')
            .map(|raw| {
                unescape(raw).ok_or_else(|| WorkflowError::InvalidPath {
                    path: path.to_string(),
                    reason: format!("invalid escape in segment '{raw}'"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// The final segment, or `None` for the root pointer.
    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// The pointer to the parent node. The root is its own parent.
    pub fn head(&self) -> Self {
        let len = self.segments.len().saturating_sub(1);
        Self {
            segments: self.segments[..len].to_vec(),
        }
    }

    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }
}

/// Interpret a segment as an array index.
///
/// Only canonical decimal forms qualify: `"0"`, or digits without a
/// leading zero.
pub fn array_index(segment: &str) -> Option<usize> {
    let canonical = !segment.is_empty()
        && segment.bytes().all(|b| b.is_ascii_digit())
        && (segment == "0" || !segment.starts_with('0'));
    if canonical { segment.parse().ok() } else { None }
}

fn unescape(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '~' {
            match chars.next() {
                Some('0') => out.push('~'),
                Some('1') => out.push('/'),
                _ => return None,
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}

impl fmt::Display for JsonPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "/{}", segment.replace('~', "~0").replace('/', "~1"))?;
        }
        Ok(())
    }
}

impl FromStr for JsonPointer {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::compile(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_splits_segments() {
        let ptr = JsonPointer::compile("/a/b/0/c").unwrap();
        assert_eq!(ptr.segments(), ["a", "b", "0", "c"]);
        assert_eq!(ptr.last(), Some("c"));
        assert_eq!(ptr.head().to_string(), "/a/b/0");
    }

    #[test]
    fn empty_string_is_root() {
        let ptr = JsonPointer::compile("").unwrap();
        assert!(ptr.is_root());
        assert_eq!(ptr.last(), None);
        assert!(ptr.head().is_root());
        assert_eq!(ptr.to_string(), "");
    }

    #[test]
    fn escapes_are_decoded_and_reencoded() {
        let ptr = JsonPointer::compile("/a~1b/m~0n").unwrap();
        assert_eq!(ptr.segments(), ["a/b", "m~n"]);
        assert_eq!(ptr.to_string(), "/a~1b/m~0n");
    }

    #[test]
    fn rejects_relative_paths_and_bad_escapes() {
        assert!(JsonPointer::compile("a/b").is_err());
        assert!(JsonPointer::compile("/a~2").is_err());
        assert!(JsonPointer::compile("/a~").is_err());
    }

    #[test]
    fn array_index_accepts_canonical_numbers_only() {
        assert_eq!(array_index("0"), Some(0));
        assert_eq!(array_index("12"), Some(12));
        assert_eq!(array_index("012"), None);
        assert_eq!(array_index("-1"), None);
        assert_eq!(array_index("x"), None);
        assert_eq!(array_index(""), None);
    }
}
