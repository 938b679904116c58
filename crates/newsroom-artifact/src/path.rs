//! Document paths for addressing the hierarchical document tree
//!
//! Provides [`DocPath`], a typed sequence of segments such as
//! `newsroom/{project}/folders/{folder}/blocks/{block}`. Paths with an even
//! number of segments address documents; odd-length paths address
//! collections.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Path within the document tree
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DocPath(Vec<String>);

impl DocPath {
    /// Create new path from segments
    #[inline]
    #[must_use]
    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    /// Create path from a single segment
    #[inline]
    #[must_use]
    pub fn single(segment: impl Into<String>) -> Self {
        Self(vec![segment.into()])
    }

    /// Empty path (root)
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Get path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Get number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if path is empty (root)
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when the path addresses a document rather than a collection
    #[inline]
    #[must_use]
    pub fn is_document(&self) -> bool {
        !self.0.is_empty() && self.0.len() % 2 == 0
    }

    /// Get parent path (if not root)
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Get last segment (if not root)
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Append a segment, returning new path
    #[inline]
    #[must_use]
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut new = self.clone();
        new.0.push(segment.into());
        new
    }

    /// Extend with multiple segments
    #[inline]
    #[must_use]
    pub fn extend(&self, segments: &[impl AsRef<str>]) -> Self {
        let mut new = self.clone();
        for seg in segments {
            new.0.push(seg.as_ref().to_string());
        }
        new
    }

    /// Check if this path is a prefix of another
    #[inline]
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        if self.0.len() > other.0.len() {
            return false;
        }
        self.0 == other.0[..self.0.len()]
    }

    /// Segments of `other` below this path, if this path is its prefix
    #[must_use]
    pub fn relative_to<'a>(&self, other: &'a Self) -> Option<&'a [String]> {
        if self.is_prefix_of(other) {
            Some(&other.0[self.0.len()..])
        } else {
            None
        }
    }

    /// Re-root this path: replace the `from` prefix with `to`
    #[must_use]
    pub fn rebase(&self, from: &Self, to: &Self) -> Option<Self> {
        from.relative_to(self).map(|rest| to.extend(rest))
    }
}

impl Display for DocPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

impl FromStr for DocPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::root());
        }

        let segments: Vec<String> = s.split('/').map(String::from).collect();

        for (i, seg) in segments.iter().enumerate() {
            if seg.is_empty() {
                return Err(PathError::EmptySegment { position: i });
            }
            if seg.chars().any(char::is_control) {
                return Err(PathError::InvalidCharacter {
                    segment: seg.clone(),
                    position: i,
                });
            }
        }

        Ok(Self(segments))
    }
}

impl From<Vec<String>> for DocPath {
    fn from(segments: Vec<String>) -> Self {
        Self(segments)
    }
}

impl From<&str> for DocPath {
    fn from(s: &str) -> Self {
        s.parse().unwrap_or_else(|_| Self::single(s))
    }
}

/// Errors in path parsing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// Empty segment in path
    #[error("empty segment at position {position}")]
    EmptySegment { position: usize },

    /// Invalid character in segment
    #[error("invalid character in segment '{segment}' at position {position}")]
    InvalidCharacter { segment: String, position: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_roundtrip() {
        let path: DocPath = "newsroom/p1/folders/f1".parse().unwrap();
        assert_eq!(path.len(), 4);
        assert_eq!(path.to_string(), "newsroom/p1/folders/f1");
        assert!(path.is_document());
        assert!(!path.child("blocks").is_document());
    }

    #[test]
    fn parse_rejects_empty_segment() {
        let err = "a//b".parse::<DocPath>().unwrap_err();
        assert_eq!(err, PathError::EmptySegment { position: 1 });
    }

    #[test]
    fn prefix_and_relative() {
        let base = DocPath::from("newsroom/p/folders/f/blocks");
        let doc = base.child("b1").child("table-data").child("t");
        assert!(base.is_prefix_of(&doc));
        let rest = base.relative_to(&doc).unwrap();
        assert_eq!(rest, &["b1".to_string(), "table-data".to_string(), "t".to_string()]);
    }

    #[test]
    fn rebase_moves_subtree() {
        let from = DocPath::from("newsroom/p/folders/f/blocks");
        let to = DocPath::from("newsroom/p/folders/f/snapshots/s1/blocks");
        let doc = from.child("b1");
        assert_eq!(
            doc.rebase(&from, &to).unwrap().to_string(),
            "newsroom/p/folders/f/snapshots/s1/blocks/b1"
        );
        assert!(DocPath::from("other/x").rebase(&from, &to).is_none());
    }

    #[test]
    fn parent_of_root_is_none() {
        assert!(DocPath::root().parent().is_none());
        assert_eq!(DocPath::from("a/b").parent().unwrap(), DocPath::single("a"));
    }
}
