//! Field paths inside a decoded value tree.
//!
//! Rendered as `.key` for object members and `[index]` for array elements, with no leading dot
//! at the root (the root itself is the empty path). Examples: `outer`, `obj.nested[2].value`,
//! `[0].payload`.

use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Route from the root of a value tree to one node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    pub fn root() -> Self {
        Self::default()
    }

    /// Path of the member `key` below this one.
    pub fn key(&self, key: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Key(key.to_string()));
        Self { segments }
    }

    /// Path of the element `index` below this one.
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Index(index));
        Self { segments }
    }

    /// Parse a rendered path back into segments. Returns None for malformed brackets.
    ///
    /// Keys containing `.` or `[` cannot be told apart from nested access; such paths parse
    /// into more segments than were rendered.
    pub fn parse(s: &str) -> Option<Self> {
        let mut segments = Vec::new();
        let mut rest = s;
        let mut first = true;
        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix('[') {
                let close = after.find(']')?;
                let index: usize = after[..close].parse().ok()?;
                segments.push(PathSegment::Index(index));
                rest = &after[close + 1..];
            } else {
                let body = if first {
                    rest
                } else {
                    rest.strip_prefix('.')?
                };
                let end = body.find(['.', '[']).unwrap_or(body.len());
                segments.push(PathSegment::Key(body[..end].to_string()));
                rest = &body[end..];
            }
            first = false;
        }
        Some(Self { segments })
    }

    /// Resolve this path against a tree.
    pub fn lookup<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(value, |node, segment| match segment {
                PathSegment::Key(k) => node.as_object()?.get(k),
                PathSegment::Index(i) => node.as_array()?.get(*i),
            })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Key(k) if i == 0 => write!(f, "{}", k)?,
                PathSegment::Key(k) => write!(f, ".{}", k)?,
                PathSegment::Index(idx) => write!(f, "[{}]", idx)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn root_renders_empty() {
        assert_eq!(FieldPath::root().to_string(), "");
        assert_eq!(FieldPath::parse(""), Some(FieldPath::root()));
    }

    #[test]
    fn mixed_segments_render() {
        let p = FieldPath::root().key("obj").key("nested").index(2).key("value");
        assert_eq!(p.to_string(), "obj.nested[2].value");
        let p = FieldPath::root().index(0).key("payload");
        assert_eq!(p.to_string(), "[0].payload");
        let p = FieldPath::root().index(1).index(3);
        assert_eq!(p.to_string(), "[1][3]");
    }

    #[test]
    fn parse_inverts_display() {
        for s in ["", "a", "a.b", "a[0]", "[0]", "[0].x[12].y", "a.b[1][2]"] {
            let p = FieldPath::parse(s).unwrap();
            assert_eq!(p.to_string(), s);
        }
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(FieldPath::parse("a[").is_none());
        assert!(FieldPath::parse("a[x]").is_none());
        assert!(FieldPath::parse("[0]b").is_none());
    }

    #[test]
    fn lookup_follows_keys_and_indices() {
        let v = json!({"obj": {"nested": [0, 1, {"value": "hit"}]}});
        let p = FieldPath::parse("obj.nested[2].value").unwrap();
        assert_eq!(p.lookup(&v), Some(&json!("hit")));
        assert_eq!(FieldPath::root().lookup(&v), Some(&v));
        assert!(FieldPath::parse("obj.missing").unwrap().lookup(&v).is_none());
        assert!(FieldPath::parse("obj[0]").unwrap().lookup(&v).is_none());
    }
}
