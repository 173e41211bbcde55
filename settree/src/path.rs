//! Path algebra over document addresses.
//!
//! A [`Path`] is an ordered list of [`Segment`]s that addresses a location in
//! the backing document and, in parallel, in the schema. String segments step
//! into object keys, index segments step into arrays.

use std::fmt;

/// Canonical delimiter used by [`Path`]'s `Display` implementation.
pub const PATH_DELIMITER: char = '.';

/// Delimiter used by path strings written inside schema directives.
///
/// `.` cannot be used there because `.` and `..` are relative-path sigils.
pub const DIRECTIVE_DELIMITER: char = '/';

/// Sigil for "same level as the current node".
pub const SAME_LEVEL: &str = ".";

/// Sigil for "one level up".
pub const LEVEL_UP: &str = "..";

/// Placeholder substituted by each entry index of a filtered link collection.
pub const FILTER_VARIABLE: &str = "<$>";

/// Placeholder substituted by a sibling id value in additional props.
pub const DYNAMIC_ID_VARIABLE: &str = "<&>";

/// One step of a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    /// Object key step.
    Key(String),
    /// Array index step.
    Index(usize),
}

impl Segment {
    /// Parse a single token, coercing all-digit tokens to indices.
    pub fn parse(token: &str) -> Self {
        if !token.is_empty()
            && token.bytes().all(|b| b.is_ascii_digit())
            && let Ok(idx) = token.parse::<usize>()
        {
            return Segment::Index(idx);
        }
        Segment::Key(token.to_string())
    }

    /// Returns the key if this is a key step.
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Segment::Key(k) => Some(k),
            Segment::Index(_) => None,
        }
    }

    /// Returns the index if this is an index step.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Segment::Index(i) => Some(*i),
            Segment::Key(_) => None,
        }
    }

    fn is_key(&self, key: &str) -> bool {
        self.as_key() == Some(key)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(k) => f.write_str(k),
            Segment::Index(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for Segment {
    fn from(value: &str) -> Self {
        Segment::Key(value.to_string())
    }
}

impl From<String> for Segment {
    fn from(value: String) -> Self {
        Segment::Key(value)
    }
}

impl From<usize> for Segment {
    fn from(value: usize) -> Self {
        Segment::Index(value)
    }
}

impl From<i32> for Segment {
    fn from(value: i32) -> Self {
        match usize::try_from(value) {
            Ok(idx) => Segment::Index(idx),
            Err(_) => Segment::Key(value.to_string()),
        }
    }
}

/// An address into the document and the schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path(Vec<Segment>);

/// Build a [`Path`] from a list of keys and indices.
///
/// ```
/// use settree::path;
/// let p = path!["items", 0, "name"];
/// assert_eq!(p.to_string(), "items.0.name");
/// ```
#[macro_export]
macro_rules! path {
    () => { $crate::path::Path::root() };
    ($($seg:expr),+ $(,)?) => {
        $crate::path::Path::from(vec![$($crate::path::Segment::from($seg)),+])
    };
}

impl Path {
    /// The empty path, addressing the document root.
    pub fn root() -> Self {
        Path(Vec::new())
    }

    /// Split `s` on `delimiter`, coercing numeric tokens to indices.
    ///
    /// The empty string parses to the root path.
    pub fn parse(s: &str, delimiter: char) -> Self {
        if s.is_empty() {
            return Path::root();
        }
        Path(s.split(delimiter).map(Segment::parse).collect())
    }

    /// Parse a `/`-delimited directive path. A leading `/` is accepted and
    /// ignored: directive paths without sigils are absolute anyway.
    pub fn parse_directive(s: &str) -> Self {
        Path::parse(
            s.strip_prefix(DIRECTIVE_DELIMITER).unwrap_or(s),
            DIRECTIVE_DELIMITER,
        )
    }

    /// Segments of this path.
    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&Segment> {
        self.0.last()
    }

    /// The parent path, or `None` for the root.
    pub fn parent(&self) -> Option<Path> {
        if self.0.is_empty() {
            None
        } else {
            Some(Path(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// A new path with `segment` appended.
    pub fn child(&self, segment: impl Into<Segment>) -> Path {
        let mut segs = self.0.clone();
        segs.push(segment.into());
        Path(segs)
    }

    /// A new path with all of `other`'s segments appended.
    pub fn join(&self, other: &Path) -> Path {
        let mut segs = self.0.clone();
        segs.extend(other.0.iter().cloned());
        Path(segs)
    }

    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Whether the first segment is a relative sigil.
    pub fn is_relative(&self) -> bool {
        self.0
            .first()
            .is_some_and(|s| s.is_key(SAME_LEVEL) || s.is_key(LEVEL_UP))
    }

    /// Resolve a relative path against the node at `current`.
    ///
    /// `.` splices `current` minus its last segment with the rest of the path,
    /// each leading `..` removes one more trailing segment. Paths without a
    /// leading sigil are already absolute and returned unchanged.
    pub fn expand_relative(&self, current: &Path) -> Path {
        match self.0.first() {
            Some(first) if first.is_key(SAME_LEVEL) => {
                let keep = current.len().saturating_sub(1);
                let mut segs = current.0[..keep].to_vec();
                segs.extend(self.0[1..].iter().cloned());
                Path(segs)
            }
            Some(first) if first.is_key(LEVEL_UP) => {
                let dir_ups = self.0.iter().take_while(|s| s.is_key(LEVEL_UP)).count();
                let keep = current.len().saturating_sub(1 + dir_ups);
                let mut segs = current.0[..keep].to_vec();
                segs.extend(self.0[dir_ups..].iter().cloned());
                Path(segs)
            }
            _ => self.clone(),
        }
    }

    /// Resolve a path relative to a container node.
    ///
    /// Plain paths are taken as descendants of `owner`; sigil paths are
    /// expanded as if written on one of `owner`'s children.
    pub fn resolve_from_owner(&self, owner: &Path) -> Path {
        if self.is_relative() {
            self.expand_relative(&owner.child(SAME_LEVEL))
        } else {
            owner.join(self)
        }
    }

    /// Index of the first segment equal to the key `marker`.
    pub fn position_of(&self, marker: &str) -> Option<usize> {
        self.0.iter().position(|s| s.is_key(marker))
    }

    pub fn contains_marker(&self, marker: &str) -> bool {
        self.position_of(marker).is_some()
    }

    /// Copy of this path with the segment at `index` replaced.
    pub fn replace_segment(&self, index: usize, segment: impl Into<Segment>) -> Path {
        let mut segs = self.0.clone();
        if let Some(slot) = segs.get_mut(index) {
            *slot = segment.into();
        }
        Path(segs)
    }

    /// The first `len` segments.
    pub fn prefix(&self, len: usize) -> Path {
        Path(self.0[..len.min(self.0.len())].to_vec())
    }

    /// Everything after the first `len` segments.
    pub fn suffix(&self, len: usize) -> Path {
        Path(self.0[len.min(self.0.len())..].to_vec())
    }

    /// Render with a custom delimiter.
    pub fn to_string_with(&self, delimiter: char) -> String {
        let mut out = String::new();
        for (i, seg) in self.0.iter().enumerate() {
            if i > 0 {
                out.push(delimiter);
            }
            out.push_str(&seg.to_string());
        }
        out
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_with(PATH_DELIMITER))
    }
}

impl From<Vec<Segment>> for Path {
    fn from(value: Vec<Segment>) -> Self {
        Path(value)
    }
}

impl FromIterator<Segment> for Path {
    fn from_iter<T: IntoIterator<Item = Segment>>(iter: T) -> Self {
        Path(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_coerces_indices() {
        let p = Path::parse("items.2.name", '.');
        assert_eq!(p, path!["items", 2, "name"]);
        assert_eq!(Path::parse("", '.'), Path::root());
        assert_eq!(Path::parse("a.-1", '.'), path!["a", "-1"]);
    }

    #[test]
    fn test_round_trip() {
        for p in [
            path![],
            path!["a"],
            path!["content", "categories", 3, "workflow", "statuses", 0],
            path![0, 1, "x"],
        ] {
            assert_eq!(Path::parse(&p.to_string(), PATH_DELIMITER), p);
        }
    }

    #[test]
    fn test_equality_is_pairwise() {
        assert_ne!(path!["a", "b"], path!["a"]);
        assert_ne!(path!["a", 0], path!["a", "0x"]);
        assert_eq!(path!["a", 0], Path::parse("a/0", '/'));
    }

    #[test]
    fn test_expand_same_level() {
        let current = path!["a", "b", "c"];
        assert_eq!(path![".", "x"].expand_relative(&current), path!["a", "b", "x"]);
    }

    #[test]
    fn test_expand_levels_up() {
        let current = path!["a", "b", "c", "d"];
        assert_eq!(
            path!["..", "..", "x"].expand_relative(&current),
            path!["a", "x"]
        );
        assert_eq!(path!["..", "x"].expand_relative(&current), path!["a", "b", "x"]);
    }

    #[test]
    fn test_expand_absolute_is_identity() {
        let p = path!["root", "x"];
        assert_eq!(p.expand_relative(&path!["a", "b"]), p);
    }

    #[test]
    fn test_resolve_from_owner() {
        let owner = path!["pages", 1];
        assert_eq!(
            path!["name"].resolve_from_owner(&owner),
            path!["pages", 1, "name"]
        );
        assert_eq!(
            path![".", "name"].resolve_from_owner(&owner),
            path!["pages", 1, "name"]
        );
        assert_eq!(
            path!["..", "shared"].resolve_from_owner(&owner),
            path!["pages", "shared"]
        );
    }

    #[test]
    fn test_markers() {
        let p = path!["a", FILTER_VARIABLE, "b"];
        assert_eq!(p.position_of(FILTER_VARIABLE), Some(1));
        assert_eq!(p.replace_segment(1, 4usize), path!["a", 4, "b"]);
        assert_eq!(p.prefix(1), path!["a"]);
        assert_eq!(p.suffix(2), path!["b"]);
    }

    #[test]
    fn test_directive_paths() {
        assert_eq!(Path::parse_directive("/tags/0"), path!["tags", 0]);
        assert_eq!(Path::parse_directive("../name"), path!["..", "name"]);
    }
}
