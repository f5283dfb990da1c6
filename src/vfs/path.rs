use std::borrow::Cow;
use std::fmt;

/// Separator between path segments
pub const SEPARATOR: char = '/';

const CURRENT_DIR: &str = ".";
const PARENT_DIR: &str = "..";

/// A slash-delimited path in the virtual filesystem.
///
/// The textual form is kept verbatim: construction never normalizes, and
/// every transformation returns a new value. The empty path and the root
/// path (`"/"`) are distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct VirtualPath {
    raw: String,
}

impl VirtualPath {
    /// Wrap a path string as-is
    pub fn parse(path: &str) -> Self {
        VirtualPath {
            raw: path.to_string(),
        }
    }

    /// The empty path
    pub fn empty() -> Self {
        VirtualPath { raw: String::new() }
    }

    /// The root path, a single separator
    pub fn root() -> Self {
        VirtualPath {
            raw: SEPARATOR.to_string(),
        }
    }

    /// Get the path as written
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Get the raw UTF-8 bytes of the path
    pub fn as_bytes(&self) -> &[u8] {
        self.raw.as_bytes()
    }

    /// Get the length of the path string in bytes
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Whether this is the empty path `""`
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Whether this is exactly `/`
    pub fn is_root(&self) -> bool {
        self.raw.len() == 1 && self.raw.starts_with(SEPARATOR)
    }

    /// Whether the path starts with the separator
    pub fn is_absolute(&self) -> bool {
        self.raw.starts_with(SEPARATOR)
    }

    /// Whether the path ends with the separator, as in `a/b/`
    pub fn has_trailing_separator(&self) -> bool {
        self.raw.ends_with(SEPARATOR)
    }

    /// Non-empty segment names, in order
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.raw.split(SEPARATOR).filter(|s| !s.is_empty())
    }

    /// Last segment name (filename)
    pub fn file_name(&self) -> Option<&str> {
        self.segments().last()
    }

    /// Append `other` to this path.
    ///
    /// An absolute `other` replaces this path entirely and an empty `other`
    /// leaves it unchanged.
    pub fn resolve(&self, other: &VirtualPath) -> VirtualPath {
        if other.is_absolute() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }

        let mut raw = String::with_capacity(self.raw.len() + other.raw.len() + 1);
        raw.push_str(&self.raw);
        if !self.has_trailing_separator() {
            raw.push(SEPARATOR);
        }
        raw.push_str(&other.raw);
        VirtualPath { raw }
    }

    /// Get the parent directory, including its trailing separator.
    ///
    /// The empty path and root have no parent. A relative single-segment
    /// path has no parent either.
    pub fn parent(&self) -> Option<VirtualPath> {
        if self.is_empty() || self.is_root() {
            return None;
        }

        let searched = if self.has_trailing_separator() {
            &self.raw[..self.raw.len() - 1]
        } else {
            &self.raw[..]
        };

        match searched.rfind(SEPARATOR) {
            Some(index) => Some(VirtualPath {
                raw: self.raw[..=index].to_string(),
            }),
            None if self.is_absolute() => Some(VirtualPath::root()),
            None => None,
        }
    }

    /// Resolve `other` against the parent of this path
    pub fn resolve_sibling(&self, other: &VirtualPath) -> VirtualPath {
        match self.parent() {
            Some(parent) => parent.resolve(other),
            None => other.clone(),
        }
    }

    /// Resolve this path against `cwd` unless it is already absolute.
    ///
    /// # Panics
    ///
    /// Panics if `cwd` is not absolute.
    pub fn to_absolute_path_from(&self, cwd: &VirtualPath) -> VirtualPath {
        assert!(
            cwd.is_absolute(),
            "working directory must be absolute, got {:?}",
            cwd.raw
        );
        if self.is_absolute() {
            self.clone()
        } else {
            cwd.resolve(self)
        }
    }

    /// Resolve this path against root unless it is already absolute
    pub fn to_absolute_path(&self) -> VirtualPath {
        self.to_absolute_path_from(&VirtualPath::root())
    }

    /// Lexically eliminate `.` segments and fold `..` into the segment
    /// before it.
    ///
    /// A `..` with nothing to cancel stays in place on a relative path and
    /// is dropped on an absolute one, since nothing sits above root. Empty
    /// segments are kept as they are, except that a `..` skips over them to
    /// the named segment it cancels and drops them with it: `a//..` becomes
    /// the empty path. Returns `Cow::Borrowed(self)` when nothing had to
    /// change.
    pub fn normalize(&self) -> Cow<'_, VirtualPath> {
        let (root, rest) = match self.raw.strip_prefix(SEPARATOR) {
            Some(rest) => (&self.raw[..1], rest),
            None => ("", &self.raw[..]),
        };

        // Each part is a segment plus its trailing separator, if any
        let mut parts: Vec<&str> = Vec::new();
        let mut mutated = false;

        for part in rest.split_inclusive(SEPARATOR) {
            match segment_name(part) {
                CURRENT_DIR => mutated = true,
                PARENT_DIR => {
                    let named = parts.iter().rposition(|p| !segment_name(p).is_empty());
                    match named {
                        Some(index) if segment_name(parts[index]) != PARENT_DIR => {
                            parts.truncate(index);
                            mutated = true;
                        }
                        None if !root.is_empty() => mutated = true,
                        _ => parts.push(part),
                    }
                }
                _ => parts.push(part),
            }
        }

        if !mutated {
            return Cow::Borrowed(self);
        }

        let mut raw = String::with_capacity(self.raw.len());
        raw.push_str(root);
        raw.extend(parts);
        Cow::Owned(VirtualPath { raw })
    }

    /// Whether `other` is a leading run of whole segments of this path.
    ///
    /// Both paths must agree on being absolute; `/ab` does not start with
    /// `/a`. Trailing separators are ignored.
    pub fn starts_with(&self, other: &VirtualPath) -> bool {
        if other.is_empty() {
            return self.is_empty();
        }
        if self.is_absolute() != other.is_absolute() {
            return false;
        }

        let mut mine = self.segments();
        other
            .segments()
            .all(|segment| mine.next() == Some(segment))
    }

    /// Whether `other` is a trailing run of whole segments of this path.
    ///
    /// An absolute `other` only matches a path with exactly the same
    /// segments.
    pub fn ends_with(&self, other: &VirtualPath) -> bool {
        if other.is_empty() {
            return self.is_empty();
        }

        let mine: Vec<&str> = self.segments().collect();
        let theirs: Vec<&str> = other.segments().collect();

        if other.is_absolute() {
            return self.is_absolute() && mine == theirs;
        }
        mine.ends_with(&theirs)
    }
}

fn segment_name(part: &str) -> &str {
    part.strip_suffix(SEPARATOR).unwrap_or(part)
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl AsRef<str> for VirtualPath {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

impl From<&str> for VirtualPath {
    fn from(path: &str) -> Self {
        VirtualPath::parse(path)
    }
}

impl From<String> for VirtualPath {
    fn from(raw: String) -> Self {
        VirtualPath { raw }
    }
}
