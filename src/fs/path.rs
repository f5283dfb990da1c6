use std::fmt;

use crate::vfs::{SEPARATOR, VirtualPath};

/// A virtual path inside one bucket
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct S3Path {
    bucket: String,
    path: VirtualPath,
}

impl S3Path {
    pub fn new(bucket: impl Into<String>, path: impl Into<VirtualPath>) -> Self {
        S3Path {
            bucket: bucket.into(),
            path: path.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn path(&self) -> &VirtualPath {
        &self.path
    }

    /// Object key this path addresses: the normalized absolute path
    /// without its leading separator. Root maps to the empty key.
    pub fn key(&self) -> String {
        let absolute = self.path.to_absolute_path();
        let normalized = absolute.normalize();
        normalized
            .as_str()
            .trim_start_matches(SEPARATOR)
            .to_string()
    }

    pub fn is_absolute(&self) -> bool {
        self.path.is_absolute()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name()
    }

    pub fn parent(&self) -> Option<S3Path> {
        self.path.parent().map(|parent| self.with_path(parent))
    }

    pub fn resolve(&self, other: impl Into<VirtualPath>) -> S3Path {
        self.with_path(self.path.resolve(&other.into()))
    }

    pub fn resolve_sibling(&self, other: impl Into<VirtualPath>) -> S3Path {
        self.with_path(self.path.resolve_sibling(&other.into()))
    }

    pub fn normalize(&self) -> S3Path {
        self.with_path(self.path.normalize().into_owned())
    }

    pub fn to_absolute_path(&self) -> S3Path {
        self.with_path(self.path.to_absolute_path())
    }

    pub fn starts_with(&self, other: &S3Path) -> bool {
        self.bucket == other.bucket && self.path.starts_with(&other.path)
    }

    pub fn ends_with(&self, other: &VirtualPath) -> bool {
        self.path.ends_with(other)
    }

    /// `s3://bucket/key`
    pub fn to_uri(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key())
    }

    fn with_path(&self, path: VirtualPath) -> S3Path {
        S3Path {
            bucket: self.bucket.clone(),
            path,
        }
    }
}

impl fmt::Display for S3Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}{}", self.bucket, self.path.to_absolute_path())
    }
}
