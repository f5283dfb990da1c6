use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::path::S3Path;
use crate::error::{Error, Result};
use crate::s3::{ObjectMetadata, ObjectStore, RangeReader, WINDOW_SIZE};
use crate::vfs::{SEPARATOR, VirtualPath};

/// Read-only filesystem over a single bucket
pub struct S3FileSystem {
    bucket: String,
    store: Arc<dyn ObjectStore>,
    closed: AtomicBool,
}

impl S3FileSystem {
    /// Create an open filesystem over `bucket`
    pub fn new(bucket: impl Into<String>, store: Arc<dyn ObjectStore>) -> Self {
        S3FileSystem {
            bucket: bucket.into(),
            store,
            closed: AtomicBool::new(false),
        }
    }

    /// Get the bucket name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Get the `s3://bucket` URI of this filesystem
    pub fn uri(&self) -> String {
        format!("s3://{}", self.bucket)
    }

    /// Get the path separator, always `/`
    pub fn separator(&self) -> char {
        SEPARATOR
    }

    /// Always true, objects cannot be modified
    pub fn is_read_only(&self) -> bool {
        true
    }

    /// Whether `close` has not been called yet
    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(Error::Closed("filesystem"))
        }
    }

    /// Get the root path `/` of the bucket
    pub fn root(&self) -> S3Path {
        S3Path::new(self.bucket.clone(), VirtualPath::root())
    }

    /// Get a path in this bucket from its string form.
    ///
    /// The string is kept as-is; nothing is normalized or looked up.
    pub fn get_path(&self, path: &str) -> S3Path {
        S3Path::new(self.bucket.clone(), path)
    }

    /// Resolve `path` to the key it addresses in this bucket
    fn object_key(&self, path: &S3Path) -> Result<String> {
        self.ensure_open()?;
        if path.bucket() != self.bucket {
            return Err(Error::InvalidArgument(format!(
                "{} does not belong to {}",
                path,
                self.uri()
            )));
        }

        let key = path.key();
        if key.is_empty() {
            return Err(Error::InvalidArgument(format!("{} does not name an object", path)));
        }
        Ok(key)
    }

    /// Open a random-access reader over the object at `path`
    pub async fn open(&self, path: &S3Path) -> Result<RangeReader> {
        self.open_with_window_size(path, WINDOW_SIZE).await
    }

    /// Open a reader that fetches `window_size` bytes per window miss
    pub async fn open_with_window_size(&self, path: &S3Path, window_size: usize) -> Result<RangeReader> {
        let key = self.object_key(path)?;
        RangeReader::open_with_window_size(Arc::clone(&self.store), self.bucket.clone(), key, window_size)
            .await
    }

    /// Get the size of the object at `path`.
    ///
    /// Fails with `NotFound` if there is no such object.
    pub async fn metadata(&self, path: &S3Path) -> Result<ObjectMetadata> {
        let key = self.object_key(path)?;
        self.store.head_object(&self.bucket, &key).await
    }

    /// Whether an object exists at `path`
    pub async fn exists(&self, path: &S3Path) -> Result<bool> {
        match self.metadata(path).await {
            Ok(_) => Ok(true),
            Err(Error::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Unsupported on a read-only filesystem
    pub fn create_directory(&self, _path: &S3Path) -> Result<()> {
        self.ensure_open()?;
        Err(Error::Unsupported("create directory"))
    }

    /// Unsupported on a read-only filesystem
    pub fn delete(&self, _path: &S3Path) -> Result<()> {
        self.ensure_open()?;
        Err(Error::Unsupported("delete"))
    }

    /// Unsupported on a read-only filesystem
    pub fn copy(&self, _source: &S3Path, _target: &S3Path) -> Result<()> {
        self.ensure_open()?;
        Err(Error::Unsupported("copy"))
    }

    /// Unsupported on a read-only filesystem
    pub fn move_path(&self, _source: &S3Path, _target: &S3Path) -> Result<()> {
        self.ensure_open()?;
        Err(Error::Unsupported("move"))
    }

    /// Mark the filesystem closed. Readers already opened stay usable.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!(bucket = %self.bucket, "closed filesystem");
        }
    }
}
