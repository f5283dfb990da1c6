//! Open filesystems keyed by bucket URI.

use percent_encoding::percent_decode_str;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use url::Url;

use super::filesystem::S3FileSystem;
use super::path::S3Path;
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::s3::{ObjectStore, S3Client};

const S3_SCHEME: &str = "s3";

/// A validated `s3://bucket/path` URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketUri {
    pub bucket: String,
    /// Percent-decoded path within the bucket, `/` when absent
    pub path: String,
}

impl BucketUri {
    /// Parse and validate an `s3://bucket/path` URI.
    ///
    /// The path is percent-decoded. A port, user info, query or fragment is
    /// rejected with `InvalidArgument`.
    pub fn parse(uri: &str) -> Result<Self> {
        let url = Url::parse(uri)
            .map_err(|e| Error::InvalidArgument(format!("invalid URI {:?}: {}", uri, e)))?;

        if !url.scheme().eq_ignore_ascii_case(S3_SCHEME) {
            return Err(Error::InvalidArgument(format!(
                "expected '{}' scheme but got '{}'",
                S3_SCHEME,
                url.scheme()
            )));
        }

        if url.port().is_some()
            || url.fragment().is_some()
            || url.query().is_some()
            || !url.username().is_empty()
            || url.password().is_some()
        {
            return Err(Error::InvalidArgument(format!(
                "{} must not carry a port, user info, query or fragment",
                uri
            )));
        }

        let bucket = match url.host_str() {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => return Err(Error::InvalidArgument(format!("{} names no bucket", uri))),
        };

        let path = percent_decode_str(url.path())
            .decode_utf8()
            .map_err(|e| Error::InvalidArgument(format!("{} has an invalid path: {}", uri, e)))?;
        let path = match path.as_ref() {
            "" => "/".to_string(),
            path => path.to_string(),
        };

        Ok(BucketUri { bucket, path })
    }

    /// Registry key, `s3://bucket`
    pub fn key(&self) -> String {
        format!("{}://{}", S3_SCHEME, self.bucket)
    }
}

/// Concurrency-safe map of open filesystems, one per bucket
#[derive(Default)]
pub struct FileSystemRegistry {
    file_systems: Mutex<HashMap<String, Arc<S3FileSystem>>>,
}

impl FileSystemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<S3FileSystem>>> {
        self.file_systems
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Get the open filesystem for the bucket in `uri`, creating an S3-backed
    /// one from `settings` if there is none.
    pub async fn new_file_system(&self, uri: &str, settings: &Settings) -> Result<Arc<S3FileSystem>> {
        let parsed = BucketUri::parse(uri)?;
        if let Some(existing) = self.lookup(&parsed.key()) {
            return Ok(existing);
        }

        let client = S3Client::new(settings).await?;
        Ok(self.insert_if_absent(&parsed, Arc::new(client)))
    }

    /// Register a filesystem backed by `store` unless one is already open
    /// for the bucket in `uri`
    pub fn register(&self, uri: &str, store: Arc<dyn ObjectStore>) -> Result<Arc<S3FileSystem>> {
        let parsed = BucketUri::parse(uri)?;
        Ok(self.insert_if_absent(&parsed, store))
    }

    fn insert_if_absent(&self, uri: &BucketUri, store: Arc<dyn ObjectStore>) -> Arc<S3FileSystem> {
        let mut file_systems = self.lock();
        let key = uri.key();

        match file_systems.get(&key) {
            Some(existing) if existing.is_open() => Arc::clone(existing),
            _ => {
                tracing::debug!(uri = %key, "registered filesystem");
                let fs = Arc::new(S3FileSystem::new(uri.bucket.clone(), store));
                file_systems.insert(key, Arc::clone(&fs));
                fs
            }
        }
    }

    /// Open filesystem for `key`; closed ones count as absent
    fn lookup(&self, key: &str) -> Option<Arc<S3FileSystem>> {
        self.lock()
            .get(key)
            .filter(|fs| fs.is_open())
            .cloned()
    }

    /// Get the open filesystem for the bucket in `uri`, if any
    pub fn get_file_system(&self, uri: &str) -> Result<Option<Arc<S3FileSystem>>> {
        let parsed = BucketUri::parse(uri)?;
        Ok(self.lookup(&parsed.key()))
    }

    /// Resolve a full `s3://bucket/path` URI to a path on its filesystem
    pub fn get_path(&self, uri: &str) -> Result<S3Path> {
        let parsed = BucketUri::parse(uri)?;
        let fs = self
            .lookup(&parsed.key())
            .ok_or_else(|| Error::NotFound(format!("no filesystem open for {}", parsed.key())))?;
        Ok(fs.get_path(&parsed.path))
    }

    /// Remove and close the filesystem for the bucket in `uri`
    pub fn remove(&self, uri: &str) -> Result<Option<Arc<S3FileSystem>>> {
        let parsed = BucketUri::parse(uri)?;
        let removed = self.lock().remove(&parsed.key());
        if let Some(fs) = &removed {
            fs.close();
        }
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
