//! In-process object store.
//!
//! Serves objects from memory and records each range request, which makes
//! it useful for tests and offline demos. Failures can be injected for the
//! next few range fetches, and objects can be removed while readers are
//! open.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use super::store::{ByteStream, ObjectMetadata, ObjectStore};
use crate::error::{Error, Result};

const DEFAULT_CHUNK_SIZE: usize = 1024;

/// A range request seen by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeRequest {
    pub bucket: String,
    pub key: String,
    pub range: RangeInclusive<u64>,
}

#[derive(Debug)]
pub struct MemoryStore {
    /// bucket -> key -> contents
    objects: RwLock<HashMap<String, HashMap<String, Bytes>>>,
    requests: Mutex<Vec<RangeRequest>>,
    /// Size of the chunks each body is split into
    chunk_size: usize,
    fail_next: AtomicUsize,
    truncate_next: AtomicUsize,
    pad_next: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store with the default chunk size
    pub fn new() -> Self {
        Self::with_chunk_size(DEFAULT_CHUNK_SIZE)
    }

    /// Create an empty store that splits bodies into `chunk_size` chunks
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        MemoryStore {
            objects: RwLock::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            chunk_size: chunk_size.max(1),
            fail_next: AtomicUsize::new(0),
            truncate_next: AtomicUsize::new(0),
            pad_next: AtomicUsize::new(0),
        }
    }

    /// Store `contents` under `key`, replacing any previous object
    pub fn put(&self, bucket: &str, key: &str, contents: impl Into<Bytes>) {
        if let Ok(mut objects) = self.objects.write() {
            objects
                .entry(bucket.to_string())
                .or_default()
                .insert(key.to_string(), contents.into());
        }
    }

    /// Delete an object, returning its contents if it existed
    pub fn remove(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.objects
            .write()
            .ok()
            .and_then(|mut objects| objects.get_mut(bucket)?.remove(key))
    }

    /// Range requests received so far, oldest first
    pub fn requests(&self) -> Vec<RangeRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// Get the number of range requests received so far
    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Make the next `count` range fetches fail with `Unavailable`
    pub fn fail_next_fetches(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` range fetches return one byte too few
    pub fn truncate_next_fetches(&self, count: usize) {
        self.truncate_next.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` range fetches return one byte too many
    pub fn pad_next_fetches(&self, count: usize) {
        self.pad_next.store(count, Ordering::SeqCst);
    }

    fn lookup(&self, bucket: &str, key: &str) -> Result<Bytes> {
        self.objects
            .read()
            .ok()
            .and_then(|objects| objects.get(bucket)?.get(key).cloned())
            .ok_or_else(|| Error::NotFound(format!("s3://{}/{}", bucket, key)))
    }
}

/// Decrement a countdown, returning whether it was armed
fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectMetadata> {
        let contents = self.lookup(bucket, key)?;
        Ok(ObjectMetadata {
            size: contents.len() as u64,
        })
    }

    async fn get_object_range(
        &self,
        bucket: &str,
        key: &str,
        range: RangeInclusive<u64>,
    ) -> Result<ByteStream> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RangeRequest {
                bucket: bucket.to_string(),
                key: key.to_string(),
                range: range.clone(),
            });
        }

        if take_one(&self.fail_next) {
            return Err(Error::Unavailable(format!(
                "injected failure for s3://{}/{}",
                bucket, key
            )));
        }

        let contents = self.lookup(bucket, key)?;
        let size = contents.len() as u64;
        if *range.start() >= size || range.start() > range.end() {
            return Err(Error::Unavailable(format!(
                "invalid range {}-{} for object of {} bytes",
                range.start(),
                range.end(),
                size
            )));
        }

        // Like S3, an end past the object is clamped
        let start = *range.start() as usize;
        let mut end = (*range.end()).min(size - 1) as usize + 1;
        if take_one(&self.truncate_next) {
            end -= 1;
        }

        let mut body = contents.slice(start..end);
        if take_one(&self.pad_next) {
            let mut padded = body.to_vec();
            padded.push(0);
            body = Bytes::from(padded);
        }
        let chunks: Vec<Result<Bytes>> = (0..body.len())
            .step_by(self.chunk_size)
            .map(|offset| Ok(body.slice(offset..(offset + self.chunk_size).min(body.len()))))
            .collect();

        Ok(futures::stream::iter(chunks).boxed())
    }
}
