//! Object store abstraction.
//!
//! The reader and filesystem layers only ever need a metadata lookup and a
//! ranged fetch, so that is all this trait exposes. Implementations are
//! expected to surface failures unchanged; there is no retry policy at
//! this layer or above it in this crate.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::ops::RangeInclusive;

use crate::error::Result;

/// Body of a range fetch, yielded in chunks.
///
/// Callers must drain it completely.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Metadata about a stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub size: u64,
}

/// Read access to immutable objects addressed by `(bucket, key)`
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Look up an object's metadata.
    ///
    /// Fails with `NotFound` when the key does not exist.
    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectMetadata>;

    /// Fetch an inclusive byte range of an object
    async fn get_object_range(
        &self,
        bucket: &str,
        key: &str,
        range: RangeInclusive<u64>,
    ) -> Result<ByteStream>;
}
