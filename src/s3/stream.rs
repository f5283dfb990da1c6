use futures::TryStreamExt;
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Arc;
use std::time::Instant;

use super::metrics::FetchMetrics;
use super::store::ObjectStore;
use crate::error::{Error, Result};

/// Default number of bytes fetched per window miss
pub const WINDOW_SIZE: usize = 4096;

/// The single cached byte range of a reader
struct Window {
    data: Box<[u8]>,
    /// Remote offset of `data[0]`
    start: u64,
    /// Number of valid bytes in `data`
    len: usize,
    /// Read pointer into `data`
    pos: usize,
}

impl Window {
    fn new(capacity: usize) -> Self {
        Window {
            data: vec![0; capacity].into_boxed_slice(),
            start: 0,
            len: 0,
            pos: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }

    fn remaining(&self) -> usize {
        self.len - self.pos
    }

    fn contains(&self, offset: u64) -> bool {
        offset >= self.start && offset < self.start + self.len as u64
    }

    fn invalidate(&mut self) {
        self.len = 0;
        self.pos = 0;
    }
}

enum State {
    Open(Window),
    Closed,
}

/// A seekable reader over an immutable object that fetches fixed-size
/// windows on demand and caches exactly one of them.
///
/// The object size is looked up once when the reader is opened and is
/// assumed not to change afterwards. Fetch failures are returned as-is:
/// there is no retry or backoff here, callers that want resilience must
/// wrap the reader themselves. A failed read leaves the position where it
/// was, so the same read can be issued again.
///
/// A reader is meant for one caller at a time. Open one reader per
/// concurrent consumer; readers over the same key share nothing.
pub struct RangeReader {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    key: String,
    /// Total size of the object
    size: u64,
    /// Current position in the object
    position: u64,
    state: State,
    metrics: Option<Arc<FetchMetrics>>,
}

impl RangeReader {
    /// Open a reader with the default window size.
    ///
    /// Fails with `NotFound` if the key does not exist.
    pub async fn open(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        key: impl Into<String>,
    ) -> Result<Self> {
        Self::open_with_window_size(store, bucket, key, WINDOW_SIZE).await
    }

    /// Open a reader that fetches `window_size` bytes per window miss.
    ///
    /// Fails with `InvalidArgument` if `window_size` is zero.
    pub async fn open_with_window_size(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        key: impl Into<String>,
        window_size: usize,
    ) -> Result<Self> {
        if window_size == 0 {
            return Err(Error::InvalidArgument("window size must be positive".into()));
        }

        let bucket = bucket.into();
        let key = key.into();
        let metadata = store.head_object(&bucket, &key).await?;
        tracing::debug!(%bucket, %key, size = metadata.size, "opened object");

        Ok(RangeReader {
            store,
            bucket,
            key,
            size: metadata.size,
            position: 0,
            state: State::Open(Window::new(window_size)),
            metrics: None,
        })
    }

    /// Report every window fetch to `metrics`
    pub fn with_metrics(mut self, metrics: Arc<FetchMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Get the bucket the object lives in
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Get the object key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the total size of the object
    pub fn size(&self) -> Result<u64> {
        self.window()?;
        Ok(self.size)
    }

    /// Get the current position
    pub fn position(&self) -> Result<u64> {
        self.window()?;
        Ok(self.position)
    }

    /// Whether `close` has not been called yet
    pub fn is_open(&self) -> bool {
        matches!(self.state, State::Open(_))
    }

    /// Remote byte range held by the current window, if any
    pub fn cached_range(&self) -> Option<std::ops::Range<u64>> {
        match &self.state {
            State::Open(window) if window.len > 0 => {
                Some(window.start..window.start + window.len as u64)
            }
            _ => None,
        }
    }

    fn window(&self) -> Result<&Window> {
        match &self.state {
            State::Open(window) => Ok(window),
            State::Closed => Err(Error::Closed("channel")),
        }
    }

    fn window_mut(&mut self) -> Result<&mut Window> {
        match &mut self.state {
            State::Open(window) => Ok(window),
            State::Closed => Err(Error::Closed("channel")),
        }
    }

    /// Read bytes at the current position into `buf`.
    ///
    /// Returns 0 at the end of the object. A read never crosses a window
    /// boundary, so it may return fewer bytes than `buf` holds.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.window()?.remaining() == 0 {
            if self.position >= self.size || buf.is_empty() {
                return Ok(0);
            }
            self.rebuffer().await?;
        }

        let window = self.window_mut()?;
        let to_copy = window.remaining().min(buf.len());
        buf[..to_copy].copy_from_slice(&window.data[window.pos..window.pos + to_copy]);
        window.pos += to_copy;
        self.position += to_copy as u64;

        Ok(to_copy)
    }

    /// Replace the window with the range starting at the current position
    async fn rebuffer(&mut self) -> Result<()> {
        let State::Open(window) = &mut self.state else {
            return Err(Error::Closed("channel"));
        };

        let start = self.position;
        let end = self.size.min(start + window.capacity() as u64) - 1;
        let expected = (end - start + 1) as usize;

        // A failed fetch leaves an empty window behind, never a partial one
        window.invalidate();

        let started = Instant::now();
        let mut body = self
            .store
            .get_object_range(&self.bucket, &self.key, start..=end)
            .await?;

        let mut filled = 0;
        while let Some(chunk) = body.try_next().await? {
            if filled + chunk.len() > expected {
                tracing::warn!(
                    bucket = %self.bucket,
                    key = %self.key,
                    start,
                    end,
                    "range fetch returned more bytes than requested"
                );
                return Err(Error::Unavailable(format!(
                    "range {}-{} of s3://{}/{} returned more than {} bytes",
                    start, end, self.bucket, self.key, expected
                )));
            }
            window.data[filled..filled + chunk.len()].copy_from_slice(&chunk);
            filled += chunk.len();
        }

        if filled < expected {
            tracing::warn!(
                bucket = %self.bucket,
                key = %self.key,
                start,
                end,
                received = filled,
                "range fetch ended early"
            );
            return Err(Error::Unavailable(format!(
                "range {}-{} of s3://{}/{} ended after {} of {} bytes",
                start, end, self.bucket, self.key, filled, expected
            )));
        }

        window.start = start;
        window.len = filled;
        window.pos = 0;

        let elapsed = started.elapsed();
        tracing::debug!(
            bucket = %self.bucket,
            key = %self.key,
            start,
            end,
            bytes = filled,
            ?elapsed,
            "fetched window"
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_fetch(start..=end, filled as u64, elapsed);
        }

        Ok(())
    }

    /// Move to `new_position`.
    ///
    /// Positions past the end of the object are rejected with
    /// `InvalidArgument` and leave the reader untouched. Seeking inside the
    /// cached window keeps it; seeking anywhere else drops it.
    pub fn seek(&mut self, new_position: u64) -> Result<()> {
        let size = self.size;
        let window = self.window_mut()?;

        if new_position > size {
            return Err(Error::InvalidArgument(format!(
                "seek to {} beyond end of object ({} bytes)",
                new_position, size
            )));
        }

        let hit = window.contains(new_position);
        if hit {
            window.pos = (new_position - window.start) as usize;
        } else {
            window.invalidate();
        }
        tracing::debug!(position = new_position, hit, "seek");

        self.position = new_position;
        Ok(())
    }

    /// Objects are read-only
    pub fn write(&mut self, _buf: &[u8]) -> Result<usize> {
        self.window()?;
        Err(Error::Unsupported("write"))
    }

    pub fn truncate(&mut self, _size: u64) -> Result<()> {
        self.window()?;
        Err(Error::Unsupported("truncate"))
    }

    /// Release the window. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.is_open() {
            tracing::debug!(bucket = %self.bucket, key = %self.key, "closed reader");
        }
        self.state = State::Closed;
    }

    /// Create a blocking reader that drives this one on `runtime`
    pub fn into_sync_reader(self, runtime: tokio::runtime::Handle) -> SyncRangeReader {
        SyncRangeReader {
            reader: Arc::new(tokio::sync::Mutex::new(self)),
            runtime,
        }
    }
}

/// Blocking wrapper around `RangeReader` for use with `std::io` traits.
///
/// Calls block on the runtime handle, so they must not be made from
/// within an async context; use `spawn_blocking` there. Clones share the
/// same reader and position.
pub struct SyncRangeReader {
    reader: Arc<tokio::sync::Mutex<RangeReader>>,
    runtime: tokio::runtime::Handle,
}

impl SyncRangeReader {
    pub fn size(&self) -> std::io::Result<u64> {
        Ok(self.reader.blocking_lock().size()?)
    }

    pub fn close(&self) {
        self.reader.blocking_lock().close();
    }
}

impl Read for SyncRangeReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.runtime
            .block_on(async {
                let mut reader = self.reader.lock().await;
                reader.read(buf).await
            })
            .map_err(std::io::Error::from)
    }
}

impl Seek for SyncRangeReader {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let mut reader = self.reader.blocking_lock();

        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(offset) => reader.size()?.checked_add_signed(offset),
            SeekFrom::Current(offset) => reader.position()?.checked_add_signed(offset),
        };
        let target = target.ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "seek to a negative or overflowing position",
            )
        })?;

        reader.seek(target)?;
        Ok(target)
    }
}

impl Write for SyncRangeReader {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        Ok(self.reader.blocking_lock().write(buf)?)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Clone for SyncRangeReader {
    fn clone(&self) -> Self {
        SyncRangeReader {
            reader: Arc::clone(&self.reader),
            runtime: self.runtime.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::s3::MemoryStore;

    fn object(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    fn store_with(len: usize) -> (Arc<MemoryStore>, Vec<u8>) {
        let store = Arc::new(MemoryStore::new());
        let data = object(len);
        store.put("bucket", "key", data.clone());
        (store, data)
    }

    async fn read_all(reader: &mut RangeReader) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; 1000];
        loop {
            let n = reader.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        out
    }

    #[tokio::test]
    async fn test_open_missing_key() {
        let store = Arc::new(MemoryStore::new());
        let result = RangeReader::open(store.clone(), "bucket", "missing").await;
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(store.request_count(), 0);
    }

    #[tokio::test]
    async fn test_sequential_read_fetches_windows() {
        let (store, data) = store_with(10_000);
        let metrics = FetchMetrics::new();
        let mut reader = RangeReader::open(store.clone(), "bucket", "key")
            .await
            .unwrap()
            .with_metrics(metrics.clone());

        assert_eq!(reader.size().unwrap(), 10_000);
        assert_eq!(read_all(&mut reader).await, data);
        assert_eq!(metrics.ranges(), vec![0..=4095, 4096..=8191, 8192..=9999]);
        assert_eq!(store.request_count(), 3);
        assert_eq!(reader.position().unwrap(), 10_000);
    }

    #[tokio::test]
    async fn test_reads_stop_at_window_boundary() {
        let (store, data) = store_with(5000);
        let mut reader = RangeReader::open(store, "bucket", "key").await.unwrap();

        let mut buf = vec![0u8; 5000];
        assert_eq!(reader.read(&mut buf).await.unwrap(), 4096);
        assert_eq!(&buf[..4096], &data[..4096]);
        assert_eq!(reader.read(&mut buf).await.unwrap(), 904);
        assert_eq!(&buf[..904], &data[4096..]);
        assert_eq!(reader.read(&mut buf).await.unwrap(), 0);
        assert_eq!(reader.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_object() {
        let (store, _) = store_with(0);
        let mut reader = RangeReader::open(store.clone(), "bucket", "key").await.unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(reader.read(&mut buf).await.unwrap(), 0);
        assert_eq!(store.request_count(), 0);
    }

    #[tokio::test]
    async fn test_seek_within_window_reuses_it() {
        let (store, data) = store_with(10_000);
        let mut reader = RangeReader::open(store.clone(), "bucket", "key").await.unwrap();

        let mut buf = [0u8; 100];
        reader.read(&mut buf).await.unwrap();
        assert_eq!(reader.cached_range(), Some(0..4096));

        for offset in [4095, 0, 2048] {
            reader.seek(offset).unwrap();
            assert_eq!(store.request_count(), 1);
            let n = reader.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], &data[offset as usize..offset as usize + n]);
        }
        assert_eq!(store.request_count(), 1);
    }

    #[tokio::test]
    async fn test_seek_outside_window_refetches_once() {
        let (store, data) = store_with(10_000);
        let metrics = FetchMetrics::new();
        let mut reader = RangeReader::open(store, "bucket", "key")
            .await
            .unwrap()
            .with_metrics(metrics.clone());

        let mut buf = [0u8; 10];
        reader.read(&mut buf).await.unwrap();

        reader.seek(7000).unwrap();
        assert_eq!(reader.cached_range(), None);
        assert_eq!(metrics.fetch_count(), 1);

        reader.read(&mut buf).await.unwrap();
        assert_eq!(&buf, &data[7000..7010]);
        assert_eq!(metrics.ranges(), vec![0..=4095, 7000..=9999]);
    }

    #[tokio::test]
    async fn test_seek_beyond_end_rejected() {
        let (store, _) = store_with(100);
        let mut reader = RangeReader::open(store, "bucket", "key").await.unwrap();

        reader.seek(40).unwrap();
        let err = reader.seek(101).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(reader.position().unwrap(), 40);

        reader.seek(100).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(reader.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_position() {
        let (store, data) = store_with(6000);
        let mut reader = RangeReader::open(store.clone(), "bucket", "key").await.unwrap();
        reader.seek(4500).unwrap();

        store.fail_next_fetches(1);
        let mut buf = [0u8; 64];
        let err = reader.read(&mut buf).await.unwrap_err();
        assert!(matches!(err, Error::Unavailable(_)));
        assert_eq!(reader.position().unwrap(), 4500);

        let n = reader.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], &data[4500..4500 + n]);
    }

    #[tokio::test]
    async fn test_short_body_is_an_error() {
        let (store, _) = store_with(3000);
        let mut reader = RangeReader::open(store.clone(), "bucket", "key").await.unwrap();

        store.truncate_next_fetches(1);
        let mut buf = [0u8; 64];
        assert!(matches!(reader.read(&mut buf).await, Err(Error::Unavailable(_))));
        assert_eq!(reader.position().unwrap(), 0);
        assert_eq!(reader.cached_range(), None);
    }

    #[tokio::test]
    async fn test_long_body_is_an_error() {
        let (store, data) = store_with(3000);
        let mut reader = RangeReader::open(store.clone(), "bucket", "key").await.unwrap();
        reader.seek(100).unwrap();

        store.pad_next_fetches(1);
        let mut buf = [0u8; 64];
        assert!(matches!(reader.read(&mut buf).await, Err(Error::Unavailable(_))));
        assert_eq!(reader.position().unwrap(), 100);
        assert_eq!(reader.cached_range(), None);

        let n = reader.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], &data[100..100 + n]);
    }

    #[tokio::test]
    async fn test_key_removed_after_open() {
        let (store, data) = store_with(6000);
        let mut reader = RangeReader::open(store.clone(), "bucket", "key").await.unwrap();

        let mut buf = [0u8; 64];
        let n = reader.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], &data[..n]);

        store.remove("bucket", "key");

        // Still served from the cached window
        let n = reader.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], &data[64..64 + n]);

        reader.seek(5000).unwrap();
        let err = reader.read(&mut buf).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(reader.position().unwrap(), 5000);
        assert_eq!(reader.cached_range(), None);
    }

    #[tokio::test]
    async fn test_custom_window_size() {
        let (store, data) = store_with(1000);
        let metrics = FetchMetrics::new();
        let mut reader = RangeReader::open_with_window_size(store, "bucket", "key", 256)
            .await
            .unwrap()
            .with_metrics(metrics.clone());

        assert_eq!(read_all(&mut reader).await, data);
        assert_eq!(metrics.fetch_count(), 4);
        assert_eq!(metrics.ranges().last(), Some(&(768..=999)));
    }

    #[tokio::test]
    async fn test_zero_window_size_rejected() {
        let (store, _) = store_with(10);
        let result = RangeReader::open_with_window_size(store, "bucket", "key", 0).await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_write_and_truncate_unsupported() {
        let (store, _) = store_with(10);
        let mut reader = RangeReader::open(store, "bucket", "key").await.unwrap();
        assert!(matches!(reader.write(b"x"), Err(Error::Unsupported("write"))));
        assert!(matches!(reader.truncate(0), Err(Error::Unsupported("truncate"))));
    }

    #[tokio::test]
    async fn test_closed_reader_fails() {
        let (store, _) = store_with(10);
        let mut reader = RangeReader::open(store, "bucket", "key").await.unwrap();

        reader.close();
        reader.close();
        assert!(!reader.is_open());

        let mut buf = [0u8; 4];
        assert!(matches!(reader.read(&mut buf).await, Err(Error::Closed("channel"))));
        assert!(matches!(reader.seek(0), Err(Error::Closed(_))));
        assert!(matches!(reader.size(), Err(Error::Closed(_))));
    }

    #[test]
    fn test_sync_reader() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (store, data) = store_with(9000);
        let reader = runtime
            .block_on(RangeReader::open(store, "bucket", "key"))
            .unwrap();
        let mut sync = reader.into_sync_reader(runtime.handle().clone());

        let mut out = Vec::new();
        sync.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);

        assert_eq!(sync.seek(SeekFrom::End(-10)).unwrap(), 8990);
        let mut tail = [0u8; 10];
        sync.read_exact(&mut tail).unwrap();
        assert_eq!(&tail, &data[8990..]);

        assert_eq!(sync.seek(SeekFrom::Current(-4000)).unwrap(), 5000);
        let err = sync.seek(SeekFrom::Current(-6000)).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
        let err = sync.seek(SeekFrom::Start(9001)).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);

        let err = sync.write(b"nope").unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::Unsupported);
        assert_eq!(sync.size().unwrap(), 9000);
    }
}
