//! End-to-end reads through the filesystem layer against an in-memory store.

use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;

use s3fs::Error;
use s3fs::fs::FileSystemRegistry;
use s3fs::s3::{FetchMetrics, MemoryStore, RangeReader, WINDOW_SIZE};

const BUCKET_URI: &str = "s3://test-bucket";

fn contents(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 253) as u8).collect()
}

fn setup(len: usize) -> (FileSystemRegistry, Arc<MemoryStore>, Vec<u8>) {
    let store = Arc::new(MemoryStore::with_chunk_size(700));
    let data = contents(len);
    store.put("test-bucket", "data/blob.bin", data.clone());

    let registry = FileSystemRegistry::new();
    registry.register(BUCKET_URI, store.clone()).unwrap();
    (registry, store, data)
}

async fn open(registry: &FileSystemRegistry, uri: &str) -> RangeReader {
    let fs = registry.get_file_system(uri).unwrap().unwrap();
    let path = registry.get_path(uri).unwrap();
    fs.open(&path).await.unwrap()
}

#[tokio::test]
async fn test_sequential_read_of_10000_bytes() {
    let (registry, store, data) = setup(10_000);
    let metrics = FetchMetrics::new();
    let mut reader = open(&registry, "s3://test-bucket/data/blob.bin")
        .await
        .with_metrics(metrics.clone());

    let mut out = Vec::new();
    let mut buf = vec![0u8; 3000];
    loop {
        let n = reader.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }

    assert_eq!(WINDOW_SIZE, 4096);
    assert_eq!(out, data);
    assert_eq!(metrics.ranges(), vec![0..=4095, 4096..=8191, 8192..=9999]);

    let requested: Vec<_> = store.requests().into_iter().map(|r| r.range).collect();
    assert_eq!(requested, vec![0..=4095, 4096..=8191, 8192..=9999]);
    assert!(store.requests().iter().all(|r| r.key == "data/blob.bin"));
}

#[tokio::test]
async fn test_interleaved_random_access() {
    let (registry, store, data) = setup(20_000);
    let mut reader = open(&registry, "s3://test-bucket/data/./blob.bin").await;
    let mut buf = [0u8; 16];

    // Two offsets inside the same window cost one fetch
    for offset in [12_000u64, 12_500, 12_001, 16_095] {
        reader.seek(offset).unwrap();
        let n = reader.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], &data[offset as usize..offset as usize + n]);
    }
    assert_eq!(store.request_count(), 1);

    reader.seek(100).unwrap();
    reader.read(&mut buf).await.unwrap();
    assert_eq!(&buf, &data[100..116]);
    assert_eq!(store.request_count(), 2);
    assert_eq!(store.requests()[1].range, 100..=4195);
}

#[tokio::test]
async fn test_missing_object() {
    let (registry, store, _) = setup(10);
    let fs = registry.get_file_system(BUCKET_URI).unwrap().unwrap();
    let path = registry.get_path("s3://test-bucket/data/missing.bin").unwrap();

    assert!(matches!(fs.open(&path).await, Err(Error::NotFound(_))));
    assert_eq!(store.request_count(), 0);
}

#[tokio::test]
async fn test_independent_readers_share_nothing() {
    let (registry, _store, data) = setup(9000);
    let mut first = open(&registry, "s3://test-bucket/data/blob.bin").await;
    let mut second = open(&registry, "s3://test-bucket/data/blob.bin").await;

    second.seek(8000).unwrap();
    let mut a = [0u8; 10];
    let mut b = [0u8; 10];
    first.read(&mut a).await.unwrap();
    second.read(&mut b).await.unwrap();

    assert_eq!(&a, &data[..10]);
    assert_eq!(&b, &data[8000..8010]);
    assert_eq!(first.position().unwrap(), 10);
}

#[test]
fn test_blocking_reader_from_plain_thread() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let (registry, _store, data) = setup(12_345);
    let reader = runtime.block_on(open(&registry, "s3://test-bucket/data/blob.bin"));
    let mut sync = reader.into_sync_reader(runtime.handle().clone());

    let handle = std::thread::spawn(move || {
        sync.seek(SeekFrom::Start(5000)).unwrap();
        let mut out = Vec::new();
        sync.read_to_end(&mut out).unwrap();
        out
    });

    assert_eq!(handle.join().unwrap(), data[5000..]);
}
