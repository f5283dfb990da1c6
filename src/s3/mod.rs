pub mod client;
pub mod memory;
pub mod metrics;
pub mod store;
pub mod stream;

pub use client::S3Client;
pub use memory::MemoryStore;
pub use metrics::FetchMetrics;
pub use store::{ByteStream, ObjectMetadata, ObjectStore};
pub use stream::{RangeReader, SyncRangeReader, WINDOW_SIZE};
