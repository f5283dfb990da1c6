pub mod filesystem;
pub mod path;
pub mod registry;

pub use filesystem::S3FileSystem;
pub use path::S3Path;
pub use registry::{BucketUri, FileSystemRegistry};
