//! Read-only filesystem view over objects in S3.
//!
//! [`vfs::VirtualPath`] models POSIX-style paths over flat object keys, and
//! [`s3::RangeReader`] exposes a single object as a seekable byte source
//! backed by windowed range fetches.

pub mod config;
pub mod error;
pub mod fs;
pub mod s3;
pub mod vfs;

pub use error::{Error, Result};
