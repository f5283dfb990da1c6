//! Error types for s3fs
//!
//! Object store failures are surfaced unchanged; nothing in this crate
//! retries or suppresses them.

use thiserror::Error;

/// Result type alias for s3fs operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Key or bucket absent at metadata lookup or fetch time
    #[error("Not found: {0}")]
    NotFound(String),

    /// Transport or network failure
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Argument outside its valid domain
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation not supported on a read-only view
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    /// Operation on a closed channel or filesystem
    #[error("{0} closed")]
    Closed(&'static str),
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        use std::io::ErrorKind;

        let kind = match &err {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Unavailable(_) => ErrorKind::Other,
            Error::InvalidArgument(_) => ErrorKind::InvalidInput,
            Error::Unsupported(_) => ErrorKind::Unsupported,
            Error::Closed(_) => ErrorKind::BrokenPipe,
        };
        std::io::Error::new(kind, err)
    }
}
