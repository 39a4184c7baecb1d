//! Cache Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use blot_catalog::error::{Error as CatalogError, ErrorKind as CatalogErrorKind};
use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A cache error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Downloaded byte count does not match the size the catalog reported.
    /// The partial file has already been discarded.
    #[display("size mismatch: expected {expected} bytes, received {actual}")]
    Integrity { expected: u64, actual: u64 },
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Cache root exists but is not a usable directory
    #[display("invalid cache directory: {}", _0.display())]
    InvalidRoot(#[error(not(source))] PathBuf),
    /// Error from the remote catalog during a fetch
    #[display("catalog error: {_0}")]
    Catalog(CatalogErrorKind),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}
impl ErrorKind {
    /// Convert a catalog error into a cache error, preserving the catalog
    /// crate's `Exn` frame (error tree) as a child in its own error tree.
    #[track_caller]
    pub fn catalog(err: CatalogError) -> Error {
        let inner = (*err).clone();
        err.raise(ErrorKind::Catalog(inner))
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Io(_) => true,
            Self::Catalog(inner) => inner.is_retryable(),
            Self::Integrity { .. } | Self::InvalidRoot(_) => false,
        }
    }
}
