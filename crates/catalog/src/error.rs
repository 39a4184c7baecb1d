//! Catalog Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A catalog error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Clone, Debug, Display, Error)]
pub enum ErrorKind {
    /// Authentication or authorization failure. Retrying won't help until
    /// the credentials change.
    #[display("access denied: {_0}")]
    Access(#[error(not(source))] String),
    /// The container itself does not exist.
    #[display("container not found: {_0}")]
    ContainerNotFound(#[error(not(source))] String),
    /// The requested blob does not exist.
    #[display("blob not found: {_0}")]
    BlobNotFound(#[error(not(source))] String),
    /// The remote object changed between listing and fetch. The caller
    /// should re-resolve against a fresh listing.
    #[display("blob changed concurrently: {_0}")]
    Conflict(#[error(not(source))] String),
    /// Network/service hiccup.
    #[display("transient storage error: {_0}")]
    Transient(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
