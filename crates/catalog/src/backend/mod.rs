//! Blob catalog trait and implementations.
//!
//! This module defines the `BlobCatalog` trait, a thin read-only interface
//! over a remote object-storage container: list blobs by prefix, fetch one
//! blob's content. Everything the rest of the tool knows about the remote
//! side goes through this trait.

mod azure;
#[cfg(feature = "mock")]
mod mock;

pub use self::azure::AzureCatalog;
#[cfg(feature = "mock")]
pub use self::mock::MockCatalog;
use crate::error::Result;
use crate::models::BlobRef;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use std::pin::Pin;

type BlobRefStream<'a> = Pin<Box<dyn Stream<Item = Result<BlobRef>> + Send + 'a>>;
/// Content stream of an open download. `'static` so callers can hold it
/// across their own await points without borrowing the catalog.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send + 'static>>;

/// An open download: re-validated blob metadata plus its content stream.
///
/// `blob` is the metadata as observed *at fetch time*, not the listing
/// snapshot the caller passed in. The two have been checked to carry the
/// same etag, but sizes and timestamps come from the fetch response.
pub struct Fetched {
    pub blob: BlobRef,
    pub data: ByteStream,
}

impl std::fmt::Debug for Fetched {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetched")
            .field("blob", &self.blob)
            .field("data", &"<byte stream>")
            .finish()
    }
}

/// Read-only interface over a remote blob container.
///
/// # Listing order
/// [`list_stream()`](Self::list_stream) yields blobs in the storage
/// service's native listing order, which is **not** guaranteed to be sorted.
/// Anything that needs a stable order (display, latest-selection) must
/// impose it itself — see [`resolve`](crate::resolve::resolve).
///
/// # Examples
///
/// ```no_run
/// use blot_catalog::{BlobCatalog, error::Result};
///
/// async fn total_size(catalog: &dyn BlobCatalog, prefix: &str) -> Result<u64> {
///     let listing = catalog.list(prefix).await?;
///     Ok(listing.iter().map(|blob| blob.size).sum())
/// }
/// ```
#[async_trait]
pub trait BlobCatalog: Send + Sync {
    /// Name of the container this catalog reads from (used for cache
    /// addressing and logging).
    fn container(&self) -> &str;

    /// Stream blob metadata matching a name prefix.
    ///
    /// Lazy and restartable: nothing is requested until the stream is
    /// polled, and calling this again produces a fresh listing. An empty
    /// prefix matches every blob in the container.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use futures::TryStreamExt;
    /// # use blot_catalog::{BlobCatalog, error::Result};
    /// # async fn example(catalog: &dyn BlobCatalog) -> Result<()> {
    /// let mut stream = catalog.list_stream("reports/2026-");
    /// while let Some(blob) = stream.try_next().await? {
    ///     println!("{}: {} bytes", blob.name, blob.size);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    fn list_stream<'a>(&'a self, prefix: &'a str) -> BlobRefStream<'a>;

    /// List all blobs matching a name prefix.
    ///
    /// Convenience wrapper that collects [`list_stream()`](Self::list_stream)
    /// into a [`Vec`] before returning.
    async fn list(&self, prefix: &str) -> Result<Vec<BlobRef>> {
        self.list_stream(prefix).try_collect().await
    }

    /// Open a download for the exact blob version `blob` refers to.
    ///
    /// Re-validates that the blob's etag at fetch time matches the
    /// caller-supplied reference; if the blob was overwritten in between,
    /// fails with [`Conflict`](crate::error::ErrorKind::Conflict) so the
    /// caller can re-resolve against a fresh listing. A reference without
    /// an etag cannot be validated and is fetched as-is.
    async fn fetch(&self, blob: &BlobRef) -> Result<Fetched>;
}
