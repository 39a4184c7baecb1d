//! In-memory catalog for testing.

use crate::BlobCatalog;
use crate::backend::{BlobRefStream, Fetched};
use crate::error::{ErrorKind, Result};
use crate::models::BlobRef;
use async_stream::stream;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use time::OffsetDateTime;
use tokio::sync::RwLock;

/// Size of the chunks the mock download stream yields. Small enough that
/// multi-chunk behaviour (byte counting, mid-stream failure) is actually
/// exercised by tests with modest payloads.
const CHUNK_SIZE: usize = 8;

#[derive(Clone)]
struct MockBlob {
    data: Vec<u8>,
    last_modified: OffsetDateTime,
    etag: Option<String>,
    content_type: Option<String>,
    /// When set, listings and fetches report this size instead of the real
    /// byte count. Lets tests fake a truncated transfer.
    reported_size: Option<u64>,
    /// When set, the download stream fails after yielding this many bytes.
    fail_after: Option<usize>,
    revision: u64,
}

impl MockBlob {
    fn size(&self) -> u64 {
        self.reported_size.unwrap_or(self.data.len() as u64)
    }

    fn blob_ref(&self, container: &str, name: &str) -> BlobRef {
        BlobRef {
            container: container.to_string(),
            name: name.to_string(),
            last_modified: self.last_modified,
            etag: self.etag.clone(),
            size: self.size(),
            content_type: self.content_type.clone(),
        }
    }
}

/// In-memory catalog for testing.
///
/// Blobs are stored in a `BTreeMap` behind a [`RwLock`], so all trait
/// methods operate on `&self` without external synchronisation. Fetches are
/// counted, overwrites rotate the etag, and transfers can be made to fail or
/// lie about their size — everything needed to simulate the unhappy paths a
/// real storage service produces.
///
/// # Examples
///
/// ```
/// use blot_catalog::backend::MockCatalog;
/// use blot_catalog::BlobCatalog;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let catalog = MockCatalog::with_blobs("reports", [
///     ("daily/2026-08-07.csv", "a,b,c"),
/// ]);
/// assert_eq!(catalog.list("daily/").await?.len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct MockCatalog {
    container: String,
    blobs: RwLock<BTreeMap<String, MockBlob>>,
    fetches: AtomicUsize,
}

impl MockCatalog {
    /// Create a mock catalog pre-populated with blobs. Every blob starts at
    /// revision 1 with a distinct etag and the current timestamp.
    pub fn with_blobs(
        container: impl Into<String>,
        blobs: impl IntoIterator<Item = (impl Into<String>, impl Into<Vec<u8>>)>,
    ) -> Self {
        let now = OffsetDateTime::now_utc();
        let mut map = BTreeMap::new();
        for (name, data) in blobs {
            let name = name.into();
            let blob = MockBlob {
                data: data.into(),
                last_modified: now,
                etag: Some(format!("\"{name}-r1\"")),
                content_type: None,
                reported_size: None,
                fail_after: None,
                revision: 1,
            };
            map.insert(name, blob);
        }
        Self {
            container: container.into(),
            blobs: RwLock::new(map),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Number of downloads opened so far. The cache reuse fast path is
    /// observable as this number *not* going up.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Replace a blob's content, bumping its revision (new etag, new
    /// last-modified).
    ///
    /// Panics if the blob was never inserted; a test overwriting a blob it
    /// never created is a broken test.
    pub async fn overwrite(&self, name: &str, data: impl Into<Vec<u8>>, modified: OffsetDateTime) {
        let mut guard = self.blobs.write().await;
        let blob = guard.get_mut(name).expect("MockCatalog::overwrite: unknown blob");
        blob.data = data.into();
        blob.revision += 1;
        blob.etag = Some(format!("\"{name}-r{}\"", blob.revision));
        blob.last_modified = modified;
    }

    /// Drop all etags, simulating a backend without stable version
    /// identifiers.
    pub async fn strip_etags(&self) {
        let mut guard = self.blobs.write().await;
        for blob in guard.values_mut() {
            blob.etag = None;
        }
    }

    /// Make listings and fetch metadata report `size` for `name` regardless
    /// of the actual content length.
    pub async fn misreport_size(&self, name: &str, size: u64) {
        let mut guard = self.blobs.write().await;
        let blob = guard.get_mut(name).expect("MockCatalog::misreport_size: unknown blob");
        blob.reported_size = Some(size);
    }

    /// Make the download stream for `name` fail with a transient error
    /// after yielding `bytes` bytes.
    pub async fn fail_fetch_after(&self, name: &str, bytes: usize) {
        let mut guard = self.blobs.write().await;
        let blob = guard.get_mut(name).expect("MockCatalog::fail_fetch_after: unknown blob");
        blob.fail_after = Some(bytes);
    }

    /// Clear any injected faults for `name` so the next fetch succeeds.
    pub async fn clear_faults(&self, name: &str) {
        let mut guard = self.blobs.write().await;
        let blob = guard.get_mut(name).expect("MockCatalog::clear_faults: unknown blob");
        blob.reported_size = None;
        blob.fail_after = None;
    }

    /// Set a blob's last-modified timestamp (listing order in the map is
    /// name-based, so tests drive latest-selection through this).
    pub async fn set_modified(&self, name: &str, modified: OffsetDateTime) {
        let mut guard = self.blobs.write().await;
        let blob = guard.get_mut(name).expect("MockCatalog::set_modified: unknown blob");
        blob.last_modified = modified;
    }
}

#[async_trait]
impl BlobCatalog for MockCatalog {
    fn container(&self) -> &str {
        &self.container
    }

    fn list_stream<'a>(&'a self, prefix: &'a str) -> BlobRefStream<'a> {
        Box::pin(stream! {
            // Snapshot matching entries under the read lock, then drop it
            // before yielding to avoid holding the lock across yield points.
            let entries: Vec<BlobRef> = {
                let guard = self.blobs.read().await;
                guard
                    .iter()
                    .filter(|(name, _)| name.starts_with(prefix))
                    .map(|(name, blob)| blob.blob_ref(&self.container, name))
                    .collect()
            };
            for entry in entries {
                yield Ok(entry);
            }
        })
    }

    async fn fetch(&self, blob: &BlobRef) -> Result<Fetched> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let current = {
            let guard = self.blobs.read().await;
            guard
                .get(&blob.name)
                .cloned()
                .ok_or_else(|| exn::Exn::from(ErrorKind::BlobNotFound(blob.name.clone())))?
        };
        if let Some(expected) = &blob.etag
            && current.etag.as_deref() != Some(expected.as_str())
        {
            exn::bail!(ErrorKind::Conflict(format!(
                "{} was overwritten after it was listed",
                blob.name
            )));
        }

        let fetched = current.blob_ref(&self.container, &blob.name);
        let name = blob.name.clone();
        let data = Box::pin(stream! {
            let mut sent = 0usize;
            for chunk in current.data.chunks(CHUNK_SIZE) {
                if let Some(limit) = current.fail_after
                    && sent + chunk.len() > limit
                {
                    yield Err(exn::Exn::from(ErrorKind::Transient(format!(
                        "connection reset downloading {name}"
                    ))));
                    return;
                }
                sent += chunk.len();
                yield Ok(Bytes::copy_from_slice(chunk));
            }
        });
        Ok(Fetched { blob: fetched, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn test_list_filters_by_prefix() {
        let catalog = MockCatalog::with_blobs("c", [("a/one", "1"), ("a/two", "2"), ("b/three", "3")]);
        let listing = catalog.list("a/").await.unwrap();
        assert_eq!(listing.len(), 2);
        let listing = catalog.list("").await.unwrap();
        assert_eq!(listing.len(), 3);
    }

    #[tokio::test]
    async fn test_fetch_streams_content() {
        let catalog = MockCatalog::with_blobs("c", [("blob", "somewhat longer than one chunk")]);
        let blob = catalog.list("").await.unwrap().remove(0);
        let fetched = catalog.fetch(&blob).await.unwrap();
        let chunks: Vec<Bytes> = fetched.data.try_collect().await.unwrap();
        assert!(chunks.len() > 1, "content should span several chunks");
        let body: Vec<u8> = chunks.iter().flat_map(|chunk| chunk.iter().copied()).collect();
        assert_eq!(body, b"somewhat longer than one chunk");
        assert_eq!(catalog.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_unknown_blob() {
        let catalog = MockCatalog::with_blobs("c", [("blob", "data")]);
        let mut blob = catalog.list("").await.unwrap().remove(0);
        blob.name = "other".to_string();
        blob.etag = None;
        let err = catalog.fetch(&blob).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::BlobNotFound(_)));
    }

    #[tokio::test]
    async fn test_overwrite_conflicts_with_stale_ref() {
        let catalog = MockCatalog::with_blobs("c", [("blob", "v1")]);
        let stale = catalog.list("").await.unwrap().remove(0);
        catalog.overwrite("blob", "v2", OffsetDateTime::now_utc()).await;
        let err = catalog.fetch(&stale).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Conflict(_)));
    }

    #[tokio::test]
    async fn test_fail_after_cuts_the_stream() {
        let catalog = MockCatalog::with_blobs("c", [("blob", "0123456789abcdef")]);
        catalog.fail_fetch_after("blob", 8).await;
        let blob = catalog.list("").await.unwrap().remove(0);
        let fetched = catalog.fetch(&blob).await.unwrap();
        let result: std::result::Result<Vec<Bytes>, _> = fetched.data.try_collect().await;
        let err = result.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Transient(_)));
    }
}
