//! Catalog models.
//!
//! These types describe remote objects as reported by a listing. They are
//! snapshots: once constructed they are never updated in place, and a fetch
//! re-validates against the snapshot rather than mutating it.

use time::OffsetDateTime;

/// A single remote object version.
///
/// The `etag` pins the exact content version this reference was taken from;
/// a fetch that observes a different etag means the blob was overwritten
/// after the listing. Backends without stable version identifiers report
/// `None` and callers fall back to `last_modified` + `size`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRef {
    /// Container the blob lives in
    pub container: String,
    /// Full blob name, including any virtual directory segments
    pub name: String,
    /// Last modified timestamp reported by the service
    pub last_modified: OffsetDateTime,
    /// Opaque content version identifier, if the backend exposes one
    pub etag: Option<String>,
    /// Content length in bytes
    pub size: u64,
    /// Content type reported by the service, passed through as the opener's
    /// mime hint
    pub content_type: Option<String>,
}

impl BlobRef {
    /// Create a new BlobRef from a listing operation.
    pub fn new(
        container: impl Into<String>,
        name: impl Into<String>,
        last_modified: OffsetDateTime,
        size: u64,
    ) -> Self {
        Self {
            container: container.into(),
            name: name.into(),
            last_modified,
            etag: None,
            size,
            content_type: None,
        }
    }

    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}
