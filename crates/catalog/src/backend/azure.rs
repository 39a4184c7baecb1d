//! Azure Blob Storage catalog backend.
//!
//! Thin adapter over the Azure storage SDK: paged listings become a flat
//! [`BlobRef`] stream, chunked downloads become a flat byte stream, and SDK
//! errors are folded into the catalog error taxonomy.

use crate::BlobCatalog;
use crate::auth::Credential;
use crate::backend::{BlobRefStream, Fetched};
use crate::error::{ErrorKind, Result};
use crate::models::BlobRef;
use async_stream::stream;
use async_trait::async_trait;
use azure_core::StatusCode;
use azure_core::error::ErrorKind as AzureErrorKind;
use azure_storage_blobs::blob::Blob;
use azure_storage_blobs::container::operations::list_blobs::BlobItem;
use azure_storage_blobs::prelude::*;
use futures::StreamExt;
use tracing::debug;

/// Catalog backed by one Azure Blob Storage container.
///
/// # Examples
///
/// ```no_run
/// use blot_catalog::backend::AzureCatalog;
/// use blot_catalog::Credential;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let catalog = AzureCatalog::new(
///     "mystorageaccount",
///     "reports",
///     Credential::from_key(None),
/// )?;
/// # Ok(())
/// # }
/// ```
pub struct AzureCatalog {
    container: String,
    client: ContainerClient,
}

impl AzureCatalog {
    /// Create a catalog for `container` in `account`.
    ///
    /// # Errors
    /// Fails with [`Access`](ErrorKind::Access) when ambient credential
    /// discovery comes up empty. Bad keys or missing containers only show
    /// up on the first request.
    pub fn new(
        account: impl Into<String>,
        container: impl Into<String>,
        credential: Credential,
    ) -> Result<Self> {
        let account = account.into();
        let container = container.into();
        let credentials = credential.into_storage_credentials(&account)?;
        let client = ClientBuilder::new(&account, credentials).container_client(&container);
        Ok(Self { container, client })
    }

    /// Re-use the same conversion for listing items and fetch responses.
    fn blob_ref(container: &str, blob: Blob) -> BlobRef {
        let properties = blob.properties;
        BlobRef {
            container: container.to_string(),
            name: blob.name,
            last_modified: properties.last_modified,
            etag: Some(properties.etag.to_string()),
            size: properties.content_length,
            content_type: Some(properties.content_type).filter(|ct| !ct.is_empty()),
        }
    }

    /// Fold an SDK error into the catalog taxonomy.
    ///
    /// `blob` is the blob name for requests made against a single blob,
    /// `None` for container-level requests; a 404 means a different thing
    /// in each case, and the service's error code tells them apart when
    /// both are possible.
    fn map_azure_error(err: azure_core::Error, container: &str, blob: Option<&str>) -> ErrorKind {
        match err.kind() {
            AzureErrorKind::HttpResponse { status, error_code } => match *status {
                StatusCode::Unauthorized | StatusCode::Forbidden => {
                    ErrorKind::Access(err.to_string())
                },
                StatusCode::NotFound => {
                    let code = error_code.as_deref().unwrap_or_default();
                    match blob {
                        Some(name) if !code.eq_ignore_ascii_case("ContainerNotFound") => {
                            ErrorKind::BlobNotFound(name.to_string())
                        },
                        _ => ErrorKind::ContainerNotFound(container.to_string()),
                    }
                },
                StatusCode::Conflict | StatusCode::PreconditionFailed => {
                    ErrorKind::Conflict(err.to_string())
                },
                _ => ErrorKind::Transient(err.to_string()),
            },
            AzureErrorKind::Credential => ErrorKind::Access(err.to_string()),
            _ => ErrorKind::Transient(err.to_string()),
        }
    }
}

#[async_trait]
impl BlobCatalog for AzureCatalog {
    fn container(&self) -> &str {
        &self.container
    }

    fn list_stream<'a>(&'a self, prefix: &'a str) -> BlobRefStream<'a> {
        let mut pages = self.client.list_blobs().prefix(prefix.to_string()).into_stream();
        Box::pin(stream! {
            while let Some(page) = pages.next().await {
                let page = match page {
                    Ok(page) => page,
                    Err(err) => {
                        yield Err(exn::Exn::from(Self::map_azure_error(err, &self.container, None)));
                        return;
                    },
                };
                for item in page.blobs.items {
                    // Virtual-directory markers only show up when listing
                    // with a delimiter; skip them if the service sends any.
                    if let BlobItem::Blob(blob) = item {
                        yield Ok(Self::blob_ref(&self.container, blob));
                    }
                }
            }
        })
    }

    async fn fetch(&self, blob: &BlobRef) -> Result<Fetched> {
        let client = self.client.blob_client(&blob.name);
        let mut pages = client.get().into_stream();
        let first = match pages.next().await {
            Some(Ok(first)) => first,
            Some(Err(err)) => {
                return Err(exn::Exn::from(Self::map_azure_error(
                    err,
                    &self.container,
                    Some(&blob.name),
                )));
            },
            None => exn::bail!(ErrorKind::Transient(format!(
                "empty response fetching {}",
                blob.name
            ))),
        };

        let fetched = Self::blob_ref(&self.container, first.blob);
        if let Some(expected) = &blob.etag
            && fetched.etag.as_deref() != Some(expected.as_str())
        {
            exn::bail!(ErrorKind::Conflict(format!(
                "{} was overwritten after it was listed",
                blob.name
            )));
        }
        debug!(name = %fetched.name, size = fetched.size, "opened download");

        let container = self.container.clone();
        let name = fetched.name.clone();
        let expected_etag = fetched.etag.clone();
        let mut body = first.data;
        let data = Box::pin(stream! {
            while let Some(chunk) = body.next().await {
                match chunk {
                    Ok(bytes) => yield Ok(bytes),
                    Err(err) => {
                        yield Err(exn::Exn::from(Self::map_azure_error(err, &container, Some(&name))));
                        return;
                    },
                }
            }
            // A large download spans several range requests. If the blob is
            // overwritten in between, the etag moves and the assembled bytes
            // would be a mix of two versions.
            while let Some(page) = pages.next().await {
                let page = match page {
                    Ok(page) => page,
                    Err(err) => {
                        yield Err(exn::Exn::from(Self::map_azure_error(err, &container, Some(&name))));
                        return;
                    },
                };
                if let Some(expected) = &expected_etag
                    && page.blob.properties.etag.to_string() != *expected
                {
                    yield Err(exn::Exn::from(ErrorKind::Conflict(format!(
                        "{name} was overwritten mid-download"
                    ))));
                    return;
                }
                let mut body = page.data;
                while let Some(chunk) = body.next().await {
                    match chunk {
                        Ok(bytes) => yield Ok(bytes),
                        Err(err) => {
                            yield Err(exn::Exn::from(Self::map_azure_error(err, &container, Some(&name))));
                            return;
                        },
                    }
                }
            }
        });

        Ok(Fetched { blob: fetched, data })
    }
}
