//! The local blob store.
//!
//! One flat directory of finalized downloads, addressed by
//! (container, blob name, cache key). A new remote version gets a new cache
//! key and therefore a new file; finalized files are never rewritten in
//! place. The store never assumes it owns the whole directory — it only
//! reads and writes files matching its own naming scheme.

use crate::error::{ErrorKind, Result};
use crate::name;
use blot_catalog::{BlobCatalog, BlobRef};
use futures::StreamExt;
use serde::Serialize;
use std::fs::create_dir_all as sync_create_dir;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Suffix marking an in-progress download. Files carrying it are never
/// reported as entries and never reused.
const TEMP_SUFFIX: &str = ".part";

/// A materialized local copy of one remote blob version.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct CacheEntry {
    /// Container the blob was fetched from
    pub container: String,
    /// Full remote blob name
    pub blob_name: String,
    /// Version identifier the copy was stored under
    pub cache_key: String,
    /// Where the finalized file lives
    pub local_path: PathBuf,
    /// Size of the finalized file in bytes
    pub size_bytes: u64,
}

/// What [`CacheStore::purge`] cleaned up.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PurgeReport {
    /// Finalized entries removed
    pub entries_removed: usize,
    /// Orphaned temporary files removed
    pub temp_files_removed: usize,
    /// Total bytes freed
    pub bytes_freed: u64,
}

/// Derive the cache key that pins a blob version to a local file name.
///
/// The etag is preferred: it changes exactly when content changes. Backends
/// without etags fall back to last-modified + size, which is a policy
/// choice, not a guaranteed dedup key — two different contents written in
/// the same second with the same length would collide.
pub fn cache_key(blob: &BlobRef) -> String {
    match &blob.etag {
        Some(etag) => format!("etag:{}", etag.trim_matches('"')),
        None => format!("mod:{}:{}", blob.last_modified.unix_timestamp(), blob.size),
    }
}

/// Flat on-disk store of downloaded blobs.
///
/// # Examples
///
/// ```no_run
/// use blot_cache::CacheStore;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = CacheStore::open("/home/me/.cache/blot/blobs")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    /// Open (creating if necessary) the store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidRoot(root));
            }
        } else {
            // Non-async here; this happens once per invocation and it's not
            // worth making the constructor async for it.
            sync_create_dir(&root).map_err(ErrorKind::Io)?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_name_for(blob: &BlobRef) -> String {
        name::encode(&blob.container, &blob.name, &cache_key(blob))
    }

    /// Return a local path holding exactly the version `blob` refers to,
    /// downloading it first if no finalized copy exists.
    ///
    /// The reuse fast path — a finalized file already present for this
    /// cache key — returns without any network traffic; that is the whole
    /// reason the cache exists. Otherwise the content is streamed into a
    /// temporary sibling, its byte count checked against the size the
    /// catalog reported ([`Integrity`](ErrorKind::Integrity) on mismatch),
    /// and the temporary renamed into its final name in one atomic step.
    ///
    /// Failure at any point — including the future being dropped — deletes
    /// the temporary; the cache never records a partial download. Two
    /// concurrent invocations may both download and both finalize: the
    /// loser atomically overwrites the winner's file with identical bytes.
    pub async fn get_or_fetch(&self, catalog: &dyn BlobCatalog, blob: &BlobRef) -> Result<CacheEntry> {
        let file_name = Self::file_name_for(blob);
        let final_path = self.root.join(&file_name);

        match fs::metadata(&final_path).await {
            Ok(metadata) => {
                debug!(name = %blob.name, path = %final_path.display(), "cache hit");
                return Ok(CacheEntry {
                    container: blob.container.clone(),
                    blob_name: blob.name.clone(),
                    cache_key: cache_key(blob),
                    local_path: final_path,
                    size_bytes: metadata.len(),
                });
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => {},
            Err(err) => return Err(exn::Exn::from(ErrorKind::Io(err))),
        }

        debug!(name = %blob.name, "cache miss, downloading");
        let fetched = catalog.fetch(blob).await.map_err(ErrorKind::catalog)?;

        // The temporary lives in the store directory itself so the final
        // rename never crosses a filesystem boundary. Dropping `temp_path`
        // (error return, cancellation) deletes the file.
        let temp = tempfile::Builder::new()
            .prefix(&format!("{file_name}."))
            .suffix(TEMP_SUFFIX)
            .tempfile_in(&self.root)
            .map_err(ErrorKind::Io)?;
        let (file, temp_path) = temp.into_parts();
        let mut file = fs::File::from_std(file);

        let mut data = fetched.data;
        let mut written: u64 = 0;
        while let Some(chunk) = data.next().await {
            let chunk = chunk.map_err(ErrorKind::catalog)?;
            written += chunk.len() as u64;
            file.write_all(&chunk).await.map_err(ErrorKind::Io)?;
        }
        file.flush().await.map_err(ErrorKind::Io)?;
        file.sync_all().await.map_err(ErrorKind::Io)?;
        drop(file);

        if written != fetched.blob.size {
            exn::bail!(ErrorKind::Integrity { expected: fetched.blob.size, actual: written });
        }

        temp_path.persist(&final_path).map_err(|err| ErrorKind::Io(err.error))?;
        debug!(name = %blob.name, bytes = written, path = %final_path.display(), "finalized");

        Ok(CacheEntry {
            container: blob.container.clone(),
            blob_name: blob.name.clone(),
            cache_key: cache_key(blob),
            local_path: final_path,
            size_bytes: written,
        })
    }

    /// Enumerate every finalized entry, recovered purely from the directory
    /// listing. Files the codec doesn't recognise (foreign files, `.part`
    /// temporaries) are ignored, not errors.
    pub async fn entries(&self) -> Result<Vec<CacheEntry>> {
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&self.root).await.map_err(ErrorKind::Io)?;
        while let Some(dirent) = dir.next_entry().await.map_err(ErrorKind::Io)? {
            let file_name = dirent.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            let Some((container, blob_name, cache_key)) = name::decode(file_name) else {
                continue;
            };
            let metadata = dirent.metadata().await.map_err(ErrorKind::Io)?;
            if !metadata.is_file() {
                continue;
            }
            entries.push(CacheEntry {
                container,
                blob_name,
                cache_key,
                local_path: dirent.path(),
                size_bytes: metadata.len(),
            });
        }
        // Directory order is arbitrary; sort for reproducible output.
        entries.sort_by(|a, b| a.local_path.cmp(&b.local_path));
        Ok(entries)
    }

    /// Remove every finalized entry and any orphaned temporary files left
    /// behind by interrupted runs. Files that aren't ours stay untouched.
    pub async fn purge(&self) -> Result<PurgeReport> {
        let mut report = PurgeReport::default();
        let mut dir = fs::read_dir(&self.root).await.map_err(ErrorKind::Io)?;
        while let Some(dirent) = dir.next_entry().await.map_err(ErrorKind::Io)? {
            let file_name = dirent.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            let is_entry = name::decode(file_name).is_some();
            let is_temp = Self::is_own_temp(file_name);
            if !is_entry && !is_temp {
                continue;
            }
            let metadata = dirent.metadata().await.map_err(ErrorKind::Io)?;
            if !metadata.is_file() {
                continue;
            }
            fs::remove_file(dirent.path()).await.map_err(ErrorKind::Io)?;
            report.bytes_freed += metadata.len();
            if is_entry {
                report.entries_removed += 1;
            } else {
                report.temp_files_removed += 1;
            }
        }
        Ok(report)
    }

    /// A temporary is `<encoded-entry-name>.<random>.part`: recognise ours
    /// by the suffix plus a decodable stem, so someone else's `.part` files
    /// survive a purge.
    fn is_own_temp(file_name: &str) -> bool {
        file_name.ends_with(TEMP_SUFFIX)
            && file_name.split('.').next().is_some_and(|stem| name::decode(stem).is_some())
    }
}
