//! blot — resolve a blob by prefix, cache it locally, open it.
//!
//! The interesting work lives in the two library crates: `blot-catalog`
//! (remote listing, fetching, prefix resolution) and `blot-cache` (the
//! crash-safe local store). This binary wires them together and owns the
//! policy decisions the core deliberately doesn't: how often to retry
//! transient failures, what to do on a concurrent-overwrite conflict
//! (re-resolve once), and where the cache directory lives.

mod cli;

use crate::cli::{CacheCommand, Cli, Command, StorageArgs};
use blot_cache::error::ErrorKind as CacheErrorKind;
use blot_cache::{CacheEntry, CacheStore};
use blot_catalog::backend::AzureCatalog;
use blot_catalog::error::ErrorKind as CatalogErrorKind;
use blot_catalog::{
    BlobCatalog, BlobRef, CatalogHandle, Credential, ResolutionQuery, ResolutionResult, resolve,
};
use clap::Parser;
use directories::ProjectDirs;
use indicatif::{ProgressBar, ProgressStyle};
use miette::{Result, miette};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// How many times a transient failure is attempted before giving up.
const MAX_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Open { storage, prefix, name } => {
            open_blob(&storage, prefix, name, cli.cache_dir).await
        },
        Command::List { storage, prefix } => {
            list_blobs(&storage, prefix.unwrap_or_default()).await
        },
        Command::Cache { action } => match action {
            CacheCommand::List { json } => cache_list(cli.cache_dir, json).await,
            CacheCommand::Purge => cache_purge(cli.cache_dir).await,
        },
    }
}

async fn open_blob(
    storage: &StorageArgs,
    prefix: String,
    exact_name: Option<String>,
    cache_dir: Option<PathBuf>,
) -> Result<()> {
    let catalog = build_catalog(storage)?;
    let store = CacheStore::open(cache_dir_or_default(cache_dir)?).map_err(render)?;
    let query = match exact_name {
        Some(name) => ResolutionQuery::exact(prefix, name),
        None => ResolutionQuery::latest(prefix),
    };

    let bar = spinner();
    bar.set_message("finding the blob");
    let (blob, entry) = materialize(catalog.as_ref(), &store, &query, &bar).await?;
    bar.finish_with_message(format!("opening {}", blob.name));

    open_file(&entry.local_path, blob.content_type.as_deref())
}

/// Resolve the query and make sure a finalized local copy exists.
///
/// If the blob is overwritten between the listing and the download, the
/// fetch fails with a conflict; the selection that conflict invalidated is
/// thrown away and resolution runs once more against fresh state. A second
/// conflict means the remote side is churning faster than we can follow,
/// and that gets reported rather than chased.
async fn materialize(
    catalog: &dyn BlobCatalog,
    store: &CacheStore,
    query: &ResolutionQuery,
    bar: &ProgressBar,
) -> Result<(BlobRef, CacheEntry)> {
    let blob = resolve_single(catalog, query).await?;
    bar.set_message(format!("downloading {}", blob.name));
    match fetch_with_retries(store, catalog, &blob).await {
        Ok(entry) => Ok((blob, entry)),
        Err(err) if is_conflict(&err) => {
            info!(name = %blob.name, "blob changed during download, re-resolving");
            let blob = resolve_single(catalog, query).await?;
            bar.set_message(format!("downloading {}", blob.name));
            let entry = fetch_with_retries(store, catalog, &blob).await.map_err(render)?;
            Ok((blob, entry))
        },
        Err(err) => Err(render(err)),
    }
}

async fn fetch_with_retries(
    store: &CacheStore,
    catalog: &dyn BlobCatalog,
    blob: &BlobRef,
) -> std::result::Result<CacheEntry, blot_cache::error::Error> {
    with_retries(|| store.get_or_fetch(catalog, blob), |err| err.is_retryable()).await
}

fn is_conflict(err: &blot_cache::error::Error) -> bool {
    matches!(&**err, CacheErrorKind::Catalog(CatalogErrorKind::Conflict(_)))
}

/// List, resolve, and insist on a single selection.
async fn resolve_single(catalog: &dyn BlobCatalog, query: &ResolutionQuery) -> Result<BlobRef> {
    let listing = with_retries(|| catalog.list(&query.prefix), |err| err.is_retryable())
        .await
        .map_err(render)?;
    debug!(count = listing.len(), prefix = %query.prefix, "listed blobs");
    match resolve(listing, query) {
        ResolutionResult::Single(blob) => Ok(blob),
        ResolutionResult::NotFound => Err(not_found(catalog, query)),
        // Open queries never carry list_mode.
        ResolutionResult::Many(_) => unreachable!("single-blob query produced a listing"),
    }
}

fn not_found(catalog: &dyn BlobCatalog, query: &ResolutionQuery) -> miette::Report {
    match &query.exact_name {
        Some(name) => miette!(
            "no blob named '{}' under prefix '{}' in container '{}'",
            name,
            query.prefix,
            catalog.container()
        ),
        None => miette!(
            "no blobs under prefix '{}' in container '{}'",
            query.prefix,
            catalog.container()
        ),
    }
}

async fn list_blobs(storage: &StorageArgs, prefix: String) -> Result<()> {
    let catalog = build_catalog(storage)?;
    let query = ResolutionQuery::listing(prefix);
    let listing = with_retries(|| catalog.list(&query.prefix), |err| err.is_retryable())
        .await
        .map_err(render)?;
    match resolve(listing, &query) {
        ResolutionResult::Many(blobs) => {
            for blob in blobs {
                println!("{}", blob.name);
            }
            Ok(())
        },
        ResolutionResult::NotFound => Err(not_found(catalog.as_ref(), &query)),
        ResolutionResult::Single(_) => unreachable!("list query produced a single blob"),
    }
}

async fn cache_list(cache_dir: Option<PathBuf>, json: bool) -> Result<()> {
    let store = CacheStore::open(cache_dir_or_default(cache_dir)?).map_err(render)?;
    let entries = store.entries().await.map_err(render)?;
    if json {
        let rendered =
            serde_json::to_string_pretty(&entries).map_err(|err| miette!("{err}"))?;
        println!("{rendered}");
        return Ok(());
    }
    for entry in entries {
        println!(
            "{}/{}\t{} bytes\t{}",
            entry.container,
            entry.blob_name,
            entry.size_bytes,
            entry.local_path.display()
        );
    }
    Ok(())
}

async fn cache_purge(cache_dir: Option<PathBuf>) -> Result<()> {
    let store = CacheStore::open(cache_dir_or_default(cache_dir)?).map_err(render)?;
    let report = store.purge().await.map_err(render)?;
    println!(
        "removed {} cached blobs and {} partial downloads, freed {} bytes",
        report.entries_removed, report.temp_files_removed, report.bytes_freed
    );
    Ok(())
}

fn build_catalog(storage: &StorageArgs) -> Result<CatalogHandle> {
    let credential = Credential::from_key(storage.storage_account_key.clone());
    let catalog =
        AzureCatalog::new(storage.storage_account.as_str(), storage.container.as_str(), credential)
            .map_err(render)?;
    Ok(Arc::new(catalog))
}

fn cache_dir_or_default(cache_dir: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = cache_dir {
        return Ok(dir);
    }
    let dirs = ProjectDirs::from("", "", "blot")
        .ok_or_else(|| miette!("no usable cache location on this system; pass --cache-dir"))?;
    Ok(dirs.cache_dir().join("blobs"))
}

/// Opener bridge: hand the finalized local file to the platform's default
/// program. The mime hint is logged for troubleshooting; the platform
/// launcher picks the program from the file itself.
fn open_file(path: &Path, mime_hint: Option<&str>) -> Result<()> {
    if let Some(mime) = mime_hint {
        debug!(mime, path = %path.display(), "opening");
    }
    opener::open(path).map_err(|err| miette!("could not open {}: {err}", path.display()))
}

fn spinner() -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    // Static template string; cannot fail to parse.
    bar.set_style(ProgressStyle::with_template("[{elapsed_precise}] {msg}").unwrap());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// Retry transient failures a bounded number of times; anything fatal
/// passes straight through on the first attempt.
async fn with_retries<T, E>(
    mut op: impl AsyncFnMut() -> std::result::Result<T, E>,
    is_retryable: impl Fn(&E) -> bool,
) -> std::result::Result<T, E> {
    let mut attempt = 1;
    loop {
        match op().await {
            Err(err) if attempt < MAX_ATTEMPTS && is_retryable(&err) => {
                debug!(attempt, "transient failure, retrying");
                tokio::time::sleep(RETRY_DELAY).await;
                attempt += 1;
            },
            result => return result,
        }
    }
}

/// Single human-readable cause for the user; the `RUST_LOG`-gated tracing
/// output carries the detail.
fn render<K: std::error::Error + Send + Sync + 'static>(err: exn::Exn<K>) -> miette::Report {
    miette!("{}", &*err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    enum FakeError {
        Transient,
        Fatal,
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_stop_at_the_cap() {
        let calls = AtomicU32::new(0);
        let result: Result<(), FakeError> = with_retries(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FakeError::Transient)
            },
            |err| matches!(err, FakeError::Transient),
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_then_success() {
        let calls = AtomicU32::new(0);
        let result = with_retries(
            || async {
                match calls.fetch_add(1, Ordering::SeqCst) {
                    0 => Err(FakeError::Transient),
                    n => Ok(n),
                }
            },
            |err| matches!(err, FakeError::Transient),
        )
        .await;
        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), FakeError> = with_retries(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FakeError::Fatal)
            },
            |err| matches!(err, FakeError::Transient),
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
