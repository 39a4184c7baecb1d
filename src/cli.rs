//! Command-line surface.
//!
//! Storage arguments mirror the environment variables the tool has always
//! read (`STORAGE_ACCOUNT`, `STORAGE_ACCOUNT_KEY`, `STORAGE_CONTAINER`),
//! so flags are only needed to override the environment.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Directory downloaded blobs are cached in
    #[arg(long("cache-dir"), env("BLOT_CACHE_DIR"), global(true))]
    pub cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct StorageArgs {
    /// Name of the storage account
    #[arg(
        short('s'),
        long("storage-account"),
        env("STORAGE_ACCOUNT"),
        required(true)
    )]
    pub storage_account: String,

    /// Storage account key; ambient identity is used when omitted
    #[arg(short('k'), long("storage-account-key"), env("STORAGE_ACCOUNT_KEY"))]
    pub storage_account_key: Option<String>,

    /// Name of the blob container
    #[arg(
        short('c'),
        long("container-name"),
        env("STORAGE_CONTAINER"),
        required(true)
    )]
    pub container: String,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Download the newest blob under a prefix and open it
    Open {
        #[command(flatten)]
        storage: StorageArgs,

        /// Prefix of the blob
        #[arg(index(1), required(true))]
        prefix: String,

        /// Exact file name under the prefix, instead of newest-wins
        #[arg(short('n'), long("name"))]
        name: Option<String>,
    },
    /// Print the name of every blob matching a prefix
    List {
        #[command(flatten)]
        storage: StorageArgs,

        /// Prefix to filter by; everything in the container when omitted
        #[arg(index(1))]
        prefix: Option<String>,
    },
    /// Inspect or clean the local blob cache
    Cache {
        #[command(subcommand)]
        action: CacheCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// List every cached blob
    List {
        /// Machine-readable JSON output
        #[arg(long)]
        json: bool,
    },
    /// Delete all cached blobs and stale partial downloads
    Purge,
}
