//! Crash-safe local cache of downloaded blobs.
//!
//! This crate owns the flat `blobs` directory that downloaded blobs land
//! in. There is no index file: every finalized entry is a single file whose
//! name encodes (container, blob name, cache key), and the set of entries
//! is recovered purely by listing the directory and decoding names. Delete
//! the directory and the cache is simply empty — nothing else to rebuild.
//!
//! # Crash safety
//! Downloads stream into a `.part`-suffixed temporary sibling and are
//! renamed into place in one atomic step after the byte count checks out.
//! A reader can never observe a partially-written file under a finalized
//! name, and an interrupted run leaves at most an orphaned temporary that
//! later runs ignore (and `purge` removes).

pub mod error;
mod name;
mod store;

pub use crate::name::{decode, encode};
pub use crate::store::{CacheEntry, CacheStore, PurgeReport, cache_key};
