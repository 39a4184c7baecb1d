pub mod auth;
pub mod backend;
pub mod error;
mod models;
pub mod resolve;

pub use crate::auth::Credential;
pub use crate::backend::{BlobCatalog, Fetched};
pub use crate::models::BlobRef;
pub use crate::resolve::{ResolutionQuery, ResolutionResult, resolve};
use std::sync::Arc;

pub type CatalogHandle = Arc<dyn BlobCatalog + Send + Sync>;
