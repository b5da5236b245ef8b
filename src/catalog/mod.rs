//! Catalog of tracks we already own. Read-only from the pipeline's side.

mod sqlite;

use async_trait::async_trait;

use crate::models::{CandidateTrack, CatalogStatus};

pub use sqlite::SqliteCatalog;

#[cfg(test)]
pub use sqlite::create_test_catalog;

#[async_trait]
pub trait Catalog: Send + Sync {
    /// `Error` when the lookup itself failed; the caller records it as-is.
    async fn lookup(&self, track: &CandidateTrack) -> CatalogStatus;
}
