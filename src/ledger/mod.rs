//! The ledger: durable record of every URL processed, the tracks found there,
//! their catalog status and, once downloaded, the local file path.
//!
//! Stores only know how to append, filter and update single fields. The
//! pipeline-level operations live on [`Ledger`].

mod schema;
mod sheets;
mod sqlite;

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    BatchId, CatalogStatus, CheckedTrack, LedgerField, LedgerRow, RowFilter, RowId, RunLogEntry,
    StoredRow,
};

pub use sheets::SheetsLedger;
pub use sqlite::SqliteLedger;

pub const MAIN_HEADER: [&str; 6] = ["BatchID", "URL", "Title", "Artist", "InCatalog", "FilePath"];

pub const RUN_LOG_HEADER: [&str; 6] = [
    "Run Number",
    "Timestamp",
    "Emails Processed",
    "URLs Added",
    "Tracks Extracted",
    "Downloads",
];

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Create missing tabs/tables and headers.
    async fn ensure_layout(&self) -> Result<()>;

    async fn append_rows(&self, rows: &[LedgerRow]) -> Result<usize>;

    /// Matching rows in ledger order.
    async fn rows_where(&self, filter: &RowFilter) -> Result<Vec<StoredRow>>;

    async fn update_field(&self, id: RowId, field: LedgerField, value: &str) -> Result<()>;

    /// Every non-empty URL cell, including rows `rows_where` skips as malformed.
    async fn recorded_urls(&self) -> Result<HashSet<String>>;

    /// 0 when nothing has been logged yet.
    async fn last_run_number(&self) -> Result<u64>;

    async fn append_run_log(&self, entry: &RunLogEntry) -> Result<()>;
}

#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn LedgerStore>,
}

impl Ledger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn LedgerStore {
        self.store.as_ref()
    }

    /// Rows of the batch that still need downloading.
    pub async fn rows_for_batch(&self, batch_id: &BatchId) -> Result<Vec<LedgerRow>> {
        let filter = RowFilter::batch(batch_id).with_status(CatalogStatus::No);
        let rows = self.store.rows_where(&filter).await?;
        Ok(rows.into_iter().map(|stored| stored.row).collect())
    }

    /// One row per track, or a single placeholder row so the URL still
    /// leaves a trace.
    pub async fn append_candidates(
        &self,
        batch_id: &BatchId,
        url: &str,
        tracks: &[CheckedTrack],
    ) -> Result<usize> {
        let rows: Vec<LedgerRow> = if tracks.is_empty() {
            vec![LedgerRow::placeholder(batch_id, url)]
        } else {
            tracks
                .iter()
                .map(|checked| LedgerRow::for_track(batch_id, url, checked))
                .collect()
        };

        let written = self.store.append_rows(&rows).await?;
        tracing::info!("Added {} rows to ledger for batch {}", written, batch_id);
        Ok(written)
    }

    /// Record `path` on the first unresolved missing-track row of the batch
    /// with this title. Returns false when no such row exists.
    pub async fn write_file_path(&self, batch_id: &BatchId, title: &str, path: &Path) -> Result<bool> {
        let filter = RowFilter::batch(batch_id).with_status(CatalogStatus::No);
        let target = self
            .store
            .rows_where(&filter)
            .await?
            .into_iter()
            .find(|stored| {
                stored.row.is_missing() && stored.row.title == title && !stored.row.has_file_path()
            });

        let Some(stored) = target else {
            return Ok(false);
        };

        self.store
            .update_field(stored.id, LedgerField::FilePath, &path.to_string_lossy())
            .await?;
        Ok(true)
    }

    /// Every URL recorded so far, placeholders and unreadable rows included.
    pub async fn known_urls(&self) -> Result<HashSet<String>> {
        self.store.recorded_urls().await
    }

    pub async fn ensure_layout(&self) -> Result<()> {
        self.store.ensure_layout().await
    }

    pub async fn last_run_number(&self) -> Result<u64> {
        self.store.last_run_number().await
    }

    pub async fn log_run(&self, entry: &RunLogEntry) -> Result<()> {
        self.store.append_run_log(entry).await
    }
}

/// Parse the textual status column. Empty means placeholder; anything
/// unrecognised marks the row as corrupt.
pub(crate) fn parse_status(raw: Option<&str>) -> std::result::Result<Option<CatalogStatus>, String> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => text.parse().map(Some),
    }
}
