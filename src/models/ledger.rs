use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CandidateTrack, CatalogStatus, CheckedTrack};

/// Short token grouping every ledger row and downloaded file of one URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchId(String);

impl BatchId {
    pub const LEN: usize = 8;

    pub fn generate() -> Self {
        let mut token = Uuid::new_v4().simple().to_string();
        token.truncate(Self::LEN);
        Self(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BatchId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for BatchId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Store-specific row key: sheet row number or SQLite rowid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerField {
    FilePath,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRow {
    pub batch_id: BatchId,
    pub url: String,
    pub title: String,
    pub artist: String,
    /// `None` only on the placeholder row written for a page with no tracks.
    pub in_catalog: Option<CatalogStatus>,
    pub file_path: Option<String>,
}

impl LedgerRow {
    pub fn for_track(batch_id: &BatchId, url: &str, checked: &CheckedTrack) -> Self {
        Self {
            batch_id: batch_id.clone(),
            url: url.to_string(),
            title: checked.track.title.clone(),
            artist: checked.track.artist.clone(),
            in_catalog: Some(checked.status),
            file_path: None,
        }
    }

    pub fn placeholder(batch_id: &BatchId, url: &str) -> Self {
        Self {
            batch_id: batch_id.clone(),
            url: url.to_string(),
            title: String::new(),
            artist: String::new(),
            in_catalog: None,
            file_path: None,
        }
    }

    pub fn track(&self) -> CandidateTrack {
        CandidateTrack::new(self.title.clone(), self.artist.clone())
    }

    pub fn is_missing(&self) -> bool {
        self.in_catalog == Some(CatalogStatus::No)
    }

    pub fn has_file_path(&self) -> bool {
        self.file_path.as_deref().is_some_and(|p| !p.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    pub id: RowId,
    pub row: LedgerRow,
}

/// Predicate for `LedgerStore::rows_where`. Empty filter matches every row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowFilter {
    pub batch_id: Option<BatchId>,
    pub in_catalog: Option<CatalogStatus>,
}

impl RowFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn batch(batch_id: &BatchId) -> Self {
        Self {
            batch_id: Some(batch_id.clone()),
            in_catalog: None,
        }
    }

    pub fn with_status(mut self, status: CatalogStatus) -> Self {
        self.in_catalog = Some(status);
        self
    }

    pub fn matches(&self, row: &LedgerRow) -> bool {
        if let Some(batch_id) = &self.batch_id {
            if &row.batch_id != batch_id {
                return false;
            }
        }
        if let Some(status) = self.in_catalog {
            if row.in_catalog != Some(status) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_batch_ids_are_short_and_distinct() {
        let a = BatchId::generate();
        let b = BatchId::generate();
        assert_eq!(a.as_str().len(), BatchId::LEN);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn filter_matches_batch_and_status() {
        let batch = BatchId::from("ab12cd34");
        let checked = CheckedTrack {
            track: CandidateTrack::new("Night Drive", "A. Rivers"),
            status: CatalogStatus::No,
        };
        let row = LedgerRow::for_track(&batch, "https://x/portal", &checked);
        let placeholder = LedgerRow::placeholder(&batch, "https://x/portal");

        let filter = RowFilter::batch(&batch).with_status(CatalogStatus::No);
        assert!(filter.matches(&row));
        assert!(!filter.matches(&placeholder));
        assert!(RowFilter::all().matches(&placeholder));
        assert!(!RowFilter::batch(&BatchId::from("ffffffff")).matches(&row));
    }
}
