mod ledger;
mod run;
mod track;

pub use ledger::{BatchId, LedgerField, LedgerRow, RowFilter, RowId, StoredRow};
pub use run::{NotificationOutcome, RunLogEntry, RunStats};
pub use track::{CandidateTrack, CatalogStatus, CheckedTrack, MessageHandle};
