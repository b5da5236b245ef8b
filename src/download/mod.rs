//! Fetching missing tracks from the release page and tying the files on disk
//! back to their ledger rows.

mod downloader;
mod reconcile;
mod wait;

use std::path::Path;

pub use downloader::{DownloadSettings, Downloader};
pub use reconcile::{ReconcileReport, Reconciler};
pub use wait::{is_partial, wait_for_downloads, WaitOutcome};

/// Entry names of `dir`, sorted.
pub(crate) async fn entry_names(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}
