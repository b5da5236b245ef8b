use std::path::{Path, PathBuf};

use super::{entry_names, is_partial};
use crate::error::Result;
use crate::ledger::Ledger;
use crate::models::BatchId;

/// Characters that never survive into a downloaded file name.
const ILLEGAL_FILENAME_CHARS: &[char] = &['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// (title, absolute file path) pairs written to the ledger
    pub matched: Vec<(String, PathBuf)>,
    pub unmatched: Vec<String>,
}

/// Matches downloaded files back to the ledger rows they were fetched for.
pub struct Reconciler {
    ledger: Ledger,
    partial_suffixes: Vec<String>,
}

impl Reconciler {
    pub fn new(ledger: Ledger, partial_suffixes: Vec<String>) -> Self {
        Self {
            ledger,
            partial_suffixes,
        }
    }

    pub async fn reconcile(&self, batch_id: &BatchId, dir: &Path) -> Result<ReconcileReport> {
        tracing::info!("Updating file paths for batch {}...", batch_id);
        let mut report = ReconcileReport::default();

        let files = match self.completed_files(dir).await {
            Ok(files) => files,
            Err(e) => {
                tracing::info!("Download folder not readable: {}", e);
                return Ok(report);
            }
        };
        if files.is_empty() {
            tracing::info!("No files found in folder.");
            return Ok(report);
        }

        let dir = std::path::absolute(dir)?;
        let rows = self.ledger.rows_for_batch(batch_id).await?;

        for row in rows.iter().filter(|row| !row.has_file_path()) {
            let Some(file) = match_file(&row.title, &files) else {
                tracing::info!("Could not match file for track: {}", row.title);
                report.unmatched.push(row.title.clone());
                continue;
            };

            let path = dir.join(file);
            match self.ledger.write_file_path(batch_id, &row.title, &path).await {
                Ok(true) => {
                    tracing::info!("Updated path: {}", file);
                    report.matched.push((row.title.clone(), path));
                }
                Ok(false) => report.unmatched.push(row.title.clone()),
                Err(e) => {
                    tracing::warn!("Could not record path for {}: {}", row.title, e);
                    report.unmatched.push(row.title.clone());
                }
            }
        }

        Ok(report)
    }

    async fn completed_files(&self, dir: &Path) -> std::io::Result<Vec<String>> {
        let names = entry_names(dir).await?;
        Ok(names
            .into_iter()
            .filter(|name| !is_partial(name, &self.partial_suffixes))
            .filter(|name| dir.join(name).is_file())
            .collect())
    }
}

/// First file whose name contains the sanitized title.
fn match_file<'a>(title: &str, files: &'a [String]) -> Option<&'a str> {
    let needle = normalize(&sanitize_title(title));
    if needle.is_empty() {
        return None;
    }
    files
        .iter()
        .map(String::as_str)
        .find(|file| normalize(file).contains(&needle))
}

fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| !ILLEGAL_FILENAME_CHARS.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Lowercase with underscores and whitespace runs folded to single spaces.
fn normalize(value: &str) -> String {
    value
        .replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
