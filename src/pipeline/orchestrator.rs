use std::collections::HashSet;
use std::sync::Arc;

use chrono::Local;

use crate::discover::TrackDiscoverer;
use crate::download::{Downloader, Reconciler};
use crate::error::Result;
use crate::ledger::Ledger;
use crate::mail::{extract_download_link, MailService};
use crate::models::{BatchId, MessageHandle, NotificationOutcome, RunLogEntry, RunStats};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Drives each unread notification through link extraction, discovery,
/// ledger append, download and reconciliation.
pub struct Orchestrator {
    mail: Arc<dyn MailService>,
    ledger: Ledger,
    discoverer: TrackDiscoverer,
    downloader: Downloader,
    reconciler: Reconciler,
    sender: String,
    link_phrase: String,
}

impl Orchestrator {
    pub fn new(
        mail: Arc<dyn MailService>,
        ledger: Ledger,
        discoverer: TrackDiscoverer,
        downloader: Downloader,
        reconciler: Reconciler,
        sender: String,
        link_phrase: String,
    ) -> Self {
        Self {
            mail,
            ledger,
            discoverer,
            downloader,
            reconciler,
            sender,
            link_phrase,
        }
    }

    /// Process every unread notification, then append one run-log entry.
    pub async fn run(&self) -> Result<RunStats> {
        self.ledger.ensure_layout().await?;
        let run_number = self.ledger.last_run_number().await? + 1;
        tracing::info!("Starting run #{}", run_number);

        let messages = match self.mail.list_unread_from(&self.sender).await {
            Ok(messages) => messages,
            Err(e) => {
                tracing::warn!("Could not list unread notifications: {}", e);
                Vec::new()
            }
        };
        tracing::info!("Found {} unread notifications from {}", messages.len(), self.sender);

        let mut known = self.ledger.known_urls().await?;
        let mut stats = RunStats {
            emails_seen: messages.len(),
            ..RunStats::default()
        };

        for (index, handle) in messages.iter().enumerate() {
            tracing::info!(
                "[{}/{}] Message {}",
                index + 1,
                messages.len(),
                handle.short_id()
            );

            let outcome = match self.process(handle, &mut known).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!("Could not record message, leaving it unread: {}", e);
                    continue;
                }
            };

            tracing::info!("Outcome: {}", outcome);
            stats.record(&outcome);
            if !self.mail.mark_read(&handle.id).await {
                tracing::warn!("Could not mark message {} as read", handle.short_id());
            }
        }

        let entry = RunLogEntry {
            run_number,
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            stats,
        };
        if let Err(e) = self.ledger.log_run(&entry).await {
            tracing::warn!("Could not write run log: {}", e);
        }

        Ok(stats)
    }

    /// Take one notification to its terminal state. An error means nothing
    /// about the message's URL reached the ledger.
    pub async fn process(
        &self,
        handle: &MessageHandle,
        known: &mut HashSet<String>,
    ) -> Result<NotificationOutcome> {
        let body = match self.mail.fetch_body(&handle.id).await {
            Ok(Some(body)) => body,
            Ok(None) => {
                tracing::info!("Message has no HTML body");
                return Ok(NotificationOutcome::SkippedNoLink);
            }
            Err(e) => {
                tracing::warn!("Could not fetch message body: {}", e);
                return Ok(NotificationOutcome::SkippedNoLink);
            }
        };

        let Some(url) = extract_download_link(&body, &self.link_phrase) else {
            tracing::info!("No '{}' link found", self.link_phrase);
            return Ok(NotificationOutcome::SkippedNoLink);
        };
        tracing::info!("Found link: {}", url);

        if known.contains(&url) {
            tracing::info!("URL already processed, skipping");
            return Ok(NotificationOutcome::SkippedDuplicate { url });
        }

        let tracks = self.discoverer.discover(&url).await;
        if tracks.is_empty() {
            tracing::info!("No tracks found");
            return Ok(NotificationOutcome::SkippedEmptyScrape { url });
        }

        let batch_id = BatchId::generate();
        self.ledger
            .append_candidates(&batch_id, &url, &tracks)
            .await?;
        known.insert(url.clone());

        let downloaded = self.downloader.download(&url, &batch_id).await;
        if downloaded > 0 {
            let dir = self.downloader.batch_dir(&batch_id);
            match self.reconciler.reconcile(&batch_id, &dir).await {
                Ok(report) => tracing::debug!(
                    "Reconciled {} files, {} rows unmatched",
                    report.matched.len(),
                    report.unmatched.len()
                ),
                Err(e) => tracing::warn!("Error updating paths: {}", e),
            }
        }

        Ok(NotificationOutcome::Completed {
            url,
            batch_id,
            tracks: tracks.len(),
            downloaded,
        })
    }
}
