use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::wait::wait_for_downloads;
use crate::browser::{
    authenticate, BrowserError, BrowserLauncher, BrowserSession, ElementId, Locator,
};
use crate::config::{Config, PortalCredentials};
use crate::ledger::Ledger;
use crate::models::{BatchId, LedgerRow};

const OPTION_POLL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct DownloadSettings {
    pub download_root: PathBuf,
    pub option_label: String,
    pub option_timeout: Duration,
    pub scroll_pause: Duration,
    pub post_click: Duration,
    pub page_settle: Duration,
    pub completion_timeout: Duration,
    pub poll_interval: Duration,
    pub partial_suffixes: Vec<String>,
}

impl DownloadSettings {
    pub fn from_config(config: &Config) -> Self {
        let download = &config.download;
        Self {
            download_root: config.download_root(),
            option_label: download.option_label.clone(),
            option_timeout: Duration::from_secs(download.option_timeout_secs),
            scroll_pause: Duration::from_millis(500),
            post_click: Duration::from_secs(download.post_click_secs),
            page_settle: config.browser.download_settle(),
            completion_timeout: Duration::from_secs(download.completion_timeout_secs),
            poll_interval: Duration::from_millis(download.poll_interval_ms),
            partial_suffixes: download.partial_suffixes.clone(),
        }
    }
}

/// Downloads the tracks of a batch that the catalog does not have yet.
pub struct Downloader {
    launcher: Arc<dyn BrowserLauncher>,
    ledger: Ledger,
    credentials: PortalCredentials,
    settings: DownloadSettings,
}

impl Downloader {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        ledger: Ledger,
        credentials: PortalCredentials,
        settings: DownloadSettings,
    ) -> Self {
        Self {
            launcher,
            ledger,
            credentials,
            settings,
        }
    }

    /// Directory receiving the files of one batch.
    pub fn batch_dir(&self, batch_id: &BatchId) -> PathBuf {
        self.settings.download_root.join(batch_id.as_str())
    }

    /// Number of download triggers that went through. Failures are logged
    /// and count as misses.
    pub async fn download(&self, url: &str, batch_id: &BatchId) -> usize {
        tracing::info!("Reading ledger (batch {})...", batch_id);
        let outstanding = match self.ledger.rows_for_batch(batch_id).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!("Could not read ledger: {}", e);
                return 0;
            }
        };
        if outstanding.is_empty() {
            return 0;
        }
        tracing::info!("Found {} tracks to download", outstanding.len());

        let dir = self.batch_dir(batch_id);
        if let Err(e) = tokio::fs::create_dir_all(&dir).await {
            tracing::warn!("Could not create {}: {}", dir.display(), e);
            return 0;
        }

        let session = match self.launcher.launch(Some(dir.as_path())).await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("Could not start browser: {}", e);
                return 0;
            }
        };

        let downloaded = match self.fetch_all(session.as_ref(), url, &outstanding).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!("Download process error: {}", e);
                0
            }
        };

        // Quitting the browser would cancel transfers still in flight
        if downloaded > 0 {
            wait_for_downloads(
                &dir,
                &self.settings.partial_suffixes,
                self.settings.completion_timeout,
                self.settings.poll_interval,
            )
            .await;
        }

        if let Err(e) = session.quit().await {
            tracing::debug!("Browser quit failed: {}", e);
        }
        tracing::info!("Browser closed");
        downloaded
    }

    async fn fetch_all(
        &self,
        session: &dyn BrowserSession,
        url: &str,
        outstanding: &[LedgerRow],
    ) -> Result<usize, BrowserError> {
        session.navigate(url).await?;
        tokio::time::sleep(self.settings.page_settle).await;
        authenticate(session, url, &self.credentials, self.settings.page_settle).await;

        tracing::info!("Starting downloads...");
        let mut rows = session.find_elements(&Locator::track_rows()).await?;
        let mut downloaded = 0;

        for wanted in outstanding {
            tracing::info!("Processing: {}", wanted.track());
            match locate_row(session, &rows, wanted).await {
                Ok(Some(row)) => {
                    if self.trigger(session, &row).await {
                        downloaded += 1;
                    }
                }
                Ok(None) => tracing::info!("Could not find a visible row for this track"),
                Err(BrowserError::StaleElement) => {
                    tracing::info!("Page re-rendered, moving on");
                    rows = session
                        .find_elements(&Locator::track_rows())
                        .await
                        .unwrap_or_else(|e| {
                            tracing::warn!("Could not re-read rows: {}", e);
                            Vec::new()
                        });
                }
                Err(e) => tracing::warn!("Error reading rows: {}", e),
            }
        }

        Ok(downloaded)
    }

    /// Open the row's menu and pick the download option.
    async fn trigger(&self, session: &dyn BrowserSession, row: &ElementId) -> bool {
        match self.try_trigger(session, row).await {
            Ok(true) => true,
            Ok(false) => {
                dismiss_menu(session).await;
                false
            }
            Err(e) => {
                tracing::warn!("Error triggering download: {}", e);
                dismiss_menu(session).await;
                false
            }
        }
    }

    async fn try_trigger(
        &self,
        session: &dyn BrowserSession,
        row: &ElementId,
    ) -> Result<bool, BrowserError> {
        let controls = session.find_elements_in(row, &Locator::menu_controls()).await?;
        let Some(menu) = controls.last() else {
            tracing::info!("Could not find menu button");
            return Ok(false);
        };

        session.scroll_into_view(menu).await?;
        tokio::time::sleep(self.settings.scroll_pause).await;
        session.script_click(menu).await?;

        let label = &self.settings.option_label;
        let Some(option) = self.wait_for_option(session).await? else {
            tracing::info!("'{}' never appeared", label);
            return Ok(false);
        };

        tracing::info!("Found '{}', clicking...", label);
        session.script_click(&option).await?;
        tokio::time::sleep(self.settings.post_click).await;
        Ok(true)
    }

    /// Innermost visible element carrying the option label. Matches come in
    /// document order, so ancestors precede the element itself.
    async fn wait_for_option(
        &self,
        session: &dyn BrowserSession,
    ) -> Result<Option<ElementId>, BrowserError> {
        let locator = Locator::menu_option(&self.settings.option_label);
        let deadline = Instant::now() + self.settings.option_timeout;

        loop {
            let matches = session.find_elements(&locator).await?;
            for candidate in matches.iter().rev() {
                match session.is_displayed(candidate).await {
                    Ok(true) => return Ok(Some(candidate.clone())),
                    Ok(false) | Err(BrowserError::StaleElement) => {}
                    Err(e) => return Err(e),
                }
            }

            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(OPTION_POLL.min(self.settings.option_timeout)).await;
        }
    }
}

/// First row element whose text holds both title and artist.
async fn locate_row(
    session: &dyn BrowserSession,
    rows: &[ElementId],
    track: &LedgerRow,
) -> Result<Option<ElementId>, BrowserError> {
    for row in rows {
        let text = session.element_text(row).await?;
        if text.contains(&track.title) && text.contains(&track.artist) {
            return Ok(Some(row.clone()));
        }
    }
    Ok(None)
}

async fn dismiss_menu(session: &dyn BrowserSession) {
    let Ok(bodies) = session.find_elements(&Locator::tag("body")).await else {
        return;
    };
    if let Some(body) = bodies.first() {
        if let Err(e) = session.click(body).await {
            tracing::debug!("Could not dismiss menu: {}", e);
        }
    }
}
