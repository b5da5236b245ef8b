use std::sync::Arc;
use std::time::Duration;

use super::scan::{scan_page, FallbackScan, SessionPage, StructuredScan};
use crate::browser::{authenticate, BrowserError, BrowserLauncher, BrowserSession};
use crate::catalog::Catalog;
use crate::config::PortalCredentials;
use crate::error::Result;
use crate::models::{CandidateTrack, CheckedTrack};

/// Opens a release page, reads its track list and checks every track
/// against the catalog.
pub struct TrackDiscoverer {
    launcher: Arc<dyn BrowserLauncher>,
    catalog: Arc<dyn Catalog>,
    credentials: PortalCredentials,
    settle: Duration,
    structured: StructuredScan,
    fallback: FallbackScan,
}

impl TrackDiscoverer {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        catalog: Arc<dyn Catalog>,
        credentials: PortalCredentials,
        settle: Duration,
    ) -> Result<Self> {
        Ok(Self {
            launcher,
            catalog,
            credentials,
            settle,
            structured: StructuredScan::new()?,
            fallback: FallbackScan::new()?,
        })
    }

    /// Tracks found at `url` with their catalog status. Browser trouble
    /// yields an empty list rather than an error.
    pub async fn discover(&self, url: &str) -> Vec<CheckedTrack> {
        tracing::info!("Scanning {}", url);

        let session = match self.launcher.launch(None).await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("Could not start browser: {}", e);
                return Vec::new();
            }
        };

        let scanned = self.scan(session.as_ref(), url).await;
        if let Err(e) = session.quit().await {
            tracing::debug!("Browser quit failed: {}", e);
        }

        let candidates = match scanned {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!("Scan failed: {}", e);
                return Vec::new();
            }
        };

        let mut checked = Vec::with_capacity(candidates.len());
        for track in candidates {
            let status = self.catalog.lookup(&track).await;
            tracing::info!("Found {} [catalog: {}]", track, status);
            checked.push(CheckedTrack { track, status });
        }
        checked
    }

    async fn scan(
        &self,
        session: &dyn BrowserSession,
        url: &str,
    ) -> std::result::Result<Vec<CandidateTrack>, BrowserError> {
        session.navigate(url).await?;
        tokio::time::sleep(self.settle).await;

        let login = authenticate(session, url, &self.credentials, self.settle).await;
        tracing::debug!("Login outcome: {:?}", login);

        let page = SessionPage::new(session);
        scan_page(&page, &self.structured, &self.fallback).await
    }
}
