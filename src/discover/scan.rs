//! Turning the rendered text of a release page into (title, artist) candidates.

use std::collections::HashSet;

use async_trait::async_trait;
use regex::Regex;

use crate::browser::{BrowserError, BrowserSession, Locator};
use crate::models::CandidateTrack;

/// A duration such as `3:45` or `12:07` anywhere in a row marks it as a track row.
const DURATION_PATTERN: &str = r"\d{1,2}:\d{2}";

/// Title line, artist line, then a line holding a duration.
const TRACK_TRIPLE_PATTERN: &str = r"(.+?)\n(.+?)\n.*?(\d{1,2}:\d{2})";

/// Read access to the page being scanned.
#[async_trait]
pub trait PageContent: Send + Sync {
    /// Texts of the row-like elements, in document order.
    async fn row_texts(&self) -> Result<Vec<String>, BrowserError>;

    async fn body_text(&self) -> Result<String, BrowserError>;
}

/// [`PageContent`] backed by a live browser session.
pub struct SessionPage<'a> {
    session: &'a dyn BrowserSession,
}

impl<'a> SessionPage<'a> {
    pub fn new(session: &'a dyn BrowserSession) -> Self {
        Self { session }
    }
}

#[async_trait]
impl PageContent for SessionPage<'_> {
    async fn row_texts(&self) -> Result<Vec<String>, BrowserError> {
        let rows = self.session.find_elements(&Locator::track_rows()).await?;
        let mut texts = Vec::with_capacity(rows.len());
        for row in &rows {
            match self.session.element_text(row).await {
                Ok(text) => texts.push(text),
                Err(BrowserError::StaleElement) => {
                    tracing::debug!("Row {} went stale while scanning", row.0);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(texts)
    }

    async fn body_text(&self) -> Result<String, BrowserError> {
        self.session.body_text().await
    }
}

#[async_trait]
pub trait ScanStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn scan(&self, page: &dyn PageContent) -> Result<Vec<CandidateTrack>, BrowserError>;
}

/// Reads one candidate per row element: the first two lines that are
/// neither a position number nor a duration.
pub struct StructuredScan {
    duration: Regex,
}

impl StructuredScan {
    pub fn new() -> crate::error::Result<Self> {
        Ok(Self {
            duration: Regex::new(DURATION_PATTERN)?,
        })
    }

    /// Nested row elements repeat their children's text, so repeated
    /// pairs are collapsed keeping the first.
    pub fn parse_rows(&self, texts: &[String]) -> Vec<CandidateTrack> {
        let mut seen = HashSet::new();
        texts
            .iter()
            .filter_map(|text| self.parse_row(text))
            .filter(|candidate| seen.insert(candidate.clone()))
            .collect()
    }

    fn parse_row(&self, text: &str) -> Option<CandidateTrack> {
        let text = text.trim();
        if !self.duration.is_match(text) {
            return None;
        }

        let mut lines = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !is_position(line) && !is_duration(line));
        let title = lines.next()?;
        let artist = lines.next()?;
        Some(CandidateTrack::new(title, artist))
    }
}

#[async_trait]
impl ScanStrategy for StructuredScan {
    fn name(&self) -> &'static str {
        "row scan"
    }

    async fn scan(&self, page: &dyn PageContent) -> Result<Vec<CandidateTrack>, BrowserError> {
        let texts = page.row_texts().await?;
        Ok(self.parse_rows(&texts))
    }
}

/// Pattern match over the whole page text, for layouts without usable rows.
pub struct FallbackScan {
    triple: Regex,
}

impl FallbackScan {
    pub fn new() -> crate::error::Result<Self> {
        Ok(Self {
            triple: Regex::new(TRACK_TRIPLE_PATTERN)?,
        })
    }

    pub fn parse_body(&self, body: &str) -> Vec<CandidateTrack> {
        self.triple
            .captures_iter(body)
            .filter_map(|caps| {
                let title = caps.get(1)?.as_str().trim();
                let artist = caps.get(2)?.as_str().trim();
                if [title, artist]
                    .iter()
                    .any(|value| is_position(value) || is_duration(value))
                {
                    return None;
                }
                Some(CandidateTrack::new(title, artist))
            })
            .collect()
    }
}

#[async_trait]
impl ScanStrategy for FallbackScan {
    fn name(&self) -> &'static str {
        "text scan"
    }

    async fn scan(&self, page: &dyn PageContent) -> Result<Vec<CandidateTrack>, BrowserError> {
        let body = page.body_text().await?;
        Ok(self.parse_body(&body))
    }
}

/// Run `primary`, and `fallback` only if the primary found nothing usable.
/// Candidates missing a title or artist never leave this function.
pub async fn scan_page(
    page: &dyn PageContent,
    primary: &dyn ScanStrategy,
    fallback: &dyn ScanStrategy,
) -> Result<Vec<CandidateTrack>, BrowserError> {
    let found = complete_only(primary.scan(page).await?);
    if !found.is_empty() {
        return Ok(found);
    }

    tracing::info!(
        "{} found nothing, falling back to {}",
        primary.name(),
        fallback.name()
    );
    Ok(complete_only(fallback.scan(page).await?))
}

fn complete_only(candidates: Vec<CandidateTrack>) -> Vec<CandidateTrack> {
    candidates
        .into_iter()
        .filter(CandidateTrack::is_complete)
        .collect()
}

/// Purely numeric text, like a track position.
fn is_position(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}

/// A bare `m:ss` or `mm:ss`.
fn is_duration(value: &str) -> bool {
    let Some((minutes, seconds)) = value.split_once(':') else {
        return false;
    };
    (1..=2).contains(&minutes.len())
        && seconds.len() == 2
        && minutes.chars().chain(seconds.chars()).all(|c| c.is_ascii_digit())
}
