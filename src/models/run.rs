use std::fmt;

use super::BatchId;

/// Counters for one invocation, written once to the run log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub emails_seen: usize,
    pub urls_processed: usize,
    pub tracks_found: usize,
    pub files_downloaded: usize,
}

impl RunStats {
    pub fn record(&mut self, outcome: &NotificationOutcome) {
        if let NotificationOutcome::Completed {
            tracks, downloaded, ..
        } = outcome
        {
            self.urls_processed += 1;
            self.tracks_found += tracks;
            self.files_downloaded += downloaded;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLogEntry {
    pub run_number: u64,
    pub timestamp: String,
    pub stats: RunStats,
}

/// Terminal state of one notification. Every variant ends with the message
/// being marked read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    SkippedNoLink,
    SkippedDuplicate {
        url: String,
    },
    SkippedEmptyScrape {
        url: String,
    },
    Completed {
        url: String,
        batch_id: BatchId,
        tracks: usize,
        downloaded: usize,
    },
}

impl fmt::Display for NotificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationOutcome::SkippedNoLink => write!(f, "skipped (no link)"),
            NotificationOutcome::SkippedDuplicate { url } => {
                write!(f, "skipped (duplicate url {})", url)
            }
            NotificationOutcome::SkippedEmptyScrape { url } => {
                write!(f, "skipped (no tracks found at {})", url)
            }
            NotificationOutcome::Completed {
                batch_id,
                tracks,
                downloaded,
                ..
            } => write!(
                f,
                "completed batch {} ({} tracks, {} downloads)",
                batch_id, tracks, downloaded
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_completed_outcomes_count_towards_stats() {
        let mut stats = RunStats::default();
        stats.record(&NotificationOutcome::SkippedNoLink);
        stats.record(&NotificationOutcome::SkippedDuplicate {
            url: "https://x/a".to_string(),
        });
        stats.record(&NotificationOutcome::Completed {
            url: "https://x/b".to_string(),
            batch_id: BatchId::from("0badc0de"),
            tracks: 3,
            downloaded: 2,
        });

        assert_eq!(stats.urls_processed, 1);
        assert_eq!(stats.tracks_found, 3);
        assert_eq!(stats.files_downloaded, 2);
        assert_eq!(stats.emails_seen, 0);
    }
}
