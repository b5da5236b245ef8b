use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Mail item as listed by the mail service. The body is fetched on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHandle {
    pub id: String,
}

impl MessageHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Shortened id for progress messages
    pub fn short_id(&self) -> &str {
        let end = self
            .id
            .char_indices()
            .nth(12)
            .map(|(idx, _)| idx)
            .unwrap_or(self.id.len());
        &self.id[..end]
    }
}

/// A (title, artist) pair seen on a release page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateTrack {
    pub title: String,
    pub artist: String,
}

impl CandidateTrack {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.title.trim().is_empty() && !self.artist.trim().is_empty()
    }
}

impl fmt::Display for CandidateTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.title, self.artist)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CatalogStatus {
    Yes,
    No,
    Error,
}

impl CatalogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogStatus::Yes => "Yes",
            CatalogStatus::No => "No",
            CatalogStatus::Error => "Error",
        }
    }
}

impl fmt::Display for CatalogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CatalogStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Yes" => Ok(CatalogStatus::Yes),
            "No" => Ok(CatalogStatus::No),
            "Error" => Ok(CatalogStatus::Error),
            other => Err(format!("unknown catalog status {:?}", other)),
        }
    }
}

/// Discoverer output: a candidate with its catalog status attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedTrack {
    pub track: CandidateTrack,
    pub status: CatalogStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_status_parses_only_known_values() {
        assert_eq!("Yes".parse::<CatalogStatus>(), Ok(CatalogStatus::Yes));
        assert_eq!(" No ".parse::<CatalogStatus>(), Ok(CatalogStatus::No));
        assert_eq!("Error".parse::<CatalogStatus>(), Ok(CatalogStatus::Error));
        assert!("maybe".parse::<CatalogStatus>().is_err());
        assert!("".parse::<CatalogStatus>().is_err());
    }

    #[test]
    fn candidate_needs_title_and_artist() {
        assert!(CandidateTrack::new("Night Drive", "A. Rivers").is_complete());
        assert!(!CandidateTrack::new("02", "").is_complete());
        assert!(!CandidateTrack::new("  ", "Someone").is_complete());
    }

    #[test]
    fn short_id_truncates_long_ids() {
        let handle = MessageHandle::new("18c2f0a9b7d64e21aa");
        assert_eq!(handle.short_id(), "18c2f0a9b7d6");
        assert_eq!(MessageHandle::new("abc").short_id(), "abc");
    }
}
