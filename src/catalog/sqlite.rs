use std::path::Path;

use async_trait::async_trait;
use rusqlite::{params, OpenFlags};
use tokio_rusqlite::Connection;

use super::Catalog;
use crate::error::{AppError, Result};
use crate::models::{CandidateTrack, CatalogStatus};

/// Catalog stored in a SQLite database with a `tracks(title, artist)` table.
pub struct SqliteCatalog {
    conn: Connection,
}

impl SqliteCatalog {
    /// Open read-only and probe the `tracks` table. Failure here is fatal for the run.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .await
        .map_err(|e| AppError::CatalogUnavailable(format!("{}: {}", path.display(), e)))?;

        let count = conn
            .call(|conn| {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM tracks", [], |row| row.get(0))?;
                Ok(count)
            })
            .await
            .map_err(|e| AppError::CatalogUnavailable(format!("{}: {}", path.display(), e)))?;

        tracing::info!("Catalog connection established ({} tracks)", count);
        Ok(Self { conn })
    }

    async fn count_matches(&self, title: &str, artist: &str) -> Result<i64> {
        let title = title.trim().to_string();
        let artist = artist.trim().to_string();
        let count = self
            .conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM tracks WHERE LOWER(title) = LOWER(?1) AND LOWER(artist) = LOWER(?2)",
                    params![title, artist],
                    |row| row.get(0),
                )?;
                Ok(count)
            })
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn lookup(&self, track: &CandidateTrack) -> CatalogStatus {
        match self.count_matches(&track.title, &track.artist).await {
            Ok(0) => CatalogStatus::No,
            Ok(_) => CatalogStatus::Yes,
            Err(e) => {
                tracing::warn!("Catalog query failed for {}: {}", track, e);
                CatalogStatus::Error
            }
        }
    }
}

/// Create a catalog database holding `tracks`, for tests.
#[cfg(test)]
pub fn create_test_catalog(path: &Path, tracks: &[(&str, &str)]) {
    let conn = rusqlite::Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE tracks (id INTEGER PRIMARY KEY AUTOINCREMENT, title TEXT NOT NULL, artist TEXT NOT NULL);",
    )
    .unwrap();
    for (title, artist) in tracks {
        conn.execute(
            "INSERT INTO tracks (title, artist) VALUES (?1, ?2)",
            params![title, artist],
        )
        .unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lookup_is_case_insensitive_and_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.db");
        create_test_catalog(&path, &[("Night Drive", "A. Rivers")]);

        let catalog = SqliteCatalog::open(&path).await.unwrap();

        assert_eq!(
            catalog
                .lookup(&CandidateTrack::new("  night drive ", "a. rivers"))
                .await,
            CatalogStatus::Yes
        );
        assert_eq!(
            catalog
                .lookup(&CandidateTrack::new("Night Drive", "Someone Else"))
                .await,
            CatalogStatus::No
        );
    }

    #[tokio::test]
    async fn missing_database_or_table_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();

        let missing = SqliteCatalog::open(dir.path().join("nope.db")).await;
        assert!(matches!(missing, Err(AppError::CatalogUnavailable(_))));

        let empty_path = dir.path().join("empty.db");
        rusqlite::Connection::open(&empty_path)
            .unwrap()
            .execute_batch("CREATE TABLE other (id INTEGER);")
            .unwrap();
        let no_table = SqliteCatalog::open(&empty_path).await;
        assert!(matches!(no_table, Err(AppError::CatalogUnavailable(_))));
    }
}
