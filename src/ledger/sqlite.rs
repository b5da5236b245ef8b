use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use rusqlite::{params, Row};
use tokio_rusqlite::Connection;

use super::schema::SCHEMA;
use super::{parse_status, LedgerStore};
use crate::error::Result;
use crate::models::{BatchId, LedgerField, LedgerRow, RowFilter, RowId, RunLogEntry, StoredRow};

/// Local ledger in a SQLite file, for runs without a spreadsheet.
pub struct SqliteLedger {
    conn: Connection,
}

impl SqliteLedger {
    pub async fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path).await?;
        Self::init(conn).await
    }

    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }
}

#[async_trait]
impl LedgerStore for SqliteLedger {
    async fn ensure_layout(&self) -> Result<()> {
        // Schema is created on open
        Ok(())
    }

    async fn append_rows(&self, rows: &[LedgerRow]) -> Result<usize> {
        let rows = rows.to_vec();
        let written = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO ledger_rows (batch_id, url, title, artist, in_catalog, file_path) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    )?;
                    for row in &rows {
                        stmt.execute(params![
                            row.batch_id.as_str(),
                            row.url,
                            row.title,
                            row.artist,
                            row.in_catalog.map(|s| s.as_str()),
                            row.file_path,
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(rows.len())
            })
            .await?;
        Ok(written)
    }

    async fn rows_where(&self, filter: &RowFilter) -> Result<Vec<StoredRow>> {
        let batch_id = filter.batch_id.as_ref().map(|b| b.as_str().to_string());
        let status = filter.in_catalog.map(|s| s.as_str());
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT id, batch_id, url, title, artist, in_catalog, file_path
                       FROM ledger_rows
                       WHERE (?1 IS NULL OR batch_id = ?1) AND (?2 IS NULL OR in_catalog = ?2)
                       ORDER BY id"#,
                )?;
                let rows = stmt
                    .query_map(params![batch_id, status], stored_row_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        Ok(rows.into_iter().flatten().collect())
    }

    async fn update_field(&self, id: RowId, field: LedgerField, value: &str) -> Result<()> {
        let value = value.to_string();
        self.conn
            .call(move |conn| {
                match field {
                    LedgerField::FilePath => conn.execute(
                        "UPDATE ledger_rows SET file_path = ?1 WHERE id = ?2",
                        params![value, id.0 as i64],
                    )?,
                };
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn recorded_urls(&self) -> Result<HashSet<String>> {
        let urls = self
            .conn
            .call(|conn| {
                let mut stmt =
                    conn.prepare("SELECT DISTINCT TRIM(url) FROM ledger_rows WHERE TRIM(url) <> ''")?;
                let urls = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<std::result::Result<HashSet<_>, _>>()?;
                Ok(urls)
            })
            .await?;
        Ok(urls)
    }

    async fn last_run_number(&self) -> Result<u64> {
        let last = self
            .conn
            .call(|conn| {
                let last: i64 = conn.query_row(
                    "SELECT COALESCE(MAX(run_number), 0) FROM run_log",
                    [],
                    |row| row.get(0),
                )?;
                Ok(last)
            })
            .await?;
        Ok(last.max(0) as u64)
    }

    async fn append_run_log(&self, entry: &RunLogEntry) -> Result<()> {
        let entry = entry.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO run_log (run_number, timestamp, emails_processed, urls_added, tracks_extracted, downloads)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
                    params![
                        entry.run_number as i64,
                        entry.timestamp,
                        entry.stats.emails_seen as i64,
                        entry.stats.urls_processed as i64,
                        entry.stats.tracks_found as i64,
                        entry.stats.files_downloaded as i64,
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

/// `None` for rows whose status column is unreadable; those are skipped.
fn stored_row_from_row(row: &Row) -> rusqlite::Result<Option<StoredRow>> {
    let id: i64 = row.get(0)?;
    let raw_status: Option<String> = row.get(5)?;
    let in_catalog = match parse_status(raw_status.as_deref()) {
        Ok(status) => status,
        Err(e) => {
            tracing::warn!("Skipping malformed ledger row {}: {}", id, e);
            return Ok(None);
        }
    };

    Ok(Some(StoredRow {
        id: RowId(id as u64),
        row: LedgerRow {
            batch_id: BatchId::from(row.get::<_, String>(1)?),
            url: row.get(2)?,
            title: row.get(3)?,
            artist: row.get(4)?,
            in_catalog,
            file_path: row
                .get::<_, Option<String>>(6)?
                .filter(|path| !path.is_empty()),
        },
    }))
}
