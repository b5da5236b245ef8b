use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse_status, LedgerStore, MAIN_HEADER, RUN_LOG_HEADER};
use crate::config::LedgerConfig;
use crate::error::{AppError, Result};
use crate::models::{BatchId, LedgerField, LedgerRow, RowFilter, RowId, RunLogEntry, StoredRow};

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Ledger kept in a Google spreadsheet: a main tab with one row per track and
/// a run-log tab. Row ids are 1-based sheet row numbers.
pub struct SheetsLedger {
    client: Client,
    base_url: String,
    spreadsheet_id: String,
    access_token: String,
    main_tab: String,
    log_tab: String,
}

impl SheetsLedger {
    pub fn new(config: &LedgerConfig, access_token: String) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            base_url: config.sheets_api_url.trim_end_matches('/').to_string(),
            spreadsheet_id: config.spreadsheet_id.clone(),
            access_token,
            main_tab: config.main_tab.clone(),
            log_tab: config.log_tab.clone(),
        })
    }

    fn spreadsheet_url(&self) -> String {
        format!("{}/v4/spreadsheets/{}", self.base_url, self.spreadsheet_id)
    }

    fn values_url(&self, range: &str) -> String {
        format!("{}/values/{}", self.spreadsheet_url(), urlencoding::encode(range))
    }

    async fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>> {
        let response = self
            .client
            .get(self.values_url(range))
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let response = check_status(response, "reading", range).await?;

        let body: ValueRange = response.json().await?;
        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    async fn put_values(&self, range: &str, values: Value) -> Result<()> {
        let response = self
            .client
            .put(self.values_url(range))
            .bearer_auth(&self.access_token)
            .query(&[("valueInputOption", "RAW")])
            .json(&json!({ "values": values }))
            .send()
            .await?;
        check_status(response, "updating", range).await?;
        Ok(())
    }

    async fn append_values(&self, range: &str, values: Value) -> Result<()> {
        let response = self
            .client
            .post(format!("{}:append", self.values_url(range)))
            .bearer_auth(&self.access_token)
            .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
            .json(&json!({ "values": values }))
            .send()
            .await?;
        check_status(response, "appending to", range).await?;
        Ok(())
    }

    async fn add_tab(&self, title: &str) -> Result<()> {
        let request = json!({
            "requests": [ { "addSheet": { "properties": { "title": title } } } ]
        });
        let response = self
            .client
            .post(format!("{}:batchUpdate", self.spreadsheet_url()))
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .await?;
        check_status(response, "creating tab", title).await?;
        Ok(())
    }

    async fn ensure_log_tab(&self) -> Result<()> {
        let header_cell = format!("{}!A1", self.log_tab);
        match self.get_values(&header_cell).await {
            Ok(values) if !values.is_empty() => return Ok(()),
            Ok(_) => {}
            Err(_) => self.add_tab(&self.log_tab).await?,
        }
        self.put_values(&header_cell, json!([RUN_LOG_HEADER])).await
    }
}

#[async_trait]
impl LedgerStore for SheetsLedger {
    async fn ensure_layout(&self) -> Result<()> {
        // The run log is best effort; the main tab is not
        if let Err(e) = self.ensure_log_tab().await {
            tracing::warn!("Could not prepare run log tab {}: {}", self.log_tab, e);
        }

        let header_range = format!("{}!A1:F1", self.main_tab);
        let current = self.get_values(&header_range).await?;
        let matches = current
            .first()
            .is_some_and(|row| row.iter().map(String::as_str).eq(MAIN_HEADER));
        if !matches {
            tracing::info!("Writing ledger header to {}", self.main_tab);
            self.put_values(&format!("{}!A1", self.main_tab), json!([MAIN_HEADER]))
                .await?;
        }
        Ok(())
    }

    async fn append_rows(&self, rows: &[LedgerRow]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let values: Vec<Value> = rows
            .iter()
            .map(|row| {
                json!([
                    row.batch_id.as_str(),
                    row.url,
                    row.title,
                    row.artist,
                    row.in_catalog.map(|s| s.as_str()).unwrap_or(""),
                    row.file_path.as_deref().unwrap_or(""),
                ])
            })
            .collect();
        self.append_values(&format!("{}!A:F", self.main_tab), Value::Array(values))
            .await?;
        Ok(rows.len())
    }

    async fn rows_where(&self, filter: &RowFilter) -> Result<Vec<StoredRow>> {
        let values = self.get_values(&format!("{}!A:F", self.main_tab)).await?;
        Ok(values
            .iter()
            .enumerate()
            .skip(1)
            .filter_map(|(index, cells)| parse_row(RowId(index as u64 + 1), cells))
            .filter(|stored| filter.matches(&stored.row))
            .collect())
    }

    async fn update_field(&self, id: RowId, field: LedgerField, value: &str) -> Result<()> {
        let column = match field {
            LedgerField::FilePath => "F",
        };
        let range = format!("{}!{}{}", self.main_tab, column, id.0);
        self.put_values(&range, json!([[value]])).await
    }

    async fn recorded_urls(&self) -> Result<HashSet<String>> {
        let values = self.get_values(&format!("{}!B:B", self.main_tab)).await?;
        Ok(values
            .into_iter()
            .skip(1)
            .filter_map(|row| row.into_iter().next())
            .map(|cell| cell.trim().to_string())
            .filter(|url| !url.is_empty())
            .collect())
    }

    async fn last_run_number(&self) -> Result<u64> {
        let values = self.get_values(&format!("{}!A:A", self.log_tab)).await?;
        if values.len() <= 1 {
            return Ok(0);
        }
        let last = values
            .last()
            .and_then(|row| row.first())
            .map(|cell| cell.trim().to_string())
            .unwrap_or_default();
        match last.parse() {
            Ok(number) => Ok(number),
            Err(_) => {
                tracing::warn!("Unreadable run number {:?} in {}", last, self.log_tab);
                Ok(0)
            }
        }
    }

    async fn append_run_log(&self, entry: &RunLogEntry) -> Result<()> {
        let values = json!([[
            entry.run_number,
            entry.timestamp,
            entry.stats.emails_seen,
            entry.stats.urls_processed,
            entry.stats.tracks_found,
            entry.stats.files_downloaded,
        ]]);
        self.append_values(&format!("{}!A:F", self.log_tab), values)
            .await
    }
}

async fn check_status(
    response: reqwest::Response,
    action: &str,
    target: &str,
) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let error_text = response.text().await.unwrap_or_default();
    Err(AppError::GoogleApi(format!(
        "{} {} failed: {} {}",
        action, target, status, error_text
    )))
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Sheets drops trailing empty cells, so short rows are normal. Rows without
/// a batch id or URL, or with an unknown status, are skipped.
fn parse_row(id: RowId, cells: &[String]) -> Option<StoredRow> {
    let cell = |index: usize| cells.get(index).map(|c| c.trim()).unwrap_or("");

    if cell(0).is_empty() || cell(1).is_empty() {
        if cells.iter().any(|c| !c.trim().is_empty()) {
            tracing::warn!("Skipping ledger row {}: missing batch id or URL", id.0);
        }
        return None;
    }

    let in_catalog = match parse_status(Some(cell(4))) {
        Ok(status) => status,
        Err(e) => {
            tracing::warn!("Skipping ledger row {}: {}", id.0, e);
            return None;
        }
    };

    Some(StoredRow {
        id,
        row: LedgerRow {
            batch_id: BatchId::from(cell(0)),
            url: cell(1).to_string(),
            title: cell(2).to_string(),
            artist: cell(3).to_string(),
            in_catalog,
            file_path: Some(cell(5).to_string()).filter(|p| !p.is_empty()),
        },
    })
}
