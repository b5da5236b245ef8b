pub const SCHEMA: &str = r#"
-- ledger_rows table (append-only apart from file_path)
CREATE TABLE IF NOT EXISTS ledger_rows (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    batch_id TEXT NOT NULL,
    url TEXT NOT NULL,
    title TEXT NOT NULL DEFAULT '',
    artist TEXT NOT NULL DEFAULT '',
    in_catalog TEXT,
    file_path TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_ledger_rows_batch_id ON ledger_rows(batch_id);
CREATE INDEX IF NOT EXISTS idx_ledger_rows_url ON ledger_rows(url);

-- run_log table
CREATE TABLE IF NOT EXISTS run_log (
    run_number INTEGER PRIMARY KEY,
    timestamp TEXT NOT NULL,
    emails_processed INTEGER NOT NULL,
    urls_added INTEGER NOT NULL,
    tracks_extracted INTEGER NOT NULL,
    downloads INTEGER NOT NULL
);
"#;
