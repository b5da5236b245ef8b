use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

mod browser;
mod catalog;
mod config;
mod discover;
mod download;
mod error;
mod ledger;
mod mail;
mod models;
mod pipeline;

use browser::WebDriverLauncher;
use catalog::SqliteCatalog;
use config::{Config, LedgerBackend};
use discover::TrackDiscoverer;
use download::{DownloadSettings, Downloader, Reconciler};
use error::{AppError, Result};
use ledger::{Ledger, LedgerStore, SheetsLedger, SqliteLedger};
use mail::GmailClient;
use pipeline::Orchestrator;

const USAGE: &str = "Usage: tracksweep [--config <path>] [--init | --check]";

#[derive(Debug, Default)]
struct Args {
    config_path: Option<PathBuf>,
    init: bool,
    check: bool,
}

fn parse_args(args: &[String]) -> Result<Args> {
    let mut parsed = Args::default();
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let path = iter
                    .next()
                    .ok_or_else(|| AppError::Config(format!("--config needs a path\n{}", USAGE)))?;
                parsed.config_path = Some(PathBuf::from(path));
            }
            "--init" => parsed.init = true,
            "--check" => parsed.check = true,
            other => {
                return Err(AppError::Config(format!(
                    "unknown argument `{}`\n{}",
                    other, USAGE
                )))
            }
        }
    }
    Ok(parsed)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Progress goes to stderr; RUST_LOG can narrow or widen it
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let args = parse_args(&args)?;

    // --init writes a fresh config and exits
    if args.init {
        let path = args.config_path.unwrap_or_else(Config::config_path);
        Config::default().save(&path)?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let config = Config::load(args.config_path.as_deref())?;
    config.validate()?;

    // Fatal if the catalog cannot be reached: nothing is processed
    let catalog = Arc::new(SqliteCatalog::open(&config.catalog.path).await?);
    let store = open_ledger(&config).await?;
    let ledger = Ledger::new(store);

    if args.check {
        ledger.ensure_layout().await?;
        let last_run = ledger.last_run_number().await?;
        println!("Configuration OK (last run #{})", last_run);
        return Ok(());
    }

    let token = google_token(&config)?;
    let mail = Arc::new(GmailClient::new(&config.gmail_api_url, token)?);
    let launcher = Arc::new(WebDriverLauncher::new(config.browser.clone())?);

    let discoverer = TrackDiscoverer::new(
        launcher.clone(),
        catalog,
        config.portal.clone(),
        config.browser.scan_settle(),
    )?;
    let downloader = Downloader::new(
        launcher,
        ledger.clone(),
        config.portal.clone(),
        DownloadSettings::from_config(&config),
    );
    let reconciler = Reconciler::new(ledger.clone(), config.download.partial_suffixes.clone());

    let orchestrator = Orchestrator::new(
        mail,
        ledger,
        discoverer,
        downloader,
        reconciler,
        config.sender.clone(),
        config.link_phrase.clone(),
    );

    let stats = orchestrator.run().await?;
    println!(
        "Processed {} emails: {} URLs, {} tracks found, {} files downloaded",
        stats.emails_seen, stats.urls_processed, stats.tracks_found, stats.files_downloaded
    );

    Ok(())
}

async fn open_ledger(config: &Config) -> Result<Arc<dyn LedgerStore>> {
    match config.ledger.backend {
        LedgerBackend::Sheets => {
            let token = google_token(config)?;
            Ok(Arc::new(SheetsLedger::new(&config.ledger, token)?))
        }
        LedgerBackend::Sqlite => {
            let path = PathBuf::from(&config.ledger.sqlite_path);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating ledger directory {}", parent.display()))?;
            }
            Ok(Arc::new(SqliteLedger::open(&path).await?))
        }
    }
}

fn google_token(config: &Config) -> Result<String> {
    config
        .google_token()
        .map(str::to_string)
        .ok_or_else(|| AppError::Config("no Google access token configured".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("tracksweep")
            .chain(list.iter().copied())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn parses_config_path_and_flags() {
        let parsed = parse_args(&args(&["--config", "/tmp/t.toml", "--check"])).unwrap();
        assert_eq!(parsed.config_path, Some(PathBuf::from("/tmp/t.toml")));
        assert!(parsed.check);
        assert!(!parsed.init);
    }

    #[test]
    fn rejects_unknown_and_incomplete_arguments() {
        assert!(parse_args(&args(&["--refresh"])).is_err());
        assert!(parse_args(&args(&["--config"])).is_err());
    }
}
