use std::path::Path;
use std::time::Duration;

use tokio::time::Instant;

use super::entry_names;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Completed,
    TimedOut,
    DirectoryMissing,
}

/// Whether `name` is a download still in progress.
pub fn is_partial(name: &str, suffixes: &[String]) -> bool {
    suffixes.iter().any(|suffix| name.ends_with(suffix.as_str()))
}

/// Poll `dir` until it holds at least one entry and nothing partial, or
/// until `timeout` runs out.
pub async fn wait_for_downloads(
    dir: &Path,
    suffixes: &[String],
    timeout: Duration,
    poll: Duration,
) -> WaitOutcome {
    tracing::info!("Waiting for downloads to finalize...");
    let started = Instant::now();
    let mut polls: u64 = 0;

    loop {
        tokio::time::sleep(poll).await;
        polls += 1;

        let names = match entry_names(dir).await {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!("Download folder {} unavailable: {}", dir.display(), e);
                return WaitOutcome::DirectoryMissing;
            }
        };

        if !names.is_empty() && !names.iter().any(|name| is_partial(name, suffixes)) {
            tracing::info!("All downloads finished.");
            return WaitOutcome::Completed;
        }

        if started.elapsed() >= timeout {
            tracing::warn!("Timed out waiting for downloads.");
            return WaitOutcome::TimedOut;
        }

        if polls % 10 == 0 {
            tracing::info!(
                "Still downloading ({}s)",
                started.elapsed().as_secs()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suffixes() -> Vec<String> {
        vec![".crdownload".to_string(), ".tmp".to_string()]
    }

    const POLL: Duration = Duration::from_millis(10);

    #[test]
    fn partial_suffixes() {
        assert!(is_partial("track.wav.crdownload", &suffixes()));
        assert!(is_partial("x.tmp", &suffixes()));
        assert!(!is_partial("track.wav", &suffixes()));
    }

    #[tokio::test]
    async fn completes_once_partial_files_are_gone() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.wav.crdownload"), b"").unwrap();

        let path = dir.path().to_path_buf();
        let finisher = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            std::fs::rename(path.join("a.wav.crdownload"), path.join("a.wav")).unwrap();
        });

        let outcome =
            wait_for_downloads(dir.path(), &suffixes(), Duration::from_secs(5), POLL).await;
        finisher.await.unwrap();

        assert_eq!(outcome, WaitOutcome::Completed);
    }

    #[tokio::test]
    async fn empty_directory_times_out() {
        let dir = tempfile::tempdir().unwrap();

        let outcome =
            wait_for_downloads(dir.path(), &suffixes(), Duration::from_millis(50), POLL).await;

        assert_eq!(outcome, WaitOutcome::TimedOut);
    }

    #[tokio::test]
    async fn stuck_partial_download_times_out() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.wav.tmp"), b"").unwrap();

        let outcome =
            wait_for_downloads(dir.path(), &suffixes(), Duration::from_millis(50), POLL).await;

        assert_eq!(outcome, WaitOutcome::TimedOut);
    }

    #[tokio::test]
    async fn missing_directory_ends_wait() {
        let dir = tempfile::tempdir().unwrap();

        let outcome = wait_for_downloads(
            &dir.path().join("never-created"),
            &suffixes(),
            Duration::from_secs(5),
            POLL,
        )
        .await;

        assert_eq!(outcome, WaitOutcome::DirectoryMissing);
    }
}
