use std::path::Path;

use ts_core::paths::WatchRoot;
use ts_remote::http::ThemeApiClient;
use ts_sync::{download, DownloadError, DownloadSummary};

use super::{friendly_error, Settings};

/// Download the whole remote tree into `path`.
pub async fn run(
    settings: &Settings,
    path: &Path,
    workers: Option<usize>,
) -> anyhow::Result<DownloadSummary> {
    let client = ThemeApiClient::new(&settings.config.remote, settings.credential.clone())?;
    let root = WatchRoot::new(path)?;
    let workers = workers.unwrap_or(settings.config.download.workers);

    println!("Downloading Theme to {root}");
    match download(&client, &root, workers).await {
        Ok(summary) => {
            println!("Finished downloading Theme ({} files)", summary.files);
            Ok(summary)
        }
        Err(DownloadError::Listing(err)) => Err(friendly_error(err, client.base_url())),
        Err(DownloadError::Incomplete {
            downloaded,
            failures,
        }) => {
            eprintln!("Failed to download {} files:", failures.len());
            for failure in &failures {
                eprintln!("  {failure}");
            }
            anyhow::bail!(
                "downloaded {downloaded} of {} files",
                downloaded + failures.len()
            )
        }
    }
}
