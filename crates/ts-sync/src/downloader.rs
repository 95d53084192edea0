use std::fmt;
use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use thiserror::Error;
use tracing::{debug, error, info};
use ts_core::paths::WatchRoot;
use ts_remote::{Listing, RemoteError, RemoteFile, RemoteStore};

/// What a completed bulk download wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSummary {
    pub root: PathBuf,
    pub files: usize,
}

/// One file that could not be downloaded.
///
/// `path` is the path as the remote listed it, which need not be a valid
/// [`ts_core::paths::RemotePath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadFailure {
    pub path: String,
    pub reason: String,
}

impl fmt::Display for DownloadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

#[derive(Debug, Error)]
pub enum DownloadError {
    /// The remote listing itself failed; nothing was written.
    #[error("failed to list remote files: {0}")]
    Listing(#[source] RemoteError),

    /// Some files were written, others failed.
    #[error("{} of {} files failed to download", failures.len(), downloaded + failures.len())]
    Incomplete {
        downloaded: usize,
        failures: Vec<DownloadFailure>,
    },
}

/// Pull every remote file into `root`, overwriting local copies.
///
/// Fetch and write run for up to `workers` files at once. A failing file is
/// logged and collected without stopping the others. Local files that are
/// not on the remote are left alone. Listing entries whose path cannot be
/// placed under `root` count as failures.
pub async fn download(
    store: &dyn RemoteStore,
    root: &WatchRoot,
    workers: usize,
) -> Result<DownloadSummary, DownloadError> {
    let listing = store.list(true).await.map_err(DownloadError::Listing)?;
    info!(root = %root, files = listing.len(), "downloading");
    if let Err(err) = tokio::fs::create_dir_all(root.path()).await {
        error!(root = %root, error = %err, "cannot create download root");
    }

    let Listing { files, invalid } = listing;
    let mut failures = Vec::new();
    for entry in invalid {
        error!(path = %entry.path, reason = %entry.reason, "download failed");
        failures.push(DownloadFailure {
            path: entry.path,
            reason: entry.reason,
        });
    }

    let results: Vec<Result<(), DownloadFailure>> = stream::iter(files)
        .map(|file| fetch_one(store, root, file))
        .buffer_unordered(workers.max(1))
        .collect()
        .await;

    let mut downloaded = 0;
    for result in results {
        match result {
            Ok(()) => downloaded += 1,
            Err(failure) => {
                error!(path = %failure.path, reason = %failure.reason, "download failed");
                failures.push(failure);
            }
        }
    }

    if failures.is_empty() {
        Ok(DownloadSummary {
            root: root.path().to_path_buf(),
            files: downloaded,
        })
    } else {
        failures.sort_by(|a, b| a.path.cmp(&b.path));
        Err(DownloadError::Incomplete {
            downloaded,
            failures,
        })
    }
}

async fn fetch_one(
    store: &dyn RemoteStore,
    root: &WatchRoot,
    file: RemoteFile,
) -> Result<(), DownloadFailure> {
    let fail = |reason: String| DownloadFailure {
        path: file.path.to_string(),
        reason,
    };

    let content = match &file.content {
        Some(content) => content.clone(),
        None => store
            .fetch_content(&file)
            .await
            .map_err(|e| fail(e.messages().join("; ")))?,
    };

    let dest = root.local_path(&file.path);
    write_file(&dest, &content)
        .await
        .map_err(|e| fail(format!("{}: {e}", dest.display())))?;
    debug!(path = %file.path, bytes = content.len(), "downloaded");
    Ok(())
}

async fn write_file(dest: &Path, content: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(dest, content).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use ts_core::paths::RemotePath;
    use ts_remote::memory::MemoryStore;

    #[tokio::test]
    async fn listing_failure_is_fatal() {
        struct Down;

        #[async_trait::async_trait]
        impl RemoteStore for Down {
            async fn list(&self, _recursive: bool) -> ts_remote::Result<Listing> {
                Err(RemoteError::Unauthorized(vec!["bad token".into()]))
            }
            async fn fetch_content(&self, _file: &RemoteFile) -> ts_remote::Result<Vec<u8>> {
                unreachable!()
            }
            fn validate(
                &self,
                _candidate: &ts_remote::CandidateFile,
            ) -> Result<(), Vec<String>> {
                Ok(())
            }
            async fn save(&self, _candidate: ts_remote::CandidateFile) -> ts_remote::Result<()> {
                unreachable!()
            }
            async fn delete(
                &self,
                _path: &RemotePath,
            ) -> ts_remote::Result<ts_remote::DeleteOutcome> {
                unreachable!()
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let root = WatchRoot::new(dir.path()).unwrap();
        let err = download(&Down, &root, 2).await.unwrap_err();
        assert!(matches!(err, DownloadError::Listing(RemoteError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn creates_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = WatchRoot::new(dir.path().join("theme")).unwrap();
        let store = MemoryStore::new().with_file("config/settings.json", "{}");

        let summary = download(&store, &root, 2).await.unwrap();
        assert_eq!(summary.files, 1);
        assert_eq!(
            std::fs::read(dir.path().join("theme/config/settings.json")).unwrap(),
            b"{}"
        );
    }

    #[tokio::test]
    async fn empty_listing_still_creates_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = WatchRoot::new(dir.path().join("theme")).unwrap();

        let summary = download(&MemoryStore::new(), &root, 2).await.unwrap();
        assert_eq!(summary.files, 0);
        assert!(dir.path().join("theme").is_dir());
    }

    #[tokio::test]
    async fn escaping_listing_entry_makes_download_incomplete() {
        let dir = tempfile::tempdir().unwrap();
        let root = WatchRoot::new(dir.path().join("theme")).unwrap();
        let store = MemoryStore::new()
            .with_file("ok.txt", "ok")
            .with_unusable_entry("../x");

        match download(&store, &root, 2).await.unwrap_err() {
            DownloadError::Incomplete {
                downloaded,
                failures,
            } => {
                assert_eq!(downloaded, 1);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].path, "../x");
            }
            other => panic!("expected Incomplete, got {other:?}"),
        }
        assert!(dir.path().join("theme/ok.txt").is_file());
        assert!(!dir.path().join("x").exists());
    }

    #[test]
    fn incomplete_error_counts_files() {
        let err = DownloadError::Incomplete {
            downloaded: 3,
            failures: vec![DownloadFailure {
                path: "a.txt".into(),
                reason: "boom".into(),
            }],
        };
        assert_eq!(err.to_string(), "1 of 4 files failed to download");
    }
}
