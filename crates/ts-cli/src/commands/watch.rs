use std::path::Path;
use std::sync::Arc;

use ts_core::paths::WatchRoot;
use ts_remote::http::ThemeApiClient;
use ts_sync::{SessionStats, ShutdownSignal, SyncSession};

use super::Settings;

/// Command-line overrides for the `[sync]` config section.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub debounce_ms: Option<u64>,
    pub workers: Option<usize>,
}

/// Watch `path` until `shutdown` fires.
pub async fn run(
    settings: &Settings,
    path: &Path,
    overrides: Overrides,
    shutdown: &ShutdownSignal,
) -> anyhow::Result<SessionStats> {
    let mut sync = settings.config.sync.clone();
    if let Some(ms) = overrides.debounce_ms {
        sync.debounce_ms = ms;
    }
    if let Some(workers) = overrides.workers {
        sync.workers = workers;
    }
    sync.validate()?;

    let client = ThemeApiClient::new(&settings.config.remote, settings.credential.clone())?;
    let root = WatchRoot::new(path)?;
    anyhow::ensure!(root.path().is_dir(), "{root} is not a directory");

    let session = SyncSession::start(Arc::new(client), root, &sync)?;
    let stats = session.run(shutdown).await?;
    Ok(stats)
}
