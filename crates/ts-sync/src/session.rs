use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};
use ts_core::config::SyncConfig;
use ts_core::file_watcher::WatchError;
use ts_core::paths::WatchRoot;
use ts_remote::RemoteStore;

use crate::aggregator::ChangeAggregator;
use crate::outcome::{report, PathOutcome};
use crate::reconciler::Reconciler;
use crate::shutdown::ShutdownSignal;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Watch(#[from] WatchError),
}

/// Totals for one watch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub change_sets: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl SessionStats {
    fn record(&mut self, outcomes: &[PathOutcome]) {
        let failed = report(outcomes);
        self.change_sets += 1;
        self.failed += failed;
        self.succeeded += outcomes.len() - failed;
    }
}

/// The continuous sync loop: watch, coalesce, reconcile, repeat.
///
/// Each change set is applied to completion before the next one is taken
/// from the watcher, so remote operations follow local event order.
pub struct SyncSession {
    aggregator: ChangeAggregator,
    reconciler: Reconciler,
}

impl SyncSession {
    /// Establish the watch. Fails if the OS watch cannot be set up.
    pub fn start(
        store: Arc<dyn RemoteStore>,
        root: WatchRoot,
        settings: &SyncConfig,
    ) -> Result<Self, SyncError> {
        let aggregator = ChangeAggregator::start(
            root.clone(),
            settings.ignore_patterns.clone(),
            settings.debounce(),
        )?;
        Ok(Self {
            aggregator,
            reconciler: Reconciler::new(store, root, settings.workers),
        })
    }

    pub fn root(&self) -> &WatchRoot {
        self.aggregator.root()
    }

    /// Run until `shutdown` fires or the watch backend goes away. The watch
    /// is released on both paths.
    pub async fn run(mut self, shutdown: &ShutdownSignal) -> Result<SessionStats, SyncError> {
        let mut rx = shutdown.subscribe();
        let mut stats = SessionStats::default();
        info!(root = %self.root(), "Watching {}", self.root());

        let result = loop {
            if shutdown.is_shutting_down() {
                break Ok(());
            }
            match self.aggregator.next(&mut rx).await {
                Ok(Some(changes)) => {
                    let outcomes = self.reconciler.apply(&changes).await;
                    stats.record(&outcomes);
                }
                Ok(None) => break Ok(()),
                Err(err) => break Err(err),
            }
        };

        if let Err(err) = self.aggregator.stop() {
            warn!(error = %err, "failed to release watch");
        }
        info!(
            change_sets = stats.change_sets,
            succeeded = stats.succeeded,
            failed = stats.failed,
            "Stopped watching"
        );
        result.map(|()| stats).map_err(SyncError::from)
    }
}
