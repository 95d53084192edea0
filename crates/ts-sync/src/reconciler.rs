use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, info};
use ts_core::changes::ChangeSet;
use ts_core::paths::{RemotePath, WatchRoot};
use ts_remote::{DeleteOutcome, RemoteStore};

use crate::outcome::{PathOutcome, SyncOutcome};

/// Applies change sets to a remote store.
///
/// Removals run first, then every modified or added path is replaced with
/// delete, read, build, validate and save. Each phase fans out to at most
/// `workers` concurrent operations and reports outcomes in input order.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn RemoteStore>,
    root: WatchRoot,
    workers: usize,
}

impl Reconciler {
    pub fn new(store: Arc<dyn RemoteStore>, root: WatchRoot, workers: usize) -> Self {
        Self {
            store,
            root,
            workers: workers.max(1),
        }
    }

    pub fn root(&self) -> &WatchRoot {
        &self.root
    }

    /// Apply one change set to completion.
    pub async fn apply(&self, changes: &ChangeSet) -> Vec<PathOutcome> {
        let upserts = changes.upserts();
        info!(
            removed = changes.removed.len(),
            upserts = upserts.len(),
            "applying change set"
        );

        let mut outcomes: Vec<PathOutcome> = stream::iter(&changes.removed)
            .map(|path| async move { PathOutcome::new(path.clone(), self.remove(path).await) })
            .buffered(self.workers)
            .collect()
            .await;

        let replaced: Vec<PathOutcome> = stream::iter(upserts)
            .map(|path| async move { PathOutcome::new(path.clone(), self.replace(path).await) })
            .buffered(self.workers)
            .collect()
            .await;
        outcomes.extend(replaced);
        outcomes
    }

    async fn remove(&self, path: &RemotePath) -> SyncOutcome {
        match self.store.delete(path).await {
            Ok(DeleteOutcome::Deleted) => SyncOutcome::Deleted,
            Ok(DeleteOutcome::NotFound) => SyncOutcome::NotFoundIgnored,
            Err(err) => SyncOutcome::RemoteError(err.messages()),
        }
    }

    async fn replace(&self, path: &RemotePath) -> SyncOutcome {
        if let SyncOutcome::RemoteError(messages) = self.remove(path).await {
            return SyncOutcome::RemoteError(messages);
        }

        let local = self.root.local_path(path);
        let content = match tokio::fs::read(&local).await {
            Ok(content) => content,
            Err(err) => return SyncOutcome::LocalIoFailed(err.to_string()),
        };

        let candidate = self.store.build(path, content);
        if let Err(messages) = self.store.validate(&candidate) {
            return SyncOutcome::ValidationFailed(messages);
        }

        debug!(path = %path, bytes = candidate.content.len(), "saving");
        match self.store.save(candidate).await {
            Ok(()) => SyncOutcome::Created,
            Err(err) => SyncOutcome::RemoteError(err.messages()),
        }
    }
}
