use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tracing::{debug, trace};
use ts_core::changes::{ChangeSet, Coalescer};
use ts_core::file_watcher::{FileWatcher, FileWatcherConfig, RawEvent, WatchError};
use ts_core::paths::WatchRoot;

/// How often the watcher queue is drained while no window is open.
pub const POLL_TICK: Duration = Duration::from_millis(25);

/// Owns the watch subscription and the debounce window for one root.
pub struct ChangeAggregator {
    root: WatchRoot,
    watcher: FileWatcher,
    coalescer: Coalescer,
}

impl ChangeAggregator {
    /// Start watching `root` recursively.
    pub fn start(
        root: WatchRoot,
        ignore_patterns: Vec<String>,
        debounce: Duration,
    ) -> Result<Self, WatchError> {
        let watcher = FileWatcher::new(FileWatcherConfig {
            root: root.path().to_path_buf(),
            ignore_patterns,
        })?;
        Ok(Self {
            root,
            watcher,
            coalescer: Coalescer::new(debounce),
        })
    }

    pub fn root(&self) -> &WatchRoot {
        &self.root
    }

    /// Wait for the next non-empty change set.
    ///
    /// Returns `Ok(None)` once `shutdown` fires; events still inside an open
    /// window are dropped.
    pub async fn next(
        &mut self,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<Option<ChangeSet>, WatchError> {
        loop {
            self.drain()?;
            let now = Instant::now();
            if self.watcher.has_new_dirs() && self.coalescer.deadline().is_some_and(|d| now >= d) {
                let found = self.watcher.rescan_new_dirs();
                if !found.is_empty() {
                    debug!(files = found.len(), "found unannounced files in new directories");
                }
                self.push_all(found, now);
            }
            if let Some(set) = self.coalescer.poll(now) {
                debug!(changes = set.len(), "change set ready");
                return Ok(Some(set));
            }

            let wait = self
                .coalescer
                .deadline()
                .map_or(POLL_TICK, |d| d.saturating_duration_since(now).min(POLL_TICK));
            tokio::select! {
                _ = shutdown.recv() => {
                    if !self.coalescer.is_idle() {
                        debug!("discarding open debounce window");
                    }
                    return Ok(None);
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    fn drain(&mut self) -> Result<(), WatchError> {
        let events = self.watcher.recv_events()?;
        let at = Instant::now();
        self.push_all(events, at);
        // A new directory may still be empty; the window has to open anyway
        // so it gets rescanned when it closes.
        if self.watcher.has_new_dirs() {
            self.coalescer.open(at);
        }
        Ok(())
    }

    fn push_all(&mut self, events: Vec<RawEvent>, at: Instant) {
        for raw in events {
            match self.root.relative(&raw.path) {
                Ok(path) => {
                    trace!(path = %path, kind = ?raw.kind, "event");
                    self.coalescer.push(path, raw.kind, at);
                }
                Err(err) => trace!(error = %err, "event dropped"),
            }
        }
    }

    /// Release the OS watch.
    pub fn stop(self) -> Result<(), WatchError> {
        self.watcher.stop()
    }
}
