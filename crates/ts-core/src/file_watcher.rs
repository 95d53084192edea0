use crossbeam_channel::{Receiver, TryRecvError};
use notify::{
    event::{ModifyKind, RenameMode},
    Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

use crate::changes::RawKind;

/// Errors from the OS watch subsystem.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The recursive watch could not be established. Fatal for a run.
    #[error("failed to watch {}: {source}", root.display())]
    Setup {
        root: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// The watch backend stopped delivering events.
    #[error("watch backend disconnected")]
    Disconnected,

    /// Releasing the watch failed.
    #[error("failed to release watch: {0}")]
    Release(#[source] notify::Error),
}

/// A raw change for an absolute path, before normalization and coalescing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub path: PathBuf,
    pub kind: RawKind,
}

/// Configuration for the file watcher.
#[derive(Debug, Clone)]
pub struct FileWatcherConfig {
    pub root: PathBuf,
    pub ignore_patterns: Vec<String>,
}

impl FileWatcherConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ignore_patterns: default_ignore_patterns(),
        }
    }
}

/// VCS metadata directories and editor artefacts that never belong in the
/// remote store.
pub fn default_ignore_patterns() -> Vec<String> {
    [".git", ".svn", ".hg", ".DS_Store", "*.swp", "*.swx", "*~", ".#*", "4913"]
        .into_iter()
        .map(String::from)
        .collect()
}

// ---------------------------------------------------------------------------
// Ignore patterns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pattern {
    Exact(String),
    Suffix(String),
    Prefix(String),
}

/// Segment-wise ignore matcher.
///
/// `name` matches a segment exactly, `*name` matches a segment suffix and
/// `name*` a segment prefix. A path is ignored when any of its segments
/// matches, so ignoring `.git` also ignores everything below it.
#[derive(Debug, Clone, Default)]
pub struct IgnoreSet {
    patterns: Vec<Pattern>,
}

impl IgnoreSet {
    pub fn new(patterns: &[String]) -> Self {
        let patterns = patterns
            .iter()
            .filter(|p| !p.is_empty())
            .map(|p| {
                if let Some(suffix) = p.strip_prefix('*') {
                    Pattern::Suffix(suffix.to_string())
                } else if let Some(prefix) = p.strip_suffix('*') {
                    Pattern::Prefix(prefix.to_string())
                } else {
                    Pattern::Exact(p.clone())
                }
            })
            .collect();
        Self { patterns }
    }

    pub fn matches_segment(&self, segment: &str) -> bool {
        self.patterns.iter().any(|pattern| match pattern {
            Pattern::Exact(name) => segment == name,
            Pattern::Suffix(suffix) => segment.ends_with(suffix.as_str()),
            Pattern::Prefix(prefix) => segment.starts_with(prefix.as_str()),
        })
    }

    pub fn is_ignored(&self, path: &Path) -> bool {
        path.components()
            .filter_map(|c| c.as_os_str().to_str())
            .any(|segment| self.matches_segment(segment))
    }
}

// ---------------------------------------------------------------------------
// Event mapping
// ---------------------------------------------------------------------------

/// Translate one `notify` event into raw per-path changes.
///
/// Metadata-only modifications and access events carry no content change and
/// are dropped. Rename halves become remove/create pairs; a rename whose
/// direction the backend could not tell is resolved by checking whether the
/// path still exists.
pub fn map_event(event: Event) -> Vec<RawEvent> {
    let tag = |kind: RawKind| move |path: PathBuf| RawEvent { path, kind };

    match event.kind {
        EventKind::Create(_) => event.paths.into_iter().map(tag(RawKind::Create)).collect(),
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::From => event.paths.into_iter().map(tag(RawKind::Remove)).collect(),
            RenameMode::To => event.paths.into_iter().map(tag(RawKind::Create)).collect(),
            RenameMode::Both => {
                let mut paths = event.paths.into_iter();
                let from = paths.next().map(tag(RawKind::Remove));
                let to = paths.next().map(tag(RawKind::Create));
                from.into_iter().chain(to).collect()
            }
            RenameMode::Any | RenameMode::Other => event
                .paths
                .into_iter()
                .map(|path| {
                    let kind = if path.exists() {
                        RawKind::Create
                    } else {
                        RawKind::Remove
                    };
                    RawEvent { path, kind }
                })
                .collect(),
        },
        EventKind::Modify(_) => event.paths.into_iter().map(tag(RawKind::Modify)).collect(),
        EventKind::Remove(_) => event.paths.into_iter().map(tag(RawKind::Remove)).collect(),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// FileWatcher
// ---------------------------------------------------------------------------

/// Recursive watch over one root, backed by `notify::RecommendedWatcher`.
///
/// The backend callback only forwards events into a channel; draining and
/// filtering happen on the caller's side in [`FileWatcher::recv_events`].
/// The OS watch is acquired in [`FileWatcher::new`] and released by
/// [`FileWatcher::stop`] or on drop.
///
/// Events come out per file. The watcher keeps the set of files it knows
/// under the root, so a directory that appears is reported as a create for
/// each file inside it and a directory that disappears as a remove for each
/// known file below it.
pub struct FileWatcher {
    config: FileWatcherConfig,
    ignore: IgnoreSet,
    watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<Event>>,
    known: BTreeSet<PathBuf>,
    new_dirs: Vec<PathBuf>,
}

impl FileWatcher {
    /// Create the backend, start watching `config.root` recursively and
    /// record the files already present.
    pub fn new(config: FileWatcherConfig) -> Result<Self, WatchError> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let setup = |source| WatchError::Setup {
            root: config.root.clone(),
            source,
        };

        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })
        .map_err(setup)?;
        watcher
            .watch(&config.root, RecursiveMode::Recursive)
            .map_err(setup)?;

        let mut this = Self {
            ignore: IgnoreSet::new(&config.ignore_patterns),
            config,
            watcher,
            rx,
            known: BTreeSet::new(),
            new_dirs: Vec::new(),
        };
        this.known = this.scan(&this.config.root).into_iter().collect();
        debug!(
            root = %this.config.root.display(),
            files = this.known.len(),
            "watch established"
        );
        Ok(this)
    }

    /// Drain every pending event without blocking.
    ///
    /// Backend errors for individual events are logged and skipped. Returns
    /// [`WatchError::Disconnected`] only once the queue is empty and the
    /// backend is gone.
    pub fn recv_events(&mut self) -> Result<Vec<RawEvent>, WatchError> {
        let mut events = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(Ok(event)) => {
                    for raw in map_event(event) {
                        if !self.is_ignored(&raw.path) {
                            self.track(raw, &mut events);
                        }
                    }
                }
                Ok(Err(err)) => warn!(error = %err, "watch backend reported an error"),
                Err(TryRecvError::Empty) => return Ok(events),
                Err(TryRecvError::Disconnected) if events.is_empty() => {
                    return Err(WatchError::Disconnected)
                }
                Err(TryRecvError::Disconnected) => return Ok(events),
            }
        }
    }

    /// Whether directories were created since the last
    /// [`FileWatcher::rescan_new_dirs`].
    pub fn has_new_dirs(&self) -> bool {
        !self.new_dirs.is_empty()
    }

    /// Walk the directories created since the last call again and report
    /// files that no event announced. Those were written before the backend
    /// had a watch on their directory.
    pub fn rescan_new_dirs(&mut self) -> Vec<RawEvent> {
        let mut found = Vec::new();
        for dir in std::mem::take(&mut self.new_dirs) {
            for path in self.scan(&dir) {
                if self.known.insert(path.clone()) {
                    found.push(RawEvent {
                        path,
                        kind: RawKind::Create,
                    });
                }
            }
        }
        found
    }

    fn is_ignored(&self, path: &Path) -> bool {
        let rel = path.strip_prefix(&self.config.root).unwrap_or(path);
        let ignored = self.ignore.is_ignored(rel);
        if ignored {
            trace!(path = %path.display(), "ignored");
        }
        ignored
    }

    /// Turn one raw event into per-file events and update the known set.
    fn track(&mut self, raw: RawEvent, out: &mut Vec<RawEvent>) {
        match raw.kind {
            RawKind::Remove => {
                let gone: Vec<PathBuf> = self
                    .known
                    .iter()
                    .filter(|known| known.starts_with(&raw.path))
                    .cloned()
                    .collect();
                if gone.is_empty() {
                    trace!(path = %raw.path.display(), "untracked path removed");
                }
                for path in gone {
                    self.known.remove(&path);
                    out.push(RawEvent {
                        path,
                        kind: RawKind::Remove,
                    });
                }
            }
            _ if raw.path.is_dir() => {
                if raw.kind == RawKind::Create {
                    for path in self.scan(&raw.path) {
                        self.known.insert(path.clone());
                        out.push(RawEvent {
                            path,
                            kind: RawKind::Create,
                        });
                    }
                    self.new_dirs.push(raw.path);
                }
            }
            _ => {
                self.known.insert(raw.path.clone());
                out.push(raw);
            }
        }
    }

    /// Every non-ignored file below `dir`.
    fn scan(&self, dir: &Path) -> Vec<PathBuf> {
        WalkDir::new(dir)
            .into_iter()
            .filter_entry(|entry| {
                let rel = entry.path().strip_prefix(&self.config.root).unwrap_or(entry.path());
                !self.ignore.is_ignored(rel)
            })
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    debug!(error = %err, "skipping unreadable entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .collect()
    }

    /// Release the OS watch.
    pub fn stop(mut self) -> Result<(), WatchError> {
        let result = self.watcher.unwatch(&self.config.root);
        debug!(root = %self.config.root.display(), "watch released");
        result.map_err(WatchError::Release)
    }
}
