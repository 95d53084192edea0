use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use crate::paths::RemotePath;

/// Default debounce window for coalescing raw events into a [`ChangeSet`].
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// What a single raw filesystem notification says happened to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawKind {
    Create,
    Modify,
    Remove,
}

/// A raw event that has already been normalized to a remote path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEvent {
    pub path: RemotePath,
    pub kind: RawKind,
    pub at: Instant,
}

// ---------------------------------------------------------------------------
// ChangeSet
// ---------------------------------------------------------------------------

/// One debounce window worth of local changes.
///
/// The three lists are disjoint and sorted by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub modified: Vec<RemotePath>,
    pub added: Vec<RemotePath>,
    pub removed: Vec<RemotePath>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.modified.is_empty() && self.added.is_empty() && self.removed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.modified.len() + self.added.len() + self.removed.len()
    }

    /// Paths that need a full replace: `modified` followed by `added`, with
    /// repeated paths kept only at their first position.
    pub fn upserts(&self) -> Vec<&RemotePath> {
        let mut seen = BTreeSet::new();
        self.modified
            .iter()
            .chain(self.added.iter())
            .filter(|path| seen.insert(*path))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Coalescer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Pending {
    existed_at_start: bool,
    exists: bool,
    saw_remove: bool,
}

impl Pending {
    fn new(kind: RawKind) -> Self {
        Self {
            existed_at_start: kind != RawKind::Create,
            exists: kind != RawKind::Remove,
            saw_remove: kind == RawKind::Remove,
        }
    }

    fn apply(&mut self, kind: RawKind) {
        self.exists = kind != RawKind::Remove;
        self.saw_remove |= kind == RawKind::Remove;
    }
}

/// Merges bursts of raw events into [`ChangeSet`]s.
///
/// A window opens with the first event after a flush and closes `window`
/// later. Within a window only the first and last state of each path
/// matter: a file that did not exist before and does not exist after
/// (editor swap files) disappears entirely, and a file that was removed and
/// recreated is reported as added.
///
/// The coalescer takes timestamps from the caller and never reads a clock,
/// so it can be driven deterministically.
#[derive(Debug)]
pub struct Coalescer {
    window: Duration,
    pending: BTreeMap<RemotePath, Pending>,
    opened_at: Option<Instant>,
}

impl Coalescer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: BTreeMap::new(),
            opened_at: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record one event.
    pub fn push(&mut self, path: RemotePath, kind: RawKind, at: Instant) {
        self.opened_at.get_or_insert(at);
        match self.pending.entry(path) {
            Entry::Vacant(entry) => {
                entry.insert(Pending::new(kind));
            }
            Entry::Occupied(mut entry) => entry.get_mut().apply(kind),
        }
    }

    /// When the current window closes, if one is open.
    /// Open a window at `at` without recording a path. Does nothing while a
    /// window is already open.
    pub fn open(&mut self, at: Instant) {
        self.opened_at.get_or_insert(at);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.opened_at.map(|opened| opened + self.window)
    }

    pub fn is_idle(&self) -> bool {
        self.opened_at.is_none()
    }

    /// Close the window if its deadline has passed. Returns `None` while the
    /// window is still open, when nothing is pending, or when every pending
    /// change cancelled out.
    pub fn poll(&mut self, now: Instant) -> Option<ChangeSet> {
        let deadline = self.deadline()?;
        if now < deadline {
            return None;
        }
        let set = self.flush();
        (!set.is_empty()).then_some(set)
    }

    /// Close the window now, regardless of its deadline.
    pub fn flush(&mut self) -> ChangeSet {
        self.opened_at = None;
        let mut set = ChangeSet::default();
        for (path, state) in std::mem::take(&mut self.pending) {
            match (state.existed_at_start, state.exists) {
                (false, true) => set.added.push(path),
                (true, false) => set.removed.push(path),
                (true, true) if state.saw_remove => set.added.push(path),
                (true, true) => set.modified.push(path),
                (false, false) => {}
            }
        }
        set
    }
}

impl Default for Coalescer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

/// Coalesce a timestamped event sequence into the change sets a live
/// watcher would emit. Events must be in timestamp order.
pub fn coalesce(events: impl IntoIterator<Item = PathEvent>, window: Duration) -> Vec<ChangeSet> {
    let mut coalescer = Coalescer::new(window);
    let mut sets = Vec::new();
    for event in events {
        if let Some(set) = coalescer.poll(event.at) {
            sets.push(set);
        }
        coalescer.push(event.path, event.kind, event.at);
    }
    let last = coalescer.flush();
    if !last.is_empty() {
        sets.push(last);
    }
    sets
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
