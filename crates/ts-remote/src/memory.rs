use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use ts_core::paths::RemotePath;

use crate::types::{CandidateFile, DeleteOutcome, InvalidEntry, Listing, RemoteFile};
use crate::validation::ValidationRules;
use crate::{RemoteError, RemoteStore, Result};

/// One call made against a [`MemoryStore`], for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    List { recursive: bool },
    Fetch(String),
    Save(String),
    Delete(String),
}

/// In-memory remote store.
///
/// Behaves like the HTTP API: saving over an existing path fails with
/// "Path has already been taken", deleting a missing path reports
/// [`DeleteOutcome::NotFound`], and candidates are checked against the same
/// [`ValidationRules`]. Failures can be injected per path.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: Mutex<BTreeMap<RemotePath, Vec<u8>>>,
    rules: ValidationRules,
    save_failures: Mutex<HashMap<String, Vec<String>>>,
    delete_failures: Mutex<HashMap<String, Vec<String>>>,
    fetch_failures: Mutex<HashMap<String, Vec<String>>>,
    unusable: Mutex<Vec<String>>,
    calls: Mutex<Vec<StoreCall>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn injected(status: u16, messages: &[String]) -> RemoteError {
    RemoteError::Api {
        status,
        messages: messages.to_vec(),
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(mut self, rules: ValidationRules) -> Self {
        self.rules = rules;
        self
    }

    /// Seed a file.
    pub fn with_file(self, path: &str, content: impl Into<Vec<u8>>) -> Self {
        self.insert(path, content);
        self
    }

    /// Store a file directly, bypassing validation and the call log.
    ///
    /// Panics on a malformed path; seeding is test setup.
    pub fn insert(&self, path: &str, content: impl Into<Vec<u8>>) {
        let path = RemotePath::parse(path).unwrap_or_else(|e| panic!("bad seed path: {e}"));
        lock(&self.files).insert(path, content.into());
    }

    /// Add a raw listing entry that is not a valid remote path, such as
    /// `../x`. It is listed but never stored.
    pub fn with_unusable_entry(self, raw: &str) -> Self {
        lock(&self.unusable).push(raw.to_string());
        self
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        let path = RemotePath::parse(path).ok()?;
        lock(&self.files).get(&path).cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        lock(&self.files).keys().map(|p| p.to_string()).collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.files).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make every save of `path` fail with `messages` (HTTP 422).
    pub fn fail_save(&self, path: &str, messages: &[&str]) {
        lock(&self.save_failures).insert(path.into(), owned(messages));
    }

    /// Make every delete of `path` fail with `messages` (HTTP 500).
    pub fn fail_delete(&self, path: &str, messages: &[&str]) {
        lock(&self.delete_failures).insert(path.into(), owned(messages));
    }

    /// Make every content fetch of `path` fail with `messages` (HTTP 500).
    pub fn fail_fetch(&self, path: &str, messages: &[&str]) {
        lock(&self.fetch_failures).insert(path.into(), owned(messages));
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        lock(&self.calls).clone()
    }

    pub fn save_count(&self) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| matches!(c, StoreCall::Save(_)))
            .count()
    }

    fn record(&self, call: StoreCall) {
        lock(&self.calls).push(call);
    }
}

fn owned(messages: &[&str]) -> Vec<String> {
    messages.iter().map(|m| m.to_string()).collect()
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn list(&self, recursive: bool) -> Result<Listing> {
        self.record(StoreCall::List { recursive });
        let files = lock(&self.files)
            .keys()
            .filter(|p| recursive || !p.as_str().contains('/'))
            .map(|p| RemoteFile::new(p.clone()))
            .collect();
        let invalid = lock(&self.unusable)
            .iter()
            .filter_map(|raw| {
                RemotePath::parse(raw.as_str()).err().map(|err| InvalidEntry {
                    path: raw.clone(),
                    reason: err.to_string(),
                })
            })
            .collect();
        Ok(Listing { files, invalid })
    }

    async fn fetch_content(&self, file: &RemoteFile) -> Result<Vec<u8>> {
        let path = file.path.as_str();
        self.record(StoreCall::Fetch(path.to_string()));
        if let Some(messages) = lock(&self.fetch_failures).get(path) {
            return Err(injected(500, messages));
        }
        lock(&self.files)
            .get(&file.path)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(path.to_string()))
    }

    fn validate(&self, candidate: &CandidateFile) -> std::result::Result<(), Vec<String>> {
        self.rules.validate(candidate)
    }

    async fn save(&self, candidate: CandidateFile) -> Result<()> {
        self.record(StoreCall::Save(candidate.path.clone()));
        if let Some(messages) = lock(&self.save_failures).get(&candidate.path) {
            return Err(injected(422, messages));
        }
        if let Err(messages) = self.rules.validate(&candidate) {
            return Err(injected(422, &messages));
        }
        let path = RemotePath::parse(candidate.path)?;

        let mut files = lock(&self.files);
        if files.contains_key(&path) {
            return Err(injected(422, &["Path has already been taken".to_string()]));
        }
        files.insert(path, candidate.content);
        Ok(())
    }

    async fn delete(&self, path: &RemotePath) -> Result<DeleteOutcome> {
        self.record(StoreCall::Delete(path.to_string()));
        if let Some(messages) = lock(&self.delete_failures).get(path.as_str()) {
            return Err(injected(500, messages));
        }
        Ok(match lock(&self.files).remove(path) {
            Some(_) => DeleteOutcome::Deleted,
            None => DeleteOutcome::NotFound,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(raw: &str) -> RemotePath {
        RemotePath::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn list_respects_recursion() {
        let store = MemoryStore::new()
            .with_file("a/b.txt", "b")
            .with_file("c.txt", "c");
        let all: Vec<_> = store
            .list(true)
            .await
            .unwrap()
            .files
            .into_iter()
            .map(|f| f.path)
            .collect();
        assert_eq!(all, [p("a/b.txt"), p("c.txt")]);
        let top = store.list(false).await.unwrap().files;
        assert_eq!(top.len(), 1);
        assert!(top.iter().all(|f| f.content.is_none()));
    }

    #[tokio::test]
    async fn unusable_entries_are_listed_as_invalid() {
        let store = MemoryStore::new()
            .with_file("ok.txt", "ok")
            .with_unusable_entry("../x");
        let listing = store.list(true).await.unwrap();
        assert_eq!(listing.files.len(), 1);
        assert_eq!(listing.invalid.len(), 1);
        assert_eq!(listing.invalid[0].path, "../x");
        assert_eq!(listing.len(), 2);
        assert!(store.get("../x").is_none());
        assert!(MemoryStore::new().list(true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_refuses_existing_path() {
        let store = MemoryStore::new().with_file("a.txt", "old");
        let err = store
            .save(CandidateFile::new("a.txt", b"new".to_vec()))
            .await
            .unwrap_err();
        assert_eq!(err.messages(), ["Path has already been taken"]);
        assert_eq!(store.get("a.txt").unwrap(), b"old");
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let store = MemoryStore::new();
        assert_eq!(store.delete(&p("nope.txt")).await.unwrap(), DeleteOutcome::NotFound);
    }

    #[tokio::test]
    async fn injected_failures_surface_messages() {
        let store = MemoryStore::new().with_file("x.txt", "x");
        store.fail_delete("x.txt", &["backend down"]);
        store.fail_fetch("x.txt", &["boom"]);
        store.fail_save("y.txt", &["Name is reserved"]);

        let err = store.delete(&p("x.txt")).await.unwrap_err();
        assert_eq!(err.messages(), ["backend down"]);
        let err = store.fetch_content(&RemoteFile::new(p("x.txt"))).await.unwrap_err();
        assert_eq!(err.messages(), ["boom"]);
        let err = store
            .save(CandidateFile::new("y.txt", Vec::new()))
            .await
            .unwrap_err();
        assert_eq!(err.messages(), ["Name is reserved"]);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn calls_are_logged_in_order() {
        let store = MemoryStore::new();
        store.delete(&p("a")).await.unwrap();
        store.save(CandidateFile::new("a", b"1".to_vec())).await.unwrap();
        assert_eq!(
            store.calls(),
            [StoreCall::Delete("a".into()), StoreCall::Save("a".into())]
        );
        assert_eq!(store.save_count(), 1);
    }
}
