use std::path::Path;
use std::sync::Arc;

use ts_core::changes::ChangeSet;
use ts_core::paths::{RemotePath, WatchRoot};
use ts_remote::memory::{MemoryStore, StoreCall};
use ts_remote::ValidationRules;
use ts_sync::{PathOutcome, Reconciler, SyncOutcome};

fn p(raw: &str) -> RemotePath {
    RemotePath::parse(raw).unwrap()
}

fn write(root: &Path, rel: &str, content: &str) {
    let dest = root.join(rel);
    std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
    std::fs::write(dest, content).unwrap();
}

fn setup(store: MemoryStore) -> (tempfile::TempDir, Arc<MemoryStore>, Reconciler) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(store);
    let root = WatchRoot::new(dir.path()).unwrap();
    let reconciler = Reconciler::new(store.clone(), root, 4);
    (dir, store, reconciler)
}

#[tokio::test]
async fn deleting_an_absent_path_is_ignored() {
    let (_dir, store, reconciler) = setup(MemoryStore::new());

    let changes = ChangeSet {
        removed: vec![p("snippets/gone.liquid")],
        ..ChangeSet::default()
    };
    let first = reconciler.apply(&changes).await;
    let second = reconciler.apply(&changes).await;

    assert_eq!(first, second);
    assert_eq!(first[0].outcome, SyncOutcome::NotFoundIgnored);
    assert!(store.is_empty());
}

#[tokio::test]
async fn modified_file_replaces_remote_content() {
    let (dir, store, reconciler) = setup(MemoryStore::new().with_file("layout/theme.liquid", "A"));
    write(dir.path(), "layout/theme.liquid", "B");

    let outcomes = reconciler
        .apply(&ChangeSet {
            modified: vec![p("layout/theme.liquid")],
            ..ChangeSet::default()
        })
        .await;

    assert_eq!(outcomes[0].outcome, SyncOutcome::Created);
    assert_eq!(store.paths(), ["layout/theme.liquid"]);
    assert_eq!(store.get("layout/theme.liquid").unwrap(), b"B");
}

#[tokio::test]
async fn invalid_candidate_is_never_saved() {
    let rules = ValidationRules {
        max_file_bytes: 4,
        ..ValidationRules::default()
    };
    let (dir, store, reconciler) = setup(MemoryStore::new().with_rules(rules));
    write(dir.path(), "assets/big.bin", "0123456789");

    let outcomes = reconciler
        .apply(&ChangeSet {
            added: vec![p("assets/big.bin")],
            ..ChangeSet::default()
        })
        .await;

    assert_eq!(
        outcomes[0].outcome,
        SyncOutcome::ValidationFailed(vec!["Content is too large (maximum is 4 bytes)".into()])
    );
    assert_eq!(store.save_count(), 0);
}

#[tokio::test]
async fn one_failure_does_not_block_siblings() {
    let (dir, store, reconciler) = setup(MemoryStore::new().with_file("old.txt", "x"));
    for name in ["a.txt", "b.txt", "c.txt"] {
        write(dir.path(), name, name);
    }
    store.fail_save("b.txt", &["Name is reserved", "Try another name"]);
    store.fail_delete("old.txt", &["locked"]);

    let outcomes = reconciler
        .apply(&ChangeSet {
            modified: vec![p("a.txt")],
            added: vec![p("b.txt"), p("c.txt"), p("missing.txt")],
            removed: vec![p("old.txt")],
        })
        .await;

    let by_path: Vec<(&str, &SyncOutcome)> = outcomes
        .iter()
        .map(|o| (o.path.as_str(), &o.outcome))
        .collect();
    assert_eq!(by_path.len(), 5);
    assert_eq!(by_path[0], ("old.txt", &SyncOutcome::RemoteError(vec!["locked".into()])));
    assert_eq!(by_path[1], ("a.txt", &SyncOutcome::Created));
    assert_eq!(
        by_path[2],
        (
            "b.txt",
            &SyncOutcome::RemoteError(vec!["Name is reserved".into(), "Try another name".into()])
        )
    );
    assert_eq!(by_path[3], ("c.txt", &SyncOutcome::Created));
    assert_eq!(by_path[4].0, "missing.txt");
    assert!(matches!(by_path[4].1, SyncOutcome::LocalIoFailed(_)));
    assert_eq!(store.paths(), ["a.txt", "c.txt", "old.txt"]);
}

#[tokio::test]
async fn removal_runs_before_recreate_of_same_path() {
    let (dir, store, reconciler) = setup(MemoryStore::new().with_file("a.txt", "stale"));
    write(dir.path(), "a.txt", "fresh");

    let outcomes = reconciler
        .apply(&ChangeSet {
            added: vec![p("a.txt")],
            removed: vec![p("a.txt")],
            ..ChangeSet::default()
        })
        .await;

    assert_eq!(
        outcomes,
        [
            PathOutcome::new(p("a.txt"), SyncOutcome::Deleted),
            PathOutcome::new(p("a.txt"), SyncOutcome::Created),
        ]
    );
    assert_eq!(store.get("a.txt").unwrap(), b"fresh");
    assert_eq!(
        store.calls(),
        [
            StoreCall::Delete("a.txt".into()),
            StoreCall::Delete("a.txt".into()),
            StoreCall::Save("a.txt".into()),
        ]
    );
}

#[tokio::test]
async fn path_listed_as_modified_and_added_is_replaced_once() {
    let (dir, store, reconciler) = setup(MemoryStore::new());
    write(dir.path(), "a.txt", "v1");

    let outcomes = reconciler
        .apply(&ChangeSet {
            modified: vec![p("a.txt")],
            added: vec![p("a.txt")],
            ..ChangeSet::default()
        })
        .await;

    assert_eq!(outcomes.len(), 1);
    assert_eq!(store.save_count(), 1);
}

#[tokio::test]
async fn nested_paths_use_forward_slashes_remotely() {
    let (dir, store, reconciler) = setup(MemoryStore::new());
    write(dir.path(), "templates/customers/login.liquid", "<form>");

    let root = reconciler.root().clone();
    let path = root
        .relative(&root.path().join("templates").join("customers").join("login.liquid"))
        .unwrap();
    assert_eq!(path.as_str(), "templates/customers/login.liquid");

    reconciler
        .apply(&ChangeSet {
            added: vec![path],
            ..ChangeSet::default()
        })
        .await;
    assert_eq!(store.paths(), ["templates/customers/login.liquid"]);
}
