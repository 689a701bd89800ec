//! Tests for entity container resolution on a directory-backed tree.

use page_stats::hierarchy::{ContentTree, FsContentTree, Resolver};
use page_stats::StatsError;
use std::sync::Arc;
use std::thread;

fn resolver(dir: &std::path::Path) -> Resolver<FsContentTree> {
    let tree = FsContentTree::new(dir);
    let root = tree.open_root("stats", "Stats").unwrap();
    Resolver::new(tree, root)
}

#[test]
fn test_resolve_creates_published_ancestors() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let resolver = resolver(tmp_dir.path());

    let container = resolver.resolve("blog/2024/hello").unwrap();
    assert_eq!(container.id, "blog/2024/hello");
    assert_eq!(container.dir, tmp_dir.path().join("blog").join("2024").join("hello"));

    for id in ["blog", "blog/2024", "blog/2024/hello"] {
        let found = resolver.find(id).unwrap().expect("ancestor exists");
        let meta = resolver.tree().metadata(&found).unwrap();
        assert!(meta.published, "{} should be published", id);
        assert_eq!(meta.title, id.rsplit('/').next().unwrap());
    }
}

#[test]
fn test_resolve_twice_returns_same_container() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let resolver = resolver(tmp_dir.path());

    let first = resolver.resolve("a/b").unwrap();
    let created_at = resolver.tree().metadata(&first).unwrap().created_at;

    let second = resolver.resolve("a/b").unwrap();
    assert_eq!(first, second);
    assert_eq!(resolver.tree().metadata(&second).unwrap().created_at, created_at);
}

#[test]
fn test_sibling_reuses_existing_parent() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let resolver = resolver(tmp_dir.path());

    resolver.resolve("blog/one").unwrap();
    resolver.resolve("blog/two").unwrap();

    let mut children: Vec<String> = std::fs::read_dir(tmp_dir.path().join("blog"))
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    children.sort();
    assert_eq!(children, vec!["one", "two"]);
}

#[test]
fn test_find_never_creates() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let resolver = resolver(tmp_dir.path());

    assert!(resolver.find("ghost/page").unwrap().is_none());
    assert!(!tmp_dir.path().join("ghost").exists());
}

#[test]
fn test_path_escapes_are_rejected() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let resolver = resolver(tmp_dir.path());

    for bad in ["../outside", "a/../b", "/abs", "a/./b", ""] {
        assert!(
            matches!(resolver.resolve(bad), Err(StatsError::InvalidEntityId(_))),
            "{:?} should be rejected",
            bad
        );
    }
}

#[test]
fn test_blocked_parent_is_storage_create() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let resolver = resolver(tmp_dir.path());

    // A plain file where the container directory should go.
    std::fs::write(tmp_dir.path().join("blocked"), b"not a dir").unwrap();

    match resolver.resolve("blocked/page") {
        Err(StatsError::StorageCreate { id, .. }) => assert_eq!(id, "blocked"),
        other => panic!("expected StorageCreate, got {:?}", other),
    }
}

#[test]
fn test_concurrent_resolve_creates_once() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let resolver = Arc::new(resolver(tmp_dir.path()));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let resolver = Arc::clone(&resolver);
            thread::spawn(move || resolver.resolve("x/y/z").unwrap())
        })
        .collect();
    let containers: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(containers.windows(2).all(|w| w[0] == w[1]));
    let dir = resolver.tree().container_root(&containers[0]);
    assert!(dir.ends_with("x/y/z"));
}
