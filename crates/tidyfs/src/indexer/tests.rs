use std::fs::{self, File};
use std::path::Path;
use std::sync::atomic::AtomicBool;

use tempfile::TempDir;

use super::*;

fn fixture() -> TempDir {
    let temp = TempDir::new().expect("tempdir");
    let root = temp.path();
    fs::create_dir(root.join("bbb")).expect("mkdir bbb");
    fs::create_dir(root.join("aaa")).expect("mkdir aaa");
    File::create(root.join("aaa/inner.txt")).expect("inner");
    File::create(root.join("c.txt")).expect("c");
    File::create(root.join(".hidden")).expect("hidden");
    temp
}

fn child_names(cache: &FileSystemCache, id: NodeId) -> Vec<String> {
    cache
        .node(id)
        .expect("node")
        .children()
        .iter()
        .map(|&child| cache.node(child).expect("child").name().to_string())
        .collect()
}

#[test]
fn sequential_scan_registers_every_entry_sorted() {
    let temp = fixture();
    let root = temp.path();
    let hidden = HiddenPolicy::default();
    let progress = ScanProgress::default();
    let ctx = ScanContext::new(&hidden, &[]).with_progress(&progress);
    let mut cache = FileSystemCache::new();

    let root_id = scan(&mut cache, &ctx, root, false).expect("scan");

    assert_eq!(child_names(&cache, root_id), vec![".hidden", "aaa", "bbb", "c.txt"]);
    assert_eq!(cache.len(), 6);
    let inner = cache.lookup(&root.join("aaa/inner.txt")).expect("inner cached");
    let aaa = cache.id_for_path(&root.join("aaa")).expect("aaa cached");
    assert_eq!(cache.node(inner).expect("inner").parent(), Some(aaa));

    let snapshot = progress.snapshot();
    assert_eq!(snapshot.scanned_files, 3);
    assert_eq!(snapshot.scanned_dirs, 3);
    assert_eq!(snapshot.errors, 0);
}

#[test]
fn parallel_scan_matches_sequential() {
    let temp = fixture();
    let root = temp.path();
    let hidden = HiddenPolicy::default();
    let ctx = ScanContext::new(&hidden, &[]);

    let mut sequential = FileSystemCache::new();
    let seq_root = scan(&mut sequential, &ctx, root, false).expect("sequential");
    let mut parallel = FileSystemCache::new();
    let par_root = scan(&mut parallel, &ctx, root, true).expect("parallel");

    let mut seq_paths: Vec<_> = sequential.paths().map(Path::to_path_buf).collect();
    let mut par_paths: Vec<_> = parallel.paths().map(Path::to_path_buf).collect();
    seq_paths.sort();
    par_paths.sort();
    assert_eq!(seq_paths, par_paths);
    assert_eq!(child_names(&sequential, seq_root), child_names(&parallel, par_root));
    assert_eq!(
        sequential.keyword_index().tokens().collect::<Vec<_>>(),
        parallel.keyword_index().tokens().collect::<Vec<_>>()
    );
}

#[test]
fn hidden_entries_skipped_when_configured() {
    let temp = fixture();
    let hidden = HiddenPolicy {
        skip_on_scan: true,
        ..HiddenPolicy::default()
    };
    let ctx = ScanContext::new(&hidden, &[]);

    for parallel in [false, true] {
        let mut cache = FileSystemCache::new();
        let root_id = scan(&mut cache, &ctx, temp.path(), parallel).expect("scan");
        assert_eq!(child_names(&cache, root_id), vec!["aaa", "bbb", "c.txt"]);
    }
}

#[test]
fn ignored_paths_are_left_out() {
    let temp = fixture();
    let hidden = HiddenPolicy::default();
    let ignored = vec![temp.path().join("aaa")];
    let ctx = ScanContext::new(&hidden, &ignored);

    for parallel in [false, true] {
        let mut cache = FileSystemCache::new();
        scan(&mut cache, &ctx, temp.path(), parallel).expect("scan");
        assert!(!cache.contains_path(&temp.path().join("aaa")));
        assert!(!cache.contains_path(&temp.path().join("aaa/inner.txt")));
        assert!(cache.contains_path(&temp.path().join("bbb")));
    }
}

#[test]
fn missing_root_fails_soft() {
    let temp = TempDir::new().expect("tempdir");
    let missing = temp.path().join("nope");
    let hidden = HiddenPolicy::default();
    let ctx = ScanContext::new(&hidden, &[]);
    let mut cache = FileSystemCache::new();

    let id = scan(&mut cache, &ctx, &missing, false).expect("soft failure");
    let node = cache.node(id).expect("detached node");
    assert!(node.is_dir());
    assert!(node.children().is_empty());
    assert!(!cache.contains_path(&missing));
}

#[test]
fn repeated_scans_of_missing_root_do_not_grow_the_arena() {
    let temp = TempDir::new().expect("tempdir");
    let missing = temp.path().join("nope");
    let hidden = HiddenPolicy::default();
    let ctx = ScanContext::new(&hidden, &[]);
    let mut cache = FileSystemCache::new();

    let first = scan(&mut cache, &ctx, &missing, false).expect("soft failure");
    let second = scan(&mut cache, &ctx, &missing, false).expect("soft failure");
    assert_eq!(first, second);
    assert_eq!(cache.nodes().len(), 1);

    // Once the root shows up the placeholder is freed.
    fs::create_dir(&missing).expect("mkdir");
    let root = scan(&mut cache, &ctx, &missing, false).expect("scan");
    assert_eq!(cache.nodes().len(), 1);
    assert_eq!(cache.id_for_path(&missing), Some(root));
}

#[test]
fn rescan_replaces_subtree_in_place() {
    let temp = fixture();
    let root = temp.path();
    let hidden = HiddenPolicy::default();
    let ctx = ScanContext::new(&hidden, &[]);
    let mut cache = FileSystemCache::new();
    let root_id = scan(&mut cache, &ctx, root, false).expect("scan");

    File::create(root.join("aaa/new.txt")).expect("new");
    let aaa = scan(&mut cache, &ctx, &root.join("aaa"), false).expect("rescan");

    assert_eq!(cache.node(aaa).expect("aaa").parent(), Some(root_id));
    assert_eq!(child_names(&cache, aaa), vec!["inner.txt", "new.txt"]);
    assert_eq!(
        child_names(&cache, root_id),
        vec![".hidden", "aaa", "bbb", "c.txt"]
    );
    assert!(cache.lookup(&root.join("aaa/new.txt")).is_ok());
}

#[test]
fn cancelled_walk_yields_nothing() {
    let temp = fixture();
    let hidden = HiddenPolicy::default();
    let cancel = AtomicBool::new(true);
    let ctx = ScanContext::new(&hidden, &[]).with_cancel(&cancel);

    assert!(walk_tree(temp.path(), &ctx).is_none());

    let mut cache = FileSystemCache::new();
    let root_id = scan(&mut cache, &ctx, temp.path(), true).expect("scan");
    assert!(cache.node(root_id).expect("root").children().is_empty());
}
