//! FileSystemIndex - the supported call surface.
//!
//! Collaborators hold one `FileSystemIndex` (behind a mutex when shared
//! across threads) and address entries either by path through `lookup`
//! or by the `NodeId` handles every operation returns. They never touch
//! OS paths of tracked entries themselves.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cache::{self, FileSystemCache};
use crate::config::TidyConfig;
use crate::error::{canonicalize_existing_path, Result};
use crate::indexer::{self, unix_now_secs, ProgressSnapshot, ScanContext, ScanProgress};
use crate::mutation;
use crate::storage::{Node, NodeId};
use crate::types::{MediaKind, OperationReport};

#[derive(Debug)]
pub struct FileSystemIndex {
    config: TidyConfig,
    cache: FileSystemCache,
    progress: Arc<ScanProgress>,
    cancel: Arc<AtomicBool>,
}

impl FileSystemIndex {
    /// Creates an index with an empty cache.
    pub fn new(config: TidyConfig) -> Self {
        Self {
            config,
            cache: FileSystemCache::new(),
            progress: Arc::new(ScanProgress::default()),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Creates an index seeded from the configured snapshot when one loads.
    pub fn open(config: TidyConfig) -> Self {
        let mut index = Self::new(config);
        if !index.load_snapshot() {
            tracing::debug!(
                "starting with an empty cache; no usable snapshot at {}",
                index.config.snapshot_path().display()
            );
        }
        index
    }

    pub fn config(&self) -> &TidyConfig {
        &self.config
    }

    pub fn cache(&self) -> &FileSystemCache {
        &self.cache
    }

    // ---- tree building ----

    /// Builds (or rebuilds) the tree rooted at `path` and returns its root.
    ///
    /// With `autosave_after_scan` set, exactly one snapshot is written once
    /// the whole scan has finished. A failed save is logged, not returned.
    pub fn scan(&mut self, path: &Path) -> Result<NodeId> {
        let root = canonicalize_existing_path(path.to_path_buf());
        self.cancel.store(false, Ordering::Relaxed);
        self.progress.reset_for_scan(unix_now_secs());

        let ctx = ScanContext::new(&self.config.hidden, &self.config.ignored_paths)
            .with_cancel(&self.cancel)
            .with_progress(&self.progress);
        let root_id = indexer::scan(&mut self.cache, &ctx, &root, self.config.parallel_scan)?;
        self.progress.finish(unix_now_secs());

        let registered = self.cache.id_for_path(&root) == Some(root_id);
        if registered && self.config.autosave_after_scan {
            if let Err(error) = self.save_snapshot() {
                tracing::warn!("snapshot write after scan of {} failed: {error}", root.display());
            }
        }
        Ok(root_id)
    }

    /// Returns the cached directory at `path`, scanning it when the cache
    /// misses or is stale.
    pub fn open_directory(&mut self, path: &Path) -> Result<NodeId> {
        match self.cache.lookup(path) {
            Ok(id) => Ok(id),
            Err(error) if error.needs_rescan() => self.scan(path),
            Err(error) => Err(error),
        }
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    /// Shared progress counters, readable while a scan holds the index.
    pub fn progress_handle(&self) -> Arc<ScanProgress> {
        Arc::clone(&self.progress)
    }

    /// Asks a running parallel walk to stop.
    pub fn cancel_scan(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Cancellation flag for callers on other threads.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    // ---- lookup and search ----

    pub fn lookup(&self, path: &Path) -> Result<NodeId> {
        self.cache.lookup(path)
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.cache.node(id)
    }

    pub fn search(&self, query: &str, match_any: bool) -> BTreeSet<NodeId> {
        self.cache.search(query, match_any)
    }

    pub fn search_paths(&self, query: &str, match_any: bool) -> Vec<PathBuf> {
        self.cache.search_paths(query, match_any)
    }

    pub fn size(&self, id: NodeId) -> u64 {
        self.cache.size(id)
    }

    pub fn find_by_name(&self, root: NodeId, name: &str) -> Option<NodeId> {
        self.cache.find_by_name(root, name)
    }

    pub fn find_by_extension(&self, root: NodeId, extension: &str) -> Vec<NodeId> {
        self.cache.find_by_extension(root, extension)
    }

    pub fn render_tree(&self, root: NodeId) -> String {
        self.cache.render_tree(root)
    }

    pub fn set_media_kind(&mut self, id: NodeId, media: Option<MediaKind>) -> Result<()> {
        self.cache.set_media_kind(id, media)
    }

    // ---- mutations ----

    pub fn move_node(&mut self, id: NodeId, new_path: &Path) -> Result<()> {
        mutation::move_node(&mut self.cache, id, new_path)
    }

    pub fn delete(&mut self, id: NodeId) -> Result<PathBuf> {
        mutation::delete(&mut self.cache, id)
    }

    pub fn change_permissions(&mut self, id: NodeId, mode: u32) -> Result<()> {
        mutation::change_permissions(&mut self.cache, id, mode)
    }

    pub fn deduplicate(&mut self, dir: NodeId) -> OperationReport {
        mutation::deduplicate(&mut self.cache, dir, &self.config.hidden)
    }

    pub fn reorganize_by_type(&mut self, dir: NodeId) -> Result<OperationReport> {
        mutation::reorganize_by_type(&mut self.cache, dir, &self.config)
    }

    pub fn reorganize_by_date(&mut self, dir: NodeId) -> Result<OperationReport> {
        mutation::reorganize_by_date(&mut self.cache, dir, &self.config)
    }

    /// Reorganize by type, then sort the photos folder by date.
    pub fn organize(&mut self, dir: NodeId) -> Result<OperationReport> {
        mutation::organize(&mut self.cache, dir, &self.config)
    }

    pub fn revert(&mut self, dir: NodeId) -> OperationReport {
        mutation::revert(&mut self.cache, dir, &self.config.hidden)
    }

    /// Prunes empty directories under `dir`, never removing `dir` itself.
    pub fn delete_empty_directories(&mut self, dir: NodeId) -> OperationReport {
        mutation::delete_empty_directories(&mut self.cache, dir, dir, &self.config.hidden)
    }

    /// Starts a new session: `revert` will restore the current layout.
    pub fn begin_session(&mut self) {
        self.cache.begin_session();
    }

    // ---- persistence ----

    pub fn save_snapshot(&self) -> Result<()> {
        cache::write_snapshot(&self.config.snapshot_path(), &self.cache)
    }

    /// Replaces the cache with the stored snapshot. Returns `false`, leaving
    /// the cache untouched, when the snapshot is missing or unusable.
    pub fn load_snapshot(&mut self) -> bool {
        match cache::load_snapshot(&self.config.snapshot_path()) {
            Some(loaded) => {
                self.cache = loaded;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn index_with_cache_in(dir: &Path) -> FileSystemIndex {
        let config = TidyConfig {
            cache_dir: dir.to_path_buf(),
            ..TidyConfig::default()
        };
        FileSystemIndex::new(config)
    }

    #[test]
    fn scan_autosaves_one_snapshot() {
        let data = TempDir::new().expect("tempdir");
        let state = TempDir::new().expect("tempdir");
        fs::write(data.path().join("a.txt"), "a").expect("write");

        let mut index = index_with_cache_in(state.path());
        index.scan(data.path()).expect("scan");

        assert!(index.config().snapshot_path().exists());
        let reopened = FileSystemIndex::open(index.config().clone());
        assert_eq!(reopened.cache().len(), index.cache().len());
    }

    #[test]
    fn scan_of_missing_root_writes_nothing() {
        let state = TempDir::new().expect("tempdir");
        let mut index = index_with_cache_in(state.path());

        let id = index.scan(&state.path().join("missing")).expect("soft fail");

        assert!(index.node(id).expect("detached").children().is_empty());
        assert!(!index.config().snapshot_path().exists());
        assert_eq!(index.progress().errors, 1);
    }

    #[test]
    fn open_directory_rescans_only_on_miss() {
        let data = TempDir::new().expect("tempdir");
        let state = TempDir::new().expect("tempdir");
        let root = data.path().canonicalize().expect("canonical");
        let mut index = index_with_cache_in(state.path());

        let first = index.open_directory(&root).expect("scan on miss");
        let second = index.open_directory(&root).expect("cached");
        assert_eq!(first, second);
    }

    #[test]
    fn load_snapshot_without_file_keeps_cache() {
        let data = TempDir::new().expect("tempdir");
        let state = TempDir::new().expect("tempdir");
        fs::write(data.path().join("a.txt"), "a").expect("write");
        let mut config = TidyConfig {
            cache_dir: state.path().to_path_buf(),
            ..TidyConfig::default()
        };
        config.autosave_after_scan = false;
        let mut index = FileSystemIndex::new(config);
        index.scan(data.path()).expect("scan");

        assert!(!index.load_snapshot());
        assert_eq!(index.cache().len(), 2);
    }
}
