//! Tree builder: turns a directory on disk into cached nodes.
//!
//! Two strategies share one entry point:
//! - `populate` walks sequentially on the calling thread and registers
//!   each child in the cache before descending into it, so a partial tree
//!   stays visible if a later sibling fails.
//! - `walk` fans out over subdirectories with rayon and produces a
//!   detached tree, which the calling thread then merges into the cache.
//!   Worker threads never touch the cache.
//!
//! Both fail soft: unreadable entries are logged, counted and skipped.

mod populate;
mod progress;
mod walk;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::cache::FileSystemCache;
use crate::config::HiddenPolicy;
use crate::error::Result;
use crate::storage::{Node, NodeId, NodeMetadata};

pub use progress::{unix_now_secs, zero_to_none, ProgressSnapshot, ScanProgress};
pub use walk::{walk_tree, WalkNode};

/// Settings and shared state for one scan.
#[derive(Debug, Clone, Copy)]
pub struct ScanContext<'a> {
    pub hidden: &'a HiddenPolicy,
    /// Subtrees to leave out entirely.
    pub ignored: &'a [PathBuf],
    /// Cancellation flag (checked between entries).
    pub cancel: Option<&'a AtomicBool>,
    pub progress: Option<&'a ScanProgress>,
}

impl<'a> ScanContext<'a> {
    pub fn new(hidden: &'a HiddenPolicy, ignored: &'a [PathBuf]) -> Self {
        Self {
            hidden,
            ignored,
            cancel: None,
            progress: None,
        }
    }

    pub fn with_cancel(mut self, cancel: &'a AtomicBool) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_progress(mut self, progress: &'a ScanProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    fn should_ignore(&self, path: &Path) -> bool {
        self.ignored
            .iter()
            .any(|ignored| path == ignored || path.starts_with(ignored))
    }

    fn should_skip_name(&self, name: &str) -> bool {
        self.hidden.skip_on_scan && self.hidden.is_hidden(name)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    fn record_file(&self) {
        if let Some(progress) = self.progress {
            progress.record_file();
        }
    }

    fn record_dir(&self) {
        if let Some(progress) = self.progress {
            progress.record_dir();
        }
    }

    fn record_error(&self) {
        if let Some(progress) = self.progress {
            progress.record_error();
        }
    }
}

/// Scans `root` into `cache` and returns the root node.
///
/// An existing cached subtree at `root` is replaced, keeping its place
/// under its parent. Revert targets recorded for the old subtree carry
/// over to the rebuilt node at the same path. A root that cannot be read
/// yields a detached, childless directory node that is not registered in
/// the body; repeated scans of that path reuse it.
pub fn scan(
    cache: &mut FileSystemCache,
    ctx: &ScanContext<'_>,
    root: &Path,
    parallel: bool,
) -> Result<NodeId> {
    let _span = tracing::info_span!("scan", root = %root.display(), parallel).entered();

    let metadata = match std::fs::symlink_metadata(root) {
        Ok(metadata) => metadata,
        Err(error) => {
            tracing::warn!("scan root unavailable {}: {error}", root.display());
            ctx.record_error();
            return Ok(cache.detached_directory(root));
        }
    };
    cache.release_detached(root);

    let (parent, displaced) = match cache.id_for_path(root) {
        Some(previous) => {
            let parent = cache.node(previous)?.parent();
            let displaced = cache.displaced_under(previous);
            cache.discard(previous)?;
            (parent, displaced)
        }
        None => (None, Vec::new()),
    };

    let root_id = if metadata.is_dir() {
        if parallel {
            match walk_tree(root, ctx) {
                Some(tree) => walk::merge(cache, root, tree)?,
                None => {
                    tracing::debug!("parallel scan cancelled for {}", root.display());
                    register_root(cache, root, NodeMetadata::from_fs_metadata(&metadata), true)?
                }
            }
        } else {
            ctx.record_dir();
            let id = register_root(cache, root, NodeMetadata::from_fs_metadata(&metadata), true)?;
            populate::populate(cache, ctx, id)?;
            id
        }
    } else {
        ctx.record_file();
        register_root(cache, root, NodeMetadata::from_fs_metadata(&metadata), false)?
    };

    if let Some(parent) = parent {
        cache.link_child(parent, root_id)?;
    }
    cache.restore_revert_paths(displaced);

    tracing::debug!(
        "scanned {} ({} cached paths)",
        root.display(),
        cache.len()
    );
    Ok(root_id)
}

fn register_root(
    cache: &mut FileSystemCache,
    root: &Path,
    metadata: NodeMetadata,
    is_dir: bool,
) -> Result<NodeId> {
    let node = if is_dir {
        Node::directory(root.to_path_buf(), metadata)
    } else {
        Node::file(root.to_path_buf(), metadata)
    };
    let id = cache.insert_node(node);
    cache.update(id)?;
    Ok(id)
}

#[cfg(test)]
mod tests;
