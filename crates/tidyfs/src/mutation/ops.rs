//! Single-node mutations: move, delete, ensure-directory.
//!
//! Each function performs its OS side effect first. In-memory state is
//! touched only after the OS call succeeds, so a failure leaves the tree
//! and the cache exactly as they were.

use std::path::{Path, PathBuf};

use crate::cache::FileSystemCache;
use crate::error::{Result, TidyError};
use crate::fsops;
use crate::storage::{Node, NodeId, NodeMetadata};

/// Moves a node (and its subtree) to `new_path`.
///
/// The destination's parent must be a cached directory and the
/// destination itself must be free on disk and in the cache. The node's
/// `revert_path` is left unchanged.
pub fn move_node(cache: &mut FileSystemCache, id: NodeId, new_path: &Path) -> Result<()> {
    let old_path = cache.node(id)?.path().to_path_buf();
    if old_path == new_path {
        return Ok(());
    }
    if new_path.starts_with(&old_path) {
        return Err(TidyError::InvalidInput(format!(
            "cannot move {} into itself ({})",
            old_path.display(),
            new_path.display()
        )));
    }
    if cache.contains_path(new_path) || fsops::exists(new_path) {
        return Err(TidyError::AlreadyExists(new_path.to_path_buf()));
    }
    let new_parent = resolve_parent_directory(cache, new_path)?;

    fsops::rename_or_copy(&old_path, new_path).map_err(|error| TidyError::os(&old_path, error))?;

    let old_parent = cache.unlink_child(id)?;
    cache.relocate(id, new_path)?;
    cache.link_child(new_parent, id)?;

    for member in cache.subtree(id) {
        cache.refresh_metadata(member);
    }
    if let Some(old_parent) = old_parent {
        cache.refresh_metadata(old_parent);
    }
    cache.refresh_metadata(new_parent);

    tracing::debug!("moved {} -> {}", old_path.display(), new_path.display());
    Ok(())
}

/// Removes a node from disk (recursively for directories), then from the
/// tree and the cache.
pub fn delete(cache: &mut FileSystemCache, id: NodeId) -> Result<PathBuf> {
    let node = cache.node(id)?;
    let path = node.path().to_path_buf();
    let parent = node.parent();

    fsops::remove_entry(&path).map_err(|error| TidyError::os(&path, error))?;

    cache.discard(id)?;
    if let Some(parent) = parent {
        cache.refresh_metadata(parent);
    }

    tracing::debug!("deleted {}", path.display());
    Ok(path)
}

/// Returns the directory child `name` of `parent`, creating it on disk and
/// registering it when absent.
pub fn ensure_directory(cache: &mut FileSystemCache, parent: NodeId, name: &str) -> Result<NodeId> {
    if let Some(existing) = cache.child_named(parent, name) {
        let node = cache.node(existing)?;
        if node.is_dir() {
            return Ok(existing);
        }
        return Err(TidyError::AlreadyExists(node.path().to_path_buf()));
    }

    let path = cache.node(parent)?.path().join(name);
    match std::fs::symlink_metadata(&path) {
        Ok(metadata) if metadata.is_dir() => {
            // On disk but never scanned; adopt it.
        }
        Ok(_) => return Err(TidyError::AlreadyExists(path)),
        Err(_) => {
            fsops::create_dir(&path).map_err(|error| TidyError::os(&path, error))?;
            tracing::debug!("created directory {}", path.display());
        }
    }

    let metadata = NodeMetadata::read(&path).map_err(|error| TidyError::os(&path, error))?;
    let id = cache.insert_node(Node::directory(path, metadata));
    cache.link_child(parent, id)?;
    cache.update(id)?;
    cache.refresh_metadata(parent);
    Ok(id)
}

/// Resolves the cached directory that will contain `path`.
fn resolve_parent_directory(cache: &FileSystemCache, path: &Path) -> Result<NodeId> {
    let parent_path = path
        .parent()
        .ok_or_else(|| TidyError::InvalidInput(format!("{} has no parent", path.display())))?;
    let parent = cache
        .id_for_path(parent_path)
        .ok_or_else(|| TidyError::NotFound(parent_path.to_path_buf()))?;
    if !cache.node(parent)?.is_dir() {
        return Err(TidyError::InvalidInput(format!(
            "{} is not a directory",
            parent_path.display()
        )));
    }
    Ok(parent)
}
