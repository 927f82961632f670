//! Parallel filesystem walking that builds a detached tree.
//!
//! - Subdirectories are walked concurrently with rayon
//! - Children are sorted by name during the walk, not after
//! - The result owns no cache state; `merge` registers it on the
//!   calling thread in preorder

use std::fs;
use std::path::Path;

use rayon::prelude::*;

use super::ScanContext;
use crate::cache::FileSystemCache;
use crate::error::Result;
use crate::storage::{Node, NodeId, NodeMetadata};
use crate::types::NodeKind;

/// A node in the tree built during walking.
#[derive(Debug)]
pub struct WalkNode {
    /// Child nodes, sorted by name.
    pub children: Vec<WalkNode>,
    /// The file name (not the full path).
    pub name: Box<str>,
    pub kind: NodeKind,
    pub metadata: NodeMetadata,
}

impl WalkNode {
    fn leaf(name: Box<str>, metadata: NodeMetadata) -> Self {
        Self {
            children: Vec::new(),
            name,
            kind: NodeKind::File,
            metadata,
        }
    }
}

/// Walks `root` in parallel.
///
/// Returns `None` if the walk was cancelled or the root is unreadable.
pub fn walk_tree(root: &Path, ctx: &ScanContext<'_>) -> Option<WalkNode> {
    let name = root
        .file_name()
        .map(|s| s.to_string_lossy().into_owned().into_boxed_str())
        .unwrap_or_else(|| root.to_string_lossy().into_owned().into_boxed_str());
    walk(root, name, ctx)
}

fn walk(path: &Path, name: Box<str>, ctx: &ScanContext<'_>) -> Option<WalkNode> {
    if ctx.is_cancelled() {
        return None;
    }

    let metadata = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(error) => {
            tracing::debug!("failed to stat {}: {error}", path.display());
            ctx.record_error();
            return None;
        }
    };
    let node_metadata = NodeMetadata::from_fs_metadata(&metadata);

    if !metadata.file_type().is_dir() {
        ctx.record_file();
        return Some(WalkNode::leaf(name, node_metadata));
    }

    ctx.record_dir();
    let read_dir = match fs::read_dir(path) {
        Ok(iter) => iter,
        Err(error) => {
            // Can't read directory, keep it without children
            tracing::warn!("failed to list {}: {error}", path.display());
            ctx.record_error();
            return Some(WalkNode {
                children: Vec::new(),
                name,
                kind: NodeKind::Directory,
                metadata: node_metadata,
            });
        }
    };

    let entries: Vec<_> = read_dir.filter_map(|entry| entry.ok()).collect();

    let mut children: Vec<WalkNode> = entries
        .into_par_iter()
        .filter_map(|entry| {
            if ctx.is_cancelled() {
                return None;
            }

            let child_path = entry.path();
            if ctx.should_ignore(&child_path) {
                return None;
            }

            let child_name = entry
                .file_name()
                .to_string_lossy()
                .into_owned()
                .into_boxed_str();
            if ctx.should_skip_name(&child_name) {
                return None;
            }

            let Ok(file_type) = entry.file_type() else {
                ctx.record_error();
                return None;
            };

            if file_type.is_dir() {
                walk(&child_path, child_name, ctx)
            } else {
                // File or symlink - leaf node
                match entry.metadata() {
                    Ok(m) => {
                        ctx.record_file();
                        Some(WalkNode::leaf(child_name, NodeMetadata::from_fs_metadata(&m)))
                    }
                    Err(error) => {
                        tracing::debug!("failed to stat {}: {error}", child_path.display());
                        ctx.record_error();
                        None
                    }
                }
            }
        })
        .collect();

    if ctx.is_cancelled() {
        return None;
    }

    children.sort_unstable_by(|a, b| a.name.cmp(&b.name));

    Some(WalkNode {
        children,
        name,
        kind: NodeKind::Directory,
        metadata: node_metadata,
    })
}

/// Registers a walked tree rooted at `root` in the cache, parents first.
pub(super) fn merge(cache: &mut FileSystemCache, root: &Path, tree: WalkNode) -> Result<NodeId> {
    let id = cache.insert_node(Node::new(root.to_path_buf(), tree.kind, tree.metadata));
    cache.update(id)?;
    merge_children(cache, id, root, tree.children)?;
    Ok(id)
}

fn merge_children(
    cache: &mut FileSystemCache,
    parent: NodeId,
    parent_path: &Path,
    children: Vec<WalkNode>,
) -> Result<()> {
    for child in children {
        let path = parent_path.join(&*child.name);
        let id = cache.insert_node(Node::new(path.clone(), child.kind, child.metadata));
        cache.link_child(parent, id)?;
        cache.update(id)?;
        merge_children(cache, id, &path, child.children)?;
    }
    Ok(())
}
