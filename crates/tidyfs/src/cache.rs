//! The path-indexed node store and its keyword index.
//!
//! `FileSystemCache` owns every node in one arena. The body maps a node's
//! current path to its id and the keyword index maps tokens to ids. Both
//! are kept in lockstep with the arena: `update` re-files a node under the
//! tokens of its current name and `remove` withdraws it from both maps.
//!
//! The cache is not synchronized. Parallel scans build detached trees and
//! hand them to the owning thread for merging.

mod keyword_index;
mod persistence;


use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use fnv::FnvHashMap;

use crate::error::{Result, TidyError};
use crate::indexer::unix_now_secs;
use crate::keywords::{extract_keywords, tokenize};
use crate::storage::{Node, NodeId, NodeMetadata, NodeSlab};
use crate::types::MediaKind;

pub use keyword_index::KeywordIndex;
pub use persistence::{load_snapshot, write_snapshot, PersistentSnapshot, SNAPSHOT_VERSION};

#[derive(Debug, Default)]
pub struct FileSystemCache {
    nodes: NodeSlab<Node>,
    body: FnvHashMap<PathBuf, NodeId>,
    keyword_index: KeywordIndex,
    /// When the current mutation session began, in seconds.
    session_started_at: u64,
    /// Placeholders for roots that could not be scanned, by path.
    detached: FnvHashMap<PathBuf, NodeId>,
}

impl FileSystemCache {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Arena access
    // -----------------------------------------------------------------------

    /// Adds a node to the arena without registering it in the body.
    pub fn insert_node(&mut self, node: Node) -> NodeId {
        self.nodes.insert(node)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Like `get`, but a dangling id is an error.
    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(id)
            .ok_or_else(|| TidyError::Internal(format!("dangling node id {id:?}")))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| TidyError::Internal(format!("dangling node id {id:?}")))
    }

    pub fn nodes(&self) -> &NodeSlab<Node> {
        &self.nodes
    }

    pub fn keyword_index(&self) -> &KeywordIndex {
        &self.keyword_index
    }

    /// Number of paths registered in the body.
    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.body.keys().map(PathBuf::as_path)
    }

    /// Body entry for `path`, without any staleness check.
    pub fn id_for_path(&self, path: &Path) -> Option<NodeId> {
        self.body.get(path).copied()
    }

    pub fn contains_path(&self, path: &Path) -> bool {
        self.body.contains_key(path)
    }

    pub fn session_started_at(&self) -> u64 {
        self.session_started_at
    }

    // -----------------------------------------------------------------------
    // Body + keyword maintenance
    // -----------------------------------------------------------------------

    /// Registers a node under its current path and re-files its keywords.
    ///
    /// Tokens from a previous name are withdrawn. A different node that
    /// held the same path is discarded along with its subtree.
    pub fn update(&mut self, id: NodeId) -> Result<()> {
        let now = unix_now_secs();
        let node = self.node_mut(id)?;
        node.stamp(now);
        let path = node.path().to_path_buf();
        let fresh = extract_keywords(node);
        let stale: Vec<Box<str>> = node
            .keywords
            .iter()
            .filter(|token| !fresh.contains(&***token))
            .cloned()
            .collect();
        node.keywords = fresh.iter().map(|token| Box::from(token.as_str())).collect();

        for token in &stale {
            self.keyword_index.remove(token, id);
        }
        for token in &fresh {
            self.keyword_index.insert(token, id);
        }

        if let Some(previous) = self.body.insert(path, id) {
            if previous != id {
                if self.is_ancestor(previous, id) {
                    self.withdraw_keywords(previous);
                } else {
                    self.discard(previous)?;
                }
            }
        }
        Ok(())
    }

    fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = self.nodes.get(id).and_then(Node::parent);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.nodes.get(parent).and_then(Node::parent);
        }
        false
    }

    /// Drops the body entry for `path` and withdraws that node's keywords.
    ///
    /// The node itself stays in the arena so a move can re-register it.
    pub fn remove(&mut self, path: &Path) -> Option<NodeId> {
        let id = self.body.remove(path)?;
        self.withdraw_keywords(id);
        Some(id)
    }

    fn withdraw_keywords(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        let tokens = std::mem::take(&mut node.keywords);
        for token in &tokens {
            self.keyword_index.remove(token, id);
        }
    }

    /// Removes `id` and its descendants from the body, the index, and the
    /// arena, and detaches it from its parent.
    pub fn discard(&mut self, id: NodeId) -> Result<()> {
        let parent = self.node(id)?.parent();
        if let Some(parent) = parent {
            if let Some(parent) = self.nodes.get_mut(parent) {
                parent.remove_child(id);
            }
        }
        for descendant in self.subtree(id) {
            let path = self.node(descendant)?.path().to_path_buf();
            if self.body.get(&path) == Some(&descendant) {
                self.body.remove(&path);
            }
            if self.detached.get(&path) == Some(&descendant) {
                self.detached.remove(&path);
            }
            self.withdraw_keywords(descendant);
            self.nodes.try_remove(descendant);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Staleness + lookup
    // -----------------------------------------------------------------------

    /// True when `path` is not cached, is gone from disk, or its mtime
    /// differs from the recorded one.
    pub fn is_modified(&self, path: &Path) -> bool {
        let Some(node) = self.id_for_path(path).and_then(|id| self.nodes.get(id)) else {
            return true;
        };
        match NodeMetadata::read(path) {
            Ok(live) => live.mtime_ns != node.metadata.mtime_ns,
            Err(_) => true,
        }
    }

    /// Returns the cached node for `path`.
    ///
    /// `NotFound` means the path was never scanned; `Stale` means it was
    /// but the filesystem has since changed.
    pub fn lookup(&self, path: &Path) -> Result<NodeId> {
        let id = self
            .id_for_path(path)
            .ok_or_else(|| TidyError::NotFound(path.to_path_buf()))?;
        if self.is_modified(path) {
            return Err(TidyError::Stale(path.to_path_buf()));
        }
        Ok(id)
    }

    /// Re-stats a node so its recorded mtime matches the filesystem.
    ///
    /// Returns false when the path could not be read.
    pub fn refresh_metadata(&mut self, id: NodeId) -> bool {
        let Some(node) = self.nodes.get_mut(id) else {
            return false;
        };
        match NodeMetadata::read(node.path()) {
            Ok(metadata) => {
                node.metadata = metadata;
                true
            }
            Err(error) => {
                tracing::debug!("metadata refresh failed for {}: {error}", node.path().display());
                false
            }
        }
    }

    // -----------------------------------------------------------------------
    // Search
    // -----------------------------------------------------------------------

    /// Keyword search. AND when `match_any` is false, OR otherwise.
    ///
    /// A query with no tokens matches nothing.
    pub fn search(&self, query: &str, match_any: bool) -> BTreeSet<NodeId> {
        let tokens = tokenize(query);
        let tokens = tokens.iter().map(String::as_str);
        if match_any {
            self.keyword_index.match_any(tokens)
        } else {
            self.keyword_index.match_all(tokens)
        }
    }

    /// `search`, resolved to current paths in sorted order.
    pub fn search_paths(&self, query: &str, match_any: bool) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .search(query, match_any)
            .into_iter()
            .filter_map(|id| self.nodes.get(id))
            .map(|node| node.path().to_path_buf())
            .collect();
        paths.sort();
        paths
    }

    // -----------------------------------------------------------------------
    // Tree structure
    // -----------------------------------------------------------------------

    /// Links `child` under `parent`, keeping children sorted by name.
    pub fn link_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let name: Box<str> = self.node(child)?.name().into();
        let position = {
            let siblings = self.node(parent)?.children();
            if siblings.contains(&child) {
                return Ok(());
            }
            siblings.partition_point(|&sibling| {
                self.nodes
                    .get(sibling)
                    .map(|node| node.name() < &*name)
                    .unwrap_or(true)
            })
        };
        self.node_mut(parent)?.children.insert(position, child);
        self.node_mut(child)?.set_parent(Some(parent));
        Ok(())
    }

    /// Detaches `child` from its parent, if it has one.
    pub fn unlink_child(&mut self, child: NodeId) -> Result<Option<NodeId>> {
        let parent = self.node(child)?.parent();
        if let Some(parent_id) = parent {
            self.node_mut(parent_id)?.remove_child(child);
        }
        self.node_mut(child)?.set_parent(None);
        Ok(parent)
    }

    /// Direct child of `parent` with the given name.
    pub fn child_named(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        let node = self.nodes.get(parent)?;
        node.children()
            .iter()
            .copied()
            .find(|&child| self.nodes.get(child).is_some_and(|c| c.name() == name))
    }

    /// `id` and every descendant, parents before children.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            out.push(current);
            stack.extend(node.children().iter().rev().copied());
        }
        out
    }

    /// Moves `id` and its descendants to `new_path` in the cache only.
    ///
    /// Every affected body key is rewritten and keywords are re-filed.
    /// `revert_path` is left alone.
    pub fn relocate(&mut self, id: NodeId, new_path: &Path) -> Result<()> {
        let old_root = self.node(id)?.path().to_path_buf();
        let members = self.subtree(id);

        let mut moves = Vec::with_capacity(members.len());
        for &member in &members {
            let old = self.node(member)?.path().to_path_buf();
            let new = match old.strip_prefix(&old_root) {
                Ok(rest) if rest.as_os_str().is_empty() => new_path.to_path_buf(),
                Ok(rest) => new_path.join(rest),
                Err(_) => {
                    return Err(TidyError::Internal(format!(
                        "descendant {} is outside {}",
                        old.display(),
                        old_root.display()
                    )))
                }
            };
            moves.push((member, old, new));
        }

        // Clear every old key before inserting new ones so overlapping
        // old/new paths cannot evict each other.
        for (member, old, _) in &moves {
            if self.body.get(old) == Some(member) {
                self.body.remove(old);
            }
        }
        for (member, _, new) in moves {
            self.node_mut(member)?.set_path(new);
            self.update(member)?;
        }
        Ok(())
    }

    /// `(path, revert_path)` of every displaced node in the subtree at `id`.
    pub(crate) fn displaced_under(&self, id: NodeId) -> Vec<(PathBuf, PathBuf)> {
        self.subtree(id)
            .into_iter()
            .filter_map(|member| self.nodes.get(member))
            .filter(|node| node.is_displaced())
            .map(|node| (node.path().to_path_buf(), node.revert_path().to_path_buf()))
            .collect()
    }

    /// Re-applies revert targets to whichever nodes now sit at those paths.
    /// Paths no longer cached are skipped.
    pub(crate) fn restore_revert_paths(&mut self, displaced: Vec<(PathBuf, PathBuf)>) {
        for (path, revert_path) in displaced {
            let Some(id) = self.id_for_path(&path) else {
                continue;
            };
            if let Some(node) = self.nodes.get_mut(id) {
                node.set_revert_path(revert_path);
            }
        }
    }

    /// Childless placeholder for a root that could not be read.
    ///
    /// Not registered in the body. Asking again for the same path returns
    /// the same node.
    pub fn detached_directory(&mut self, path: &Path) -> NodeId {
        if let Some(&id) = self.detached.get(path) {
            if self.nodes.contains(id) {
                return id;
            }
        }
        let id = self
            .nodes
            .insert(Node::directory(path.to_path_buf(), NodeMetadata::default()));
        self.detached.insert(path.to_path_buf(), id);
        id
    }

    /// Frees the placeholder for `path`, if one exists and is still unused.
    pub(crate) fn release_detached(&mut self, path: &Path) {
        let Some(id) = self.detached.remove(path) else {
            return;
        };
        let unused = self
            .nodes
            .get(id)
            .is_some_and(|node| node.parent().is_none() && node.children().is_empty());
        if unused && self.body.get(path) != Some(&id) {
            self.nodes.try_remove(id);
        }
    }

    /// Starts a new mutation session: every node's current path becomes the
    /// location `revert` restores.
    pub fn begin_session(&mut self) {
        let ids: Vec<NodeId> = self.nodes.iter().map(|(id, _)| id).collect();
        for id in ids {
            self.nodes[id].rebase_revert_path();
        }
        self.session_started_at = unix_now_secs();
        tracing::debug!("mutation session started ({} nodes)", self.nodes.len());
    }

    // -----------------------------------------------------------------------
    // Queries over a subtree
    // -----------------------------------------------------------------------

    /// Live size: OS length for files (0 if gone), sum of children for
    /// directories.
    pub fn size(&self, id: NodeId) -> u64 {
        let Some(node) = self.nodes.get(id) else {
            return 0;
        };
        if node.is_dir() {
            node.children().iter().map(|&child| self.size(child)).sum()
        } else {
            fs::symlink_metadata(node.path())
                .map(|m| m.len())
                .unwrap_or(0)
        }
    }

    /// First node named `name` in a preorder walk from `root`.
    pub fn find_by_name(&self, root: NodeId, name: &str) -> Option<NodeId> {
        self.subtree(root)
            .into_iter()
            .find(|&id| self.nodes.get(id).is_some_and(|node| node.name() == name))
    }

    /// Files under `root` with the given extension. A leading dot is ignored.
    pub fn find_by_extension(&self, root: NodeId, extension: &str) -> Vec<NodeId> {
        let wanted = extension.trim_start_matches('.');
        self.subtree(root)
            .into_iter()
            .filter(|&id| {
                self.nodes
                    .get(id)
                    .and_then(Node::extension)
                    .is_some_and(|ext| ext == wanted)
            })
            .collect()
    }

    /// Indented listing, two spaces per level, directories suffixed with `/`.
    pub fn render_tree(&self, root: NodeId) -> String {
        let mut out = String::new();
        self.render_into(root, 0, &mut out);
        out
    }

    fn render_into(&self, id: NodeId, depth: usize, out: &mut String) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        let suffix = if node.is_dir() { "/" } else { "" };
        let _ = writeln!(out, "{:indent$}{}{suffix}", "", node.name(), indent = depth * 2);
        for &child in node.children() {
            self.render_into(child, depth + 1, out);
        }
    }

    /// Tags a node with the media kind a collaborator detected.
    pub fn set_media_kind(&mut self, id: NodeId, media: Option<MediaKind>) -> Result<()> {
        self.node_mut(id)?.set_media(media);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Snapshot plumbing
    // -----------------------------------------------------------------------

    pub(crate) fn from_parts(
        nodes: NodeSlab<Node>,
        body: FnvHashMap<PathBuf, NodeId>,
        keyword_index: KeywordIndex,
        session_started_at: u64,
    ) -> Self {
        // Unregistered parentless nodes are scan placeholders.
        let detached = nodes
            .iter()
            .filter(|(id, node)| {
                node.parent().is_none() && body.get(node.path()) != Some(id)
            })
            .map(|(id, node)| (node.path().to_path_buf(), id))
            .collect();
        Self {
            nodes,
            body,
            keyword_index,
            session_started_at,
            detached,
        }
    }

    pub(crate) fn body(&self) -> &FnvHashMap<PathBuf, NodeId> {
        &self.body
    }
}
