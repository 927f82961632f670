//! Node types stored in the arena.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thin_vec::ThinVec;

use super::index_types::NodeId;
use crate::types::{MediaKind, NodeKind};

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Stat snapshot taken when a node was scanned or last refreshed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMetadata {
    /// Byte length as reported by the OS at stat time.
    pub size: u64,
    /// Creation time in seconds since the epoch. 0 means not available.
    pub ctime: u64,
    /// Modification time in nanoseconds since the epoch. 0 means not available.
    pub mtime_ns: u64,
}

impl NodeMetadata {
    pub fn from_fs_metadata(metadata: &fs::Metadata) -> Self {
        let mtime_ns = metadata.modified().ok().map(nanos_since_epoch).unwrap_or(0);

        // Birth time is missing on some filesystems; mtime is the closest stand-in.
        let ctime = metadata
            .created()
            .or_else(|_| metadata.modified())
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);

        Self {
            size: metadata.len(),
            ctime,
            mtime_ns,
        }
    }

    /// Stats `path` without following symlinks.
    pub fn read(path: &Path) -> std::io::Result<Self> {
        fs::symlink_metadata(path).map(|m| Self::from_fs_metadata(&m))
    }
}

pub(crate) fn nanos_since_epoch(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos().min(u64::MAX as u128) as u64)
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// One filesystem entry.
///
/// Directories own their children through the `children` id list; the
/// `parent` link is a non-owning back reference into the same arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    path: PathBuf,
    revert_path: PathBuf,
    name: Box<str>,
    kind: NodeKind,
    parent: Option<NodeId>,
    /// Child ids, kept sorted by child name.
    pub(crate) children: ThinVec<NodeId>,
    pub metadata: NodeMetadata,
    /// Seconds since the epoch when the cache last recorded this node.
    cache_timestamp: u64,
    media: Option<MediaKind>,
    /// Tokens this node is currently filed under in the keyword index.
    pub(crate) keywords: ThinVec<Box<str>>,
}

impl Node {
    pub fn new(path: PathBuf, kind: NodeKind, metadata: NodeMetadata) -> Self {
        let name = display_name(&path);
        Self {
            revert_path: path.clone(),
            path,
            name,
            kind,
            parent: None,
            children: ThinVec::new(),
            metadata,
            cache_timestamp: 0,
            media: None,
            keywords: ThinVec::new(),
        }
    }

    pub fn file(path: PathBuf, metadata: NodeMetadata) -> Self {
        Self::new(path, NodeKind::File, metadata)
    }

    pub fn directory(path: PathBuf, metadata: NodeMetadata) -> Self {
        Self::new(path, NodeKind::Directory, metadata)
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where `revert` sends this node.
    #[inline]
    pub fn revert_path(&self) -> &Path {
        &self.revert_path
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    #[inline]
    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[inline]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    #[inline]
    pub fn cache_timestamp(&self) -> u64 {
        self.cache_timestamp
    }

    #[inline]
    pub fn media(&self) -> Option<MediaKind> {
        self.media
    }

    /// True when the node sits somewhere other than where the session began.
    #[inline]
    pub fn is_displaced(&self) -> bool {
        self.path != self.revert_path
    }

    /// Extension without the leading dot, if the name has one.
    ///
    /// Dotfiles such as `.bashrc` and names ending in a dot have none.
    pub fn extension(&self) -> Option<&str> {
        if !self.is_file() {
            return None;
        }
        name_extension(self.name())
    }

    /// Modification time in seconds, if recorded.
    pub fn modified_at(&self) -> Option<u64> {
        match self.metadata.mtime_ns {
            0 => None,
            ns => Some(ns / 1_000_000_000),
        }
    }

    /// Creation time in seconds, if recorded.
    pub fn created_at(&self) -> Option<u64> {
        match self.metadata.ctime {
            0 => None,
            secs => Some(secs),
        }
    }

    pub(crate) fn set_path(&mut self, path: PathBuf) {
        self.name = display_name(&path);
        self.path = path;
    }

    pub(crate) fn set_parent(&mut self, parent: Option<NodeId>) {
        self.parent = parent;
    }

    pub(crate) fn stamp(&mut self, now: u64) {
        self.cache_timestamp = now;
    }

    pub(crate) fn set_media(&mut self, media: Option<MediaKind>) {
        self.media = media;
    }

    /// Marks the current location as the one `revert` restores.
    pub(crate) fn rebase_revert_path(&mut self) {
        self.revert_path = self.path.clone();
    }

    /// Sets the location `revert` restores, e.g. after a rescan rebuilt the node.
    pub(crate) fn set_revert_path(&mut self, revert_path: PathBuf) {
        self.revert_path = revert_path;
    }

    pub(crate) fn remove_child(&mut self, child: NodeId) -> bool {
        if let Some(pos) = self.children.iter().position(|&c| c == child) {
            self.children.remove(pos);
            true
        } else {
            false
        }
    }
}

/// Extension of a bare file name, without the dot.
pub(crate) fn name_extension(name: &str) -> Option<&str> {
    let dot_pos = name.rfind('.')?;
    if dot_pos + 1 >= name.len() || name[..dot_pos].chars().all(|c| c == '.') {
        return None;
    }
    Some(&name[dot_pos + 1..])
}

/// Basename used for display and keyword extraction.
///
/// Filesystem roots have no basename and keep their full path.
fn display_name(path: &Path) -> Box<str> {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned().into_boxed_str())
        .unwrap_or_else(|| path.to_string_lossy().into_owned().into_boxed_str())
}
