//! Snapshot persistence - cache read/write operations.
//!
//! The arena, body and keyword index are written as one postcard record
//! inside a zstd stream. Arena ids are stored sparsely so every id held by
//! the body and the index is still valid after a reload.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread::available_parallelism;

use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};

use super::{FileSystemCache, KeywordIndex};
use crate::error::{Result, TidyError};
use crate::indexer::unix_now_secs;
use crate::storage::{Node, NodeId, NodeSlab};

/// Snapshot format version - increment when changing the format.
pub const SNAPSHOT_VERSION: u32 = 1;

/// On-disk form of a `FileSystemCache`.
#[derive(Deserialize)]
pub struct PersistentSnapshot {
    pub version: u32,
    /// Seconds since the epoch when the snapshot was written.
    pub saved_at: u64,
    pub nodes: NodeSlab<Node>,
    pub body: FnvHashMap<PathBuf, NodeId>,
    pub keyword_index: KeywordIndex,
    pub session_started_at: u64,
}

/// Borrowed twin of `PersistentSnapshot`; field order must match.
#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    saved_at: u64,
    nodes: &'a NodeSlab<Node>,
    body: &'a FnvHashMap<PathBuf, NodeId>,
    keyword_index: &'a KeywordIndex,
    session_started_at: u64,
}

// ---------------------------------------------------------------------------
// Write operations
// ---------------------------------------------------------------------------

/// Writes the cache to `path`.
///
/// - Postcard encoding
/// - Zstd compression (level 6, multi-threaded)
/// - Atomic write (temp file in the same directory, then rename)
pub fn write_snapshot(path: &Path, cache: &FileSystemCache) -> Result<()> {
    let snapshot = SnapshotRef {
        version: SNAPSHOT_VERSION,
        saved_at: unix_now_secs(),
        nodes: cache.nodes(),
        body: cache.body(),
        keyword_index: cache.keyword_index(),
        session_started_at: cache.session_started_at(),
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|error| {
        TidyError::Internal(format!(
            "failed to create snapshot directory {}: {error}",
            parent.display()
        ))
    })?;

    let temp = tempfile::NamedTempFile::new_in(parent).map_err(|error| {
        TidyError::Internal(format!(
            "failed to create snapshot temp file in {}: {error}",
            parent.display()
        ))
    })?;

    {
        let mut encoder = zstd::Encoder::new(temp.as_file(), 6).map_err(|error| {
            TidyError::Internal(format!("failed to create zstd encoder: {error}"))
        })?;

        let threads = available_parallelism().map(|x| x.get() as u32).unwrap_or(4);
        encoder.multithread(threads).map_err(|error| {
            TidyError::Internal(format!("failed to enable multi-threaded zstd: {error}"))
        })?;

        let mut output = BufWriter::new(encoder);
        postcard::to_io(&snapshot, &mut output).map_err(|error| {
            TidyError::Serialization(format!("failed to encode snapshot with postcard: {error}"))
        })?;

        let encoder = output.into_inner().map_err(|error| {
            TidyError::Internal(format!("failed to flush snapshot buffer: {}", error.error()))
        })?;
        let mut file = encoder.finish().map_err(|error| {
            TidyError::Internal(format!("failed to finish zstd stream: {error}"))
        })?;
        file.flush()?;
    }

    temp.persist(path).map_err(|error| {
        TidyError::Internal(format!(
            "failed to finalize snapshot file {}: {}",
            path.display(),
            error.error
        ))
    })?;

    tracing::debug!(
        "wrote snapshot to {} ({} nodes, {} paths, {} tokens)",
        path.display(),
        cache.nodes().len(),
        cache.len(),
        cache.keyword_index().len()
    );

    Ok(())
}

// ---------------------------------------------------------------------------
// Read operations
// ---------------------------------------------------------------------------

/// Loads a cache from `path`.
///
/// Any failure (missing file, corrupt stream, version mismatch, dangling
/// ids) is logged and yields `None` so the caller can rescan.
pub fn load_snapshot(path: &Path) -> Option<FileSystemCache> {
    let input = match File::open(path) {
        Ok(file) => file,
        Err(error) if error.kind() == ErrorKind::NotFound => return None,
        Err(error) => {
            tracing::warn!("snapshot read failed for {}: {}", path.display(), error);
            return None;
        }
    };

    let decoder = match zstd::Decoder::new(input) {
        Ok(d) => d,
        Err(error) => {
            tracing::warn!("snapshot decompress failed for {}: {}", path.display(), error);
            return None;
        }
    };

    let mut input = BufReader::new(decoder);
    let mut scratch = vec![0u8; 16 * 1024];

    let snapshot: PersistentSnapshot = {
        let _span = tracing::info_span!("snapshot_decode", path = %path.display()).entered();
        match postcard::from_io((&mut input, scratch.as_mut_slice())) {
            Ok((s, _)) => s,
            Err(error) => {
                tracing::warn!("snapshot decode failed for {}: {}", path.display(), error);
                return None;
            }
        }
    };

    if snapshot.version != SNAPSHOT_VERSION {
        tracing::debug!(
            "snapshot version mismatch: {} != {}",
            snapshot.version,
            SNAPSHOT_VERSION
        );
        return None;
    }

    if let Some(dangling) = first_dangling_id(&snapshot) {
        tracing::warn!(
            "snapshot {} references missing node {:?}",
            path.display(),
            dangling
        );
        return None;
    }

    tracing::debug!(
        "loaded snapshot from {} ({} nodes, saved_at={})",
        path.display(),
        snapshot.nodes.len(),
        snapshot.saved_at
    );

    Some(FileSystemCache::from_parts(
        snapshot.nodes,
        snapshot.body,
        snapshot.keyword_index,
        snapshot.session_started_at,
    ))
}

/// Any id in the body, index, or tree links that the arena does not hold.
fn first_dangling_id(snapshot: &PersistentSnapshot) -> Option<NodeId> {
    let nodes = &snapshot.nodes;
    let from_body = snapshot.body.values().copied();
    let from_index = snapshot
        .keyword_index
        .tokens()
        .filter_map(|token| snapshot.keyword_index.get(token))
        .flat_map(|ids| ids.iter().copied());
    let from_links = nodes
        .iter()
        .flat_map(|(_, node)| node.children().iter().copied().chain(node.parent()));

    from_body
        .chain(from_index)
        .chain(from_links)
        .find(|&id| !nodes.contains(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_mismatch_is_rejected() {
        let temp = tempfile::TempDir::new().expect("tempdir");
        let path = temp.path().join("future.bin.zst");
        let cache = FileSystemCache::new();
        let snapshot = SnapshotRef {
            version: SNAPSHOT_VERSION + 1,
            saved_at: unix_now_secs(),
            nodes: cache.nodes(),
            body: cache.body(),
            keyword_index: cache.keyword_index(),
            session_started_at: 0,
        };
        let encoded = postcard::to_stdvec(&snapshot).expect("encode");
        let compressed = zstd::encode_all(&encoded[..], 1).expect("compress");
        fs::write(&path, compressed).expect("write");

        assert!(load_snapshot(&path).is_none());

        write_snapshot(&path, &cache).expect("rewrite");
        assert!(load_snapshot(&path).is_some());
    }
}
