//! Sequential directory population.

use std::fs;

use super::ScanContext;
use crate::cache::FileSystemCache;
use crate::error::Result;
use crate::storage::{Node, NodeId, NodeMetadata};

/// Fills `dir` with its on-disk children, depth first.
///
/// Each child is registered before recursing, so everything scanned so far
/// is visible in the cache even if a later entry fails.
pub(super) fn populate(cache: &mut FileSystemCache, ctx: &ScanContext<'_>, dir: NodeId) -> Result<()> {
    let path = cache.node(dir)?.path().to_path_buf();
    let read_dir = match fs::read_dir(&path) {
        Ok(iter) => iter,
        Err(error) => {
            tracing::warn!("failed to list {}: {error}", path.display());
            ctx.record_error();
            return Ok(());
        }
    };

    let mut entries: Vec<_> = read_dir.filter_map(|entry| entry.ok()).collect();
    entries.sort_unstable_by_key(|entry| entry.file_name());

    for entry in entries {
        if ctx.is_cancelled() {
            return Ok(());
        }

        let child_path = entry.path();
        if ctx.should_ignore(&child_path) {
            continue;
        }
        let name = entry.file_name();
        if ctx.should_skip_name(&name.to_string_lossy()) {
            continue;
        }

        let Ok(file_type) = entry.file_type() else {
            ctx.record_error();
            continue;
        };
        let metadata = match NodeMetadata::read(&child_path) {
            Ok(metadata) => metadata,
            Err(error) => {
                tracing::debug!("failed to stat {}: {error}", child_path.display());
                ctx.record_error();
                continue;
            }
        };

        let is_dir = file_type.is_dir();
        let node = if is_dir {
            ctx.record_dir();
            Node::directory(child_path, metadata)
        } else {
            ctx.record_file();
            Node::file(child_path, metadata)
        };

        let child = cache.insert_node(node);
        cache.link_child(dir, child)?;
        cache.update(child)?;

        if is_dir {
            populate(cache, ctx, child)?;
        }
    }
    Ok(())
}
