use crate::cache::FileSystemCache;
use crate::config::HiddenPolicy;
use crate::storage::NodeId;
use crate::types::{OperationKind, OperationReport};

use super::ops::delete;

/// Post-order cleanup under `dir`.
///
/// Child directories left without children are deleted, as are hidden
/// files. `dir` itself goes too once empty, unless it is `root`.
/// Removed paths land in `pruned`.
pub fn delete_empty_directories(
    cache: &mut FileSystemCache,
    dir: NodeId,
    root: NodeId,
    hidden: &HiddenPolicy,
) -> OperationReport {
    let mut report = OperationReport::new(OperationKind::Delete);
    prune(cache, dir, root, hidden, &mut report);
    report
}

fn prune(
    cache: &mut FileSystemCache,
    dir: NodeId,
    root: NodeId,
    hidden: &HiddenPolicy,
    report: &mut OperationReport,
) {
    let Some(node) = cache.get(dir) else {
        return;
    };
    let children = node.children().to_vec();

    for child in children {
        let Some(node) = cache.get(child) else {
            continue;
        };
        if node.is_dir() {
            prune(cache, child, root, hidden, report);
            // The recursive call may already have removed it.
            let now_empty = cache
                .get(child)
                .is_some_and(|node| node.children().is_empty() && cache.contains_path(node.path()));
            if now_empty {
                remove(cache, child, report);
            }
        } else if hidden.is_hidden(node.name()) {
            remove(cache, child, report);
        }
    }

    let dir_empty = cache.get(dir).is_some_and(|node| node.children().is_empty());
    if dir_empty && dir != root {
        remove(cache, dir, report);
    }
}

fn remove(cache: &mut FileSystemCache, id: NodeId, report: &mut OperationReport) {
    let path = match cache.get(id) {
        Some(node) => node.path().to_path_buf(),
        None => return,
    };
    match delete(cache, id) {
        Ok(path) => report.pruned.push(path),
        Err(error) => {
            tracing::warn!("failed to prune {}: {error}", path.display());
            report.record_failure(path, error);
        }
    }
}
