use std::collections::HashSet;

use crate::cache::FileSystemCache;
use crate::config::HiddenPolicy;
use crate::fsops::sha256_file;
use crate::storage::NodeId;
use crate::types::{OperationKind, OperationReport};

use super::ops::delete;
use super::prune::delete_empty_directories;

/// Deletes files under `dir` whose content matches a file seen earlier in
/// the walk, then prunes directories left empty.
///
/// The walk is depth first in child order (children are sorted by name),
/// so the first copy in that order survives. Hidden duplicates are kept.
pub fn deduplicate(cache: &mut FileSystemCache, dir: NodeId, hidden: &HiddenPolicy) -> OperationReport {
    let mut report = OperationReport::new(OperationKind::Delete);
    let mut seen = HashSet::new();
    walk(cache, dir, hidden, &mut seen, &mut report);

    let cleanup = delete_empty_directories(cache, dir, dir, hidden);
    report.absorb(cleanup);

    tracing::info!("deduplicate: {report}");
    report
}

fn walk(
    cache: &mut FileSystemCache,
    dir: NodeId,
    hidden: &HiddenPolicy,
    seen: &mut HashSet<String>,
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
            walk(cache, child, hidden, seen, report);
            continue;
        }

        let path = node.path().to_path_buf();
        let is_hidden = hidden.is_hidden(node.name());
        let digest = match sha256_file(&path) {
            Ok(digest) => digest,
            Err(error) => {
                tracing::warn!("failed to hash {}: {error}", path.display());
                report.record_failure(path, error);
                continue;
            }
        };

        if seen.contains(&digest) && !is_hidden {
            match delete(cache, child) {
                Ok(path) => report.succeeded.push(path),
                Err(error) => report.record_failure(path, error),
            }
        } else {
            seen.insert(digest);
        }
    }
}
