use crate::cache::FileSystemCache;
use crate::config::HiddenPolicy;
use crate::storage::NodeId;
use crate::types::{OperationKind, OperationReport};

use super::ops::move_node;
use super::prune::delete_empty_directories;

/// Sends every displaced node under `dir` back to its `revert_path`, then
/// prunes the folders that emptied out.
///
/// Running it again on a reverted tree moves nothing.
pub fn revert(cache: &mut FileSystemCache, dir: NodeId, hidden: &HiddenPolicy) -> OperationReport {
    let mut report = OperationReport::new(OperationKind::Move);
    revert_children(cache, dir, &mut report);

    let cleanup = delete_empty_directories(cache, dir, dir, hidden);
    report.absorb(cleanup);

    tracing::info!("revert: {report}");
    report
}

fn revert_children(cache: &mut FileSystemCache, dir: NodeId, report: &mut OperationReport) {
    // Moves below rewrite this list, so walk a copy.
    let children = match cache.get(dir) {
        Some(node) => node.children().to_vec(),
        None => return,
    };

    for child in children {
        let Some(node) = cache.get(child) else {
            continue;
        };
        let is_dir = node.is_dir();

        // A directory goes back first so its children land with it.
        if node.is_displaced() {
            let current = node.path().to_path_buf();
            let target = node.revert_path().to_path_buf();
            match move_node(cache, child, &target) {
                Ok(()) => report.succeeded.push(current),
                Err(error) => {
                    tracing::warn!(
                        "revert of {} to {} failed: {error}",
                        current.display(),
                        target.display()
                    );
                    report.record_failure(current, error);
                }
            }
        }

        if is_dir {
            revert_children(cache, child, report);
        }
    }
}
