//! Structural mutations over the tree and the cache.
//!
//! Every operation here follows the same ordering rule: the OS call runs
//! first and in-memory state changes only when it succeeds. Batch
//! operations are sequences of independent single-node calls; a failing
//! item is recorded in the returned `OperationReport` and the batch goes
//! on. Nothing is rolled back.

mod dedup;
mod ops;
mod prune;
mod reorganize;
mod revert;


use crate::cache::FileSystemCache;
use crate::error::{Result, TidyError};
use crate::storage::NodeId;

pub use dedup::deduplicate;
pub use ops::{delete, ensure_directory, move_node};
pub use prune::delete_empty_directories;
pub use reorganize::{organize, reorganize_by_date, reorganize_by_type};
pub use revert::revert;

/// Changes the permission bits of a node's entry on disk.
pub fn change_permissions(cache: &mut FileSystemCache, id: NodeId, mode: u32) -> Result<()> {
    let path = cache.node(id)?.path().to_path_buf();
    crate::fsops::set_mode(&path, mode).map_err(|error| TidyError::os(&path, error))?;
    cache.refresh_metadata(id);
    Ok(())
}
