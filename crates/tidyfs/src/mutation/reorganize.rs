//! Reorganize by type, by date, and the combined organize pipeline.

use chrono::{Datelike, Local, TimeZone};

use crate::cache::FileSystemCache;
use crate::config::TidyConfig;
use crate::error::{Result, TidyError};
use crate::storage::{Node, NodeId};
use crate::types::{Category, OperationKind, OperationReport};

use super::ops::{ensure_directory, move_node};

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Moves every direct file child of `dir` into a per-category folder.
///
/// Subdirectories are not descended into.
pub fn reorganize_by_type(
    cache: &mut FileSystemCache,
    dir: NodeId,
    config: &TidyConfig,
) -> Result<OperationReport> {
    let mut report = OperationReport::new(OperationKind::Move);
    let children = direct_children(cache, dir)?;

    for child in children {
        let Some(node) = cache.get(child) else {
            continue;
        };
        if !node.is_file() {
            continue;
        }
        let source = node.path().to_path_buf();
        let name = node.name().to_string();
        let folder = config.folder_for(Category::from_extension(node.extension()));

        let outcome = ensure_directory(cache, dir, folder).and_then(|target| {
            let destination = cache.node(target)?.path().join(&name);
            move_node(cache, child, &destination)
        });
        match outcome {
            Ok(()) => report.succeeded.push(source),
            Err(error) => {
                tracing::warn!("reorganize by type skipped {}: {error}", source.display());
                report.record_failure(source, error);
            }
        }
    }

    tracing::info!("reorganize by type: {report}");
    Ok(report)
}

/// Moves every direct, non-hidden file child of `dir` into `YYYY/Month`
/// folders derived from its creation time in local time.
pub fn reorganize_by_date(
    cache: &mut FileSystemCache,
    dir: NodeId,
    config: &TidyConfig,
) -> Result<OperationReport> {
    let mut report = OperationReport::new(OperationKind::Move);
    let children = direct_children(cache, dir)?;

    for child in children {
        let Some(node) = cache.get(child) else {
            continue;
        };
        if node.is_dir() || config.hidden.is_hidden(node.name()) {
            continue;
        }
        let source = node.path().to_path_buf();
        let name = node.name().to_string();
        let bucket = date_bucket(node);

        let outcome = bucket.and_then(|(year, month)| {
            let year_dir = ensure_directory(cache, dir, &year)?;
            let month_dir = ensure_directory(cache, year_dir, month)?;
            let destination = cache.node(month_dir)?.path().join(&name);
            move_node(cache, child, &destination)
        });
        match outcome {
            Ok(()) => report.succeeded.push(source),
            Err(error) => {
                tracing::warn!("reorganize by date skipped {}: {error}", source.display());
                report.record_failure(source, error);
            }
        }
    }

    tracing::info!("reorganize by date: {report}");
    Ok(report)
}

/// Reorganizes `dir` by type, then sorts the photos folder by date.
pub fn organize(
    cache: &mut FileSystemCache,
    dir: NodeId,
    config: &TidyConfig,
) -> Result<OperationReport> {
    let mut report = reorganize_by_type(cache, dir, config)?;
    if let Some(photos) = cache.child_named(dir, config.folder_for(Category::Photos)) {
        if cache.node(photos)?.is_dir() {
            report.absorb(reorganize_by_date(cache, photos, config)?);
        }
    }
    Ok(report)
}

/// Four-digit year and English month name for a node's creation time.
fn date_bucket(node: &Node) -> Result<(String, &'static str)> {
    let secs = node
        .created_at()
        .or_else(|| node.modified_at())
        .ok_or_else(|| {
            TidyError::InvalidInput(format!("no timestamp for {}", node.path().display()))
        })?;
    let secs = i64::try_from(secs)
        .map_err(|_| TidyError::InvalidInput(format!("timestamp out of range: {secs}")))?;
    let when = Local.timestamp_opt(secs, 0).earliest().ok_or_else(|| {
        TidyError::InvalidInput(format!("timestamp out of range: {secs}"))
    })?;
    let month = MONTH_NAMES[when.month0() as usize];
    Ok((format!("{:04}", when.year()), month))
}

fn direct_children(cache: &FileSystemCache, dir: NodeId) -> Result<Vec<NodeId>> {
    let node = cache.node(dir)?;
    if !node.is_dir() {
        return Err(TidyError::InvalidInput(format!(
            "{} is not a directory",
            node.path().display()
        )));
    }
    Ok(node.children().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::storage::NodeMetadata;

    #[test]
    fn date_bucket_uses_local_calendar() {
        // Mid-month so no timezone can shift it across a month boundary.
        let secs = Local
            .with_ymd_and_hms(2021, 3, 15, 12, 0, 0)
            .single()
            .unwrap()
            .timestamp() as u64;
        let node = Node::file(
            PathBuf::from("/x/a.jpg"),
            NodeMetadata {
                size: 0,
                ctime: secs,
                mtime_ns: secs * 1_000_000_000,
            },
        );
        assert_eq!(date_bucket(&node).unwrap(), ("2021".to_string(), "March"));
    }

    #[test]
    fn date_bucket_requires_a_timestamp() {
        let node = Node::file(PathBuf::from("/x/a.jpg"), NodeMetadata::default());
        assert!(date_bucket(&node).is_err());
    }
}
