//! In-memory model of a directory tree with keyword search and tidy-up
//! operations.
//!
//! This crate provides:
//! - A node arena mirroring files and directories, with a path body and
//!   a keyword index kept in step on every change
//! - Sequential and rayon-parallel tree building
//! - Move, delete, deduplicate, reorganize by type or date, prune and
//!   revert, each applying the OS change before touching memory
//! - A compressed snapshot of the cache and a periodic organize task

pub mod cache;
pub mod config;
pub mod error;
pub mod fsops;
pub mod indexer;
pub mod keywords;
pub mod manager;
pub mod mutation;
pub mod schedule;
pub mod storage;
pub mod types;

// Re-export main types
pub use cache::{FileSystemCache, KeywordIndex, SNAPSHOT_VERSION};
pub use config::{load_or_create_config, HiddenPolicy, TidyConfig};
pub use error::{Result, TidyError};
pub use indexer::{ProgressSnapshot, ScanContext, ScanProgress};
pub use manager::FileSystemIndex;
pub use schedule::OrganizeScheduler;
pub use storage::{Node, NodeId, NodeMetadata};
pub use types::{Category, MediaKind, NodeKind, OperationFailure, OperationKind, OperationReport};
