//! Storage layer: the node arena and the types stored in it.
//!
//! - `index_types` - `NodeId` and the sorted posting list `SortedNodeIds`
//! - `entry` - arena slot enum
//! - `slab` - freelist arena with stable ids (`NodeSlab<T>`)
//! - `node` - `Node` and its stat snapshot `NodeMetadata`

mod entry;
mod index_types;
mod node;
mod slab;

pub use index_types::{NodeId, SortedNodeIds};
pub use node::{Node, NodeMetadata};
pub(crate) use node::{name_extension, nanos_since_epoch};
pub use slab::{NodeSlab, NodeSlabIter};
