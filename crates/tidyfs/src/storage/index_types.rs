//! Node id types for type-safe arena indexing.

use std::fmt;

use serde::de::{Deserializer, Error as DeError};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use thin_vec::ThinVec;

/// A compact 32-bit handle into the node arena.
///
/// Ids are stable for the lifetime of a node and survive snapshot
/// round-trips, so they can be stored in the body map and keyword index.
/// `u32::MAX` is reserved and never handed out.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// Creates a node id from an arena slot.
    ///
    /// # Panics
    /// Panics if `slot >= u32::MAX`.
    #[inline]
    pub fn new(slot: usize) -> Self {
        assert!(slot < u32::MAX as usize, "node id must be less than u32::MAX");
        Self(slot as u32)
    }

    #[inline]
    pub fn get(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl Serialize for NodeId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = u32::deserialize(deserializer)?;
        if value == u32::MAX {
            return Err(D::Error::custom("NodeId cannot be u32::MAX"));
        }
        Ok(Self(value))
    }
}

/// A set of node ids kept sorted by id.
///
/// Used as the posting list of the keyword index. `ThinVec` keeps the
/// empty case at one pointer, which matters with many rare tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct SortedNodeIds {
    ids: ThinVec<NodeId>,
}

impl SortedNodeIds {
    #[inline]
    pub fn with_single(id: NodeId) -> Self {
        Self {
            ids: ThinVec::from_iter([id]),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &NodeId> {
        self.ids.iter()
    }

    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    /// Inserts in sorted position; returns false if already present.
    pub fn insert(&mut self, id: NodeId) -> bool {
        match self.ids.binary_search(&id) {
            Ok(_) => false,
            Err(pos) => {
                self.ids.insert(pos, id);
                true
            }
        }
    }

    /// Removes an id, returning true if it was present.
    pub fn remove(&mut self, id: NodeId) -> bool {
        match self.ids.binary_search(&id) {
            Ok(pos) => {
                self.ids.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    /// Keeps only ids also present in `other`.
    pub fn retain_shared(&mut self, other: &SortedNodeIds) {
        self.ids.retain(|id| other.contains(*id));
    }
}

impl FromIterator<NodeId> for SortedNodeIds {
    fn from_iter<I: IntoIterator<Item = NodeId>>(iter: I) -> Self {
        let mut ids: Vec<NodeId> = iter.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        Self {
            ids: ThinVec::from_iter(ids),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_roundtrips_slot() {
        let id = NodeId::new(100);
        assert_eq!(id.get(), 100);
    }

    #[test]
    fn node_id_rejects_sentinel_on_decode() {
        let bytes = postcard::to_stdvec(&u32::MAX).unwrap();
        assert!(postcard::from_bytes::<NodeId>(&bytes).is_err());
    }

    #[test]
    fn sorted_ids_insert_keeps_order_and_dedups() {
        let mut ids = SortedNodeIds::default();
        assert!(ids.insert(NodeId::new(5)));
        assert!(ids.insert(NodeId::new(1)));
        assert!(ids.insert(NodeId::new(3)));
        assert!(!ids.insert(NodeId::new(3)));

        let collected: Vec<_> = ids.iter().map(NodeId::get).collect();
        assert_eq!(collected, vec![1, 3, 5]);
    }

    #[test]
    fn sorted_ids_remove() {
        let mut ids: SortedNodeIds = [NodeId::new(10), NodeId::new(20)].into_iter().collect();
        assert!(ids.remove(NodeId::new(10)));
        assert!(!ids.remove(NodeId::new(10)));
        assert!(ids.remove(NodeId::new(20)));
        assert!(ids.is_empty());
    }

    #[test]
    fn retain_shared_intersects() {
        let mut left: SortedNodeIds = [1, 2, 3].into_iter().map(NodeId::new).collect();
        let right: SortedNodeIds = [2, 3, 4].into_iter().map(NodeId::new).collect();
        left.retain_shared(&right);
        let collected: Vec<_> = left.iter().map(NodeId::get).collect();
        assert_eq!(collected, vec![2, 3]);
    }

    #[test]
    fn empty_posting_list_is_one_pointer() {
        assert_eq!(std::mem::size_of::<SortedNodeIds>(), std::mem::size_of::<usize>());
    }
}
