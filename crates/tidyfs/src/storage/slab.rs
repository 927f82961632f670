//! Arena that owns every node of every scanned tree.
//!
//! Slots are addressed by `NodeId`. Freed slots go on a freelist and are
//! reused, but a live node's id never changes, which is what lets the
//! body map and keyword index refer to nodes by id. Serialization writes
//! only occupied slots keyed by index and rebuilds the holes on load.

use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ops::{Index, IndexMut};

use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, Serializer};

use super::entry::Entry;
use super::index_types::NodeId;

pub struct NodeSlab<T> {
    entries: Vec<Entry<T>>,
    /// Occupied slot count.
    len: usize,
    /// Head of the freelist; equals `entries.len()` when there is no hole.
    next: usize,
}

impl<T> Default for NodeSlab<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> NodeSlab<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            len: 0,
            next: 0,
        }
    }

    /// Inserts a value, returning its stable id.
    pub fn insert(&mut self, value: T) -> NodeId {
        let key = self.next;
        if key == self.entries.len() {
            self.entries.push(Entry::Occupied(value));
            self.next = self.entries.len();
        } else {
            let next_free = match self.entries[key] {
                Entry::Vacant(next) => next,
                Entry::Occupied(_) => unreachable!("freelist head points at an occupied slot"),
            };
            self.entries[key] = Entry::Occupied(value);
            self.next = next_free;
        }
        self.len += 1;
        NodeId::new(key)
    }

    pub fn get(&self, id: NodeId) -> Option<&T> {
        match self.entries.get(id.get())? {
            Entry::Occupied(value) => Some(value),
            Entry::Vacant(_) => None,
        }
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        match self.entries.get_mut(id.get())? {
            Entry::Occupied(value) => Some(value),
            Entry::Vacant(_) => None,
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Frees the slot at `id`, returning its value if it was occupied.
    pub fn try_remove(&mut self, id: NodeId) -> Option<T> {
        let index = id.get();
        let entry = self.entries.get_mut(index)?;
        if matches!(entry, Entry::Vacant(_)) {
            return None;
        }
        match mem::replace(entry, Entry::Vacant(self.next)) {
            Entry::Occupied(value) => {
                self.len -= 1;
                self.next = index;
                Some(value)
            }
            Entry::Vacant(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> NodeSlabIter<'_, T> {
        NodeSlabIter {
            entries: &self.entries,
            index: 0,
        }
    }
}

impl<T> Index<NodeId> for NodeSlab<T> {
    type Output = T;

    fn index(&self, id: NodeId) -> &Self::Output {
        self.get(id).expect("invalid node id")
    }
}

impl<T> IndexMut<NodeId> for NodeSlab<T> {
    fn index_mut(&mut self, id: NodeId) -> &mut Self::Output {
        self.get_mut(id).expect("invalid node id")
    }
}

impl<T> fmt::Debug for NodeSlab<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeSlab")
            .field("len", &self.len)
            .field("next", &self.next)
            .field("slots", &self.entries.len())
            .finish()
    }
}

/// Iterator over occupied slots.
pub struct NodeSlabIter<'a, T> {
    entries: &'a [Entry<T>],
    index: usize,
}

impl<'a, T> Iterator for NodeSlabIter<'a, T> {
    type Item = (NodeId, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        while self.index < self.entries.len() {
            let idx = self.index;
            self.index += 1;
            if let Entry::Occupied(value) = &self.entries[idx] {
                return Some((NodeId::new(idx), value));
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

impl<T: Serialize> Serialize for NodeSlab<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.len))?;
        for (id, value) in self.iter() {
            map.serialize_entry(&id, value)?;
        }
        map.end()
    }
}

struct NodeSlabVisitor<T>(PhantomData<T>);

impl<'de, T: Deserialize<'de>> Visitor<'de> for NodeSlabVisitor<T> {
    type Value = NodeSlab<T>;

    fn expecting(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "a map of node id to node")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut slab = NodeSlab::new();
        while let Some((id, value)) = map.next_entry::<NodeId, T>()? {
            let index = id.get();
            while slab.entries.len() <= index {
                slab.entries.push(Entry::Vacant(0));
            }
            if matches!(slab.entries[index], Entry::Vacant(_)) {
                slab.len += 1;
            }
            slab.entries[index] = Entry::Occupied(value);
        }

        // Rebuild the freelist back to front so the lowest hole is reused first.
        let mut next = slab.entries.len();
        for idx in (0..slab.entries.len()).rev() {
            if let Entry::Vacant(slot) = &mut slab.entries[idx] {
                *slot = next;
                next = idx;
            }
        }
        slab.next = next;

        Ok(slab)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for NodeSlab<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(NodeSlabVisitor(PhantomData))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freed_slot_is_reused() {
        let mut slab = NodeSlab::new();
        let a = slab.insert(10);
        let b = slab.insert(20);
        let c = slab.insert(30);
        assert_eq!(slab.len(), 3);

        assert_eq!(slab.try_remove(b), Some(20));
        assert_eq!(slab.try_remove(b), None);
        assert_eq!(slab.len(), 2);
        assert!(slab.get(b).is_none());

        let d = slab.insert(40);
        assert_eq!(d, b);
        assert_eq!(slab[a], 10);
        assert_eq!(slab[c], 30);
        assert_eq!(slab[d], 40);
    }

    #[test]
    fn iteration_skips_holes() {
        let mut slab = NodeSlab::new();
        slab.insert("a");
        let hole = slab.insert("b");
        slab.insert("c");
        slab.try_remove(hole);

        let values: Vec<_> = slab.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec!["a", "c"]);
    }

    #[test]
    fn sparse_ids_survive_serialization() {
        let mut slab = NodeSlab::new();
        slab.insert(1u32);
        let hole = slab.insert(2u32);
        let kept = slab.insert(3u32);
        slab.try_remove(hole);

        let bytes = postcard::to_stdvec(&slab).unwrap();
        let mut restored: NodeSlab<u32> = postcard::from_bytes(&bytes).unwrap();

        assert_eq!(restored.len(), 2);
        assert!(restored.get(hole).is_none());
        assert_eq!(restored.get(kept), Some(&3));

        // The hole is back on the freelist.
        assert_eq!(restored.insert(9), hole);
    }
}
