//! Token → node posting lists.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::storage::{NodeId, SortedNodeIds};

/// Inverted index from keyword token to the nodes filed under it.
///
/// Posting lists are never left empty; a token disappears with its last
/// node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeywordIndex {
    postings: BTreeMap<Box<str>, SortedNodeIds>,
}

impl KeywordIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, token: &str, id: NodeId) {
        match self.postings.get_mut(token) {
            Some(ids) => {
                ids.insert(id);
            }
            None => {
                self.postings
                    .insert(token.into(), SortedNodeIds::with_single(id));
            }
        }
    }

    pub fn remove(&mut self, token: &str, id: NodeId) {
        let Some(ids) = self.postings.get_mut(token) else {
            return;
        };
        ids.remove(id);
        if ids.is_empty() {
            self.postings.remove(token);
        }
    }

    pub fn get(&self, token: &str) -> Option<&SortedNodeIds> {
        self.postings.get(token)
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.postings.keys().map(|token| &**token)
    }

    pub fn len(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    /// Nodes filed under every token. Empty when any token is unknown.
    pub fn match_all<'a, I>(&self, tokens: I) -> BTreeSet<NodeId>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut lists = Vec::new();
        for token in tokens {
            match self.postings.get(token) {
                Some(ids) => lists.push(ids),
                None => return BTreeSet::new(),
            }
        }
        // Intersect starting from the shortest list.
        lists.sort_by_key(|ids| ids.len());
        let Some((first, rest)) = lists.split_first() else {
            return BTreeSet::new();
        };
        let mut result = (*first).clone();
        for ids in rest {
            if result.is_empty() {
                break;
            }
            result.retain_shared(ids);
        }
        result.iter().copied().collect()
    }

    /// Nodes filed under at least one token.
    pub fn match_any<'a, I>(&self, tokens: I) -> BTreeSet<NodeId>
    where
        I: IntoIterator<Item = &'a str>,
    {
        tokens
            .into_iter()
            .filter_map(|token| self.postings.get(token))
            .flat_map(|ids| ids.iter().copied())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[usize]) -> BTreeSet<NodeId> {
        values.iter().copied().map(NodeId::new).collect()
    }

    fn sample() -> KeywordIndex {
        // t1 -> {X, Y}, t2 -> {Y, Z}
        let mut index = KeywordIndex::new();
        index.insert("t1", NodeId::new(1));
        index.insert("t1", NodeId::new(2));
        index.insert("t2", NodeId::new(2));
        index.insert("t2", NodeId::new(3));
        index
    }

    #[test]
    fn and_intersects() {
        assert_eq!(sample().match_all(["t1", "t2"]), ids(&[2]));
    }

    #[test]
    fn or_unions() {
        assert_eq!(sample().match_any(["t1", "t2"]), ids(&[1, 2, 3]));
    }

    #[test]
    fn unknown_token_empties_and_but_not_or() {
        let index = sample();
        assert!(index.match_all(["t1", "nope"]).is_empty());
        assert_eq!(index.match_any(["t1", "nope"]), ids(&[1, 2]));
    }

    #[test]
    fn no_tokens_match_nothing() {
        let index = sample();
        assert!(index.match_all(std::iter::empty()).is_empty());
        assert!(index.match_any(std::iter::empty()).is_empty());
    }

    #[test]
    fn removing_last_id_drops_token() {
        let mut index = sample();
        index.remove("t1", NodeId::new(1));
        index.remove("t1", NodeId::new(2));
        assert!(index.get("t1").is_none());
        assert_eq!(index.tokens().collect::<Vec<_>>(), vec!["t2"]);
    }
}
