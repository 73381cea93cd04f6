use std::collections::btree_map;
use std::collections::BTreeMap;

use prov_crypto::CommitmentHash;
use serde::{Deserialize, Serialize};

use crate::edge::DisclosedEdge;

/// Disclosed edges keyed by the commitment of their `this` endpoint.
///
/// Keys are always derived from the edge itself, so a lookup hit is a proof
/// that the caller knows the `(id, secret)` behind the hash.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<DisclosedEdge>", into = "Vec<DisclosedEdge>")]
pub struct DisclosureMap {
    entries: BTreeMap<CommitmentHash, DisclosedEdge>,
}

impl DisclosureMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, edge: DisclosedEdge) {
        self.entries.insert(edge.this_hash().clone(), edge);
    }

    pub fn get(&self, hash: &CommitmentHash) -> Option<&DisclosedEdge> {
        self.entries.get(hash)
    }

    pub fn contains(&self, hash: &CommitmentHash) -> bool {
        self.entries.contains_key(hash)
    }

    pub fn values(&self) -> btree_map::Values<'_, CommitmentHash, DisclosedEdge> {
        self.entries.values()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, CommitmentHash, DisclosedEdge> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// This map plus every entry seen from its other endpoint, so an edge
    /// can be found from either end. Direct entries win over reversed ones.
    pub fn with_reverse_index(&self) -> DisclosureMap {
        let mut indexed = self.clone();
        for reversed in self.entries.values().filter_map(DisclosedEdge::reversed) {
            indexed
                .entries
                .entry(reversed.this_hash().clone())
                .or_insert(reversed);
        }
        indexed
    }
}

impl FromIterator<DisclosedEdge> for DisclosureMap {
    fn from_iter<I: IntoIterator<Item = DisclosedEdge>>(iter: I) -> Self {
        let mut map = Self::new();
        for edge in iter {
            map.insert(edge);
        }
        map
    }
}

impl Extend<DisclosedEdge> for DisclosureMap {
    fn extend<I: IntoIterator<Item = DisclosedEdge>>(&mut self, iter: I) {
        for edge in iter {
            self.insert(edge);
        }
    }
}

impl From<Vec<DisclosedEdge>> for DisclosureMap {
    fn from(edges: Vec<DisclosedEdge>) -> Self {
        edges.into_iter().collect()
    }
}

impl From<DisclosureMap> for Vec<DisclosedEdge> {
    fn from(map: DisclosureMap) -> Self {
        map.entries.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use prov_types::NodeId;

    use super::*;

    fn id(s: &str) -> NodeId {
        NodeId::new(s).unwrap()
    }

    #[test]
    fn reverse_index_adds_other_side() {
        let edge = DisclosedEdge::new(id("prov:a"), "as", id("prov:b"), "bs").unwrap();
        let map: DisclosureMap = vec![edge.clone()].into();
        assert_eq!(map.len(), 1);

        let indexed = map.with_reverse_index();
        assert_eq!(indexed.len(), 2);
        let back = indexed.get(edge.other_hash().unwrap()).unwrap();
        assert_eq!(back.this_id(), &id("prov:b"));
        assert_eq!(back.other_id(), &id("prov:a"));
    }

    #[test]
    fn public_other_side_is_not_reversed() {
        let edge = DisclosedEdge::new(id("prov:a"), "as", id("prov:b"), "").unwrap();
        let map: DisclosureMap = vec![edge].into();
        assert_eq!(map.with_reverse_index().len(), 1);
    }

    #[test]
    fn serializes_as_edge_list() {
        let edge = DisclosedEdge::new(id("prov:a"), "as", id("prov:b"), "bs").unwrap();
        let map: DisclosureMap = vec![edge].into();
        let json = serde_json::to_string(&map).unwrap();
        let back: DisclosureMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }
}
