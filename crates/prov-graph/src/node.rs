use std::collections::BTreeSet;

use prov_crypto::{commit, CommitmentHash};
use prov_types::{NodeId, NodeType, TimeMs};
use serde::{Deserialize, Serialize};

use crate::disclosure::DisclosureMap;
use crate::edge::EdgeSet;

/// A provenance vertex.
///
/// `signature` is detached: it covers every other field, with private edges
/// contributing only their hashes, so disclosing an edge later does not
/// invalidate it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub node_type: NodeType,
    /// PEM public key of the current owner.
    pub owner_public_key: String,
    pub created_time: TimeMs,
    pub updated_time: TimeMs,
    /// Set once the vertex has been transferred; a finalized vertex gains no
    /// further successors.
    pub is_finalized: bool,
    pub public_parents: BTreeSet<NodeId>,
    pub public_children: BTreeSet<NodeId>,
    pub private_parents: EdgeSet,
    pub private_children: EdgeSet,
    pub signature: String,
}

impl Node {
    pub fn new(id: NodeId, node_type: NodeType, owner_public_key: impl Into<String>, time: TimeMs) -> Self {
        Self {
            id,
            node_type,
            owner_public_key: owner_public_key.into(),
            created_time: time,
            updated_time: time,
            is_finalized: false,
            public_parents: BTreeSet::new(),
            public_children: BTreeSet::new(),
            private_parents: EdgeSet::new(),
            private_children: EdgeSet::new(),
            signature: String::new(),
        }
    }

    /// Link a successor. A non-empty secret makes the edge private and
    /// returns its commitment.
    pub fn attach_child(&mut self, child: &NodeId, secret: &str) -> Option<CommitmentHash> {
        attach(&mut self.public_children, &mut self.private_children, child, secret)
    }

    /// Link a predecessor. A non-empty secret makes the edge private and
    /// returns its commitment.
    pub fn attach_parent(&mut self, parent: &NodeId, secret: &str) -> Option<CommitmentHash> {
        attach(&mut self.public_parents, &mut self.private_parents, parent, secret)
    }

    /// Complete every private edge disclosed by `disclosures`.
    ///
    /// Returns the number of edges that became (or stayed) known.
    pub fn complete_edges(&mut self, disclosures: &DisclosureMap) -> usize {
        let mut completed = 0;
        for edge in disclosures.values() {
            if self.private_parents.complete(edge) {
                completed += 1;
            }
            if self.private_children.complete(edge) {
                completed += 1;
            }
        }
        completed
    }

    /// Hashes of all private edges, parents first.
    pub fn private_edge_hashes(&self) -> impl Iterator<Item = &CommitmentHash> {
        self.private_parents
            .hashes()
            .chain(self.private_children.hashes())
    }

    /// Absorb a newer copy of the same vertex.
    ///
    /// Scalar fields follow `incoming`. Edges are unioned and known private
    /// edges are never forgotten.
    pub fn merge_from(&mut self, incoming: &Node) {
        self.node_type = incoming.node_type;
        self.owner_public_key = incoming.owner_public_key.clone();
        self.created_time = incoming.created_time;
        self.updated_time = incoming.updated_time;
        self.is_finalized = incoming.is_finalized;
        self.signature = incoming.signature.clone();
        self.public_parents.extend(incoming.public_parents.iter().cloned());
        self.public_children.extend(incoming.public_children.iter().cloned());
        self.private_parents.merge(&incoming.private_parents);
        self.private_children.merge(&incoming.private_children);
    }

    /// A copy with every private endpoint hidden.
    pub fn redacted(&self) -> Node {
        let mut node = self.clone();
        node.private_parents = self.private_parents.redacted();
        node.private_children = self.private_children.redacted();
        node
    }
}

fn attach(
    public: &mut BTreeSet<NodeId>,
    private: &mut EdgeSet,
    target: &NodeId,
    secret: &str,
) -> Option<CommitmentHash> {
    if secret.is_empty() {
        public.insert(target.clone());
        None
    } else {
        let hash = commit(target.as_str(), secret);
        private.insert_unknown(hash.clone());
        Some(hash)
    }
}
