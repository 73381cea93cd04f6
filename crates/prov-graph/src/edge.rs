//! Private edges and their hash-keyed arena.
//!
//! A private edge is identified by the commitment of the endpoint it points
//! to. Until the endpoint's `(id, secret)` pair is disclosed the edge is
//! [`PrivateEdge::Unknown`]; disclosure moves it to [`PrivateEdge::Known`].
//! The transition only ever goes one way.

use std::collections::btree_map::{self, Entry};
use std::collections::BTreeMap;

use prov_crypto::{commit, CommitmentHash};
use prov_types::NodeId;
use serde::{Deserialize, Serialize};

use crate::error::{GraphError, GraphResult};

/// A disclosed private edge.
///
/// `this` is the endpoint the edge points at, `other` the vertex holding it.
/// Both hashes are computed at construction, so a `DisclosedEdge` always
/// satisfies `this_hash == commit(this_id, this_secret)`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDisclosedEdge")]
pub struct DisclosedEdge {
    this_id: NodeId,
    this_secret: String,
    this_hash: CommitmentHash,
    other_id: NodeId,
    other_secret: String,
    other_hash: Option<CommitmentHash>,
}

impl DisclosedEdge {
    /// Disclose an edge. `other_secret` may be empty when the holding vertex
    /// is referenced publicly from the other side.
    pub fn new(
        this_id: NodeId,
        this_secret: impl Into<String>,
        other_id: NodeId,
        other_secret: impl Into<String>,
    ) -> GraphResult<Self> {
        let this_secret = this_secret.into();
        if this_secret.is_empty() {
            return Err(GraphError::EmptySecret(this_id));
        }
        let other_secret = other_secret.into();
        let this_hash = commit(this_id.as_str(), &this_secret);
        let other_hash = (!other_secret.is_empty()).then(|| commit(other_id.as_str(), &other_secret));
        Ok(Self {
            this_id,
            this_secret,
            this_hash,
            other_id,
            other_secret,
            other_hash,
        })
    }

    pub fn this_id(&self) -> &NodeId {
        &self.this_id
    }

    pub fn this_secret(&self) -> &str {
        &self.this_secret
    }

    pub fn this_hash(&self) -> &CommitmentHash {
        &self.this_hash
    }

    pub fn other_id(&self) -> &NodeId {
        &self.other_id
    }

    pub fn other_secret(&self) -> &str {
        &self.other_secret
    }

    pub fn other_hash(&self) -> Option<&CommitmentHash> {
        self.other_hash.as_ref()
    }

    /// The same edge seen from the other endpoint, if that side is private.
    pub fn reversed(&self) -> Option<Self> {
        if self.other_secret.is_empty() {
            return None;
        }
        Self::new(
            self.other_id.clone(),
            self.other_secret.clone(),
            self.this_id.clone(),
            self.this_secret.clone(),
        )
        .ok()
    }
}

impl std::fmt::Debug for DisclosedEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisclosedEdge")
            .field("this_id", &self.this_id)
            .field("this_hash", &self.this_hash)
            .field("other_id", &self.other_id)
            .field("other_hash", &self.other_hash)
            .finish_non_exhaustive()
    }
}

/// Wire form of [`DisclosedEdge`]. Hashes are recomputed, never trusted.
#[derive(Deserialize)]
struct RawDisclosedEdge {
    this_id: NodeId,
    this_secret: String,
    other_id: NodeId,
    #[serde(default)]
    other_secret: String,
}

impl TryFrom<RawDisclosedEdge> for DisclosedEdge {
    type Error = GraphError;

    fn try_from(raw: RawDisclosedEdge) -> Result<Self, Self::Error> {
        Self::new(raw.this_id, raw.this_secret, raw.other_id, raw.other_secret)
    }
}

/// A private edge: hash only, or fully disclosed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivateEdge {
    Unknown { hash: CommitmentHash },
    Known(DisclosedEdge),
}

impl PrivateEdge {
    pub fn hash(&self) -> &CommitmentHash {
        match self {
            Self::Unknown { hash } => hash,
            Self::Known(edge) => edge.this_hash(),
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    pub fn disclosed(&self) -> Option<&DisclosedEdge> {
        match self {
            Self::Known(edge) => Some(edge),
            Self::Unknown { .. } => None,
        }
    }
}

/// Private edges of one direction, keyed by disclosure hash.
///
/// Edges are never removed and never downgraded from `Known` to `Unknown`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<CommitmentHash, PrivateEdge>",
    into = "BTreeMap<CommitmentHash, PrivateEdge>"
)]
pub struct EdgeSet {
    edges: BTreeMap<CommitmentHash, PrivateEdge>,
}

impl EdgeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an edge by hash. Existing entries are left untouched.
    pub fn insert_unknown(&mut self, hash: CommitmentHash) {
        self.edges
            .entry(hash.clone())
            .or_insert(PrivateEdge::Unknown { hash });
    }

    /// Record a disclosed edge under its own commitment.
    pub fn insert_known(&mut self, edge: DisclosedEdge) {
        self.edges
            .insert(edge.this_hash().clone(), PrivateEdge::Known(edge));
    }

    /// Disclose an edge that is already present. Returns `false` when no
    /// edge with that hash exists.
    pub fn complete(&mut self, edge: &DisclosedEdge) -> bool {
        match self.edges.get_mut(edge.this_hash()) {
            Some(slot) => {
                *slot = PrivateEdge::Known(edge.clone());
                true
            }
            None => false,
        }
    }

    /// Union with `other`, keeping whatever is known on either side.
    pub fn merge(&mut self, other: &EdgeSet) {
        for (hash, edge) in &other.edges {
            match (self.edges.entry(hash.clone()), edge) {
                (Entry::Vacant(slot), _) => {
                    slot.insert(edge.clone());
                }
                (Entry::Occupied(mut slot), PrivateEdge::Known(_)) => {
                    slot.insert(edge.clone());
                }
                (Entry::Occupied(_), PrivateEdge::Unknown { .. }) => {}
            }
        }
    }

    /// The same hashes with every endpoint hidden.
    pub fn redacted(&self) -> EdgeSet {
        let edges = self
            .edges
            .keys()
            .map(|hash| (hash.clone(), PrivateEdge::Unknown { hash: hash.clone() }))
            .collect();
        Self { edges }
    }

    pub fn get(&self, hash: &CommitmentHash) -> Option<&PrivateEdge> {
        self.edges.get(hash)
    }

    pub fn contains(&self, hash: &CommitmentHash) -> bool {
        self.edges.contains_key(hash)
    }

    pub fn hashes(&self) -> impl Iterator<Item = &CommitmentHash> {
        self.edges.keys()
    }

    pub fn known(&self) -> impl Iterator<Item = &DisclosedEdge> {
        self.edges.values().filter_map(PrivateEdge::disclosed)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, CommitmentHash, PrivateEdge> {
        self.edges.iter()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

impl TryFrom<BTreeMap<CommitmentHash, PrivateEdge>> for EdgeSet {
    type Error = GraphError;

    fn try_from(edges: BTreeMap<CommitmentHash, PrivateEdge>) -> Result<Self, Self::Error> {
        for (key, edge) in &edges {
            if edge.hash() != key {
                return Err(GraphError::EdgeKeyMismatch {
                    key: key.clone(),
                    actual: edge.hash().clone(),
                });
            }
        }
        Ok(Self { edges })
    }
}

impl From<EdgeSet> for BTreeMap<CommitmentHash, PrivateEdge> {
    fn from(set: EdgeSet) -> Self {
        set.edges
    }
}
