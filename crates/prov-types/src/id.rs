use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Globally unique identifier of a provenance vertex.
///
/// Generated ids take the form `<graph_name>:<uuid>`, but any non-empty
/// string received from the ledger is accepted.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId(String);

impl NodeId {
    /// Wrap a raw id, rejecting the empty string.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        if id.is_empty() {
            return Err(TypeError::EmptyId);
        }
        Ok(Self(id))
    }

    /// Build a namespaced id `<graph>:<unique>`.
    pub fn qualified(graph: &str, unique: impl fmt::Display) -> Self {
        Self(format!("{graph}:{unique}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The graph prefix, if this id is namespaced.
    pub fn graph(&self) -> Option<&str> {
        self.0.split_once(':').map(|(graph, _)| graph)
    }
}

impl TryFrom<String> for NodeId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

impl AsRef<[u8]> for NodeId {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Correlation id issued by the responder for one transfer attempt.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AckId(String);

impl AckId {
    /// Fresh random ack id (UUID v4).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        if id.is_empty() {
            return Err(TypeError::EmptyId);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AckId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AckId> for String {
    fn from(id: AckId) -> Self {
        id.0
    }
}

impl fmt::Debug for AckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AckId({})", self.0)
    }
}

impl fmt::Display for AckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(
    /// Local user account.
    UserId
);
numeric_id!(
    /// Entry in a user's peer directory.
    PeerId
);
numeric_id!(
    /// Repository key of a transfer handshake record.
    RequestId
);

/// Cache partition owned by one local user.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Namespace(String);

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The namespace a user's cached nodes live in.
    pub fn for_user(user: UserId) -> Self {
        Self(user.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_rejects_empty() {
        assert_eq!(NodeId::new(""), Err(TypeError::EmptyId));
        assert!(NodeId::new("prov:1").is_ok());
    }

    #[test]
    fn qualified_node_id_exposes_graph() {
        let id = NodeId::qualified("prov", "abc");
        assert_eq!(id.as_str(), "prov:abc");
        assert_eq!(id.graph(), Some("prov"));
        assert_eq!(NodeId::new("bare").unwrap().graph(), None);
    }

    #[test]
    fn node_id_deserialize_validates() {
        let ok: NodeId = serde_json::from_str("\"prov:x\"").unwrap();
        assert_eq!(ok.as_str(), "prov:x");
        assert!(serde_json::from_str::<NodeId>("\"\"").is_err());
    }

    #[test]
    fn ack_ids_are_unique() {
        assert_ne!(AckId::generate(), AckId::generate());
    }

    #[test]
    fn namespace_for_user() {
        assert_eq!(Namespace::for_user(UserId(42)).as_str(), "42");
    }
}
