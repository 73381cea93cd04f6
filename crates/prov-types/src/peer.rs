use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::id::{PeerId, UserId};

/// Wire protocol family a peer speaks.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolKind {
    /// Length-prefixed bincode frames over TCP.
    Framed,
    /// Anything this build does not speak.
    #[serde(other)]
    Unknown,
}

/// Protocol family and version advertised by a peer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerProtocol {
    pub kind: ProtocolKind,
    pub major: u32,
    pub minor: u32,
}

impl PeerProtocol {
    /// Major version of the framed protocol spoken by this build.
    pub const FRAMED_MAJOR: u32 = 1;

    pub fn framed() -> Self {
        Self {
            kind: ProtocolKind::Framed,
            major: Self::FRAMED_MAJOR,
            minor: 0,
        }
    }

    /// Reject anything other than framed v1.x.
    pub fn ensure_supported(&self) -> Result<(), TypeError> {
        match self.kind {
            ProtocolKind::Framed if self.major == Self::FRAMED_MAJOR => Ok(()),
            ProtocolKind::Framed => Err(TypeError::UnsupportedProtocol(format!(
                "framed v{}.{}",
                self.major, self.minor
            ))),
            ProtocolKind::Unknown => Err(TypeError::UnsupportedProtocol(format!(
                "unknown v{}.{}",
                self.major, self.minor
            ))),
        }
    }
}

/// A counterparty in a user's peer directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub id: PeerId,
    pub user_id: UserId,
    pub protocol: PeerProtocol,
    pub connection_uri: String,
    /// PEM-encoded public key the peer signs with.
    pub public_key: String,
}
