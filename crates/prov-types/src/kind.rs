use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of provenance vertex.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Asset,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asset => write!(f, "asset"),
        }
    }
}

/// How an asset came into existence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreationProcess {
    Create,
    Transfer,
}

/// Lifecycle of a transfer handshake record.
///
/// `Accepted` and `Rejected` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Accepted => write!(f, "accepted"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// Which side of the handshake created a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    /// We sent the request.
    Outbound,
    /// We received the request.
    Inbound,
}

impl TransferDirection {
    pub fn is_outbound(&self) -> bool {
        matches!(self, Self::Outbound)
    }
}

/// Whether a new provenance edge carries a secret or a cleartext id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Private,
    Public,
}

impl Visibility {
    pub fn is_private(&self) -> bool {
        matches!(self, Self::Private)
    }
}

/// Protocol-level error taxonomy shared by every crate's error type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Asset or disclosed endpoint absent.
    NotFound,
    /// Malformed request, unsupported peer protocol or key type.
    InvalidArgument,
    /// Id collision. Retried by the claim loop.
    AlreadyExists,
    /// Lock or context deadline elapsed before the operation started.
    TimedOut,
    /// An in-flight call was interrupted; the counterparty may have committed.
    OutcomeUnknown,
    /// Counterparty reported an error of unknown cause.
    PeerGeneralError,
    /// Counterparty response could not be interpreted.
    UnhandledPeerError,
    /// Local failure outside the taxonomy (storage, crypto library).
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotFound => "not found",
            Self::InvalidArgument => "invalid argument",
            Self::AlreadyExists => "already exists",
            Self::TimedOut => "timed out",
            Self::OutcomeUnknown => "outcome unknown",
            Self::PeerGeneralError => "peer error",
            Self::UnhandledPeerError => "unhandled peer error",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(!RequestStatus::Pending.is_terminal());
        assert!(RequestStatus::Accepted.is_terminal());
        assert!(RequestStatus::Rejected.is_terminal());
    }

    #[test]
    fn enums_serialize_snake_case() {
        assert_eq!(serde_json::to_string(&NodeType::Asset).unwrap(), "\"asset\"");
        assert_eq!(
            serde_json::to_string(&CreationProcess::Transfer).unwrap(),
            "\"transfer\""
        );
    }
}
