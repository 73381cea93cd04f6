use prov_types::ErrorKind;
use thiserror::Error;

use crate::context::Interrupted;
use crate::wire_error::WireError;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid message type: {0}")]
    InvalidMessageType(u8),

    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("framing error: {0}")]
    FramingError(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("unexpected reply: expected {expected}, got {got}")]
    UnexpectedMessage {
        expected: &'static str,
        got: &'static str,
    },

    #[error("peer reported {0}")]
    Remote(WireError),

    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("no route to {0}")]
    UnknownPeer(String),

    /// Gave up before anything was sent.
    #[error("{0} before the call started")]
    Deadline(Interrupted),

    /// Gave up while a request was in flight; the peer may have acted on it.
    #[error("{0} while a call was in flight")]
    Interrupted(Interrupted),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidMessageType(_)
            | Self::FramingError(_)
            | Self::Deserialization(_)
            | Self::UnexpectedMessage { .. } => ErrorKind::UnhandledPeerError,
            Self::Remote(wire) => wire.kind().unwrap_or(ErrorKind::UnhandledPeerError),
            Self::MessageTooLarge { .. } | Self::Serialization(_) => ErrorKind::InvalidArgument,
            Self::Deadline(_) => ErrorKind::TimedOut,
            Self::Interrupted(_) => ErrorKind::OutcomeUnknown,
            Self::ConnectionClosed | Self::UnknownPeer(_) | Self::Io(_) => {
                ErrorKind::PeerGeneralError
            }
        }
    }
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
