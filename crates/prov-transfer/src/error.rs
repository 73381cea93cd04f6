use prov_crypto::SignerError;
use prov_graph::GraphError;
use prov_ledger::LedgerError;
use prov_protocol::{Interrupted, ProtocolError, WireError};
use prov_store::StoreError;
use prov_types::{ErrorKind, TypeError};

use crate::bus::BusError;

/// Errors surfaced by transfer operations.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Every offered candidate id was already taken on the ledger.
    #[error("all {attempted} candidates already claimed")]
    CandidatesExhausted { attempted: usize },

    #[error("timed out: {0}")]
    TimedOut(String),

    /// An in-flight operation was abandoned; it may still have taken effect.
    #[error("outcome unknown: {0}")]
    OutcomeUnknown(String),

    /// The counterparty answered with an in-band error.
    #[error("peer error ({kind}): {message}")]
    Peer { kind: ErrorKind, message: String },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Signer(#[from] SignerError),

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl TransferError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidArgument(_) | Self::Config(_) => ErrorKind::InvalidArgument,
            Self::CandidatesExhausted { .. } => ErrorKind::AlreadyExists,
            Self::TimedOut(_) => ErrorKind::TimedOut,
            Self::OutcomeUnknown(_) => ErrorKind::OutcomeUnknown,
            Self::Peer { kind, .. } => *kind,
            Self::Protocol(e) => e.kind(),
            Self::Ledger(e) => e.kind(),
            Self::Store(e) => e.kind(),
            Self::Graph(e) => e.kind(),
            Self::Signer(e) => e.kind(),
            Self::Type(e) => e.kind(),
            Self::Bus(_) => ErrorKind::Internal,
        }
    }

    /// A lock or context that ended before work could start.
    pub fn deadline(what: &str, reason: Interrupted) -> Self {
        Self::TimedOut(format!("{what}: {reason}"))
    }

    /// In-band form sent back to a peer.
    pub fn to_wire(&self) -> WireError {
        WireError::from_kind(self.kind(), self.to_string())
    }

    /// Interpret an in-band error received from a peer.
    pub fn check_wire(error: Option<WireError>) -> TransferResult<()> {
        match error {
            None => Ok(()),
            Some(wire) => match wire.kind() {
                None => Ok(()),
                Some(kind) => Err(Self::Peer {
                    kind,
                    message: wire.message,
                }),
            },
        }
    }
}

/// Convenience alias for transfer results.
pub type TransferResult<T> = Result<T, TransferError>;
