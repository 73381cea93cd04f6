//! Error types for the provenance graph model.

use prov_crypto::{CommitmentHash, SignerError};
use prov_types::{ErrorKind, NodeId};

/// Errors that can occur while building or checking graph values.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GraphError {
    /// A disclosed edge must carry the secret of its own endpoint.
    #[error("edge to {0} has an empty secret")]
    EmptySecret(NodeId),

    /// A known edge was stored under a key that is not its commitment.
    #[error("edge keyed {key:?} commits to {actual:?}")]
    EdgeKeyMismatch {
        key: CommitmentHash,
        actual: CommitmentHash,
    },

    #[error(transparent)]
    Signer(#[from] SignerError),
}

impl GraphError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptySecret(_) | Self::EdgeKeyMismatch { .. } => ErrorKind::InvalidArgument,
            Self::Signer(e) => e.kind(),
        }
    }
}

/// Convenience alias for graph results.
pub type GraphResult<T> = Result<T, GraphError>;
