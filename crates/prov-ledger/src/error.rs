use prov_crypto::SignerError;
use prov_graph::GraphError;
use prov_types::{ErrorKind, NodeId};

/// Errors produced by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("node not found: {0}")]
    NotFound(NodeId),

    #[error("node already exists: {0}")]
    AlreadyExists(NodeId),

    #[error("asset {0} has already been transferred")]
    AlreadyFinalized(NodeId),

    #[error("signature rejected for {0}")]
    InvalidSignature(NodeId),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    #[error("ledger state lock poisoned")]
    LockPoisoned,
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::AlreadyFinalized(_) | Self::InvalidSignature(_) | Self::InvalidRequest(_) => {
                ErrorKind::InvalidArgument
            }
            Self::Unavailable(_) | Self::LockPoisoned => ErrorKind::Internal,
        }
    }

    /// Whether the claim loop may move on to the next candidate.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }
}

impl From<GraphError> for LedgerError {
    fn from(err: GraphError) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}

impl From<SignerError> for LedgerError {
    fn from(err: SignerError) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}

/// Convenience alias for ledger results.
pub type LedgerResult<T> = Result<T, LedgerError>;
