use prov_types::{AckId, ErrorKind, RequestId, RequestStatus};

/// Errors from cache and repository operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("request record not found: {0}")]
    RequestNotFound(RequestId),

    #[error("request for ack {0} already recorded")]
    DuplicateAck(AckId),

    #[error("request record has not been persisted")]
    Unpersisted,

    #[error("cannot move request {ack} from {from} to {to}")]
    InvalidTransition {
        ack: AckId,
        from: RequestStatus,
        to: RequestStatus,
    },

    #[error("store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RequestNotFound(_) => ErrorKind::NotFound,
            Self::DuplicateAck(_) => ErrorKind::AlreadyExists,
            Self::Unpersisted | Self::InvalidTransition { .. } => ErrorKind::InvalidArgument,
            Self::LockPoisoned => ErrorKind::Internal,
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
