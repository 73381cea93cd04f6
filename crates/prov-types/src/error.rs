use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("empty identifier")]
    EmptyId,

    #[error("invalid timestamp: {0}")]
    InvalidTime(i64),

    #[error("unsupported peer protocol: {0}")]
    UnsupportedProtocol(String),
}

impl TypeError {
    pub fn kind(&self) -> crate::ErrorKind {
        crate::ErrorKind::InvalidArgument
    }
}
