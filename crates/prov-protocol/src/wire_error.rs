use std::fmt;

use prov_types::ErrorKind;
use serde::{Deserialize, Serialize};

/// In-band error codes carried in replies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorCode {
    Success = 0,
    AlreadyExists = 1,
    InvalidArgument = 2,
    NotFound = 3,
    GeneralError = 4,
}

impl ErrorCode {
    pub fn from_u32(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Success),
            1 => Some(Self::AlreadyExists),
            2 => Some(Self::InvalidArgument),
            3 => Some(Self::NotFound),
            4 => Some(Self::GeneralError),
            _ => None,
        }
    }

    /// Code reported to a peer for a local error of `kind`.
    pub fn for_kind(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::NotFound => Self::NotFound,
            ErrorKind::InvalidArgument => Self::InvalidArgument,
            ErrorKind::AlreadyExists => Self::AlreadyExists,
            _ => Self::GeneralError,
        }
    }
}

/// `{code, message}` error struct carried inside replies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireError {
    pub code: u32,
    pub message: String,
}

impl WireError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code as u32,
            message: message.into(),
        }
    }

    pub fn from_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::for_kind(kind), message)
    }

    /// How a received error is classified locally. `None` means success.
    pub fn kind(&self) -> Option<ErrorKind> {
        match ErrorCode::from_u32(self.code) {
            Some(ErrorCode::Success) => None,
            Some(ErrorCode::AlreadyExists) => Some(ErrorKind::AlreadyExists),
            Some(ErrorCode::InvalidArgument) => Some(ErrorKind::InvalidArgument),
            Some(ErrorCode::NotFound) => Some(ErrorKind::NotFound),
            Some(ErrorCode::GeneralError) => Some(ErrorKind::PeerGeneralError),
            None => Some(ErrorKind::UnhandledPeerError),
        }
    }
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code={} message={}", self.code, self.message)
    }
}
