//! Wire protocol for provenance transfer.
//!
//! Defines the messages exchanged between a transfer initiator and a
//! responder, their framing, the in-band error codes, and the plumbing both
//! sides share: deadline/cancellation contexts, deadline-bounded locks,
//! transports, and a per-peer connection pool.

pub mod codec;
pub mod context;
pub mod error;
pub mod message;
pub mod pool;
pub mod transport;
pub mod wire_error;

pub use codec::FrameCodec;
pub use context::{CallContext, DeadlineMutex, Interrupted, KeyGuard, KeyedLock};
pub use error::{ProtocolError, ProtocolResult};
pub use message::{
    AcceptAssetMsg, AcceptAssetReply, CandidateMsg, RequestToAcceptAssetMsg,
    RequestToAcceptAssetReply, SecretIdMsg, TransferMessage, MAX_MESSAGE_SIZE, PROTOCOL_VERSION,
};
pub use pool::ConnectionPool;
pub use transport::{PeerConnection, PeerConnector, TcpConnection, TcpConnector};
pub use wire_error::{ErrorCode, WireError};
