//! Foundation types for provenance transfer.
//!
//! This crate provides the identifiers, timestamps, enums and error taxonomy
//! shared by every other `prov-*` crate.
//!
//! # Key Types
//!
//! - [`NodeId`] — Globally unique, namespaced identifier of a provenance vertex
//! - [`AckId`] — Correlation id issued by a responder for one transfer attempt
//! - [`TimeMs`] — Milliseconds since the Unix epoch
//! - [`RequestStatus`] — Lifecycle state of a transfer handshake record
//! - [`ErrorKind`] — Protocol-level error taxonomy
//! - [`Peer`] — A counterparty reachable over the transfer protocol

pub mod error;
pub mod id;
pub mod idgen;
pub mod kind;
pub mod peer;
pub mod time;

pub use error::TypeError;
pub use id::{AckId, Namespace, NodeId, PeerId, RequestId, UserId};
pub use idgen::{IdGenerator, UuidIdGenerator};
pub use kind::{CreationProcess, ErrorKind, NodeType, RequestStatus, TransferDirection, Visibility};
pub use peer::{Peer, PeerProtocol, ProtocolKind};
pub use time::TimeMs;
