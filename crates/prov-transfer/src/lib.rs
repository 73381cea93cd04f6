//! Asset transfer handshake for the provenance graph.
//!
//! A sender offers several pre-signed successor identities for an asset; the
//! recipient claims exactly one on the ledger and tells the sender. This
//! crate implements both sides:
//!
//! - [`CandidateGenerator`] — unlinkable, independently signed candidates
//! - [`TransferInitiator`] — builds, sends and records an outbound request
//! - [`Responder`] — acknowledges requests and runs the [`ValidationChain`]
//! - [`AcceptanceProtocol`] — the claim loop and the accept/reject reply
//! - [`PrivateEdgeTraversal`] — resolves disclosed private neighbours
//! - [`EventBus`] and the [`inbound`] subscribers that update local state
//! - [`TransferNode`] — everything above wired together from a [`TransferConfig`]

pub mod acceptance;
pub mod bus;
pub mod candidate;
pub mod chain;
pub mod config;
pub mod error;
pub mod events;
pub mod identity;
pub mod inbound;
pub mod initiator;
pub mod local;
pub mod node;
pub mod payload;
pub mod responder;
pub mod server;
pub mod traversal;

#[cfg(test)]
mod testing;

pub use acceptance::{AcceptDecision, AcceptanceProtocol, ClaimedCandidate};
pub use bus::{BusError, EventBus, EventHandler, EventPublisher};
pub use candidate::CandidateGenerator;
pub use chain::{
    ExistenceFilter, HashValidityFilter, NoopTerminal, PublishTerminal, TransferValidator,
    ValidationChain,
};
pub use config::TransferConfig;
pub use error::{TransferError, TransferResult};
pub use events::{AcceptAssetEvent, RequestToAcceptAssetEvent, TransferEvent};
pub use identity::LocalIdentity;
pub use inbound::{AcceptNotificationHandler, InboundRequestHandler};
pub use initiator::{OutboundTransfer, TransferInitiator};
pub use local::LocalConnector;
pub use node::{TransferNode, TransferNodeParts};
pub use payload::{ExposedEdge, TransferPayload};
pub use responder::{AcceptHandler, NoopAcceptHandler, PublishAcceptHandler, Responder, ResponderOptions};
pub use server::TransferServer;
pub use traversal::PrivateEdgeTraversal;
