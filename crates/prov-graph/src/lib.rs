//! Provenance graph model.
//!
//! Assets are vertices of a signed, append-only DAG. Each vertex carries
//! public edges (cleartext ids) and private edges known only by their
//! disclosure commitment until someone supplies the `(id, secret)` pair.
//!
//! # Key Types
//!
//! - [`Node`] — A provenance vertex with public and private edge sets
//! - [`Asset`] — A node plus its material payload; the signed unit
//! - [`PrivateEdge`] — `Unknown` (hash only) or `Known` (disclosed) edge
//! - [`EdgeSet`] — Private edges keyed by disclosure hash
//! - [`DisclosureMap`] — Disclosed `(id, secret)` pairs a caller hands over
//! - [`CandidateId`] — A pre-signed successor identity offered in a transfer

pub mod asset;
pub mod candidate;
pub mod disclosure;
pub mod edge;
pub mod error;
pub mod node;

pub use asset::Asset;
pub use candidate::CandidateId;
pub use disclosure::DisclosureMap;
pub use edge::{DisclosedEdge, EdgeSet, PrivateEdge};
pub use error::{GraphError, GraphResult};
pub use node::Node;
