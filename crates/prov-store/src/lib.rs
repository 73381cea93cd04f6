//! Local cache and repository for provenance transfer.
//!
//! Everything a party knows beyond what the ledger publishes lives here:
//! assets with their disclosed private edges, the audit trail of transfer
//! handshakes, and the peer directory.
//!
//! # Design Rules
//!
//! 1. Upserts are idempotent and never forget a disclosed edge.
//! 2. Reads reflect prior writes within the same namespace.
//! 3. Handshake records are never deleted; status only moves forward.

pub mod error;
pub mod memory;
pub mod record;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use record::{RequestToAcceptAsset, RequestTransition};
pub use traits::{NodeCache, PeerDirectory, RequestRepository};
