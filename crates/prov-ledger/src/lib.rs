//! Ledger boundary for provenance transfer.
//!
//! The ledger is the source of truth for which node ids exist and who owns
//! each asset. This crate provides:
//! - The async [`LedgerClient`] trait the transfer protocol talks to
//! - Request/receipt types for asset creation and transfer
//! - [`InMemoryLedger`], enforcing id uniqueness, single transfer per asset
//!   and candidate signatures, for tests and embedding

pub mod error;
pub mod memory;
pub mod requests;
pub mod traits;

pub use error::{LedgerError, LedgerResult};
pub use memory::InMemoryLedger;
pub use requests::{CreateAssetRequest, TransferAssetRequest, TransferReceipt};
pub use traits::LedgerClient;
