use std::collections::BTreeMap;

use async_trait::async_trait;
use prov_graph::Asset;
use prov_types::NodeId;

use crate::error::LedgerResult;
use crate::requests::{CreateAssetRequest, TransferAssetRequest, TransferReceipt};

/// Client boundary to the authenticated asset ledger.
///
/// Implementations sign locally with the caller's key and submit; the
/// ledger verifies and commits atomically.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn create_asset(&self, request: CreateAssetRequest) -> LedgerResult<Asset>;

    async fn get_asset_by_id(&self, id: &NodeId) -> LedgerResult<Asset>;

    /// Fails with `AlreadyExists` when `new_id` is taken, which the claim
    /// loop treats as "try the next candidate".
    async fn transfer_asset(&self, request: TransferAssetRequest) -> LedgerResult<TransferReceipt>;

    async fn do_node_ids_exist(&self, ids: &[NodeId]) -> LedgerResult<BTreeMap<NodeId, bool>>;
}
