use std::sync::Arc;

use async_trait::async_trait;
use prov_ledger::LedgerClient;
use prov_protocol::CallContext;
use prov_types::NodeId;
use tracing::{debug, warn};

use super::TransferValidator;
use crate::error::{TransferError, TransferResult};
use crate::payload::TransferPayload;

/// Drops disclosed edges whose recomputed hashes disagree with what the
/// sender claimed.
#[derive(Clone, Copy, Debug, Default)]
pub struct HashValidityFilter;

#[async_trait]
impl TransferValidator for HashValidityFilter {
    fn name(&self) -> &str {
        "hash_validity"
    }

    async fn validate(&self, _ctx: &CallContext, mut payload: TransferPayload) -> TransferResult<TransferPayload> {
        let before = payload.exposed.len();
        payload.exposed.retain(|key, exposed| exposed.matches_claims(key));
        let dropped = before - payload.exposed.len();
        if dropped > 0 {
            warn!(ack_id = %payload.ack_id, dropped, "disclosed edges with mismatched hashes dropped");
        }
        Ok(payload)
    }
}

/// Requires the asset to exist on the ledger and drops disclosed edges
/// with an endpoint the ledger does not know.
pub struct ExistenceFilter {
    ledger: Arc<dyn LedgerClient>,
}

impl ExistenceFilter {
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl TransferValidator for ExistenceFilter {
    fn name(&self) -> &str {
        "existence"
    }

    async fn validate(&self, ctx: &CallContext, mut payload: TransferPayload) -> TransferResult<TransferPayload> {
        let ids = payload.referenced_ids();
        let exists = ctx
            .run(self.ledger.do_node_ids_exist(&ids))
            .await
            .map_err(|reason| TransferError::deadline("existence check", reason))??;
        let known = |id: &NodeId| exists.get(id).copied().unwrap_or(false);

        if !known(&payload.asset_id) {
            return Err(TransferError::NotFound(format!(
                "asset {} is not on the ledger",
                payload.asset_id
            )));
        }
        let before = payload.exposed.len();
        payload
            .exposed
            .retain(|_, exposed| known(exposed.edge.this_id()) && known(exposed.edge.other_id()));
        debug!(
            ack_id = %payload.ack_id,
            dropped = before - payload.exposed.len(),
            "existence checked"
        );
        Ok(payload)
    }
}
