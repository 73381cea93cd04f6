use std::collections::HashSet;
use std::sync::Arc;

use prov_graph::{Asset, DisclosureMap};
use prov_ledger::LedgerClient;
use prov_protocol::CallContext;
use prov_store::NodeCache;
use prov_types::{Namespace, NodeId};
use tracing::debug;

use crate::error::{TransferError, TransferResult};

/// Walks private edges that a disclosure map unlocks, starting from one
/// asset.
///
/// Edges are followed in both directions, every node is visited once even
/// if the disclosed edges form a cycle, and every visited node is cached
/// with its newly known edges.
pub struct PrivateEdgeTraversal {
    ledger: Arc<dyn LedgerClient>,
    cache: Arc<dyn NodeCache>,
}

impl PrivateEdgeTraversal {
    pub fn new(ledger: Arc<dyn LedgerClient>, cache: Arc<dyn NodeCache>) -> Self {
        Self { ledger, cache }
    }

    /// Read one asset, from the cache when `use_cache` and it is there,
    /// otherwise from the ledger. Ledger reads are cached.
    pub async fn fetch_node(
        &self,
        ctx: &CallContext,
        namespace: &Namespace,
        id: &NodeId,
        use_cache: bool,
    ) -> TransferResult<Asset> {
        if use_cache {
            if let Some(asset) = self.cache.get_asset(namespace, id)? {
                return Ok(asset);
            }
        }
        let asset = ctx
            .run(self.ledger.get_asset_by_id(id))
            .await
            .map_err(|reason| TransferError::deadline("ledger read", reason))??;
        Ok(self.cache.upsert_asset(namespace, &asset)?)
    }

    /// Every asset reachable from `start` through edges in `disclosures`,
    /// `start` first.
    pub async fn fetch_private_edges(
        &self,
        ctx: &CallContext,
        namespace: &Namespace,
        disclosures: &DisclosureMap,
        start: &Asset,
        use_cache: bool,
    ) -> TransferResult<Vec<Asset>> {
        let index = disclosures.with_reverse_index();
        let mut visited = HashSet::from([start.id().clone()]);
        let first = self.complete_and_cache(namespace, start.clone(), &index)?;
        let mut stack = vec![first.clone()];
        let mut found = vec![first];

        while let Some(node) = stack.pop() {
            let neighbours: Vec<NodeId> = node
                .node
                .private_edge_hashes()
                .filter_map(|hash| index.get(hash))
                .map(|edge| edge.this_id().clone())
                .collect();
            for id in neighbours {
                if !visited.insert(id.clone()) {
                    continue;
                }
                let next = self.fetch_node(ctx, namespace, &id, use_cache).await?;
                let next = self.complete_and_cache(namespace, next, &index)?;
                found.push(next.clone());
                stack.push(next);
            }
        }
        debug!(start = %start.id(), visited = found.len(), "private edges resolved");
        Ok(found)
    }

    fn complete_and_cache(&self, namespace: &Namespace, mut asset: Asset, index: &DisclosureMap) -> TransferResult<Asset> {
        asset.node.complete_edges(index);
        Ok(self.cache.upsert_asset(namespace, &asset)?)
    }
}
