use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use prov_crypto::NodeSigner;
use prov_graph::Asset;
use prov_types::{IdGenerator, NodeId, UuidIdGenerator};
use tracing::{debug, info};

use crate::error::{LedgerError, LedgerResult};
use crate::requests::{CreateAssetRequest, TransferAssetRequest, TransferReceipt};
use crate::traits::LedgerClient;

/// In-memory ledger for tests, local demos, and embedding.
///
/// Stores only commitments for private edges, like a public ledger would.
pub struct InMemoryLedger {
    ids: UuidIdGenerator,
    signer: NodeSigner,
    inner: RwLock<LedgerState>,
}

#[derive(Default)]
struct LedgerState {
    assets: HashMap<NodeId, Asset>,
}

impl InMemoryLedger {
    pub fn new(graph_name: impl Into<String>) -> Self {
        Self {
            ids: UuidIdGenerator::new(graph_name),
            signer: NodeSigner,
            inner: RwLock::new(LedgerState::default()),
        }
    }

    /// Commit an already-signed asset as-is.
    pub fn insert_signed(&self, asset: &Asset) -> LedgerResult<()> {
        if !asset.verify_signature(&self.signer)? {
            return Err(LedgerError::InvalidSignature(asset.id().clone()));
        }
        let mut state = self.inner.write().map_err(|_| LedgerError::LockPoisoned)?;
        if state.assets.contains_key(asset.id()) {
            return Err(LedgerError::AlreadyExists(asset.id().clone()));
        }
        state.assets.insert(asset.id().clone(), asset.redacted());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|s| s.assets.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn create_asset(&self, request: CreateAssetRequest) -> LedgerResult<Asset> {
        let mut asset = Asset::new(
            self.ids.new_id(),
            request.owner_key.public_key_pem(),
            request.time,
            request.material_name,
            request.unit,
            request.quantity,
        );
        asset.sign(&self.signer, &request.owner_key)?;
        self.insert_signed(&asset)?;
        info!(id = %asset.id(), "asset created");
        Ok(asset)
    }

    async fn get_asset_by_id(&self, id: &NodeId) -> LedgerResult<Asset> {
        let state = self.inner.read().map_err(|_| LedgerError::LockPoisoned)?;
        state
            .assets
            .get(id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(id.clone()))
    }

    async fn transfer_asset(&self, request: TransferAssetRequest) -> LedgerResult<TransferReceipt> {
        let mut state = self.inner.write().map_err(|_| LedgerError::LockPoisoned)?;

        let current_id = request.current.id().clone();
        let stored = state
            .assets
            .get(&current_id)
            .ok_or_else(|| LedgerError::NotFound(current_id.clone()))?;
        if stored.node.is_finalized {
            return Err(LedgerError::AlreadyFinalized(current_id));
        }
        if state.assets.contains_key(&request.new_id) {
            debug!(new_id = %request.new_id, "candidate id already claimed");
            return Err(LedgerError::AlreadyExists(request.new_id));
        }

        let mut updated_current = stored
            .transfer_draft()
            .with_child(&request.new_id, &request.new_secret);
        let authentic = self.signer.verify(
            &stored.node.owner_public_key,
            &updated_current,
            &request.current_signature,
        )?;
        if !authentic {
            return Err(LedgerError::InvalidSignature(current_id));
        }
        updated_current.node.signature = request.current_signature;

        let mut new_asset = Asset::successor_of(
            &updated_current,
            request.new_id,
            request.new_owner_key.public_key_pem(),
            request.time,
            &request.current_secret,
        );
        new_asset.sign(&self.signer, &request.new_owner_key)?;

        state
            .assets
            .insert(current_id.clone(), updated_current.redacted());
        state
            .assets
            .insert(new_asset.id().clone(), new_asset.redacted());
        info!(from = %current_id, to = %new_asset.id(), "asset transferred");

        Ok(TransferReceipt {
            updated_current,
            new_asset,
        })
    }

    async fn do_node_ids_exist(&self, ids: &[NodeId]) -> LedgerResult<BTreeMap<NodeId, bool>> {
        let state = self.inner.read().map_err(|_| LedgerError::LockPoisoned)?;
        Ok(ids
            .iter()
            .map(|id| (id.clone(), state.assets.contains_key(id)))
            .collect())
    }
}
