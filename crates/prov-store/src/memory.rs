use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use prov_crypto::same_public_key;
use prov_graph::Asset;
use prov_types::{AckId, Namespace, NodeId, Peer, PeerId, RequestId, RequestStatus, TransferDirection, UserId};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::record::{RequestToAcceptAsset, RequestTransition};
use crate::traits::{NodeCache, PeerDirectory, RequestRepository};

/// `HashMap`-backed cache, repository and peer directory for tests and
/// embedding. Values are cloned on read and write.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<StoreState>,
}

#[derive(Default)]
struct StoreState {
    assets: HashMap<(Namespace, NodeId), Asset>,
    requests: BTreeMap<RequestId, RequestToAcceptAsset>,
    ack_index: HashMap<(UserId, AckId, TransferDirection), RequestId>,
    next_request_id: u64,
    peers: BTreeMap<(UserId, PeerId), Peer>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached assets across all namespaces.
    pub fn asset_count(&self) -> usize {
        self.inner.read().map(|s| s.assets.len()).unwrap_or(0)
    }
}

impl NodeCache for InMemoryStore {
    fn upsert_asset(&self, namespace: &Namespace, asset: &Asset) -> StoreResult<Asset> {
        let mut state = self.inner.write().map_err(|_| StoreError::LockPoisoned)?;
        let key = (namespace.clone(), asset.id().clone());
        let merged = match state.assets.entry(key) {
            Entry::Occupied(mut slot) => {
                slot.get_mut().merge_from(asset);
                slot.get().clone()
            }
            Entry::Vacant(slot) => slot.insert(asset.clone()).clone(),
        };
        debug!(%namespace, id = %asset.id(), "asset cached");
        Ok(merged)
    }

    fn get_asset(&self, namespace: &Namespace, id: &NodeId) -> StoreResult<Option<Asset>> {
        let state = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(state.assets.get(&(namespace.clone(), id.clone())).cloned())
    }
}

impl RequestRepository for InMemoryStore {
    fn create_request(&self, mut record: RequestToAcceptAsset) -> StoreResult<RequestToAcceptAsset> {
        let mut state = self.inner.write().map_err(|_| StoreError::LockPoisoned)?;
        let ack_key = (record.user_id, record.ack_id.clone(), record.direction);
        if state.ack_index.contains_key(&ack_key) {
            return Err(StoreError::DuplicateAck(record.ack_id));
        }
        state.next_request_id += 1;
        let id = RequestId(state.next_request_id);
        record.id = Some(id);
        state.ack_index.insert(ack_key, id);
        state.requests.insert(id, record.clone());
        Ok(record)
    }

    fn get_request(&self, id: RequestId) -> StoreResult<Option<RequestToAcceptAsset>> {
        let state = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(state.requests.get(&id).cloned())
    }

    fn find_by_ack(
        &self,
        user: UserId,
        ack_id: &AckId,
        direction: TransferDirection,
    ) -> StoreResult<Option<RequestToAcceptAsset>> {
        let state = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(state
            .ack_index
            .get(&(user, ack_id.clone(), direction))
            .and_then(|id| state.requests.get(id))
            .cloned())
    }

    fn transition_request(
        &self,
        id: RequestId,
        transition: RequestTransition,
    ) -> StoreResult<RequestToAcceptAsset> {
        let mut state = self.inner.write().map_err(|_| StoreError::LockPoisoned)?;
        let slot = state
            .requests
            .get_mut(&id)
            .ok_or(StoreError::RequestNotFound(id))?;
        if slot.apply(transition)? {
            debug!(ack_id = %slot.ack_id, status = %slot.status, "request settled");
        }
        Ok(slot.clone())
    }

    fn list_requests(
        &self,
        user: UserId,
        status: Option<RequestStatus>,
        direction: Option<TransferDirection>,
    ) -> StoreResult<Vec<RequestToAcceptAsset>> {
        let state = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(state
            .requests
            .values()
            .filter(|r| r.user_id == user)
            .filter(|r| status.map_or(true, |s| r.status == s))
            .filter(|r| direction.map_or(true, |d| r.direction == d))
            .cloned()
            .collect())
    }
}

impl PeerDirectory for InMemoryStore {
    fn upsert_peer(&self, peer: Peer) -> StoreResult<()> {
        let mut state = self.inner.write().map_err(|_| StoreError::LockPoisoned)?;
        state.peers.insert((peer.user_id, peer.id), peer);
        Ok(())
    }

    fn get_peer(&self, user: UserId, id: PeerId) -> StoreResult<Option<Peer>> {
        let state = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(state.peers.get(&(user, id)).cloned())
    }

    fn find_peer_by_public_key(&self, user: UserId, public_key: &str) -> StoreResult<Option<Peer>> {
        let state = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(state
            .peers
            .values()
            .find(|p| p.user_id == user && same_public_key(&p.public_key, public_key))
            .cloned())
    }

    fn list_peers(&self, user: UserId) -> StoreResult<Vec<Peer>> {
        let state = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(state
            .peers
            .values()
            .filter(|p| p.user_id == user)
            .cloned()
            .collect())
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("assets", &self.asset_count())
            .finish_non_exhaustive()
    }
}
