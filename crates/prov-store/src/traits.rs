use prov_graph::Asset;
use prov_types::{AckId, Namespace, NodeId, Peer, PeerId, RequestId, RequestStatus, TransferDirection, UserId};

use crate::error::StoreResult;
use crate::record::{RequestToAcceptAsset, RequestTransition};

/// Per-namespace cache of assets and their disclosed edges.
pub trait NodeCache: Send + Sync {
    /// Merge `asset` into the cached copy and return the result.
    ///
    /// Idempotent. Known private edges already cached survive an upsert
    /// that only carries their hash.
    fn upsert_asset(&self, namespace: &Namespace, asset: &Asset) -> StoreResult<Asset>;

    /// Returns `Ok(None)` if the asset is not cached.
    fn get_asset(&self, namespace: &Namespace, id: &NodeId) -> StoreResult<Option<Asset>>;

    /// Default implementation calls `get_asset()` for each id and skips misses.
    fn get_assets(&self, namespace: &Namespace, ids: &[NodeId]) -> StoreResult<Vec<Asset>> {
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(asset) = self.get_asset(namespace, id)? {
                found.push(asset);
            }
        }
        Ok(found)
    }
}

/// Append-and-update store of transfer handshake records.
pub trait RequestRepository: Send + Sync {
    /// Persist a new record and assign its id.
    ///
    /// Fails with `DuplicateAck` if the user already has a record for the
    /// same ack id and direction.
    fn create_request(&self, record: RequestToAcceptAsset) -> StoreResult<RequestToAcceptAsset>;

    fn get_request(&self, id: RequestId) -> StoreResult<Option<RequestToAcceptAsset>>;

    fn find_by_ack(
        &self,
        user: UserId,
        ack_id: &AckId,
        direction: TransferDirection,
    ) -> StoreResult<Option<RequestToAcceptAsset>>;

    /// Apply `transition` to the stored record and return it afterwards.
    ///
    /// The stored copy is read and written under one lock, so an accepted
    /// or rejected record never changes status; only repeating its current
    /// state succeeds, as a no-op.
    fn transition_request(
        &self,
        id: RequestId,
        transition: RequestTransition,
    ) -> StoreResult<RequestToAcceptAsset>;

    /// Records of `user`, oldest first, optionally filtered.
    fn list_requests(
        &self,
        user: UserId,
        status: Option<RequestStatus>,
        direction: Option<TransferDirection>,
    ) -> StoreResult<Vec<RequestToAcceptAsset>>;
}

/// Each user's known counterparties.
pub trait PeerDirectory: Send + Sync {
    fn upsert_peer(&self, peer: Peer) -> StoreResult<()>;

    fn get_peer(&self, user: UserId, id: PeerId) -> StoreResult<Option<Peer>>;

    /// Keys are compared as parsed keys, not as PEM text.
    fn find_peer_by_public_key(&self, user: UserId, public_key: &str) -> StoreResult<Option<Peer>>;

    fn list_peers(&self, user: UserId) -> StoreResult<Vec<Peer>>;
}
