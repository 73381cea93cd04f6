use std::sync::Arc;

use prov_crypto::{AlphanumericSecrets, PublicKey};
use prov_graph::{Asset, DisclosureMap};
use prov_ledger::{CreateAssetRequest, LedgerClient};
use prov_protocol::{CallContext, ConnectionPool, PeerConnector};
use prov_store::{InMemoryStore, NodeCache, PeerDirectory, RequestRepository, RequestToAcceptAsset};
use prov_types::{NodeId, Peer, PeerId, RequestId, RequestStatus, TimeMs, TransferDirection};
use rust_decimal::Decimal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::acceptance::{AcceptDecision, AcceptanceProtocol};
use crate::bus::EventBus;
use crate::candidate::CandidateGenerator;
use crate::config::TransferConfig;
use crate::error::{TransferError, TransferResult};
use crate::identity::LocalIdentity;
use crate::inbound::{AcceptNotificationHandler, InboundRequestHandler};
use crate::initiator::{OutboundTransfer, TransferInitiator};
use crate::responder::{Responder, ResponderOptions};
use crate::server::TransferServer;
use crate::traversal::PrivateEdgeTraversal;

/// External services a [`TransferNode`] is built on.
#[derive(Clone)]
pub struct TransferNodeParts {
    pub ledger: Arc<dyn LedgerClient>,
    pub cache: Arc<dyn NodeCache>,
    pub repository: Arc<dyn RequestRepository>,
    pub peers: Arc<dyn PeerDirectory>,
    pub connector: Arc<dyn PeerConnector>,
}

impl TransferNodeParts {
    /// Cache, repository and peer directory held in memory.
    pub fn in_memory(ledger: Arc<dyn LedgerClient>, connector: Arc<dyn PeerConnector>) -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self {
            ledger,
            cache: store.clone(),
            repository: store.clone(),
            peers: store,
            connector,
        }
    }
}

/// One party of the transfer protocol: sender and recipient roles, the
/// responder endpoint and the local subscribers, all acting for a single
/// [`LocalIdentity`].
pub struct TransferNode {
    config: TransferConfig,
    identity: LocalIdentity,
    ledger: Arc<dyn LedgerClient>,
    cache: Arc<dyn NodeCache>,
    repository: Arc<dyn RequestRepository>,
    peers: Arc<dyn PeerDirectory>,
    bus: Arc<EventBus>,
    responder: Arc<Responder>,
    initiator: TransferInitiator,
    acceptance: AcceptanceProtocol,
    traversal: Arc<PrivateEdgeTraversal>,
}

impl TransferNode {
    pub fn new(config: TransferConfig, identity: LocalIdentity, parts: TransferNodeParts) -> TransferResult<Self> {
        config.validate()?;
        let bus = Arc::new(EventBus::new(config.event_channel_capacity));
        let pool = Arc::new(ConnectionPool::new(
            parts.connector,
            config.max_idle_connections_per_peer,
        ));
        let responder = Arc::new(Responder::from_options(
            ResponderOptions::from_config(&config)
                .ledger(Arc::clone(&parts.ledger))
                .publisher(bus.clone()),
        ));
        let initiator = TransferInitiator::new(
            Arc::clone(&pool),
            CandidateGenerator::from_config(&config),
            Arc::clone(&parts.repository),
        );
        let acceptance = AcceptanceProtocol::new(
            pool,
            Arc::clone(&parts.ledger),
            Arc::clone(&parts.repository),
            Arc::clone(&parts.cache),
            Arc::new(AlphanumericSecrets::new(config.secret_length)),
        );
        let traversal = Arc::new(PrivateEdgeTraversal::new(
            Arc::clone(&parts.ledger),
            Arc::clone(&parts.cache),
        ));
        Ok(Self {
            config,
            identity,
            ledger: parts.ledger,
            cache: parts.cache,
            repository: parts.repository,
            peers: parts.peers,
            bus,
            responder,
            initiator,
            acceptance,
            traversal,
        })
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    pub fn identity(&self) -> &LocalIdentity {
        &self.identity
    }

    pub fn bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.bus)
    }

    /// The endpoint peers talk to. Serve it with [`Self::bind`] or register
    /// it with a [`crate::LocalConnector`].
    pub fn responder(&self) -> Arc<Responder> {
        Arc::clone(&self.responder)
    }

    /// Subscribe the inbound request and accept handlers to their topics.
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> TransferResult<Vec<JoinHandle<()>>> {
        let timeout = self.config.request_timeout();
        let requests = InboundRequestHandler::new(
            self.identity.clone(),
            Arc::clone(&self.repository),
            Arc::clone(&self.peers),
            Arc::clone(&self.traversal),
            timeout,
        );
        let accepts = AcceptNotificationHandler::new(
            self.identity.clone(),
            Arc::clone(&self.ledger),
            Arc::clone(&self.repository),
            Arc::clone(&self.cache),
            timeout,
        );
        Ok(vec![
            self.bus.subscribe_handler(&self.config.request_topic, Arc::new(requests))?,
            self.bus.subscribe_handler(&self.config.accept_topic, Arc::new(accepts))?,
        ])
    }

    /// Bind the responder to the configured listen address.
    pub async fn bind(&self) -> TransferResult<TransferServer> {
        TransferServer::bind(
            self.config.listen_addr,
            self.responder(),
            self.config.request_timeout(),
        )
        .await
    }

    /// Serve until `shutdown` is cancelled.
    pub async fn serve(&self, shutdown: CancellationToken) -> TransferResult<()> {
        self.bind().await?.serve(shutdown).await
    }

    /// Register a counterparty in this identity's peer directory.
    pub fn add_peer(&self, mut peer: Peer) -> TransferResult<()> {
        peer.protocol.ensure_supported()?;
        PublicKey::from_pem(&peer.public_key)?;
        peer.user_id = self.identity.user_id;
        self.peers.upsert_peer(peer)?;
        Ok(())
    }

    pub fn peers(&self) -> TransferResult<Vec<Peer>> {
        Ok(self.peers.list_peers(self.identity.user_id)?)
    }

    /// Mint an asset owned by this identity and cache it.
    pub async fn create_asset(
        &self,
        ctx: &CallContext,
        material_name: &str,
        unit: &str,
        quantity: Decimal,
    ) -> TransferResult<Asset> {
        let request = CreateAssetRequest {
            time: TimeMs::now(),
            material_name: material_name.to_string(),
            unit: unit.to_string(),
            quantity,
            owner_key: self.identity.key.clone(),
        };
        let asset = ctx
            .run(self.ledger.create_asset(request))
            .await
            .map_err(|reason| TransferError::OutcomeUnknown(format!("asset creation {reason}")))??;
        Ok(self.cache.upsert_asset(&self.identity.namespace(), &asset)?)
    }

    /// Offer an asset to a peer from the directory.
    pub async fn transfer_asset(
        &self,
        ctx: &CallContext,
        peer_id: PeerId,
        transfer: OutboundTransfer,
    ) -> TransferResult<RequestToAcceptAsset> {
        let peer = self.peer(peer_id)?;
        self.initiator
            .transfer_asset(ctx, &self.identity, &peer, transfer)
            .await
    }

    /// Answer a pending inbound request.
    pub async fn accept_request(
        &self,
        ctx: &CallContext,
        request_id: RequestId,
        decision: AcceptDecision,
        message: &str,
    ) -> TransferResult<RequestToAcceptAsset> {
        let request = self
            .repository
            .get_request(request_id)?
            .filter(|r| r.user_id == self.identity.user_id)
            .ok_or_else(|| TransferError::NotFound(format!("request {request_id}")))?;
        let peer = self.peer(request.peer_id)?;
        let record = self
            .acceptance
            .accept_request_to_accept_asset(ctx, &self.identity, &peer, &request, decision, message)
            .await?;
        info!(request = %request_id, status = %record.status, "request answered");
        Ok(record)
    }

    /// Resolve and cache the private history of `asset_id` that
    /// `disclosures` unlocks.
    pub async fn fetch_private_edges(
        &self,
        ctx: &CallContext,
        asset_id: &NodeId,
        disclosures: &DisclosureMap,
        use_cache: bool,
    ) -> TransferResult<Vec<Asset>> {
        let namespace = self.identity.namespace();
        let start = self
            .traversal
            .fetch_node(ctx, &namespace, asset_id, use_cache)
            .await?;
        self.traversal
            .fetch_private_edges(ctx, &namespace, disclosures, &start, use_cache)
            .await
    }

    /// This identity's handshake records, oldest first.
    pub fn requests(
        &self,
        status: Option<RequestStatus>,
        direction: Option<TransferDirection>,
    ) -> TransferResult<Vec<RequestToAcceptAsset>> {
        Ok(self
            .repository
            .list_requests(self.identity.user_id, status, direction)?)
    }

    fn peer(&self, id: PeerId) -> TransferResult<Peer> {
        self.peers
            .get_peer(self.identity.user_id, id)?
            .ok_or_else(|| TransferError::NotFound(format!("peer {id}")))
    }
}
