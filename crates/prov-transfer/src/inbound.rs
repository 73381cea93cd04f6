//! Bus subscribers that turn protocol events into local state.
//!
//! [`InboundRequestHandler`] runs on the recipient: it records each
//! validated request and resolves the disclosed history.
//! [`AcceptNotificationHandler`] runs on the sender: it settles the
//! outbound record when the recipient answers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use prov_graph::{Asset, CandidateId, DisclosedEdge};
use prov_ledger::LedgerClient;
use prov_protocol::{CallContext, KeyedLock};
use prov_store::{NodeCache, PeerDirectory, RequestRepository, RequestToAcceptAsset, RequestTransition, StoreError};
use prov_types::{AckId, TransferDirection};
use tracing::{debug, info, warn};

use crate::bus::EventHandler;
use crate::error::{TransferError, TransferResult};
use crate::events::{AcceptAssetEvent, RequestToAcceptAssetEvent, TransferEvent};
use crate::identity::LocalIdentity;
use crate::traversal::PrivateEdgeTraversal;

// ---------------------------------------------------------------------------
// InboundRequestHandler
// ---------------------------------------------------------------------------

pub struct InboundRequestHandler {
    identity: LocalIdentity,
    repository: Arc<dyn RequestRepository>,
    peers: Arc<dyn PeerDirectory>,
    traversal: Arc<PrivateEdgeTraversal>,
    timeout: Duration,
}

impl InboundRequestHandler {
    pub fn new(
        identity: LocalIdentity,
        repository: Arc<dyn RequestRepository>,
        peers: Arc<dyn PeerDirectory>,
        traversal: Arc<PrivateEdgeTraversal>,
        timeout: Duration,
    ) -> Self {
        Self {
            identity,
            repository,
            peers,
            traversal,
            timeout,
        }
    }

    /// Record a validated request addressed to this identity.
    ///
    /// Requests for another key, from an unknown sender, or already
    /// recorded are ignored. Returns the new pending record otherwise.
    pub async fn process(
        &self,
        ctx: &CallContext,
        event: RequestToAcceptAssetEvent,
    ) -> TransferResult<Option<RequestToAcceptAsset>> {
        if !self.identity.owns_key(&event.recipient_public_key) {
            debug!(ack_id = %event.ack_id, "request addressed to another key");
            return Ok(None);
        }
        let user = self.identity.user_id;
        let Some(peer) = self.peers.find_peer_by_public_key(user, &event.sender_public_key)? else {
            warn!(ack_id = %event.ack_id, "request from a sender not in the peer directory");
            return Ok(None);
        };
        if self
            .repository
            .find_by_ack(user, &event.ack_id, TransferDirection::Inbound)?
            .is_some()
        {
            debug!(ack_id = %event.ack_id, "request already recorded");
            return Ok(None);
        }

        let pending = RequestToAcceptAsset::pending(
            TransferDirection::Inbound,
            event.time,
            event.ack_id.clone(),
            event.asset_id.clone(),
            peer.id,
            user,
            event.exposed_private_connections.clone(),
            event.candidates,
        );
        let record = match self.repository.create_request(pending) {
            Ok(record) => record,
            Err(StoreError::DuplicateAck(_)) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        info!(ack_id = %record.ack_id, asset = %record.asset_id, peer = %peer.id, "transfer request received");

        let namespace = self.identity.namespace();
        let history = async {
            let asset = self
                .traversal
                .fetch_node(ctx, &namespace, &event.asset_id, false)
                .await?;
            self.traversal
                .fetch_private_edges(ctx, &namespace, &event.exposed_private_connections, &asset, false)
                .await
        };
        match history.await {
            Ok(found) => debug!(ack_id = %record.ack_id, nodes = found.len(), "disclosed history cached"),
            Err(err) => warn!(ack_id = %record.ack_id, error = %err, "disclosed history not resolved"),
        }
        Ok(Some(record))
    }
}

#[async_trait]
impl EventHandler for InboundRequestHandler {
    async fn handle(&self, event: TransferEvent) {
        let TransferEvent::RequestToAcceptAsset(event) = event else {
            return;
        };
        let ctx = CallContext::with_timeout(self.timeout);
        if let Err(err) = self.process(&ctx, event).await {
            warn!(error = %err, "inbound request not recorded");
        }
    }
}

// ---------------------------------------------------------------------------
// AcceptNotificationHandler
// ---------------------------------------------------------------------------

pub struct AcceptNotificationHandler {
    identity: LocalIdentity,
    ledger: Arc<dyn LedgerClient>,
    repository: Arc<dyn RequestRepository>,
    cache: Arc<dyn NodeCache>,
    timeout: Duration,
    /// Answers for one ack id are applied one at a time.
    settling: KeyedLock<AckId>,
}

impl AcceptNotificationHandler {
    pub fn new(
        identity: LocalIdentity,
        ledger: Arc<dyn LedgerClient>,
        repository: Arc<dyn RequestRepository>,
        cache: Arc<dyn NodeCache>,
        timeout: Duration,
    ) -> Self {
        Self {
            identity,
            ledger,
            repository,
            cache,
            timeout,
            settling: KeyedLock::new(),
        }
    }

    /// Settle the outbound record an accept or reject refers to.
    ///
    /// Duplicates and answers to unknown or settled requests are ignored.
    /// Whichever answer settles the record first wins; later ones for the
    /// same ack id see it settled. When the recipient did not name the
    /// claimed candidate it is found by matching the asset's committed
    /// signature.
    pub async fn process(
        &self,
        ctx: &CallContext,
        event: AcceptAssetEvent,
    ) -> TransferResult<Option<RequestToAcceptAsset>> {
        let user = self.identity.user_id;
        let _turn = self
            .settling
            .lock(ctx, event.ack_id.clone())
            .await
            .map_err(|reason| TransferError::deadline("earlier answer still settling", reason))?;
        let Some(record) = self
            .repository
            .find_by_ack(user, &event.ack_id, TransferDirection::Outbound)?
        else {
            warn!(ack_id = %event.ack_id, "answer to an unknown request");
            return Ok(None);
        };
        if record.status.is_terminal() {
            debug!(ack_id = %event.ack_id, status = %record.status, "request already settled");
            return Ok(None);
        }
        let id = record.id.ok_or(StoreError::Unpersisted)?;
        let message = (!event.message.is_empty()).then(|| event.message.clone());

        if !event.accepted {
            let record = self
                .repository
                .transition_request(id, RequestTransition::Reject { message })?;
            info!(ack_id = %record.ack_id, "transfer rejected by recipient");
            return Ok(Some(record));
        }

        let current = ctx
            .run(self.ledger.get_asset_by_id(&record.asset_id))
            .await
            .map_err(|reason| TransferError::deadline("ledger read", reason))??;
        let candidate = match &event.new_id {
            Some(new_id) => match record.candidate(new_id) {
                Some(candidate) if event.new_secret.is_empty() || event.new_secret == candidate.secret => {
                    candidate.clone()
                }
                _ => {
                    warn!(ack_id = %event.ack_id, new_id = %new_id, "accept names a candidate that was never offered");
                    return Ok(None);
                }
            },
            None => claimed_by_signature(&record, &current.node.signature)
                .cloned()
                .ok_or_else(|| {
                    TransferError::NotFound(format!(
                        "no offered candidate matches the committed transfer of {}",
                        record.asset_id
                    ))
                })?,
        };

        self.cache_settled(ctx, &record, &candidate, &event, current).await?;
        let record = self.repository.transition_request(
            id,
            RequestTransition::Accept {
                new_asset_id: Some(candidate.id.clone()),
                message,
            },
        )?;
        info!(ack_id = %record.ack_id, new_asset = %candidate.id, "transfer accepted by recipient");
        Ok(Some(record))
    }

    /// Cache the transferred asset, and its successor when disclosed, with
    /// whatever edges between them this party can now resolve.
    async fn cache_settled(
        &self,
        ctx: &CallContext,
        record: &RequestToAcceptAsset,
        candidate: &CandidateId,
        event: &AcceptAssetEvent,
        mut current: Asset,
    ) -> TransferResult<()> {
        let namespace = self.identity.namespace();
        let old_secret = match &event.old_id {
            Some(old_id) if *old_id == record.asset_id => event.old_secret.clone(),
            _ => String::new(),
        };

        if candidate.is_private() {
            let child = DisclosedEdge::new(
                candidate.id.clone(),
                candidate.secret.clone(),
                record.asset_id.clone(),
                old_secret.clone(),
            )?;
            current.node.private_children.complete(&child);
        }
        self.cache.upsert_asset(&namespace, &current)?;

        if event.new_id.is_some() {
            let mut successor = ctx
                .run(self.ledger.get_asset_by_id(&candidate.id))
                .await
                .map_err(|reason| TransferError::deadline("ledger read", reason))??;
            if !old_secret.is_empty() {
                let parent = DisclosedEdge::new(
                    record.asset_id.clone(),
                    old_secret,
                    candidate.id.clone(),
                    candidate.secret.clone(),
                )?;
                successor.node.private_parents.complete(&parent);
            }
            self.cache.upsert_asset(&namespace, &successor)?;
        }
        Ok(())
    }
}

fn claimed_by_signature<'a>(record: &'a RequestToAcceptAsset, signature: &str) -> Option<&'a CandidateId> {
    record.candidates.iter().find(|c| c.signature == signature)
}

#[async_trait]
impl EventHandler for AcceptNotificationHandler {
    async fn handle(&self, event: TransferEvent) {
        let TransferEvent::AcceptAsset(event) = event else {
            return;
        };
        let ctx = CallContext::with_timeout(self.timeout);
        if let Err(err) = self.process(&ctx, event).await {
            warn!(error = %err, "accept message not applied");
        }
    }
}
