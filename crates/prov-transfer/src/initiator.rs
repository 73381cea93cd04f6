//! Sender side: offer an asset to a peer.

use std::sync::Arc;

use prov_graph::{Asset, CandidateId, DisclosureMap};
use prov_protocol::{CallContext, ConnectionPool, PeerConnection, ProtocolError, TransferMessage};
use prov_store::{RequestRepository, RequestToAcceptAsset};
use prov_types::{AckId, ErrorKind, Peer, TimeMs, TransferDirection, Visibility};
use tracing::{info, warn};

use crate::candidate::CandidateGenerator;
use crate::error::{TransferError, TransferResult};
use crate::identity::LocalIdentity;
use crate::payload;

/// What to offer in one outbound transfer.
#[derive(Clone, Debug)]
pub struct OutboundTransfer {
    pub time: TimeMs,
    pub asset: Asset,
    /// Private edges the recipient should learn about.
    pub disclosed: DisclosureMap,
    /// Whether the successor's link back to `asset` stays private.
    pub successor: Visibility,
}

pub struct TransferInitiator {
    pool: Arc<ConnectionPool>,
    candidates: CandidateGenerator,
    repository: Arc<dyn RequestRepository>,
}

impl TransferInitiator {
    pub fn new(
        pool: Arc<ConnectionPool>,
        candidates: CandidateGenerator,
        repository: Arc<dyn RequestRepository>,
    ) -> Self {
        Self {
            pool,
            candidates,
            repository,
        }
    }

    /// Offer `transfer.asset` to `peer` and record the pending outbound
    /// request under the ack id the peer returns.
    ///
    /// Nothing is recorded if the peer refuses or the call does not
    /// complete. An interrupted call fails with an `OutcomeUnknown` kind:
    /// the peer may have acknowledged it.
    pub async fn transfer_asset(
        &self,
        ctx: &CallContext,
        owner: &LocalIdentity,
        peer: &Peer,
        transfer: OutboundTransfer,
    ) -> TransferResult<RequestToAcceptAsset> {
        peer.protocol.ensure_supported()?;
        let candidates = self
            .candidates
            .generate(&transfer.asset, &owner.key, transfer.successor)?;

        let mut conn = self.pool.checkout(ctx, &peer.connection_uri).await?;
        let outcome = self.offer(ctx, conn.as_mut(), peer, &transfer, &candidates).await;
        self.pool.checkin(ctx, &peer.connection_uri, conn).await;
        let ack_id = outcome.map_err(|err| {
            if err.kind() == ErrorKind::OutcomeUnknown {
                warn!(asset = %transfer.asset.id(), peer = %peer.id, error = %err, "transfer request outcome unknown");
            }
            err
        })?;

        let record = RequestToAcceptAsset::pending(
            TransferDirection::Outbound,
            transfer.time,
            ack_id,
            transfer.asset.id().clone(),
            peer.id,
            owner.user_id,
            transfer.disclosed,
            candidates,
        );
        let record = self.repository.create_request(record)?;
        info!(
            ack_id = %record.ack_id,
            asset = %record.asset_id,
            peer = %peer.id,
            candidates = record.candidates.len(),
            "transfer request sent"
        );
        Ok(record)
    }

    async fn offer(
        &self,
        ctx: &CallContext,
        conn: &mut dyn PeerConnection,
        peer: &Peer,
        transfer: &OutboundTransfer,
        candidates: &[CandidateId],
    ) -> TransferResult<AckId> {
        let request = payload::request_message(
            transfer.time,
            &transfer.asset,
            &peer.public_key,
            &transfer.disclosed,
            candidates,
        );
        let reply = ConnectionPool::call_on(ctx, conn, &TransferMessage::RequestToAcceptAsset(request)).await?;
        match reply {
            TransferMessage::RequestToAcceptAssetReply(reply) => {
                TransferError::check_wire(reply.error)?;
                AckId::new(reply.ack_id).map_err(|_| TransferError::Peer {
                    kind: ErrorKind::UnhandledPeerError,
                    message: "acknowledgement without ack id".into(),
                })
            }
            TransferMessage::Error(wire) => Err(ProtocolError::Remote(wire).into()),
            other => Err(ProtocolError::UnexpectedMessage {
                expected: "RequestToAcceptAssetReply",
                got: other.type_name(),
            }
            .into()),
        }
    }
}
