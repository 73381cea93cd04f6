//! Recipient side: claim one offered candidate and answer the sender.

use std::sync::Arc;

use prov_crypto::{KeyPair, SecretGenerator};
use prov_graph::{Asset, CandidateId, DisclosedEdge};
use prov_ledger::{LedgerClient, TransferAssetRequest, TransferReceipt};
use prov_protocol::{AcceptAssetMsg, CallContext, ConnectionPool, KeyedLock, ProtocolError, TransferMessage};
use prov_store::{NodeCache, RequestRepository, RequestToAcceptAsset, RequestTransition, StoreError};
use prov_types::{Namespace, Peer, RequestId, RequestStatus, TimeMs, Visibility};
use tracing::{debug, info, warn};

use crate::error::{TransferError, TransferResult};
use crate::identity::LocalIdentity;

/// The recipient's answer to a pending inbound request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcceptDecision {
    Accept {
        /// Whether the new asset's link back to the old one stays private.
        successor: Visibility,
        /// Tell the sender which candidate was claimed, with both secrets.
        inform_sender: bool,
    },
    Reject,
}

/// The candidate that was claimed and what the ledger committed.
#[derive(Clone, Debug)]
pub struct ClaimedCandidate {
    /// Position in the offered list.
    pub index: usize,
    pub candidate: CandidateId,
    /// Secret hiding the new asset's link back; empty when public.
    pub recipient_secret: String,
    pub receipt: TransferReceipt,
}

pub struct AcceptanceProtocol {
    pool: Arc<ConnectionPool>,
    ledger: Arc<dyn LedgerClient>,
    repository: Arc<dyn RequestRepository>,
    cache: Arc<dyn NodeCache>,
    secrets: Arc<dyn SecretGenerator>,
    /// A request is answered by one caller at a time.
    answering: KeyedLock<RequestId>,
}

impl AcceptanceProtocol {
    pub fn new(
        pool: Arc<ConnectionPool>,
        ledger: Arc<dyn LedgerClient>,
        repository: Arc<dyn RequestRepository>,
        cache: Arc<dyn NodeCache>,
        secrets: Arc<dyn SecretGenerator>,
    ) -> Self {
        Self {
            pool,
            ledger,
            repository,
            cache,
            secrets,
            answering: KeyedLock::new(),
        }
    }

    /// Accept or reject a pending inbound request.
    ///
    /// Accepting claims the first free candidate on the ledger, caches both
    /// resulting assets with the edges this party can now see, and sends the
    /// accept message. The record is marked accepted once the claim has
    /// succeeded, even if the message cannot be delivered; that error is
    /// still returned. Rejecting sends the message first and only then
    /// marks the record.
    ///
    /// The stored record, not `request`, decides whether the request can
    /// still be answered. Concurrent answers to one request run one after
    /// the other, so the second sees the first one's outcome.
    pub async fn accept_request_to_accept_asset(
        &self,
        ctx: &CallContext,
        identity: &LocalIdentity,
        peer: &Peer,
        request: &RequestToAcceptAsset,
        decision: AcceptDecision,
        message: &str,
    ) -> TransferResult<RequestToAcceptAsset> {
        let id = request.id.ok_or(StoreError::Unpersisted)?;
        let _turn = self
            .answering
            .lock(ctx, id)
            .await
            .map_err(|reason| TransferError::deadline("request already being answered", reason))?;
        let stored = self
            .repository
            .get_request(id)?
            .ok_or_else(|| TransferError::NotFound(format!("request {id}")))?;
        let request = &stored;
        check_answerable(identity, peer, request)?;
        peer.protocol.ensure_supported()?;

        let (successor, inform_sender) = match decision {
            AcceptDecision::Reject => {
                self.send(ctx, peer, reply(request, false, message)).await?;
                let record = self.repository.transition_request(
                    id,
                    RequestTransition::Reject {
                        message: Some(message.to_string()),
                    },
                )?;
                info!(ack_id = %record.ack_id, "transfer rejected");
                return Ok(record);
            }
            AcceptDecision::Accept {
                successor,
                inform_sender,
            } => (successor, inform_sender),
        };

        let recipient_secret = if successor.is_private() {
            self.secrets.new_secret()
        } else {
            String::new()
        };
        let current = ctx
            .run(self.ledger.get_asset_by_id(&request.asset_id))
            .await
            .map_err(|reason| TransferError::deadline("asset lookup", reason))??;
        let claimed = self
            .claim_candidate(
                ctx,
                TimeMs::now(),
                &current,
                &identity.key,
                &request.candidates,
                &recipient_secret,
            )
            .await?;
        self.cache_claimed(&identity.namespace(), &claimed)?;

        let mut accept = reply(request, true, message);
        if inform_sender {
            accept.new_id = claimed.candidate.id.to_string();
            accept.new_secret = claimed.candidate.secret.clone();
            accept.old_id = request.asset_id.to_string();
            accept.old_secret = claimed.recipient_secret.clone();
        }
        let sent = self.send(ctx, peer, accept).await;

        let record = self.repository.transition_request(
            id,
            RequestTransition::Accept {
                new_asset_id: Some(claimed.candidate.id.clone()),
                message: Some(message.to_string()),
            },
        )?;
        info!(
            ack_id = %record.ack_id,
            new_asset = %claimed.candidate.id,
            attempts = claimed.index + 1,
            "transfer accepted"
        );
        if let Err(err) = sent {
            warn!(ack_id = %record.ack_id, error = %err, "accept message not delivered");
            return Err(err);
        }
        Ok(record)
    }

    /// Try `candidates` in order until the ledger accepts one.
    ///
    /// A candidate already taken is skipped; any other ledger error ends the
    /// loop. If every candidate is taken the result is
    /// [`TransferError::CandidatesExhausted`].
    pub async fn claim_candidate(
        &self,
        ctx: &CallContext,
        time: TimeMs,
        current: &Asset,
        recipient: &KeyPair,
        candidates: &[CandidateId],
        recipient_secret: &str,
    ) -> TransferResult<ClaimedCandidate> {
        for (index, candidate) in candidates.iter().enumerate() {
            let request = TransferAssetRequest {
                time,
                current: current.clone(),
                new_owner_key: recipient.clone(),
                new_id: candidate.id.clone(),
                new_secret: candidate.secret.clone(),
                current_secret: recipient_secret.to_string(),
                current_signature: candidate.signature.clone(),
            };
            let outcome = ctx
                .run(self.ledger.transfer_asset(request))
                .await
                .map_err(|reason| {
                    TransferError::OutcomeUnknown(format!("claim of {} {reason}", candidate.id))
                })?;
            match outcome {
                Ok(receipt) => {
                    debug!(asset = %current.id(), candidate = %candidate.id, index, "candidate claimed");
                    return Ok(ClaimedCandidate {
                        index,
                        candidate: candidate.clone(),
                        recipient_secret: recipient_secret.to_string(),
                        receipt,
                    });
                }
                Err(err) if err.is_already_exists() => {
                    debug!(candidate = %candidate.id, index, "candidate already taken");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(TransferError::CandidatesExhausted {
            attempted: candidates.len(),
        })
    }

    /// Cache both assets of a claim with the private edges between them
    /// filled in.
    fn cache_claimed(&self, namespace: &Namespace, claimed: &ClaimedCandidate) -> TransferResult<()> {
        let mut current = claimed.receipt.updated_current.clone();
        let mut successor = claimed.receipt.new_asset.clone();
        let candidate = &claimed.candidate;

        if candidate.is_private() {
            let child = DisclosedEdge::new(
                candidate.id.clone(),
                candidate.secret.clone(),
                current.id().clone(),
                claimed.recipient_secret.clone(),
            )?;
            current.node.private_children.complete(&child);
        }
        if !claimed.recipient_secret.is_empty() {
            let parent = DisclosedEdge::new(
                current.id().clone(),
                claimed.recipient_secret.clone(),
                candidate.id.clone(),
                candidate.secret.clone(),
            )?;
            successor.node.private_parents.complete(&parent);
        }
        self.cache.upsert_asset(namespace, &current)?;
        self.cache.upsert_asset(namespace, &successor)?;
        Ok(())
    }

    async fn send(&self, ctx: &CallContext, peer: &Peer, msg: AcceptAssetMsg) -> TransferResult<()> {
        let reply = self
            .pool
            .call(ctx, &peer.connection_uri, &TransferMessage::AcceptAsset(msg))
            .await?;
        match reply {
            TransferMessage::AcceptAssetReply(reply) => TransferError::check_wire(reply.error),
            TransferMessage::Error(wire) => Err(ProtocolError::Remote(wire).into()),
            other => Err(ProtocolError::UnexpectedMessage {
                expected: "AcceptAssetReply",
                got: other.type_name(),
            }
            .into()),
        }
    }
}

fn check_answerable(identity: &LocalIdentity, peer: &Peer, request: &RequestToAcceptAsset) -> TransferResult<()> {
    if request.is_outbound() {
        return Err(TransferError::InvalidArgument(format!(
            "request {} was sent by this party",
            request.ack_id
        )));
    }
    if request.status != RequestStatus::Pending {
        return Err(TransferError::InvalidArgument(format!(
            "request {} is already {}",
            request.ack_id, request.status
        )));
    }
    if request.user_id != identity.user_id || request.peer_id != peer.id {
        return Err(TransferError::InvalidArgument(format!(
            "request {} belongs to another user or peer",
            request.ack_id
        )));
    }
    Ok(())
}

fn reply(request: &RequestToAcceptAsset, accepted: bool, message: &str) -> AcceptAssetMsg {
    AcceptAssetMsg {
        ack_id: request.ack_id.to_string(),
        accepted,
        message: message.to_string(),
        new_id: String::new(),
        new_secret: String::new(),
        old_id: String::new(),
        old_secret: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, VecDeque};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use prov_crypto::AlphanumericSecrets;
    use prov_graph::DisclosureMap;
    use prov_ledger::{CreateAssetRequest, LedgerError, LedgerResult};
    use prov_store::InMemoryStore;
    use prov_types::{AckId, ErrorKind, NodeId, PeerId, PeerProtocol, TransferDirection, UserId};

    use super::*;
    use crate::candidate::CandidateGenerator;
    use crate::chain::ValidationChain;
    use crate::config::TransferConfig;
    use crate::events::AcceptAssetEvent;
    use crate::local::LocalConnector;
    use crate::responder::{AcceptHandler, Responder};
    use crate::testing::{ec_key, id, signed_asset};

    #[derive(Clone, Copy, Debug)]
    enum Step {
        Taken,
        Fail,
        Claim,
    }

    /// Ledger that answers transfers from a script and records each attempt.
    struct ScriptedLedger {
        current: Asset,
        steps: Mutex<VecDeque<Step>>,
        attempts: Mutex<Vec<NodeId>>,
        read_delay: Duration,
    }

    impl ScriptedLedger {
        fn new(current: Asset, steps: impl IntoIterator<Item = Step>, read_delay: Duration) -> Self {
            Self {
                current,
                steps: Mutex::new(steps.into_iter().collect()),
                attempts: Mutex::new(Vec::new()),
                read_delay,
            }
        }

        fn attempts(&self) -> Vec<NodeId> {
            self.attempts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LedgerClient for ScriptedLedger {
        async fn create_asset(&self, _request: CreateAssetRequest) -> LedgerResult<Asset> {
            Err(LedgerError::InvalidRequest("not scripted".into()))
        }

        async fn get_asset_by_id(&self, _id: &NodeId) -> LedgerResult<Asset> {
            tokio::time::sleep(self.read_delay).await;
            Ok(self.current.clone())
        }

        async fn transfer_asset(&self, request: TransferAssetRequest) -> LedgerResult<TransferReceipt> {
            self.attempts.lock().unwrap().push(request.new_id.clone());
            let step = self.steps.lock().unwrap().pop_front().unwrap_or(Step::Claim);
            match step {
                Step::Taken => Err(LedgerError::AlreadyExists(request.new_id)),
                Step::Fail => Err(LedgerError::Unavailable("ledger down".into())),
                Step::Claim => {
                    let updated_current = request
                        .current
                        .transfer_draft()
                        .with_child(&request.new_id, &request.new_secret);
                    let new_asset = Asset::successor_of(
                        &updated_current,
                        request.new_id,
                        request.new_owner_key.public_key_pem(),
                        request.time,
                        &request.current_secret,
                    );
                    Ok(TransferReceipt {
                        updated_current,
                        new_asset,
                    })
                }
            }
        }

        async fn do_node_ids_exist(&self, ids: &[NodeId]) -> LedgerResult<BTreeMap<NodeId, bool>> {
            Ok(ids.iter().map(|id| (id.clone(), true)).collect())
        }
    }

    #[derive(Default)]
    struct SpyAccepts(Mutex<Vec<AcceptAssetEvent>>);

    #[async_trait]
    impl AcceptHandler for SpyAccepts {
        async fn handle_accept(&self, _ctx: &CallContext, event: AcceptAssetEvent) -> TransferResult<()> {
            self.0.lock().unwrap().push(event);
            Ok(())
        }
    }

    struct Fixture {
        protocol: AcceptanceProtocol,
        ledger: Arc<ScriptedLedger>,
        store: Arc<InMemoryStore>,
        sender_inbox: Arc<SpyAccepts>,
        identity: LocalIdentity,
        peer: Peer,
        request: RequestToAcceptAsset,
    }

    fn fixture(steps: Vec<Step>) -> Fixture {
        slow_fixture(steps, Duration::ZERO)
    }

    fn slow_fixture(steps: Vec<Step>, read_delay: Duration) -> Fixture {
        let sender_key = ec_key();
        let asset = signed_asset(&sender_key, "prov:a");
        let candidates = CandidateGenerator::from_config(&TransferConfig::default())
            .generate(&asset, &sender_key, Visibility::Private)
            .unwrap();

        let sender_inbox = Arc::new(SpyAccepts::default());
        let sender = Responder::new(ValidationChain::new(), sender_inbox.clone());
        let connector = Arc::new(LocalConnector::new());
        connector.register("alice", Arc::new(sender));

        let ledger = Arc::new(ScriptedLedger::new(asset.clone(), steps, read_delay));
        let store = Arc::new(InMemoryStore::new());
        let identity = LocalIdentity::new(UserId(2), ec_key());
        let peer = Peer {
            id: PeerId(1),
            user_id: UserId(2),
            protocol: PeerProtocol::framed(),
            connection_uri: "alice".into(),
            public_key: sender_key.public_key_pem().to_string(),
        };
        let request = store
            .create_request(RequestToAcceptAsset::pending(
                TransferDirection::Inbound,
                TimeMs(5),
                AckId::generate(),
                asset.id().clone(),
                peer.id,
                identity.user_id,
                DisclosureMap::new(),
                candidates,
            ))
            .unwrap();
        let protocol = AcceptanceProtocol::new(
            Arc::new(ConnectionPool::new(connector, 2)),
            ledger.clone(),
            store.clone(),
            store.clone(),
            Arc::new(AlphanumericSecrets::default()),
        );
        Fixture {
            protocol,
            ledger,
            store,
            sender_inbox,
            identity,
            peer,
            request,
        }
    }

    fn candidate_ids(request: &RequestToAcceptAsset) -> Vec<NodeId> {
        request.candidates.iter().map(|c| c.id.clone()).collect()
    }

    #[tokio::test]
    async fn claim_skips_taken_candidates_in_order() {
        let f = fixture(vec![Step::Taken, Step::Taken, Step::Taken]);
        let claimed = f
            .protocol
            .claim_candidate(
                &CallContext::background(),
                TimeMs(9),
                &f.ledger.current,
                &f.identity.key,
                &f.request.candidates,
                "rs",
            )
            .await
            .unwrap();
        assert_eq!(claimed.index, 3);
        assert_eq!(claimed.candidate, f.request.candidates[3]);
        assert_eq!(f.ledger.attempts(), candidate_ids(&f.request)[..4].to_vec());
    }

    #[tokio::test]
    async fn exhausted_candidates_leave_request_pending() {
        let f = fixture(vec![Step::Taken; 6]);
        let err = f
            .protocol
            .accept_request_to_accept_asset(
                &CallContext::background(),
                &f.identity,
                &f.peer,
                &f.request,
                AcceptDecision::Accept {
                    successor: Visibility::Private,
                    inform_sender: true,
                },
                "ok",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::CandidatesExhausted { attempted: 6 }));
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(f.ledger.attempts(), candidate_ids(&f.request));

        let stored = f.store.get_request(f.request.id.unwrap()).unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Pending);
        assert!(f.sender_inbox.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn other_ledger_errors_abort_the_loop() {
        let f = fixture(vec![Step::Taken, Step::Fail]);
        let err = f
            .protocol
            .claim_candidate(
                &CallContext::background(),
                TimeMs(9),
                &f.ledger.current,
                &f.identity.key,
                &f.request.candidates,
                "",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Ledger(LedgerError::Unavailable(_))));
        assert_eq!(f.ledger.attempts().len(), 2);
    }

    #[tokio::test]
    async fn accept_informs_sender_and_caches_known_edges() {
        let f = fixture(vec![Step::Taken]);
        let record = f
            .protocol
            .accept_request_to_accept_asset(
                &CallContext::background(),
                &f.identity,
                &f.peer,
                &f.request,
                AcceptDecision::Accept {
                    successor: Visibility::Private,
                    inform_sender: true,
                },
                "thanks",
            )
            .await
            .unwrap();
        let chosen = &f.request.candidates[1];
        assert_eq!(record.status, RequestStatus::Accepted);
        assert_eq!(record.new_asset_id.as_ref(), Some(&chosen.id));
        assert_eq!(f.store.get_request(record.id.unwrap()).unwrap(), Some(record.clone()));

        let inbox = f.sender_inbox.0.lock().unwrap();
        assert_eq!(inbox.len(), 1);
        assert!(inbox[0].accepted);
        assert_eq!(inbox[0].new_id.as_ref(), Some(&chosen.id));
        assert_eq!(inbox[0].new_secret, chosen.secret);
        assert_eq!(inbox[0].old_id.as_ref(), Some(&id("prov:a")));
        assert!(!inbox[0].old_secret.is_empty());

        let ns = f.identity.namespace();
        let successor = f.store.get_asset(&ns, &chosen.id).unwrap().unwrap();
        let parent = successor.node.private_parents.known().next().unwrap();
        assert_eq!(parent.this_id(), &id("prov:a"));
        assert_eq!(parent.this_secret(), inbox[0].old_secret);
        let current = f.store.get_asset(&ns, &id("prov:a")).unwrap().unwrap();
        let child = current.node.private_children.known().next().unwrap();
        assert_eq!(child.this_id(), &chosen.id);
    }

    #[tokio::test]
    async fn uninformed_accept_discloses_nothing() {
        let f = fixture(Vec::new());
        f.protocol
            .accept_request_to_accept_asset(
                &CallContext::background(),
                &f.identity,
                &f.peer,
                &f.request,
                AcceptDecision::Accept {
                    successor: Visibility::Public,
                    inform_sender: false,
                },
                "",
            )
            .await
            .unwrap();
        let inbox = f.sender_inbox.0.lock().unwrap();
        assert_eq!(inbox[0].new_id, None);
        assert!(inbox[0].new_secret.is_empty());
        assert!(inbox[0].old_secret.is_empty());
    }

    #[tokio::test]
    async fn reject_notifies_then_records() {
        let f = fixture(Vec::new());
        let record = f
            .protocol
            .accept_request_to_accept_asset(
                &CallContext::background(),
                &f.identity,
                &f.peer,
                &f.request,
                AcceptDecision::Reject,
                "not mine",
            )
            .await
            .unwrap();
        assert_eq!(record.status, RequestStatus::Rejected);
        assert!(f.ledger.attempts().is_empty());
        let inbox = f.sender_inbox.0.lock().unwrap();
        assert!(!inbox[0].accepted);
        assert_eq!(inbox[0].message, "not mine");

        let again = f
            .protocol
            .accept_request_to_accept_asset(
                &CallContext::background(),
                &f.identity,
                &f.peer,
                &record,
                AcceptDecision::Reject,
                "",
            )
            .await
            .unwrap_err();
        assert_eq!(again.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn undeliverable_accept_still_records_the_claim() {
        let mut f = fixture(Vec::new());
        f.peer.connection_uri = "gone".into();
        let err = f
            .protocol
            .accept_request_to_accept_asset(
                &CallContext::background(),
                &f.identity,
                &f.peer,
                &f.request,
                AcceptDecision::Accept {
                    successor: Visibility::Private,
                    inform_sender: false,
                },
                "",
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PeerGeneralError);
        let stored = f.store.get_request(f.request.id.unwrap()).unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Accepted);
        assert_eq!(stored.new_asset_id.as_ref(), Some(&f.request.candidates[0].id));
    }

    #[tokio::test]
    async fn stale_copy_cannot_answer_a_settled_request() {
        let f = fixture(Vec::new());
        f.protocol
            .accept_request_to_accept_asset(
                &CallContext::background(),
                &f.identity,
                &f.peer,
                &f.request,
                AcceptDecision::Reject,
                "no",
            )
            .await
            .unwrap();

        // `f.request` still says pending.
        let err = f
            .protocol
            .accept_request_to_accept_asset(
                &CallContext::background(),
                &f.identity,
                &f.peer,
                &f.request,
                AcceptDecision::Accept {
                    successor: Visibility::Private,
                    inform_sender: true,
                },
                "",
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(f.ledger.attempts().is_empty());
        let stored = f.store.get_request(f.request.id.unwrap()).unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Rejected);
    }

    #[tokio::test]
    async fn concurrent_reject_waits_for_the_claim() {
        let f = slow_fixture(Vec::new(), Duration::from_millis(200));
        let ctx = CallContext::background();
        let accept = f.protocol.accept_request_to_accept_asset(
            &ctx,
            &f.identity,
            &f.peer,
            &f.request,
            AcceptDecision::Accept {
                successor: Visibility::Private,
                inform_sender: true,
            },
            "yes",
        );
        let late_reject = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            f.protocol
                .accept_request_to_accept_asset(&ctx, &f.identity, &f.peer, &f.request, AcceptDecision::Reject, "no")
                .await
        };
        let (accepted, rejected) = tokio::join!(accept, late_reject);

        let record = accepted.unwrap();
        assert_eq!(record.status, RequestStatus::Accepted);
        assert_eq!(rejected.unwrap_err().kind(), ErrorKind::InvalidArgument);
        let stored = f.store.get_request(f.request.id.unwrap()).unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Accepted);
        assert_eq!(stored.new_asset_id.as_ref(), Some(&f.request.candidates[0].id));

        let inbox = f.sender_inbox.0.lock().unwrap();
        assert_eq!(inbox.len(), 1);
        assert!(inbox[0].accepted);
    }
}
