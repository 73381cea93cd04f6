//! The responder: the recipient-side endpoint of the transfer protocol.

use std::sync::Arc;

use async_trait::async_trait;
use prov_ledger::LedgerClient;
use prov_protocol::{
    AcceptAssetMsg, AcceptAssetReply, CallContext, DeadlineMutex, RequestToAcceptAssetMsg,
    RequestToAcceptAssetReply, TransferMessage, WireError,
};
use prov_types::{AckId, ErrorKind};
use tracing::{debug, info, warn};

use crate::bus::EventPublisher;
use crate::chain::{NoopTerminal, PublishTerminal, TransferValidator, ValidationChain};
use crate::config::TransferConfig;
use crate::error::{TransferError, TransferResult};
use crate::events::{AcceptAssetEvent, TransferEvent};
use crate::payload::TransferPayload;

// ---------------------------------------------------------------------------
// AcceptHandler
// ---------------------------------------------------------------------------

/// Receives accept/reject messages for requests this party sent.
#[async_trait]
pub trait AcceptHandler: Send + Sync {
    async fn handle_accept(&self, ctx: &CallContext, event: AcceptAssetEvent) -> TransferResult<()>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopAcceptHandler;

#[async_trait]
impl AcceptHandler for NoopAcceptHandler {
    async fn handle_accept(&self, _ctx: &CallContext, event: AcceptAssetEvent) -> TransferResult<()> {
        debug!(ack_id = %event.ack_id, accepted = event.accepted, "accept ignored");
        Ok(())
    }
}

/// Publishes each accept message on a bus topic.
pub struct PublishAcceptHandler {
    publisher: Arc<dyn EventPublisher>,
    topic: String,
}

impl PublishAcceptHandler {
    pub fn new(publisher: Arc<dyn EventPublisher>, topic: impl Into<String>) -> Self {
        Self {
            publisher,
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl AcceptHandler for PublishAcceptHandler {
    async fn handle_accept(&self, _ctx: &CallContext, event: AcceptAssetEvent) -> TransferResult<()> {
        let ack_id = event.ack_id.clone();
        let delivered = self.publisher.publish(&self.topic, TransferEvent::AcceptAsset(event))?;
        debug!(%ack_id, topic = %self.topic, delivered, "accept published");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ResponderOptions
// ---------------------------------------------------------------------------

/// How to assemble a [`Responder`].
#[derive(Clone)]
pub struct ResponderOptions {
    /// Enables the existence check.
    pub ledger: Option<Arc<dyn LedgerClient>>,
    /// Where validated requests and accept messages go. `None` drops them.
    pub publisher: Option<Arc<dyn EventPublisher>>,
    pub request_topic: String,
    pub accept_topic: String,
    /// Replaces the default chain. Handlers run last-registered first.
    pub validators: Option<Vec<Arc<dyn TransferValidator>>>,
}

impl ResponderOptions {
    pub fn from_config(config: &TransferConfig) -> Self {
        Self {
            ledger: None,
            publisher: None,
            request_topic: config.request_topic.clone(),
            accept_topic: config.accept_topic.clone(),
            validators: None,
        }
    }

    pub fn ledger(mut self, ledger: Arc<dyn LedgerClient>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn validators(mut self, validators: Vec<Arc<dyn TransferValidator>>) -> Self {
        self.validators = Some(validators);
        self
    }
}

impl Default for ResponderOptions {
    fn default() -> Self {
        Self::from_config(&TransferConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Responder
// ---------------------------------------------------------------------------

/// Answers `RequestToAcceptAsset` and `AcceptAsset` calls.
///
/// The chain and accept handler can be swapped while serving; each call
/// takes a snapshot of them under its own deadline.
pub struct Responder {
    chain: DeadlineMutex<Arc<ValidationChain>>,
    accept_handler: DeadlineMutex<Arc<dyn AcceptHandler>>,
}

impl Responder {
    pub fn new(chain: ValidationChain, accept_handler: Arc<dyn AcceptHandler>) -> Self {
        Self {
            chain: DeadlineMutex::new(Arc::new(chain)),
            accept_handler: DeadlineMutex::new(accept_handler),
        }
    }

    pub fn from_options(options: ResponderOptions) -> Self {
        let chain = match options.validators {
            Some(validators) => ValidationChain::from_registered(validators),
            None => {
                let terminal: Arc<dyn TransferValidator> = match &options.publisher {
                    Some(publisher) => Arc::new(PublishTerminal::new(
                        Arc::clone(publisher),
                        options.request_topic.clone(),
                    )),
                    None => Arc::new(NoopTerminal),
                };
                ValidationChain::with_default_validators(options.ledger.clone(), terminal)
            }
        };
        let accept_handler: Arc<dyn AcceptHandler> = match options.publisher {
            Some(publisher) => Arc::new(PublishAcceptHandler::new(publisher, options.accept_topic)),
            None => Arc::new(NoopAcceptHandler),
        };
        Self::new(chain, accept_handler)
    }

    pub async fn set_chain(&self, ctx: &CallContext, chain: ValidationChain) -> TransferResult<()> {
        let mut current = self
            .chain
            .lock(ctx)
            .await
            .map_err(|reason| TransferError::deadline("validation chain lock", reason))?;
        *current = Arc::new(chain);
        Ok(())
    }

    /// Add `validator` in front of the current chain.
    pub async fn register_validator(
        &self,
        ctx: &CallContext,
        validator: Arc<dyn TransferValidator>,
    ) -> TransferResult<()> {
        let mut current = self
            .chain
            .lock(ctx)
            .await
            .map_err(|reason| TransferError::deadline("validation chain lock", reason))?;
        let mut chain = ValidationChain::clone(&current);
        chain.layer(validator);
        *current = Arc::new(chain);
        Ok(())
    }

    pub async fn set_accept_handler(&self, ctx: &CallContext, handler: Arc<dyn AcceptHandler>) -> TransferResult<()> {
        let mut current = self
            .accept_handler
            .lock(ctx)
            .await
            .map_err(|reason| TransferError::deadline("accept handler lock", reason))?;
        *current = handler;
        Ok(())
    }

    /// Acknowledge a transfer request.
    ///
    /// A fresh ack id is always returned; validation failures travel in the
    /// reply's error field.
    pub async fn request_to_accept_asset(
        &self,
        ctx: &CallContext,
        msg: RequestToAcceptAssetMsg,
    ) -> RequestToAcceptAssetReply {
        let ack_id = AckId::generate();
        let asset_id = msg.asset_id.clone();
        let error = match self.validate_request(ctx, ack_id.clone(), msg).await {
            Ok(payload) => {
                info!(
                    %ack_id,
                    asset = %payload.asset_id,
                    candidates = payload.candidates.len(),
                    edges = payload.exposed.len(),
                    "transfer request acknowledged"
                );
                None
            }
            Err(err) => {
                warn!(%ack_id, asset = %asset_id, error = %err, "transfer request refused");
                Some(err.to_wire())
            }
        };
        RequestToAcceptAssetReply {
            ack_id: ack_id.to_string(),
            error,
        }
    }

    async fn validate_request(
        &self,
        ctx: &CallContext,
        ack_id: AckId,
        msg: RequestToAcceptAssetMsg,
    ) -> TransferResult<TransferPayload> {
        let payload = TransferPayload::from_message(ack_id, msg)?;
        let chain = {
            let current = self
                .chain
                .lock(ctx)
                .await
                .map_err(|reason| TransferError::deadline("validation chain lock", reason))?;
            Arc::clone(&current)
        };
        chain.run(ctx, payload).await
    }

    /// Hand a received accept/reject message to the accept handler.
    pub async fn accept_asset(&self, ctx: &CallContext, msg: AcceptAssetMsg) -> AcceptAssetReply {
        let error = match self.dispatch_accept(ctx, msg).await {
            Ok(()) => None,
            Err(err) => {
                warn!(error = %err, "accept message refused");
                Some(err.to_wire())
            }
        };
        AcceptAssetReply { error }
    }

    async fn dispatch_accept(&self, ctx: &CallContext, msg: AcceptAssetMsg) -> TransferResult<()> {
        let event = AcceptAssetEvent::from_message(msg)?;
        info!(ack_id = %event.ack_id, accepted = event.accepted, "accept message received");
        let handler = {
            let current = self
                .accept_handler
                .lock(ctx)
                .await
                .map_err(|reason| TransferError::deadline("accept handler lock", reason))?;
            Arc::clone(&current)
        };
        handler.handle_accept(ctx, event).await
    }

    /// Answer any request message. Replies are never sent as requests.
    pub async fn handle(&self, ctx: &CallContext, request: TransferMessage) -> TransferMessage {
        match request {
            TransferMessage::RequestToAcceptAsset(msg) => {
                TransferMessage::RequestToAcceptAssetReply(self.request_to_accept_asset(ctx, msg).await)
            }
            TransferMessage::AcceptAsset(msg) => TransferMessage::AcceptAssetReply(self.accept_asset(ctx, msg).await),
            other => {
                warn!(message = other.type_name(), "unexpected request type");
                TransferMessage::Error(WireError::from_kind(
                    ErrorKind::InvalidArgument,
                    format!("{} is not a request", other.type_name()),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    use prov_ledger::InMemoryLedger;
    use prov_protocol::{CandidateMsg, ErrorCode};

    use super::*;
    use crate::bus::EventBus;
    use crate::testing::{ec_key, signed_asset};

    fn request(asset_id: &str) -> RequestToAcceptAssetMsg {
        RequestToAcceptAssetMsg {
            time_ms: 1,
            asset_id: asset_id.into(),
            owner_public_key: "sender".into(),
            new_owner_public_key: "recipient".into(),
            secret_ids: BTreeMap::new(),
            candidates: vec![CandidateMsg {
                id: "prov:c".into(),
                secret: "cs".into(),
                signature: "sig".into(),
            }],
        }
    }

    fn accept(ack: &str) -> AcceptAssetMsg {
        AcceptAssetMsg {
            ack_id: ack.into(),
            accepted: true,
            message: "thanks".into(),
            new_id: String::new(),
            new_secret: String::new(),
            old_id: String::new(),
            old_secret: String::new(),
        }
    }

    #[tokio::test]
    async fn valid_request_is_acknowledged_and_published() {
        let key = ec_key();
        let ledger = Arc::new(InMemoryLedger::new("prov"));
        ledger.insert_signed(&signed_asset(&key, "prov:a")).unwrap();
        let bus = Arc::new(EventBus::new(8));
        let mut requests = bus.subscribe(&TransferConfig::default().request_topic).unwrap();
        let responder = Responder::from_options(ResponderOptions::default().ledger(ledger).publisher(bus));

        let reply = responder
            .request_to_accept_asset(&CallContext::background(), request("prov:a"))
            .await;
        assert!(reply.error.is_none());
        assert!(!reply.ack_id.is_empty());

        match requests.recv().await.unwrap() {
            TransferEvent::RequestToAcceptAsset(event) => {
                assert_eq!(event.ack_id.as_str(), reply.ack_id);
                assert_eq!(event.candidates.len(), 1);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn refused_requests_still_get_an_ack_id() {
        let ledger = Arc::new(InMemoryLedger::new("prov"));
        let responder = Responder::from_options(ResponderOptions::default().ledger(ledger));
        let reply = responder
            .request_to_accept_asset(&CallContext::background(), request("prov:missing"))
            .await;
        assert!(!reply.ack_id.is_empty());
        assert_eq!(reply.error.unwrap().code, ErrorCode::NotFound as u32);

        let mut malformed = request("prov:a");
        malformed.candidates.clear();
        let reply = responder
            .request_to_accept_asset(&CallContext::background(), malformed)
            .await;
        assert_eq!(reply.error.unwrap().code, ErrorCode::InvalidArgument as u32);
    }

    #[tokio::test]
    async fn accept_messages_reach_the_accept_topic() {
        let bus = Arc::new(EventBus::new(8));
        let mut accepts = bus.subscribe(&TransferConfig::default().accept_topic).unwrap();
        let responder = Responder::from_options(ResponderOptions::default().publisher(bus));

        let reply = responder.accept_asset(&CallContext::background(), accept("ack-9")).await;
        assert!(reply.error.is_none());
        match accepts.recv().await.unwrap() {
            TransferEvent::AcceptAsset(event) => assert_eq!(event.ack_id.as_str(), "ack-9"),
            other => panic!("unexpected event {other:?}"),
        }

        let reply = responder.accept_asset(&CallContext::background(), accept("")).await;
        assert_eq!(reply.error.unwrap().code, ErrorCode::InvalidArgument as u32);
    }

    #[tokio::test]
    async fn replies_are_not_requests() {
        let responder = Responder::from_options(ResponderOptions::default());
        let reply = responder
            .handle(
                &CallContext::background(),
                TransferMessage::AcceptAssetReply(AcceptAssetReply { error: None }),
            )
            .await;
        assert!(matches!(reply, TransferMessage::Error(e) if e.code == ErrorCode::InvalidArgument as u32));
    }

    #[tokio::test]
    async fn busy_chain_lock_times_out() {
        let responder = Responder::from_options(ResponderOptions::default());
        let _held = responder.chain.lock(&CallContext::background()).await.unwrap();
        let reply = responder
            .request_to_accept_asset(&CallContext::with_timeout(Duration::from_millis(20)), request("prov:a"))
            .await;
        assert_eq!(reply.error.unwrap().code, ErrorCode::GeneralError as u32);
    }

    #[tokio::test]
    async fn registered_validator_runs_before_defaults() {
        struct Deny;

        #[async_trait]
        impl TransferValidator for Deny {
            fn name(&self) -> &str {
                "deny"
            }

            async fn validate(&self, _ctx: &CallContext, _p: TransferPayload) -> TransferResult<TransferPayload> {
                Err(TransferError::InvalidArgument("denied".into()))
            }
        }

        let responder = Responder::from_options(ResponderOptions::default());
        let ctx = CallContext::background();
        responder.register_validator(&ctx, Arc::new(Deny)).await.unwrap();
        let reply = responder.request_to_accept_asset(&ctx, request("prov:a")).await;
        let error = reply.error.unwrap();
        assert_eq!(error.code, ErrorCode::InvalidArgument as u32);
        assert!(error.message.contains("denied"));
    }
}
