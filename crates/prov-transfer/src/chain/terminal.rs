use std::sync::Arc;

use async_trait::async_trait;
use prov_protocol::CallContext;
use tracing::{debug, warn};

use super::TransferValidator;
use crate::bus::EventPublisher;
use crate::error::TransferResult;
use crate::events::TransferEvent;
use crate::payload::TransferPayload;

/// Ends the chain without side effects.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopTerminal;

#[async_trait]
impl TransferValidator for NoopTerminal {
    fn name(&self) -> &str {
        "noop"
    }

    async fn validate(&self, _ctx: &CallContext, payload: TransferPayload) -> TransferResult<TransferPayload> {
        Ok(payload)
    }
}

/// Ends the chain by publishing the validated request.
///
/// A failed publish is logged and does not fail the request; the sender
/// still gets its ack id.
pub struct PublishTerminal {
    publisher: Arc<dyn EventPublisher>,
    topic: String,
}

impl PublishTerminal {
    pub fn new(publisher: Arc<dyn EventPublisher>, topic: impl Into<String>) -> Self {
        Self {
            publisher,
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl TransferValidator for PublishTerminal {
    fn name(&self) -> &str {
        "publish"
    }

    async fn validate(&self, _ctx: &CallContext, payload: TransferPayload) -> TransferResult<TransferPayload> {
        let event = TransferEvent::RequestToAcceptAsset(payload.to_event());
        match self.publisher.publish(&self.topic, event) {
            Ok(delivered) => debug!(ack_id = %payload.ack_id, topic = %self.topic, delivered, "request published"),
            Err(err) => warn!(ack_id = %payload.ack_id, topic = %self.topic, error = %err, "request not published"),
        }
        Ok(payload)
    }
}
