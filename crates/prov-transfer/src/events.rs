//! Events carried on the in-process bus.

use prov_graph::{CandidateId, DisclosureMap};
use prov_protocol::AcceptAssetMsg;
use prov_types::{AckId, NodeId, TimeMs};
use serde::{Deserialize, Serialize};

use crate::error::{TransferError, TransferResult};

/// A validated inbound transfer request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestToAcceptAssetEvent {
    pub time: TimeMs,
    pub ack_id: AckId,
    pub asset_id: NodeId,
    pub sender_public_key: String,
    pub recipient_public_key: String,
    pub exposed_private_connections: DisclosureMap,
    pub candidates: Vec<CandidateId>,
}

/// A recipient's accept or reject, as received by the sender.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptAssetEvent {
    pub ack_id: AckId,
    pub accepted: bool,
    pub message: String,
    pub new_id: Option<NodeId>,
    pub new_secret: String,
    pub old_id: Option<NodeId>,
    pub old_secret: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferEvent {
    RequestToAcceptAsset(RequestToAcceptAssetEvent),
    AcceptAsset(AcceptAssetEvent),
}

impl AcceptAssetEvent {
    pub fn from_message(msg: AcceptAssetMsg) -> TransferResult<Self> {
        let ack_id = AckId::new(msg.ack_id)
            .map_err(|_| TransferError::InvalidArgument("accept message without ack id".into()))?;
        Ok(Self {
            ack_id,
            accepted: msg.accepted,
            message: msg.message,
            new_id: optional_id(msg.new_id),
            new_secret: msg.new_secret,
            old_id: optional_id(msg.old_id),
            old_secret: msg.old_secret,
        })
    }

    pub fn to_message(&self) -> AcceptAssetMsg {
        AcceptAssetMsg {
            ack_id: self.ack_id.to_string(),
            accepted: self.accepted,
            message: self.message.clone(),
            new_id: self.new_id.as_ref().map(NodeId::to_string).unwrap_or_default(),
            new_secret: self.new_secret.clone(),
            old_id: self.old_id.as_ref().map(NodeId::to_string).unwrap_or_default(),
            old_secret: self.old_secret.clone(),
        }
    }
}

fn optional_id(raw: String) -> Option<NodeId> {
    NodeId::new(raw).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undisclosed_fields_become_none() {
        let msg = AcceptAssetMsg {
            ack_id: "ack-1".into(),
            accepted: true,
            message: "ok".into(),
            new_id: String::new(),
            new_secret: String::new(),
            old_id: String::new(),
            old_secret: String::new(),
        };
        let event = AcceptAssetEvent::from_message(msg.clone()).unwrap();
        assert_eq!(event.new_id, None);
        assert_eq!(event.old_id, None);
        assert_eq!(event.to_message(), msg);
    }

    #[test]
    fn missing_ack_id_is_invalid() {
        let msg = AcceptAssetMsg {
            ack_id: String::new(),
            accepted: false,
            message: String::new(),
            new_id: String::new(),
            new_secret: String::new(),
            old_id: String::new(),
            old_secret: String::new(),
        };
        assert!(matches!(
            AcceptAssetEvent::from_message(msg),
            Err(TransferError::InvalidArgument(_))
        ));
    }
}
