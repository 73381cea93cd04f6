use prov_graph::{CandidateId, DisclosureMap};
use prov_types::{AckId, NodeId, PeerId, RequestId, RequestStatus, TimeMs, TransferDirection, UserId};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Audit record of one transfer handshake, kept by each side.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestToAcceptAsset {
    /// Assigned by the repository on first write.
    pub id: Option<RequestId>,
    pub status: RequestStatus,
    pub direction: TransferDirection,
    pub time: TimeMs,
    pub ack_id: AckId,
    pub asset_id: NodeId,
    pub peer_id: PeerId,
    pub user_id: UserId,
    pub exposed_private_connections: DisclosureMap,
    pub candidates: Vec<CandidateId>,
    pub new_asset_id: Option<NodeId>,
    /// Free text attached to the accept or reject message.
    pub message: Option<String>,
}

/// A status change the repository applies to a stored record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestTransition {
    Accept {
        new_asset_id: Option<NodeId>,
        message: Option<String>,
    },
    Reject {
        message: Option<String>,
    },
}

impl RequestToAcceptAsset {
    /// A pending record not yet persisted.
    #[allow(clippy::too_many_arguments)]
    pub fn pending(
        direction: TransferDirection,
        time: TimeMs,
        ack_id: AckId,
        asset_id: NodeId,
        peer_id: PeerId,
        user_id: UserId,
        exposed_private_connections: DisclosureMap,
        candidates: Vec<CandidateId>,
    ) -> Self {
        Self {
            id: None,
            status: RequestStatus::Pending,
            direction,
            time,
            ack_id,
            asset_id,
            peer_id,
            user_id,
            exposed_private_connections,
            candidates,
            new_asset_id: None,
            message: None,
        }
    }

    pub fn is_outbound(&self) -> bool {
        self.direction.is_outbound()
    }

    /// Move to `accepted`. Re-accepting with the same id is a no-op and
    /// returns `false`.
    pub fn accept(&mut self, new_asset_id: Option<NodeId>, message: Option<String>) -> StoreResult<bool> {
        match self.status {
            RequestStatus::Pending => {
                self.status = RequestStatus::Accepted;
                self.new_asset_id = new_asset_id;
                self.message = message;
                Ok(true)
            }
            RequestStatus::Accepted if new_asset_id.is_none() || self.new_asset_id == new_asset_id => {
                Ok(false)
            }
            from => Err(self.invalid(from, RequestStatus::Accepted)),
        }
    }

    /// Move to `rejected`. Re-rejecting is a no-op and returns `false`.
    pub fn reject(&mut self, message: Option<String>) -> StoreResult<bool> {
        match self.status {
            RequestStatus::Pending => {
                self.status = RequestStatus::Rejected;
                self.message = message;
                Ok(true)
            }
            RequestStatus::Rejected => Ok(false),
            from => Err(self.invalid(from, RequestStatus::Rejected)),
        }
    }

    /// Apply `transition`. Returns `false` when it repeats the current state.
    pub fn apply(&mut self, transition: RequestTransition) -> StoreResult<bool> {
        match transition {
            RequestTransition::Accept { new_asset_id, message } => self.accept(new_asset_id, message),
            RequestTransition::Reject { message } => self.reject(message),
        }
    }

    /// The offered candidate with this id.
    pub fn candidate(&self, id: &NodeId) -> Option<&CandidateId> {
        self.candidates.iter().find(|c| &c.id == id)
    }

    fn invalid(&self, from: RequestStatus, to: RequestStatus) -> StoreError {
        StoreError::InvalidTransition {
            ack: self.ack_id.clone(),
            from,
            to,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn record(ack: &str, direction: TransferDirection) -> RequestToAcceptAsset {
        RequestToAcceptAsset::pending(
            direction,
            TimeMs(1),
            AckId::new(ack).unwrap(),
            NodeId::new("prov:a").unwrap(),
            PeerId(1),
            UserId(7),
            DisclosureMap::new(),
            Vec::new(),
        )
    }

    #[test]
    fn accept_is_idempotent_for_same_id() {
        let mut r = record("ack", TransferDirection::Outbound);
        let new_id = NodeId::new("prov:b").unwrap();
        assert!(r.accept(Some(new_id.clone()), None).unwrap());
        assert!(!r.accept(Some(new_id.clone()), None).unwrap());
        assert!(!r.accept(None, None).unwrap());
        assert_eq!(r.new_asset_id, Some(new_id));
    }

    #[test]
    fn accept_with_different_id_is_rejected() {
        let mut r = record("ack", TransferDirection::Inbound);
        r.accept(Some(NodeId::new("prov:b").unwrap()), None).unwrap();
        assert!(matches!(
            r.accept(Some(NodeId::new("prov:c").unwrap()), None),
            Err(StoreError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn terminal_states_do_not_cross() {
        let mut r = record("ack", TransferDirection::Inbound);
        assert!(r.reject(Some("no thanks".into())).unwrap());
        assert!(!r.reject(None).unwrap());
        assert!(r.accept(None, None).is_err());

        let mut a = record("ack2", TransferDirection::Inbound);
        a.accept(None, None).unwrap();
        assert!(a.reject(None).is_err());
    }
}
