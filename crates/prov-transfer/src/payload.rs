//! Conversion between wire requests and the payload the validation chain
//! works on.

use std::collections::{BTreeMap, HashSet};

use prov_graph::{Asset, CandidateId, DisclosedEdge, DisclosureMap};
use prov_protocol::{CandidateMsg, RequestToAcceptAssetMsg, SecretIdMsg};
use prov_types::{AckId, NodeId, TimeMs};
use tracing::debug;

use crate::error::{TransferError, TransferResult};
use crate::events::RequestToAcceptAssetEvent;

/// A disclosed edge as received, with the hashes the sender claimed.
///
/// `edge` always carries hashes recomputed locally from `(id, secret)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExposedEdge {
    pub claimed_this_hash: Option<String>,
    pub claimed_other_hash: Option<String>,
    pub edge: DisclosedEdge,
}

impl ExposedEdge {
    /// Whether the recomputed hashes agree with the map key and every
    /// claimed hash.
    pub fn matches_claims(&self, key: &str) -> bool {
        let this_hash = self.edge.this_hash().as_str();
        let other_hash = self.edge.other_hash().map(|h| h.as_str());
        key == this_hash
            && self.claimed_this_hash.as_deref().map_or(true, |h| h == this_hash)
            && self
                .claimed_other_hash
                .as_deref()
                .map_or(true, |h| Some(h) == other_hash)
    }
}

/// An inbound transfer request after structural checks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferPayload {
    pub ack_id: AckId,
    pub time: TimeMs,
    pub asset_id: NodeId,
    pub sender_public_key: String,
    pub recipient_public_key: String,
    /// Disclosed edges keyed by the hash the sender sent them under.
    pub exposed: BTreeMap<String, ExposedEdge>,
    pub candidates: Vec<CandidateId>,
}

impl TransferPayload {
    /// Parse a received request.
    ///
    /// Missing ids, missing keys, an empty or duplicated candidate list are
    /// rejected outright. Disclosed entries that cannot form an edge are
    /// dropped.
    pub fn from_message(ack_id: AckId, msg: RequestToAcceptAssetMsg) -> TransferResult<Self> {
        let asset_id = NodeId::new(msg.asset_id)
            .map_err(|_| TransferError::InvalidArgument("request names no asset".into()))?;
        if msg.owner_public_key.trim().is_empty() || msg.new_owner_public_key.trim().is_empty() {
            return Err(TransferError::InvalidArgument(
                "request must carry both owner keys".into(),
            ));
        }
        if msg.candidates.is_empty() {
            return Err(TransferError::InvalidArgument("request offers no candidates".into()));
        }

        let mut seen = HashSet::new();
        let mut candidates = Vec::with_capacity(msg.candidates.len());
        for raw in msg.candidates {
            let candidate = candidate_from_wire(raw)?;
            if !seen.insert(candidate.id.clone()) {
                return Err(TransferError::InvalidArgument(format!(
                    "candidate {} offered twice",
                    candidate.id
                )));
            }
            candidates.push(candidate);
        }

        let mut exposed = BTreeMap::new();
        for (key, raw) in msg.secret_ids {
            match exposed_from_wire(raw) {
                Some(edge) => {
                    exposed.insert(key, edge);
                }
                None => debug!(%key, "dropping malformed disclosed edge"),
            }
        }

        Ok(Self {
            ack_id,
            time: TimeMs(msg.time_ms),
            asset_id,
            sender_public_key: msg.owner_public_key,
            recipient_public_key: msg.new_owner_public_key,
            exposed,
            candidates,
        })
    }

    pub fn disclosures(&self) -> DisclosureMap {
        self.exposed.values().map(|e| e.edge.clone()).collect()
    }

    /// The asset id followed by both endpoints of every disclosed edge.
    pub fn referenced_ids(&self) -> Vec<NodeId> {
        let mut ids = vec![self.asset_id.clone()];
        for exposed in self.exposed.values() {
            ids.push(exposed.edge.this_id().clone());
            ids.push(exposed.edge.other_id().clone());
        }
        ids.sort();
        ids.dedup();
        ids
    }

    pub fn to_event(&self) -> RequestToAcceptAssetEvent {
        RequestToAcceptAssetEvent {
            time: self.time,
            ack_id: self.ack_id.clone(),
            asset_id: self.asset_id.clone(),
            sender_public_key: self.sender_public_key.clone(),
            recipient_public_key: self.recipient_public_key.clone(),
            exposed_private_connections: self.disclosures(),
            candidates: self.candidates.clone(),
        }
    }
}

/// Build the wire request offering `asset` to `recipient_public_key`.
pub fn request_message(
    time: TimeMs,
    asset: &Asset,
    recipient_public_key: &str,
    disclosed: &DisclosureMap,
    candidates: &[CandidateId],
) -> RequestToAcceptAssetMsg {
    let secret_ids = disclosed
        .values()
        .map(|edge| {
            let entry = SecretIdMsg {
                this_id: edge.this_id().to_string(),
                this_secret: edge.this_secret().to_string(),
                this_hash: Some(edge.this_hash().to_string()),
                other_id: edge.other_id().to_string(),
                other_secret: edge.other_secret().to_string(),
                other_hash: edge.other_hash().map(ToString::to_string),
            };
            (edge.this_hash().to_string(), entry)
        })
        .collect();
    RequestToAcceptAssetMsg {
        time_ms: time.as_millis(),
        asset_id: asset.id().to_string(),
        owner_public_key: asset.node.owner_public_key.clone(),
        new_owner_public_key: recipient_public_key.to_string(),
        secret_ids,
        candidates: candidates.iter().map(candidate_to_wire).collect(),
    }
}

fn candidate_to_wire(candidate: &CandidateId) -> CandidateMsg {
    CandidateMsg {
        id: candidate.id.to_string(),
        secret: candidate.secret.clone(),
        signature: candidate.signature.clone(),
    }
}

fn candidate_from_wire(raw: CandidateMsg) -> TransferResult<CandidateId> {
    let id = NodeId::new(raw.id)
        .map_err(|_| TransferError::InvalidArgument("candidate without id".into()))?;
    if raw.signature.is_empty() {
        return Err(TransferError::InvalidArgument(format!(
            "candidate {id} is unsigned"
        )));
    }
    Ok(CandidateId {
        id,
        secret: raw.secret,
        signature: raw.signature,
    })
}

fn exposed_from_wire(raw: SecretIdMsg) -> Option<ExposedEdge> {
    let this_id = NodeId::new(raw.this_id).ok()?;
    let other_id = NodeId::new(raw.other_id).ok()?;
    let edge = DisclosedEdge::new(this_id, raw.this_secret, other_id, raw.other_secret).ok()?;
    Some(ExposedEdge {
        claimed_this_hash: raw.this_hash,
        claimed_other_hash: raw.other_hash,
        edge,
    })
}
