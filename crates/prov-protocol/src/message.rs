use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::wire_error::WireError;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// All message types in the transfer protocol.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferMessage {
    RequestToAcceptAsset(RequestToAcceptAssetMsg),
    RequestToAcceptAssetReply(RequestToAcceptAssetReply),
    AcceptAsset(AcceptAssetMsg),
    AcceptAssetReply(AcceptAssetReply),
    /// Sent instead of a reply when a request frame cannot be handled at all.
    Error(WireError),
}

/// A sender's offer to hand over an asset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestToAcceptAssetMsg {
    pub time_ms: u64,
    pub asset_id: String,
    pub owner_public_key: String,
    pub new_owner_public_key: String,
    /// Disclosed private edges keyed by the hash the sender claims for them.
    pub secret_ids: BTreeMap<String, SecretIdMsg>,
    pub candidates: Vec<CandidateMsg>,
}

/// One disclosed private edge, with the hashes the sender claims.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretIdMsg {
    pub this_id: String,
    pub this_secret: String,
    pub this_hash: Option<String>,
    pub other_id: String,
    pub other_secret: String,
    pub other_hash: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateMsg {
    pub id: String,
    pub secret: String,
    pub signature: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestToAcceptAssetReply {
    pub ack_id: String,
    pub error: Option<WireError>,
}

/// A recipient's answer to an earlier request. Empty strings mean "not
/// disclosed".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptAssetMsg {
    pub ack_id: String,
    pub accepted: bool,
    pub message: String,
    pub new_id: String,
    pub new_secret: String,
    pub old_id: String,
    pub old_secret: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptAssetReply {
    pub error: Option<WireError>,
}

impl TransferMessage {
    pub fn type_tag(&self) -> u8 {
        match self {
            Self::RequestToAcceptAsset(_) => 1,
            Self::RequestToAcceptAssetReply(_) => 2,
            Self::AcceptAsset(_) => 3,
            Self::AcceptAssetReply(_) => 4,
            Self::Error(_) => 255,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::RequestToAcceptAsset(_) => "RequestToAcceptAsset",
            Self::RequestToAcceptAssetReply(_) => "RequestToAcceptAssetReply",
            Self::AcceptAsset(_) => "AcceptAsset",
            Self::AcceptAssetReply(_) => "AcceptAssetReply",
            Self::Error(_) => "Error",
        }
    }
}
