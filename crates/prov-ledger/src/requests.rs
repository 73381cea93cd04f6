use prov_crypto::KeyPair;
use prov_graph::Asset;
use prov_types::{NodeId, TimeMs};
use rust_decimal::Decimal;

/// Mint a new asset owned by `owner_key`.
#[derive(Clone, Debug)]
pub struct CreateAssetRequest {
    pub time: TimeMs,
    pub material_name: String,
    pub unit: String,
    pub quantity: Decimal,
    pub owner_key: KeyPair,
}

/// Claim one transfer candidate.
///
/// `new_id`/`new_secret`/`current_signature` come from the sender's
/// candidate; `current_secret` is the recipient's choice for the link back
/// from the new asset. Empty secrets mean public edges.
#[derive(Clone, Debug)]
pub struct TransferAssetRequest {
    pub time: TimeMs,
    pub current: Asset,
    pub new_owner_key: KeyPair,
    pub new_id: NodeId,
    pub new_secret: String,
    pub current_secret: String,
    pub current_signature: String,
}

/// Outcome of a successful claim: both assets as committed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferReceipt {
    pub updated_current: Asset,
    pub new_asset: Asset,
}
