//! Fixtures shared by the unit tests of this crate.

use std::time::Duration;

use prov_crypto::{EcCurve, KeyPair, NodeSigner};
use prov_graph::{Asset, DisclosedEdge};
use prov_types::{NodeId, TimeMs};
use rust_decimal::Decimal;

pub(crate) fn ec_key() -> KeyPair {
    KeyPair::generate_ecdsa(EcCurve::P256).unwrap()
}

pub(crate) fn id(s: &str) -> NodeId {
    NodeId::new(s).unwrap()
}

/// Unsigned asset owned by `key`.
pub(crate) fn asset_owned_by(key: &KeyPair, asset_id: &str) -> Asset {
    Asset::new(id(asset_id), key.public_key_pem(), TimeMs(1), "copper", "kg", Decimal::ONE)
}

pub(crate) fn signed_asset(key: &KeyPair, asset_id: &str) -> Asset {
    sign(asset_owned_by(key, asset_id), key)
}

pub(crate) fn sign(mut asset: Asset, key: &KeyPair) -> Asset {
    asset.sign(&NodeSigner, key).unwrap();
    asset
}

pub(crate) fn edge(this: &str, this_secret: &str, other: &str, other_secret: &str) -> DisclosedEdge {
    DisclosedEdge::new(id(this), this_secret, id(other), other_secret).unwrap()
}

/// Poll `check` until it holds, failing the test after five seconds.
pub(crate) async fn eventually<F: FnMut() -> bool>(what: &str, mut check: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
