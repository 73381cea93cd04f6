use std::collections::BTreeSet;

use prov_crypto::{CommitmentHash, KeyPair, NodeSigner, Signable, SignerError};
use prov_types::{CreationProcess, NodeId, NodeType, TimeMs};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::GraphResult;
use crate::node::Node;

/// A provenance vertex carrying a quantity of some material.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub node: Node,
    pub material_name: String,
    pub unit: String,
    pub quantity: Decimal,
    pub creation_process: CreationProcess,
}

impl Asset {
    /// A freshly created, unsigned asset with no edges.
    pub fn new(
        id: NodeId,
        owner_public_key: impl Into<String>,
        time: TimeMs,
        material_name: impl Into<String>,
        unit: impl Into<String>,
        quantity: Decimal,
    ) -> Self {
        Self {
            node: Node::new(id, NodeType::Asset, owner_public_key, time),
            material_name: material_name.into(),
            unit: unit.into(),
            quantity,
            creation_process: CreationProcess::Create,
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.node.id
    }

    /// The form the current owner signs when handing the asset on: the
    /// same vertex, finalized.
    pub fn transfer_draft(&self) -> Asset {
        let mut draft = self.clone();
        draft.node.is_finalized = true;
        draft
    }

    /// A copy with one more successor edge.
    pub fn with_child(&self, child: &NodeId, secret: &str) -> Asset {
        let mut asset = self.clone();
        asset.node.attach_child(child, secret);
        asset
    }

    /// The unsigned successor of `current` under a new owner.
    ///
    /// `parent_secret` hides the link back to `current` when non-empty.
    pub fn successor_of(
        current: &Asset,
        new_id: NodeId,
        new_owner_public_key: impl Into<String>,
        time: TimeMs,
        parent_secret: &str,
    ) -> Asset {
        let mut asset = Asset::new(
            new_id,
            new_owner_public_key,
            time,
            current.material_name.clone(),
            current.unit.clone(),
            current.quantity,
        );
        asset.creation_process = CreationProcess::Transfer;
        asset.node.attach_parent(current.id(), parent_secret);
        asset
    }

    /// Sign in place with the owner's key.
    pub fn sign(&mut self, signer: &NodeSigner, key: &KeyPair) -> GraphResult<()> {
        self.node.signature = signer.sign(key, &*self)?;
        Ok(())
    }

    /// Check the stored signature against the stored owner key.
    pub fn verify_signature(&self, signer: &NodeSigner) -> GraphResult<bool> {
        Ok(signer.verify(&self.node.owner_public_key, self, &self.node.signature)?)
    }

    /// Absorb a newer copy of the same asset.
    pub fn merge_from(&mut self, incoming: &Asset) {
        self.node.merge_from(&incoming.node);
        self.material_name = incoming.material_name.clone();
        self.unit = incoming.unit.clone();
        self.quantity = incoming.quantity;
        self.creation_process = incoming.creation_process;
    }

    /// A copy with every private endpoint hidden.
    pub fn redacted(&self) -> Asset {
        Asset {
            node: self.node.redacted(),
            ..self.clone()
        }
    }
}

/// Signature-free canonical form. Private edges appear as hashes only.
#[derive(Serialize)]
struct CanonicalAsset<'a> {
    id: &'a NodeId,
    node_type: NodeType,
    owner_public_key: &'a str,
    created_time: u64,
    updated_time: u64,
    is_finalized: bool,
    public_parents: &'a BTreeSet<NodeId>,
    public_children: &'a BTreeSet<NodeId>,
    private_parents: Vec<&'a CommitmentHash>,
    private_children: Vec<&'a CommitmentHash>,
    material_name: &'a str,
    unit: &'a str,
    quantity: String,
    creation_process: CreationProcess,
}

impl Signable for Asset {
    fn signing_bytes(&self) -> Result<Vec<u8>, SignerError> {
        let node = &self.node;
        let canonical = CanonicalAsset {
            id: &node.id,
            node_type: node.node_type,
            owner_public_key: &node.owner_public_key,
            created_time: node.created_time.as_millis(),
            updated_time: node.updated_time.as_millis(),
            is_finalized: node.is_finalized,
            public_parents: &node.public_parents,
            public_children: &node.public_children,
            private_parents: node.private_parents.hashes().collect(),
            private_children: node.private_children.hashes().collect(),
            material_name: &self.material_name,
            unit: &self.unit,
            quantity: self.quantity.normalize().to_string(),
            creation_process: self.creation_process,
        };
        serde_json::to_vec(&canonical).map_err(|e| SignerError::Canonicalization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use prov_crypto::EcCurve;

    use super::*;
    use crate::edge::DisclosedEdge;

    fn id(s: &str) -> NodeId {
        NodeId::new(s).unwrap()
    }

    fn signed_asset(key: &KeyPair) -> Asset {
        let mut asset = Asset::new(
            id("prov:a1"),
            key.public_key_pem(),
            TimeMs(1_700_000_000_000),
            "copper",
            "kg",
            Decimal::from_str("12.50").unwrap(),
        );
        asset.node.attach_parent(&id("prov:p"), "ps");
        asset.sign(&NodeSigner, key).unwrap();
        asset
    }

    fn assert_round_trip(key: &KeyPair) {
        let asset = signed_asset(key);
        assert!(asset.verify_signature(&NodeSigner).unwrap());

        let mut mutations: Vec<Asset> = Vec::new();
        let mut m = asset.clone();
        m.material_name = "tin".into();
        mutations.push(m);
        let mut m = asset.clone();
        m.quantity = Decimal::from_str("12.51").unwrap();
        mutations.push(m);
        let mut m = asset.clone();
        m.node.is_finalized = true;
        mutations.push(m);
        let mut m = asset.clone();
        m.node.updated_time = TimeMs(1);
        mutations.push(m);
        let mut m = asset.clone();
        m.node.created_time = TimeMs(1);
        mutations.push(m);
        let mut m = asset.clone();
        m.node.id = id("prov:a9");
        mutations.push(m);
        let mut m = asset.clone();
        m.unit = "t".into();
        mutations.push(m);
        let mut m = asset.clone();
        m.creation_process = CreationProcess::Transfer;
        mutations.push(m);
        let mut m = asset.clone();
        m.node.public_parents.insert(id("prov:q"));
        mutations.push(m);
        let mut m = asset.clone();
        m.node.public_children.insert(id("prov:q"));
        mutations.push(m);
        // Same key, different PEM text: the signed bytes carry the text.
        let mut m = asset.clone();
        m.node.owner_public_key = key.public_key_pem().replace('\n', "\r\n");
        mutations.push(m);
        let mut m = asset.clone();
        m.node.owner_public_key = KeyPair::generate_ecdsa(EcCurve::P256)
            .unwrap()
            .public_key_pem()
            .to_string();
        mutations.push(m);
        mutations.push(asset.with_child(&id("prov:c"), ""));
        mutations.push(asset.with_child(&id("prov:c"), "cs"));

        for mutated in mutations {
            assert!(!mutated.verify_signature(&NodeSigner).unwrap());
        }
    }

    #[test]
    fn signing_bytes_cover_every_field() {
        let key = KeyPair::generate_ecdsa(EcCurve::P256).unwrap();
        let asset = signed_asset(&key);
        let canonical: serde_json::Value = serde_json::from_slice(&asset.signing_bytes().unwrap()).unwrap();
        let fields: BTreeSet<&str> = canonical.as_object().unwrap().keys().map(String::as_str).collect();
        let expected: BTreeSet<&str> = [
            "id",
            "node_type",
            "owner_public_key",
            "created_time",
            "updated_time",
            "is_finalized",
            "public_parents",
            "public_children",
            "private_parents",
            "private_children",
            "material_name",
            "unit",
            "quantity",
            "creation_process",
        ]
        .into_iter()
        .collect();
        assert_eq!(fields, expected);
        assert!(!canonical.to_string().contains(&asset.node.signature));
    }

    #[test]
    fn rsa_signature_round_trip() {
        assert_round_trip(&KeyPair::generate_rsa(2048).unwrap());
    }

    #[test]
    fn ecdsa_signature_round_trip() {
        assert_round_trip(&KeyPair::generate_ecdsa(EcCurve::P256).unwrap());
    }

    #[test]
    fn disclosure_and_scale_do_not_change_signature() {
        let key = KeyPair::generate_ecdsa(EcCurve::P256).unwrap();
        let mut asset = signed_asset(&key);
        let edge = DisclosedEdge::new(id("prov:p"), "ps", id("prov:a1"), "").unwrap();
        assert!(asset.node.private_parents.complete(&edge));
        asset.quantity = Decimal::from_str("12.5").unwrap();
        assert!(asset.verify_signature(&NodeSigner).unwrap());
    }

    #[test]
    fn successor_links_back_to_current() {
        let key = KeyPair::generate_ecdsa(EcCurve::P256).unwrap();
        let current = signed_asset(&key);
        let next = Asset::successor_of(&current, id("prov:a2"), "new-owner", TimeMs(5), "rs");
        assert_eq!(next.creation_process, CreationProcess::Transfer);
        assert_eq!(next.quantity, current.quantity);
        assert!(next
            .node
            .private_parents
            .contains(&prov_crypto::commit("prov:a1", "rs")));

        let public = Asset::successor_of(&current, id("prov:a3"), "new-owner", TimeMs(5), "");
        assert!(public.node.public_parents.contains(current.id()));
    }

    #[test]
    fn transfer_draft_only_finalizes() {
        let key = KeyPair::generate_ecdsa(EcCurve::P256).unwrap();
        let asset = signed_asset(&key);
        let draft = asset.transfer_draft();
        assert!(draft.node.is_finalized);
        assert_eq!(draft.node.updated_time, asset.node.updated_time);
    }
}
