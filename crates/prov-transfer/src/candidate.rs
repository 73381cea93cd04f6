use std::sync::Arc;

use prov_crypto::{AlphanumericSecrets, KeyPair, NodeSigner, SecretGenerator};
use prov_graph::{Asset, CandidateId};
use prov_types::{IdGenerator, UuidIdGenerator, Visibility};
use tracing::debug;

use crate::config::TransferConfig;
use crate::error::{TransferError, TransferResult};
use crate::identity::same_key;

/// Produces the successor identities a sender offers for one transfer.
///
/// Every candidate signs the transfer draft with only its own child edge
/// attached, so claiming one reveals nothing about the others.
#[derive(Clone)]
pub struct CandidateGenerator {
    ids: Arc<dyn IdGenerator>,
    secrets: Arc<dyn SecretGenerator>,
    signer: NodeSigner,
    count: usize,
}

impl CandidateGenerator {
    pub fn new(ids: Arc<dyn IdGenerator>, secrets: Arc<dyn SecretGenerator>, count: usize) -> Self {
        Self {
            ids,
            secrets,
            signer: NodeSigner,
            count,
        }
    }

    pub fn from_config(config: &TransferConfig) -> Self {
        Self::new(
            Arc::new(UuidIdGenerator::new(config.graph_name.clone())),
            Arc::new(AlphanumericSecrets::new(config.secret_length)),
            config.candidate_count,
        )
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Sign `count` candidates for handing `asset` over.
    ///
    /// `owner` must hold the asset's key. A private successor gets a fresh
    /// secret per candidate; a public one gets none.
    pub fn generate(
        &self,
        asset: &Asset,
        owner: &KeyPair,
        successor: Visibility,
    ) -> TransferResult<Vec<CandidateId>> {
        if !same_key(owner.public_key_pem(), &asset.node.owner_public_key) {
            return Err(TransferError::InvalidArgument(format!(
                "key does not own asset {}",
                asset.id()
            )));
        }
        if asset.node.is_finalized {
            return Err(TransferError::InvalidArgument(format!(
                "asset {} was already transferred",
                asset.id()
            )));
        }

        let draft = asset.transfer_draft();
        let mut candidates = Vec::with_capacity(self.count);
        for _ in 0..self.count {
            let id = self.ids.new_id();
            let secret = if successor.is_private() {
                self.secrets.new_secret()
            } else {
                String::new()
            };
            let signature = self.signer.sign(owner, &draft.with_child(&id, &secret))?;
            candidates.push(CandidateId { id, secret, signature });
        }
        debug!(asset = %asset.id(), count = candidates.len(), "candidates signed");
        Ok(candidates)
    }
}
