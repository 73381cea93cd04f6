use prov_crypto::{commit, CommitmentHash, NodeSigner, PublicKey};
use prov_types::NodeId;
use serde::{Deserialize, Serialize};

use crate::asset::Asset;
use crate::error::GraphResult;

/// A pre-signed successor identity offered by a sender.
///
/// `signature` authenticates the sender's transfer draft with exactly this
/// candidate attached as a child. `secret` is empty for a public candidate.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateId {
    pub id: NodeId,
    pub secret: String,
    pub signature: String,
}

impl CandidateId {
    pub fn is_private(&self) -> bool {
        !self.secret.is_empty()
    }

    /// Commitment of the edge this candidate adds, if private.
    pub fn edge_hash(&self) -> Option<CommitmentHash> {
        self.is_private()
            .then(|| commit(self.id.as_str(), &self.secret))
    }

    /// The signed form: `draft` plus this candidate's edge.
    pub fn attach_to(&self, draft: &Asset) -> Asset {
        draft.with_child(&self.id, &self.secret)
    }

    /// Check the signature against `draft` under the draft owner's key.
    pub fn verify(&self, signer: &NodeSigner, draft: &Asset) -> GraphResult<bool> {
        let key = PublicKey::from_pem(&draft.node.owner_public_key)?;
        Ok(signer.verify_with(&key, &self.attach_to(draft), &self.signature)?)
    }
}

impl std::fmt::Debug for CandidateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandidateId")
            .field("id", &self.id)
            .field("private", &self.is_private())
            .finish_non_exhaustive()
    }
}
