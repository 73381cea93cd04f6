use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};

/// Length of a SHA-512 digest.
pub const DIGEST_LEN: usize = 64;

/// Disclosure commitment: base64 of `SHA-512(id ‖ secret)`.
///
/// There is no salt or domain tag: both parties recompute the same value
/// independently, so the encoding must be stable across processes.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommitmentHash(String);

impl CommitmentHash {
    /// Parse a transmitted commitment, checking it decodes to a digest.
    pub fn from_base64(encoded: &str) -> Result<Self, CommitmentError> {
        let raw = STANDARD
            .decode(encoded)
            .map_err(|e| CommitmentError::InvalidEncoding(e.to_string()))?;
        if raw.len() != DIGEST_LEN {
            return Err(CommitmentError::InvalidLength {
                expected: DIGEST_LEN,
                actual: raw.len(),
            });
        }
        Ok(Self(encoded.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short hex prefix for log lines.
    pub fn short(&self) -> String {
        match STANDARD.decode(&self.0) {
            Ok(raw) => hex::encode(&raw[..6.min(raw.len())]),
            Err(_) => self.0.chars().take(12).collect(),
        }
    }
}

impl TryFrom<String> for CommitmentHash {
    type Error = CommitmentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_base64(&value)
    }
}

impl From<CommitmentHash> for String {
    fn from(hash: CommitmentHash) -> Self {
        hash.0
    }
}

impl fmt::Debug for CommitmentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommitmentHash({}..)", self.short())
    }
}

impl fmt::Display for CommitmentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Commit to an `(id, secret)` pair.
pub fn commit(id: &str, secret: &str) -> CommitmentHash {
    let mut hasher = Sha512::new();
    hasher.update(id.as_bytes());
    hasher.update(secret.as_bytes());
    CommitmentHash(STANDARD.encode(hasher.finalize()))
}

/// Recompute the commitment for `(id, secret)` and compare.
pub fn verify(id: &str, secret: &str, claimed: &CommitmentHash) -> bool {
    commit(id, secret) == *claimed
}

/// Errors from parsing commitments.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommitmentError {
    #[error("invalid commitment encoding: {0}")]
    InvalidEncoding(String),
    #[error("invalid commitment length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn commit_is_deterministic() {
        assert_eq!(commit("prov:a", "s3cret"), commit("prov:a", "s3cret"));
    }

    #[test]
    fn commit_hashes_the_concatenation() {
        let expected = STANDARD.encode(Sha512::digest(b"prov:as3cret"));
        assert_eq!(commit("prov:a", "s3cret").as_str(), expected);
    }

    #[test]
    fn parse_round_trips_and_rejects_garbage() {
        let hash = commit("id", "secret");
        assert_eq!(CommitmentHash::from_base64(hash.as_str()).unwrap(), hash);
        assert!(matches!(
            CommitmentHash::from_base64("!!!"),
            Err(CommitmentError::InvalidEncoding(_))
        ));
        assert_eq!(
            CommitmentHash::from_base64(&STANDARD.encode(b"short")),
            Err(CommitmentError::InvalidLength {
                expected: DIGEST_LEN,
                actual: 5
            })
        );
    }

    #[test]
    fn serde_validates() {
        let hash = commit("id", "secret");
        let json = serde_json::to_string(&hash).unwrap();
        let back: CommitmentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
        assert!(serde_json::from_str::<CommitmentHash>("\"abc\"").is_err());
    }

    fn mutate(s: &str, index: usize, replacement: char) -> Option<String> {
        let mut chars: Vec<char> = s.chars().collect();
        let slot = chars.get_mut(index % s.chars().count().max(1))?;
        if *slot == replacement {
            return None;
        }
        *slot = replacement;
        Some(chars.into_iter().collect())
    }

    proptest! {
        #[test]
        fn verify_accepts_own_commitment(id in "[a-z]{1,8}:[a-zA-Z0-9-]{1,36}", secret in "[a-zA-Z0-9]{0,32}") {
            let hash = commit(&id, &secret);
            prop_assert!(verify(&id, &secret, &hash));
        }

        #[test]
        fn single_char_mutation_of_id_fails(id in "[a-zA-Z0-9]{1,36}", secret in "[a-zA-Z0-9]{1,32}", index in 0usize..64, c in proptest::char::range('a', 'z')) {
            let hash = commit(&id, &secret);
            if let Some(mutated) = mutate(&id, index, c) {
                prop_assert!(!verify(&mutated, &secret, &hash));
            }
        }

        #[test]
        fn single_char_mutation_of_secret_fails(id in "[a-zA-Z0-9]{1,36}", secret in "[a-zA-Z0-9]{1,32}", index in 0usize..64, c in proptest::char::range('A', 'Z')) {
            let hash = commit(&id, &secret);
            if let Some(mutated) = mutate(&secret, index, c) {
                prop_assert!(!verify(&id, &mutated, &hash));
            }
        }
    }
}
