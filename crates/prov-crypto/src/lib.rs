//! Cryptographic primitives for provenance transfer.
//!
//! Provides SHA-512 disclosure commitments over `(id, secret)` pairs,
//! detached RSA/ECDSA signatures over canonical node encodings, PEM key
//! handling, and a CSPRNG-backed secret generator.
//!
//! Every primitive comes from openssl or sha2; this crate only composes them.

pub mod commitment;
pub mod keys;
pub mod secret;
pub mod signer;

pub use commitment::{commit, verify, CommitmentError, CommitmentHash};
pub use keys::{same_public_key, EcCurve, KeyAlgorithm, KeyPair, PublicKey};
pub use secret::{AlphanumericSecrets, SecretGenerator};
pub use signer::{NodeSigner, Signable, SignerError};
