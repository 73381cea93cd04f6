use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use openssl::hash::MessageDigest;
use openssl::sign::{Signer, Verifier};
use prov_types::ErrorKind;

use crate::keys::{KeyPair, PublicKey};

/// A value with a stable, signature-free byte encoding.
///
/// Implementations must exclude their own signature field and must
/// serialize collections in a deterministic order.
pub trait Signable {
    fn signing_bytes(&self) -> Result<Vec<u8>, SignerError>;
}

/// Produces and checks detached SHA-512 signatures over [`Signable`] values.
///
/// RSA keys sign with PKCS#1 v1.5 padding, EC keys with DER-encoded ECDSA.
/// Signatures travel as standard base64.
#[derive(Clone, Copy, Debug, Default)]
pub struct NodeSigner;

impl NodeSigner {
    pub fn sign<T: Signable + ?Sized>(&self, key: &KeyPair, value: &T) -> Result<String, SignerError> {
        let message = value.signing_bytes()?;
        let mut signer = Signer::new(MessageDigest::sha512(), key.pkey())?;
        signer.update(&message)?;
        Ok(STANDARD.encode(signer.sign_to_vec()?))
    }

    /// Verify against a PEM public key.
    pub fn verify<T: Signable + ?Sized>(
        &self,
        public_pem: &str,
        value: &T,
        signature: &str,
    ) -> Result<bool, SignerError> {
        let key = PublicKey::from_pem(public_pem)?;
        self.verify_with(&key, value, signature)
    }

    /// Verify against an already-parsed public key.
    ///
    /// Returns `Ok(false)` for a well-formed signature that does not match,
    /// including DER the verifier refuses to parse.
    pub fn verify_with<T: Signable + ?Sized>(
        &self,
        key: &PublicKey,
        value: &T,
        signature: &str,
    ) -> Result<bool, SignerError> {
        let raw = STANDARD
            .decode(signature)
            .map_err(|e| SignerError::MalformedSignature(e.to_string()))?;
        let message = value.signing_bytes()?;
        let mut verifier = Verifier::new(MessageDigest::sha512(), key.pkey())?;
        verifier.update(&message)?;
        Ok(verifier.verify(&raw).unwrap_or(false))
    }
}

/// Errors from key handling and signing operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignerError {
    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),
    #[error("malformed key: {0}")]
    MalformedKey(String),
    #[error("malformed signature: {0}")]
    MalformedSignature(String),
    #[error("canonical encoding failed: {0}")]
    Canonicalization(String),
    #[error("crypto library error: {0}")]
    Crypto(String),
}

impl SignerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedKeyType(_) | Self::MalformedKey(_) | Self::MalformedSignature(_) => {
                ErrorKind::InvalidArgument
            }
            Self::Canonicalization(_) | Self::Crypto(_) => ErrorKind::Internal,
        }
    }
}

impl From<openssl::error::ErrorStack> for SignerError {
    fn from(err: openssl::error::ErrorStack) -> Self {
        Self::Crypto(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::keys::EcCurve;

    #[derive(Clone, serde::Serialize)]
    struct Payload {
        id: String,
        fields: BTreeMap<String, String>,
    }

    impl Signable for Payload {
        fn signing_bytes(&self) -> Result<Vec<u8>, SignerError> {
            serde_json::to_vec(self).map_err(|e| SignerError::Canonicalization(e.to_string()))
        }
    }

    fn payload() -> Payload {
        let mut fields = BTreeMap::new();
        fields.insert("material".to_string(), "copper".to_string());
        fields.insert("unit".to_string(), "kg".to_string());
        Payload {
            id: "prov:1".to_string(),
            fields,
        }
    }

    fn round_trip(key: &KeyPair) {
        let signer = NodeSigner;
        let value = payload();
        let signature = signer.sign(key, &value).unwrap();
        assert!(signer.verify(key.public_key_pem(), &value, &signature).unwrap());

        let mut tampered = value.clone();
        tampered.fields.insert("unit".to_string(), "g".to_string());
        assert!(!signer.verify(key.public_key_pem(), &tampered, &signature).unwrap());

        let mut renamed = value;
        renamed.id = "prov:2".to_string();
        assert!(!signer.verify(key.public_key_pem(), &renamed, &signature).unwrap());
    }

    #[test]
    fn rsa_sign_and_verify() {
        round_trip(&KeyPair::generate_rsa(2048).unwrap());
    }

    #[test]
    fn ecdsa_sign_and_verify() {
        round_trip(&KeyPair::generate_ecdsa(EcCurve::P256).unwrap());
    }

    #[test]
    fn wrong_key_fails() {
        let signer = NodeSigner;
        let a = KeyPair::generate_ecdsa(EcCurve::P256).unwrap();
        let b = KeyPair::generate_ecdsa(EcCurve::P256).unwrap();
        let signature = signer.sign(&a, &payload()).unwrap();
        assert!(!signer.verify(b.public_key_pem(), &payload(), &signature).unwrap());
    }

    #[test]
    fn non_base64_signature_is_malformed() {
        let key = KeyPair::generate_ecdsa(EcCurve::P256).unwrap();
        assert!(matches!(
            NodeSigner.verify(key.public_key_pem(), &payload(), "%%%"),
            Err(SignerError::MalformedSignature(_))
        ));
    }

    #[test]
    fn garbage_der_does_not_verify() {
        let key = KeyPair::generate_ecdsa(EcCurve::P256).unwrap();
        let junk = STANDARD.encode(b"definitely not der");
        assert!(!NodeSigner.verify(key.public_key_pem(), &payload(), &junk).unwrap());
    }

    #[test]
    fn error_kinds() {
        assert_eq!(
            SignerError::UnsupportedKeyType("ed25519".into()).kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(SignerError::Crypto("x".into()).kind(), ErrorKind::Internal);
    }
}
