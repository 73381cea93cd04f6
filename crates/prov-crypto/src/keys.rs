use std::fmt;

use openssl::ec::{EcGroup, EcKey};
use openssl::nid::Nid;
use openssl::pkey::{Id, PKey, Private, Public};
use openssl::rsa::Rsa;
use serde::{Deserialize, Serialize};

use crate::signer::SignerError;

/// Signature algorithm implied by a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyAlgorithm {
    /// RSA with PKCS#1 v1.5 padding.
    Rsa,
    /// ECDSA with DER-encoded signatures.
    Ecdsa,
}

impl KeyAlgorithm {
    fn detect(id: Id) -> Result<Self, SignerError> {
        match id {
            Id::RSA => Ok(Self::Rsa),
            Id::EC => Ok(Self::Ecdsa),
            other => Err(SignerError::UnsupportedKeyType(format!("{other:?}"))),
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rsa => write!(f, "rsa"),
            Self::Ecdsa => write!(f, "ecdsa"),
        }
    }
}

/// Named curves accepted for ECDSA key generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum EcCurve {
    P256,
    P384,
    #[default]
    P521,
}

impl EcCurve {
    fn nid(&self) -> Nid {
        match self {
            Self::P256 => Nid::X9_62_PRIME256V1,
            Self::P384 => Nid::SECP384R1,
            Self::P521 => Nid::SECP521R1,
        }
    }
}

/// A user or peer key pair held as PEM.
///
/// Immutable once built. Only the public half ever leaves the process.
#[derive(Clone)]
pub struct KeyPair {
    private_pem: String,
    public_pem: String,
    algorithm: KeyAlgorithm,
    pkey: PKey<Private>,
}

impl KeyPair {
    /// Parse a PKCS#8, PKCS#1 (RSA) or SEC1 (EC) private key.
    pub fn from_private_pem(private_pem: &str) -> Result<Self, SignerError> {
        let pkey = PKey::private_key_from_pem(private_pem.as_bytes())
            .map_err(|e| SignerError::MalformedKey(e.to_string()))?;
        let algorithm = KeyAlgorithm::detect(pkey.id())?;
        let public_pem = pem_string(pkey.public_key_to_pem()?)?;
        Ok(Self {
            private_pem: private_pem.to_string(),
            public_pem,
            algorithm,
            pkey,
        })
    }

    /// Generate a fresh RSA key pair.
    pub fn generate_rsa(bits: u32) -> Result<Self, SignerError> {
        let pkey = PKey::from_rsa(Rsa::generate(bits)?)?;
        Self::from_generated(pkey, KeyAlgorithm::Rsa)
    }

    /// Generate a fresh ECDSA key pair on `curve`.
    pub fn generate_ecdsa(curve: EcCurve) -> Result<Self, SignerError> {
        let group = EcGroup::from_curve_name(curve.nid())?;
        let pkey = PKey::from_ec_key(EcKey::generate(&group)?)?;
        Self::from_generated(pkey, KeyAlgorithm::Ecdsa)
    }

    fn from_generated(pkey: PKey<Private>, algorithm: KeyAlgorithm) -> Result<Self, SignerError> {
        Ok(Self {
            private_pem: pem_string(pkey.private_key_to_pem_pkcs8()?)?,
            public_pem: pem_string(pkey.public_key_to_pem()?)?,
            algorithm,
            pkey,
        })
    }

    pub fn private_key_pem(&self) -> &str {
        &self.private_pem
    }

    pub fn public_key_pem(&self) -> &str {
        &self.public_pem
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    pub(crate) fn pkey(&self) -> &PKey<Private> {
        &self.pkey
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("algorithm", &self.algorithm)
            .field("private", &"<redacted>")
            .finish()
    }
}

/// The public half of a key pair, parsed for verification.
#[derive(Clone)]
pub struct PublicKey {
    algorithm: KeyAlgorithm,
    pkey: PKey<Public>,
}

impl PublicKey {
    /// Parse a SubjectPublicKeyInfo PEM (`-----BEGIN PUBLIC KEY-----`).
    pub fn from_pem(public_pem: &str) -> Result<Self, SignerError> {
        let pkey = PKey::public_key_from_pem(public_pem.as_bytes())
            .map_err(|e| SignerError::MalformedKey(e.to_string()))?;
        let algorithm = KeyAlgorithm::detect(pkey.id())?;
        Ok(Self { algorithm, pkey })
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    /// DER SubjectPublicKeyInfo. Unlike the PEM text it does not depend on
    /// line endings or wrapping.
    pub fn to_der(&self) -> Result<Vec<u8>, SignerError> {
        Ok(self.pkey.public_key_to_der()?)
    }

    pub fn same_key(&self, other: &PublicKey) -> bool {
        self.pkey.public_eq(&other.pkey)
    }

    pub(crate) fn pkey(&self) -> &PKey<Public> {
        &self.pkey
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.algorithm)
    }
}

/// Whether two public key PEMs encode the same key. A PEM that does not
/// parse matches nothing.
pub fn same_public_key(a: &str, b: &str) -> bool {
    match (PublicKey::from_pem(a), PublicKey::from_pem(b)) {
        (Ok(a), Ok(b)) => a.same_key(&b),
        _ => false,
    }
}

fn pem_string(bytes: Vec<u8>) -> Result<String, SignerError> {
    String::from_utf8(bytes).map_err(|e| SignerError::MalformedKey(e.to_string()))
}
