use prov_crypto::{same_public_key, KeyPair};
use prov_types::{Namespace, UserId};

/// The local user a node acts for.
#[derive(Clone, Debug)]
pub struct LocalIdentity {
    pub user_id: UserId,
    pub key: KeyPair,
}

impl LocalIdentity {
    pub fn new(user_id: UserId, key: KeyPair) -> Self {
        Self { user_id, key }
    }

    /// Cache namespace of this user.
    pub fn namespace(&self) -> Namespace {
        Namespace::for_user(self.user_id)
    }

    pub fn public_key_pem(&self) -> &str {
        self.key.public_key_pem()
    }

    /// Whether `pem` is this identity's public key.
    pub fn owns_key(&self, pem: &str) -> bool {
        same_key(self.key.public_key_pem(), pem)
    }
}

/// Key equality on the parsed keys, so PEM line endings and wrapping do
/// not matter.
pub(crate) fn same_key(a: &str, b: &str) -> bool {
    same_public_key(a, b)
}
