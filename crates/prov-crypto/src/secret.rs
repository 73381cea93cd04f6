use rand::distributions::{Alphanumeric, DistString};
use rand::rngs::OsRng;

/// Source of fresh edge secrets.
pub trait SecretGenerator: Send + Sync {
    fn new_secret(&self) -> String;
}

/// Alphanumeric secrets drawn from the operating system CSPRNG.
#[derive(Clone, Copy, Debug)]
pub struct AlphanumericSecrets {
    length: usize,
}

impl AlphanumericSecrets {
    pub const DEFAULT_LENGTH: usize = 20;

    pub fn new(length: usize) -> Self {
        Self { length }
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

impl Default for AlphanumericSecrets {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LENGTH)
    }
}

impl SecretGenerator for AlphanumericSecrets {
    fn new_secret(&self) -> String {
        Alphanumeric.sample_string(&mut OsRng, self.length)
    }
}
