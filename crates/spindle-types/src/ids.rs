use serde::{Deserialize, Serialize};

use crate::error::AtomError;

/// Strong typed identifiers used throughout the engine.

/// An opaque 128-bit shard/destination tag. The engine uses it only for
/// equality and set operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Euid(pub u128);

impl std::fmt::Display for Euid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "euid:{:032x}", self.0)
    }
}

/// A public key. Signature verification is the caller's oracle; the engine
/// only needs equality and a stable fingerprint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
    /// Fingerprint of this key, usable as a destination tag.
    pub fn euid(&self) -> Euid {
        let mut prefix = [0u8; 16];
        prefix.copy_from_slice(&self.0[..16]);
        Euid(u128::from_be_bytes(prefix))
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "key:{:02x}{:02x}..{:02x}", self.0[0], self.0[1], self.0[31])
    }
}

/// An opaque digital signature blob.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature(pub Vec<u8>);

/// A ledger address: a public key scoped to a universe by its magic byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address {
    pub magic: u8,
    pub key: PublicKey,
}

impl Address {
    pub fn new(magic: u8, key: PublicKey) -> Self {
        Self { magic, key }
    }

    /// The destination tag this address maps to.
    pub fn euid(&self) -> Euid {
        self.key.euid()
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "addr:{}:{}", self.magic, self.key)
    }
}

/// A resource identifier: `(address, name)` globally naming a resource.
///
/// Names must match `[1-9A-Za-z]+`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Rri {
    address: Address,
    name: String,
}

impl Rri {
    /// Construct an RRI, validating the name against `[1-9A-Za-z]+`.
    pub fn of(address: Address, name: impl Into<String>) -> Result<Self, AtomError> {
        let name = name.into();
        if name.is_empty() || !name.chars().all(is_rri_name_char) {
            return Err(AtomError::IllegalRriName(name));
        }
        Ok(Self { address, name })
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

fn is_rri_name_char(c: char) -> bool {
    matches!(c, '1'..='9' | 'A'..='Z' | 'a'..='z')
}

impl std::fmt::Display for Rri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}/{}", self.address, self.name)
    }
}
