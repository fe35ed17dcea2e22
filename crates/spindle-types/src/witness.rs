use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ids::{Euid, PublicKey, Signature};

/// The witness oracle a transition procedure validates against.
///
/// The engine does not verify signatures itself; whoever assembled the
/// bundle vouches for them.
pub trait WitnessData {
    fn is_signed_by(&self, key: &PublicKey) -> bool;
}

/// Signatures attached to an atom, keyed by signer key fingerprint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessBundle {
    signatures: HashMap<Euid, Signature>,
}

impl WitnessBundle {
    pub fn add(&mut self, key: PublicKey, signature: Signature) {
        self.signatures.insert(key.euid(), signature);
    }

    pub fn signed_by(key: PublicKey, signature: Signature) -> Self {
        let mut bundle = Self::default();
        bundle.add(key, signature);
        bundle
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }
}

impl WitnessData for WitnessBundle {
    fn is_signed_by(&self, key: &PublicKey) -> bool {
        self.signatures.contains_key(&key.euid())
    }
}
