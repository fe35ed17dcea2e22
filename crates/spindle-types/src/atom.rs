use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::AtomError;
use crate::particle::Particle;
use crate::spin::Spin;
use crate::witness::WitnessBundle;

/// Content-addressed atom identifier: Sha256 of the canonical atom body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AtomId(pub [u8; 32]);

impl std::fmt::Display for AtomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0[..8] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// A particle together with the spin this instruction asserts it will hold
/// *after* execution. Only `Up` and `Down` are valid targets.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpunParticle {
    pub spin: Spin,
    pub particle: Particle,
}

impl SpunParticle {
    pub fn up(particle: Particle) -> Self {
        Self { spin: Spin::Up, particle }
    }

    pub fn down(particle: Particle) -> Self {
        Self { spin: Spin::Down, particle }
    }
}

/// An ordered, non-empty sequence of spun particles.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticleGroup(Vec<SpunParticle>);

impl ParticleGroup {
    pub fn of(particles: Vec<SpunParticle>) -> Result<Self, AtomError> {
        if particles.is_empty() {
            return Err(AtomError::EmptyGroup);
        }
        Ok(Self(particles))
    }

    pub fn particles(&self) -> &[SpunParticle] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The ledger's atomic state-change unit: an ordered list of particle groups
/// plus a witness bundle and free-form metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Atom {
    groups: Vec<ParticleGroup>,
    witnesses: WitnessBundle,
    metadata: BTreeMap<String, String>,
}

impl Atom {
    pub const METADATA_TIMESTAMP: &'static str = "timestamp";

    pub fn new(groups: Vec<ParticleGroup>) -> Self {
        Self {
            groups,
            witnesses: WitnessBundle::default(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_witnesses(mut self, witnesses: WitnessBundle) -> Self {
        self.witnesses = witnesses;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn groups(&self) -> &[ParticleGroup] {
        &self.groups
    }

    pub fn witnesses(&self) -> &WitnessBundle {
        &self.witnesses
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Number of spun particles across all groups.
    pub fn particle_count(&self) -> usize {
        self.groups.iter().map(ParticleGroup::len).sum()
    }

    /// Content address of this atom: a Sha256 over the canonical JSON
    /// encoding of the groups and metadata. Witnesses do not contribute, so
    /// signing an atom does not change its identity.
    pub fn aid(&self) -> AtomId {
        let body = serde_json::json!({
            "groups": self.groups,
            "metadata": self.metadata,
        });
        let mut hasher = Sha256::new();
        hasher.update(body.to_string().as_bytes());
        AtomId(hasher.finalize().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{Address, PublicKey, Signature};
    use crate::particle::UniqueParticle;

    fn test_particle(nonce: u64) -> Particle {
        let addr = Address::new(2, PublicKey([1; 32]));
        Particle::Unique(UniqueParticle::new(addr, "id", nonce))
    }

    #[test]
    fn groups_must_be_non_empty() {
        assert!(matches!(
            ParticleGroup::of(vec![]),
            Err(AtomError::EmptyGroup)
        ));
        assert!(ParticleGroup::of(vec![SpunParticle::up(test_particle(0))]).is_ok());
    }

    #[test]
    fn aid_is_deterministic() {
        let make = || {
            Atom::new(vec![
                ParticleGroup::of(vec![SpunParticle::up(test_particle(0))]).unwrap()
            ])
            .with_metadata(Atom::METADATA_TIMESTAMP, "100")
        };
        assert_eq!(make().aid(), make().aid());
    }

    #[test]
    fn aid_ignores_witnesses() {
        let atom = Atom::new(vec![
            ParticleGroup::of(vec![SpunParticle::up(test_particle(0))]).unwrap()
        ]);
        let unsigned_aid = atom.aid();

        let key = PublicKey([9; 32]);
        let mut witnesses = WitnessBundle::default();
        witnesses.add(key, Signature(vec![1, 2, 3]));
        let signed = atom.with_witnesses(witnesses);

        assert_eq!(unsigned_aid, signed.aid());
    }

    #[test]
    fn aid_tracks_content() {
        let a = Atom::new(vec![
            ParticleGroup::of(vec![SpunParticle::up(test_particle(0))]).unwrap()
        ]);
        let b = Atom::new(vec![
            ParticleGroup::of(vec![SpunParticle::up(test_particle(1))]).unwrap()
        ]);
        assert_ne!(a.aid(), b.aid());
    }

    #[test]
    fn particle_count_spans_groups() {
        let atom = Atom::new(vec![
            ParticleGroup::of(vec![
                SpunParticle::up(test_particle(0)),
                SpunParticle::up(test_particle(1)),
            ])
            .unwrap(),
            ParticleGroup::of(vec![SpunParticle::down(test_particle(0))]).unwrap(),
        ]);
        assert_eq!(atom.particle_count(), 3);
    }
}
