use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::ids::{Address, Euid, Rri};

/// Class discriminant of a particle, used as the registration key for
/// definitions and transition procedures.
///
/// `Void` never names a concrete particle; it marks the empty side of a
/// transition token (creation from nothing, or consumption to nothing).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ParticleClass {
    Void,
    Rri,
    Unique,
    Message,
}

impl std::fmt::Display for ParticleClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParticleClass::Void => write!(f, "void"),
            ParticleClass::Rri => write!(f, "rri"),
            ParticleClass::Unique => write!(f, "unique"),
            ParticleClass::Message => write!(f, "message"),
        }
    }
}

/// An immutable piece of application state whose existence is a function of
/// its spin. Identity is by value equality.
///
/// Each variant carries the destination set it *declares*; whether that set
/// matches what the registered shard mapper computes is checked by the
/// machine's virtualization layer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Particle {
    Rri(RriParticle),
    Unique(UniqueParticle),
    Message(MessageParticle),
}

impl Particle {
    pub fn class(&self) -> ParticleClass {
        match self {
            Particle::Rri(_) => ParticleClass::Rri,
            Particle::Unique(_) => ParticleClass::Unique,
            Particle::Message(_) => ParticleClass::Message,
        }
    }

    /// The destination set this particle declares.
    pub fn destinations(&self) -> &BTreeSet<Euid> {
        match self {
            Particle::Rri(p) => &p.destinations,
            Particle::Unique(p) => &p.destinations,
            Particle::Message(p) => &p.destinations,
        }
    }
}

impl std::fmt::Display for Particle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Particle::Rri(p) => write!(f, "rri({}, nonce={})", p.rri, p.nonce),
            Particle::Unique(p) => write!(f, "unique({}, {})", p.address, p.name),
            Particle::Message(p) => write!(f, "message({} -> {})", p.from, p.to),
        }
    }
}

/// The OS-level resource claim particle. An unused claim (nonce 0) is
/// virtually `Up`, so consuming it allocates the resource it names.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RriParticle {
    pub rri: Rri,
    pub nonce: u64,
    pub destinations: BTreeSet<Euid>,
}

impl RriParticle {
    pub fn new(rri: Rri) -> Self {
        let destinations = BTreeSet::from([rri.address().euid()]);
        Self { rri, nonce: 0, destinations }
    }

    pub fn with_nonce(rri: Rri, nonce: u64) -> Self {
        let destinations = BTreeSet::from([rri.address().euid()]);
        Self { rri, nonce, destinations }
    }
}

/// A one-shot unique identifier bound to an RRI.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UniqueParticle {
    pub address: Address,
    pub name: String,
    pub nonce: u64,
    pub destinations: BTreeSet<Euid>,
}

impl UniqueParticle {
    pub fn new(address: Address, name: impl Into<String>, nonce: u64) -> Self {
        let destinations = BTreeSet::from([address.euid()]);
        Self { address, name: name.into(), nonce, destinations }
    }

    /// The RRI this unique id claims, if the name is well-formed.
    pub fn rri(&self) -> Option<Rri> {
        Rri::of(self.address, self.name.clone()).ok()
    }
}

/// A two-address payload particle.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageParticle {
    pub from: Address,
    pub to: Address,
    pub payload: Vec<u8>,
    pub nonce: u64,
    pub destinations: BTreeSet<Euid>,
}

impl MessageParticle {
    pub fn new(from: Address, to: Address, payload: impl Into<Vec<u8>>, nonce: u64) -> Self {
        let destinations = BTreeSet::from([from.euid(), to.euid()]);
        Self { from, to, payload: payload.into(), nonce, destinations }
    }
}
