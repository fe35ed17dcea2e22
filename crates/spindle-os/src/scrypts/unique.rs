use std::collections::BTreeSet;
use std::sync::Arc;

use spindle_types::{Particle, ParticleClass};

use crate::error::SysError;
use crate::syscalls::{ConstraintScrypt, SysCalls};

/// Atom model for one-shot unique identifiers.
///
/// A unique id is claimed by consuming the RRI it names: the id's address
/// and name form the resource identifier, and the claim must be witnessed
/// by the address's signing key.
pub struct UniqueIdScrypt;

impl ConstraintScrypt for UniqueIdScrypt {
    fn main(&self, os: &mut dyn SysCalls) -> Result<(), SysError> {
        os.register_particle_multi(
            ParticleClass::Unique,
            Arc::new(|particle: &Particle| match particle {
                Particle::Unique(p) => BTreeSet::from([p.address]),
                _ => BTreeSet::new(),
            }),
            Arc::new(|particle: &Particle| match particle {
                Particle::Unique(p) if p.name.is_empty() => Err("unique name is empty".into()),
                Particle::Unique(_) => Ok(()),
                _ => Err("expected a unique particle".into()),
            }),
            Some(Arc::new(|particle: &Particle| match particle {
                Particle::Unique(p) => p.rri(),
                _ => None,
            })),
        )?;

        os.create_transition_from_rri(ParticleClass::Unique)
    }
}
