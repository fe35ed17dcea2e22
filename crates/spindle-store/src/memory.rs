use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use tracing::debug;

use spindle_types::{Atom, Euid, Particle, Spin};

use crate::{EngineStore, StoreError};

/// A non-persistent engine store backed by a guarded map. Serves every
/// shard. Suitable for tests and single-node deployments.
pub struct InMemoryEngineStore {
    particles: RwLock<HashMap<Particle, (Spin, Atom)>>,
}

impl InMemoryEngineStore {
    pub fn new() -> Self {
        Self {
            particles: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.particles.read().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryEngineStore {
    fn default() -> Self {
        Self::new()
    }
}

/// A pushed spin is storable when it lies strictly ahead of the current
/// spin. Skipping `Up` is allowed: a virtualized particle is consumed
/// without ever being stored at `Up`.
fn advanceable(current: Spin, pushed: Spin) -> bool {
    matches!(
        (current, pushed),
        (Spin::Neutral, Spin::Up) | (Spin::Neutral, Spin::Down) | (Spin::Up, Spin::Down)
    )
}

impl EngineStore for InMemoryEngineStore {
    fn supports(&self, _destinations: &BTreeSet<Euid>) -> bool {
        true
    }

    fn get_spin(&self, particle: &Particle) -> Result<Spin, StoreError> {
        let particles = self.particles.read().map_err(|_| StoreError::Lock)?;
        Ok(particles
            .get(particle)
            .map(|(spin, _)| *spin)
            .unwrap_or(Spin::Neutral))
    }

    fn get_atom_containing(
        &self,
        particle: &Particle,
        _is_input: bool,
    ) -> Result<Option<Atom>, StoreError> {
        let particles = self.particles.read().map_err(|_| StoreError::Lock)?;
        Ok(particles.get(particle).map(|(_, atom)| atom.clone()))
    }

    fn store_atom(&self, atom: &Atom) -> Result<(), StoreError> {
        let mut particles = self.particles.write().map_err(|_| StoreError::Lock)?;

        // First pass: every push must advance, or nothing is applied.
        let mut pending: HashMap<&Particle, Spin> = HashMap::new();
        for group in atom.groups() {
            for spun in group.particles() {
                let current = pending
                    .get(&spun.particle)
                    .copied()
                    .or_else(|| particles.get(&spun.particle).map(|(spin, _)| *spin))
                    .unwrap_or(Spin::Neutral);
                if !advanceable(current, spun.spin) {
                    return Err(StoreError::SpinConflict {
                        particle: spun.particle.to_string(),
                        from: current,
                        to: spun.spin,
                    });
                }
                pending.insert(&spun.particle, spun.spin);
            }
        }

        for (particle, spin) in pending {
            particles.insert(particle.clone(), (spin, atom.clone()));
        }

        debug!(aid = %atom.aid(), "atom stored");
        Ok(())
    }
}
