use std::sync::Arc;

use spindle_store::EngineStore;
use spindle_types::{Particle, Spin};

use crate::error::{CmError, CmErrorKind};

/// Predicate deciding whether a transformer speaks for a particle.
pub type SpinPredicate = Arc<dyn Fn(&Particle) -> bool + Send + Sync>;

/// A predicate-driven override of the base store's answer for never-stored
/// particles. Transformers form a stack: each matching transformer in
/// registration order overrides the spin reported so far, so the last
/// registered has the final word.
#[derive(Clone)]
pub struct StateTransformer {
    predicate: SpinPredicate,
    virtual_spin: Spin,
}

impl StateTransformer {
    pub fn new(predicate: SpinPredicate, virtual_spin: Spin) -> Self {
        Self {
            predicate,
            virtual_spin,
        }
    }

    pub fn applies_to(&self, particle: &Particle) -> bool {
        (self.predicate)(particle)
    }

    pub fn virtual_spin(&self) -> Spin {
        self.virtual_spin
    }
}

/// Resolve a particle's effective spin through the transformer stack.
///
/// A particle the base store has seen keeps its stored spin untouched. A
/// never-stored particle must be claimed by at least one transformer to have
/// legitimate provenance; otherwise it is a missing dependency.
pub fn resolve_spin(
    store: &dyn EngineStore,
    transformers: &[StateTransformer],
    particle: &Particle,
) -> Result<Spin, CmError> {
    let stored = store.get_spin(particle)?;
    if stored != Spin::Neutral {
        return Ok(stored);
    }

    let mut spin = Spin::Neutral;
    let mut claimed = false;
    for transformer in transformers {
        if transformer.applies_to(particle) {
            spin = transformer.virtual_spin();
            claimed = true;
        }
    }

    if !claimed {
        return Err(CmError::of(
            CmErrorKind::MissingDependency,
            format!("{particle} has no provenance in this store"),
        ));
    }

    Ok(spin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use spindle_store::InMemoryEngineStore;
    use spindle_types::{
        Address, Particle, ParticleGroup, PublicKey, Rri, RriParticle, SpunParticle,
        UniqueParticle,
    };

    fn test_address() -> Address {
        Address::new(2, PublicKey([1; 32]))
    }

    fn rri_particle(nonce: u64) -> Particle {
        let rri = Rri::of(test_address(), "token").unwrap();
        Particle::Rri(RriParticle::with_nonce(rri, nonce))
    }

    fn unique_particle() -> Particle {
        Particle::Unique(UniqueParticle::new(test_address(), "id", 0))
    }

    fn accept_all_neutral() -> StateTransformer {
        StateTransformer::new(Arc::new(|_| true), Spin::Neutral)
    }

    fn rri_zero_nonce_up() -> StateTransformer {
        StateTransformer::new(
            Arc::new(|p: &Particle| matches!(p, Particle::Rri(rri) if rri.nonce == 0)),
            Spin::Up,
        )
    }

    #[test]
    fn unclaimed_particle_is_a_missing_dependency() {
        let store = InMemoryEngineStore::new();
        let err = resolve_spin(&store, &[], &unique_particle()).unwrap_err();
        assert_eq!(err.kind, CmErrorKind::MissingDependency);
    }

    #[test]
    fn later_transformers_override_earlier_ones() {
        let store = InMemoryEngineStore::new();
        let stack = [accept_all_neutral(), rri_zero_nonce_up()];

        assert_eq!(
            resolve_spin(&store, &stack, &rri_particle(0)).unwrap(),
            Spin::Up
        );
        assert_eq!(
            resolve_spin(&store, &stack, &rri_particle(7)).unwrap(),
            Spin::Neutral
        );
        assert_eq!(
            resolve_spin(&store, &stack, &unique_particle()).unwrap(),
            Spin::Neutral
        );
    }

    #[test]
    fn stored_spin_wins_over_virtualization() {
        let store = InMemoryEngineStore::new();
        let particle = rri_particle(0);
        let atom = spindle_types::Atom::new(vec![ParticleGroup::of(vec![
            SpunParticle::down(particle.clone()),
        ])
        .unwrap()]);
        store.store_atom(&atom).unwrap();

        let stack = [accept_all_neutral(), rri_zero_nonce_up()];
        assert_eq!(
            resolve_spin(&store, &stack, &particle).unwrap(),
            Spin::Down
        );
    }
}
