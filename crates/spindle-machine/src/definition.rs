use std::collections::BTreeSet;
use std::sync::Arc;

use spindle_types::{Euid, Particle, Rri};

/// Maps a particle to the shard destinations it must be stored in.
pub type ShardMapper = Arc<dyn Fn(&Particle) -> BTreeSet<Euid> + Send + Sync>;

/// A pure per-particle validity check. Failures are reported as messages.
pub type StaticCheck = Arc<dyn Fn(&Particle) -> Result<(), String> + Send + Sync>;

/// Maps a particle to the resource identifier it is indexed by, when it has
/// one. `None` means the particle names no resource.
pub type RriMapper = Arc<dyn Fn(&Particle) -> Option<Rri> + Send + Sync>;

/// Everything the machine knows about one particle class.
#[derive(Clone)]
pub struct ParticleDefinition {
    shard_mapper: ShardMapper,
    static_check: StaticCheck,
    rri_mapper: Option<RriMapper>,
    allows_transitions_from_outside_scrypts: bool,
}

impl ParticleDefinition {
    pub fn new(shard_mapper: ShardMapper, static_check: StaticCheck) -> Self {
        Self {
            shard_mapper,
            static_check,
            rri_mapper: None,
            allows_transitions_from_outside_scrypts: false,
        }
    }

    pub fn with_rri_mapper(mut self, rri_mapper: RriMapper) -> Self {
        self.rri_mapper = Some(rri_mapper);
        self
    }

    pub fn allow_transitions_from_outside_scrypts(mut self) -> Self {
        self.allows_transitions_from_outside_scrypts = true;
        self
    }

    /// The destinations the registered mapper computes for this particle.
    pub fn map_destinations(&self, particle: &Particle) -> BTreeSet<Euid> {
        (self.shard_mapper)(particle)
    }

    pub fn check(&self, particle: &Particle) -> Result<(), String> {
        (self.static_check)(particle)
    }

    pub fn rri_mapper(&self) -> Option<&RriMapper> {
        self.rri_mapper.as_ref()
    }

    pub fn rri(&self, particle: &Particle) -> Option<Rri> {
        self.rri_mapper.as_ref().and_then(|mapper| mapper(particle))
    }

    pub fn allows_transitions_from_outside_scrypts(&self) -> bool {
        self.allows_transitions_from_outside_scrypts
    }
}

impl std::fmt::Debug for ParticleDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParticleDefinition")
            .field("has_rri_mapper", &self.rri_mapper.is_some())
            .field(
                "allows_transitions_from_outside_scrypts",
                &self.allows_transitions_from_outside_scrypts,
            )
            .finish()
    }
}
