use std::collections::HashMap;
use std::sync::Arc;

use spindle_machine::{CmError, CmErrorKind};
use spindle_types::{Particle, ParticleClass};

/// Maps a fungible particle to its quantity.
pub type AmountMapper = Arc<dyn Fn(&Particle) -> u128 + Send + Sync>;

/// A fungible resource description: which input class carries value, how to
/// read that value, and which other classes resolve to this mapper.
///
/// The `covers` chain is the explicit replacement for subclass lookup:
/// classes listed there fall back to this definition's mapper unless they
/// register one of their own.
pub struct FungibleDefinition {
    input_class: ParticleClass,
    covers: Vec<ParticleClass>,
    amount_mapper: AmountMapper,
}

impl FungibleDefinition {
    pub fn new(input_class: ParticleClass, amount_mapper: AmountMapper) -> Self {
        Self {
            input_class,
            covers: Vec::new(),
            amount_mapper,
        }
    }

    /// Declare a class whose instances fall back to this mapper.
    pub fn covering(mut self, class: ParticleClass) -> Self {
        self.covers.push(class);
        self
    }

    pub fn input_class(&self) -> ParticleClass {
        self.input_class
    }
}

/// Resolves particle instances to the quantities their fungible definitions
/// declare. Direct registrations win over fallback coverage.
pub struct ParticleValueMapper {
    mappers: HashMap<ParticleClass, AmountMapper>,
}

impl ParticleValueMapper {
    pub fn from(definitions: &[FungibleDefinition]) -> Self {
        let mut mappers: HashMap<ParticleClass, AmountMapper> = HashMap::new();

        for definition in definitions {
            mappers.insert(definition.input_class, definition.amount_mapper.clone());
        }
        for definition in definitions {
            for class in &definition.covers {
                mappers
                    .entry(*class)
                    .or_insert_with(|| definition.amount_mapper.clone());
            }
        }

        Self { mappers }
    }

    /// The quantity mapped for this particle instance.
    pub fn amount(&self, particle: &Particle) -> Result<u128, CmError> {
        let mapper = self.mappers.get(&particle.class()).ok_or_else(|| {
            CmError::of(
                CmErrorKind::UnknownParticle,
                format!("no amount mapper for class {}", particle.class()),
            )
        })?;
        Ok(mapper(particle))
    }
}
