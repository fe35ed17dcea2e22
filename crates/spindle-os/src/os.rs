use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info};

use spindle_machine::{
    AtomCompute, ConstraintMachine, ConstraintMachineBuilder, KernelProcedure, ParticleDefinition,
    StateTransformer, TransitionProcedure, TransitionToken,
};
use spindle_types::{Address, Particle, ParticleClass, Spin};

use crate::env::ConstraintScryptEnv;
use crate::error::SysError;
use crate::syscalls::{AddressChecker, ConstraintScrypt, KernelCalls, KernelScrypt};

/// The operating system of the constraint machine: loads constraint scrypts
/// and kernel drivers, accumulates their registrations, and compiles the
/// result into an immutable [`ConstraintMachine`].
///
/// The RRI particle is registered up front; it is the low-level particle the
/// OS uses to manage allocation of every other resource.
pub struct AtomOs {
    address_checker: AddressChecker,
    definitions: HashMap<ParticleClass, ParticleDefinition>,
    procedures: HashMap<TransitionToken, Box<dyn TransitionProcedure>>,
    kernel_procedures: Vec<KernelProcedure>,
    computes: Vec<(String, AtomCompute)>,
    compute_keys: HashSet<String>,
}

impl AtomOs {
    /// An OS whose address checker admits only the given universe magic.
    pub fn new(universe_magic: u8) -> Self {
        Self::with_address_checker(Arc::new(move |address: &Address| {
            if address.magic == universe_magic {
                Ok(())
            } else {
                Err(format!("{address} belongs to another universe"))
            }
        }))
    }

    pub fn with_address_checker(address_checker: AddressChecker) -> Self {
        let mut os = Self {
            address_checker,
            definitions: HashMap::new(),
            procedures: HashMap::new(),
            kernel_procedures: Vec::new(),
            computes: Vec::new(),
            compute_keys: HashSet::new(),
        };
        os.register_rri_particle();
        os
    }

    fn register_rri_particle(&mut self) {
        let checker = self.address_checker.clone();
        let definition = ParticleDefinition::new(
            Arc::new(|particle: &Particle| match particle {
                Particle::Rri(p) => BTreeSet::from([p.rri.address().euid()]),
                _ => BTreeSet::new(),
            }),
            Arc::new(move |particle: &Particle| match particle {
                Particle::Rri(p) => checker(p.rri.address()),
                _ => Err("expected an rri particle".into()),
            }),
        )
        .with_rri_mapper(Arc::new(|particle: &Particle| match particle {
            Particle::Rri(p) => Some(p.rri.clone()),
            _ => None,
        }))
        .allow_transitions_from_outside_scrypts();

        self.definitions.insert(ParticleClass::Rri, definition);
    }

    /// Load a constraint scrypt. Its registrations become visible to later
    /// scrypts; a scrypt that fails mid-way contributes nothing.
    pub fn load(&mut self, scrypt: &dyn ConstraintScrypt) -> Result<(), SysError> {
        let taken: HashSet<TransitionToken> = self.procedures.keys().copied().collect();
        let mut env =
            ConstraintScryptEnv::new(&self.definitions, &taken, self.address_checker.clone());
        scrypt.main(&mut env)?;

        let (definitions, procedures) = env.into_parts();
        debug!(
            definitions = definitions.len(),
            procedures = procedures.len(),
            "constraint scrypt loaded"
        );
        self.definitions.extend(definitions);
        self.procedures.extend(procedures);
        Ok(())
    }

    /// Load a kernel driver scrypt: atom-wide predicates and computes.
    pub fn load_kernel(&mut self, driver: &dyn KernelScrypt) -> Result<(), SysError> {
        struct KernelEnv<'a> {
            os: &'a mut AtomOs,
        }

        impl KernelCalls for KernelEnv<'_> {
            fn require(&mut self, check: KernelProcedure) {
                self.os.kernel_procedures.push(check);
            }

            fn compute(&mut self, key: &str, compute: AtomCompute) -> Result<(), SysError> {
                if !self.os.compute_keys.insert(key.to_string()) {
                    return Err(SysError::DuplicateComputeKey(key.to_string()));
                }
                self.os.computes.push((key.to_string(), compute));
                Ok(())
            }
        }

        driver.main(&mut KernelEnv { os: self })
    }

    /// Compile everything loaded so far into an immutable machine, with the
    /// standard state transformers installed: the default-destination
    /// transformer first, the RRI zero-nonce transformer last so it has the
    /// final word.
    pub fn build_machine(self) -> Result<ConstraintMachine, SysError> {
        let mut builder = ConstraintMachineBuilder::new();

        let transformer_definitions = Arc::new(self.definitions.clone());

        for (class, definition) in self.definitions {
            builder.register_definition(class, definition)?;
        }
        for (token, procedure) in self.procedures {
            builder.add_procedure(token, procedure)?;
        }
        for kernel_procedure in self.kernel_procedures {
            builder.add_kernel_procedure(kernel_procedure);
        }
        for (key, compute) in self.computes {
            builder.add_compute(key, compute)?;
        }

        // A never-stored particle is legitimate at Neutral when its declared
        // destinations are exactly what its registered mapper computes.
        builder.state_transformer(StateTransformer::new(
            Arc::new(move |particle: &Particle| {
                transformer_definitions
                    .get(&particle.class())
                    .map(|definition| {
                        let computed = definition.map_destinations(particle);
                        !computed.is_empty() && computed == *particle.destinations()
                    })
                    .unwrap_or(false)
            }),
            Spin::Neutral,
        ));

        // An unused RRI claim is implicitly available.
        builder.state_transformer(StateTransformer::new(
            Arc::new(|particle: &Particle| {
                matches!(particle, Particle::Rri(p) if p.nonce == 0)
            }),
            Spin::Up,
        ));

        info!("constraint machine built");
        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syscalls::SysCalls;
    use spindle_types::{PublicKey, Rri, RriParticle, UniqueParticle};

    fn address(fill: u8) -> Address {
        Address::new(2, PublicKey([fill; 32]))
    }

    struct UniqueScrypt;

    impl ConstraintScrypt for UniqueScrypt {
        fn main(&self, os: &mut dyn SysCalls) -> Result<(), SysError> {
            os.register_particle_with_rri(
                ParticleClass::Unique,
                Arc::new(|particle: &Particle| match particle {
                    Particle::Unique(p) => p.address,
                    _ => Address::new(0, PublicKey([0; 32])),
                }),
                Arc::new(|_: &Particle| Ok(())),
                Arc::new(|particle: &Particle| match particle {
                    Particle::Unique(p) => p.rri(),
                    _ => None,
                }),
            )?;
            os.create_transition_from_rri(ParticleClass::Unique)
        }
    }

    #[test]
    fn loading_the_same_scrypt_twice_duplicates_its_definitions() {
        let mut os = AtomOs::new(2);
        os.load(&UniqueScrypt).unwrap();
        assert_eq!(
            os.load(&UniqueScrypt),
            Err(SysError::DuplicateDefinition(ParticleClass::Unique))
        );
    }

    #[test]
    fn rri_particle_is_preregistered_and_usable_from_any_scrypt() {
        let mut os = AtomOs::new(2);
        // UniqueScrypt registers a transition consuming the OS-owned rri.
        os.load(&UniqueScrypt).unwrap();
        let machine = os.build_machine().unwrap();
        assert!(machine.definition(ParticleClass::Rri).is_some());
        assert!(machine.definition(ParticleClass::Unique).is_some());
    }

    #[test]
    fn transition_for_unregistered_class_is_rejected() {
        struct BadScrypt;
        impl ConstraintScrypt for BadScrypt {
            fn main(&self, os: &mut dyn SysCalls) -> Result<(), SysError> {
                os.create_transition_from_rri(ParticleClass::Unique)
            }
        }

        let mut os = AtomOs::new(2);
        assert_eq!(
            os.load(&BadScrypt),
            Err(SysError::NotRegistered(ParticleClass::Unique))
        );
    }

    #[test]
    fn foreign_universe_addresses_fail_the_wrapped_static_check() {
        let mut os = AtomOs::new(2);
        os.load(&UniqueScrypt).unwrap();
        let machine = os.build_machine().unwrap();

        let definition = machine.definition(ParticleClass::Unique).unwrap();
        let local = Particle::Unique(UniqueParticle::new(address(1), "id", 0));
        assert!(definition.check(&local).is_ok());

        let foreign = Particle::Unique(UniqueParticle::new(
            Address::new(9, PublicKey([1; 32])),
            "id",
            0,
        ));
        assert!(definition.check(&foreign).is_err());
    }

    #[test]
    fn rri_definition_maps_the_resource_address() {
        let os = AtomOs::new(2);
        let machine = os.build_machine().unwrap();
        let definition = machine.definition(ParticleClass::Rri).unwrap();

        let rri = Rri::of(address(5), "token").unwrap();
        let particle = Particle::Rri(RriParticle::new(rri.clone()));
        assert_eq!(definition.rri(&particle), Some(rri));
        assert_eq!(
            definition.map_destinations(&particle),
            BTreeSet::from([address(5).euid()])
        );
    }

    #[test]
    fn duplicate_compute_keys_are_rejected() {
        struct Driver;
        impl KernelScrypt for Driver {
            fn main(&self, kernel: &mut dyn KernelCalls) -> Result<(), SysError> {
                kernel.compute("timestamp", Box::new(|_| serde_json::Value::Null))?;
                kernel.compute("timestamp", Box::new(|_| serde_json::Value::Null))
            }
        }

        let mut os = AtomOs::new(2);
        assert_eq!(
            os.load_kernel(&Driver),
            Err(SysError::DuplicateComputeKey("timestamp".into()))
        );
    }
}
