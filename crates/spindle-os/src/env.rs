use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use spindle_machine::{
    ParticleDefinition, RriMapper, StaticCheck, TransitionProcedure, TransitionToken, UsedData,
};
use spindle_types::{Particle, ParticleClass, WitnessData};

use crate::error::SysError;
use crate::routines::CreateCombinedTransitionRoutine;
use crate::syscalls::{AddressChecker, AddressesMapper, CombinedCheck, ConstraintRoutine, SysCalls};

/// The per-scrypt registration environment.
///
/// A scrypt sees the definitions of previously loaded scrypts (when those
/// allow it) but registers into its own local maps, which the OS merges
/// after the scrypt completes. A scrypt that fails mid-way therefore leaves
/// nothing behind.
pub struct ConstraintScryptEnv<'a> {
    loaded_definitions: &'a HashMap<ParticleClass, ParticleDefinition>,
    loaded_tokens: &'a HashSet<TransitionToken>,
    address_checker: AddressChecker,

    scrypt_definitions: HashMap<ParticleClass, ParticleDefinition>,
    scrypt_procedures: HashMap<TransitionToken, Box<dyn TransitionProcedure>>,
}

impl<'a> ConstraintScryptEnv<'a> {
    pub(crate) fn new(
        loaded_definitions: &'a HashMap<ParticleClass, ParticleDefinition>,
        loaded_tokens: &'a HashSet<TransitionToken>,
        address_checker: AddressChecker,
    ) -> Self {
        Self {
            loaded_definitions,
            loaded_tokens,
            address_checker,
            scrypt_definitions: HashMap::new(),
            scrypt_procedures: HashMap::new(),
        }
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        HashMap<ParticleClass, ParticleDefinition>,
        HashMap<TransitionToken, Box<dyn TransitionProcedure>>,
    ) {
        (self.scrypt_definitions, self.scrypt_procedures)
    }

    fn definition_exists(&self, class: ParticleClass) -> bool {
        self.loaded_definitions.contains_key(&class) || self.scrypt_definitions.contains_key(&class)
    }

    /// Look up a definition usable from this scrypt. Definitions from other
    /// scrypts are only visible when they opted into outside transitions.
    fn usable_definition(&self, class: ParticleClass) -> Result<&ParticleDefinition, SysError> {
        if let Some(definition) = self.loaded_definitions.get(&class) {
            if !definition.allows_transitions_from_outside_scrypts() {
                return Err(SysError::OutsideScrypt(class));
            }
            return Ok(definition);
        }
        self.scrypt_definitions
            .get(&class)
            .ok_or(SysError::NotRegistered(class))
    }
}

impl SysCalls for ConstraintScryptEnv<'_> {
    fn register_particle_multi(
        &mut self,
        class: ParticleClass,
        addresses: AddressesMapper,
        static_check: StaticCheck,
        rri_mapper: Option<RriMapper>,
    ) -> Result<(), SysError> {
        if self.definition_exists(class) {
            return Err(SysError::DuplicateDefinition(class));
        }

        let shard_addresses = addresses.clone();
        let checker = self.address_checker.clone();
        let check_rri_mapper = rri_mapper.clone();
        let wrapped_check: StaticCheck = Arc::new(move |particle: &Particle| {
            if let Some(rri_mapper) = &check_rri_mapper {
                let Some(rri) = rri_mapper(particle) else {
                    return Err("rri cannot be null".into());
                };
                checker(rri.address())?;
            }

            let declared = addresses(particle);
            if declared.is_empty() {
                return Err("address required".into());
            }
            for address in &declared {
                checker(address)?;
            }

            static_check(particle)
        });

        let mut definition = ParticleDefinition::new(
            Arc::new(move |particle: &Particle| {
                shard_addresses(particle)
                    .iter()
                    .map(|address| address.euid())
                    .collect()
            }),
            wrapped_check,
        );
        if let Some(rri_mapper) = rri_mapper {
            definition = definition.with_rri_mapper(rri_mapper);
        }

        debug!(%class, "particle registered");
        self.scrypt_definitions.insert(class, definition);
        Ok(())
    }

    fn create_transition_from_rri(&mut self, class: ParticleClass) -> Result<(), SysError> {
        let definition = self.usable_definition(class)?;
        if definition.rri_mapper().is_none() {
            return Err(SysError::MissingRriMapper(class));
        }

        self.create_transition(
            TransitionToken::of(ParticleClass::Rri, class),
            Box::new(RriClaimProcedure),
        )
    }

    fn create_transition_from_rri_combined(
        &mut self,
        class_a: ParticleClass,
        class_b: ParticleClass,
        combined_check: CombinedCheck,
    ) -> Result<(), SysError> {
        for class in [class_a, class_b] {
            let definition = self.usable_definition(class)?;
            if definition.rri_mapper().is_none() {
                return Err(SysError::MissingRriMapper(class));
            }
        }

        let routine = CreateCombinedTransitionRoutine::new(class_a, class_b, combined_check);
        self.execute_routine(&routine)
    }

    fn create_transition(
        &mut self,
        token: TransitionToken,
        procedure: Box<dyn TransitionProcedure>,
    ) -> Result<(), SysError> {
        if self.loaded_tokens.contains(&token) || self.scrypt_procedures.contains_key(&token) {
            return Err(SysError::DuplicateTransition(token));
        }

        for class in [token.input, token.output] {
            if class != ParticleClass::Void {
                self.usable_definition(class)?;
            }
        }

        debug!(%token, "transition registered");
        self.scrypt_procedures.insert(token, procedure);
        Ok(())
    }

    fn execute_routine(&mut self, routine: &dyn ConstraintRoutine) -> Result<(), SysError> {
        routine.main(self)
    }
}

/// Require that the witness bundle carries the signing key of an RRI
/// particle's address.
pub(crate) fn rri_signed(input: Option<&Particle>, witness: &dyn WitnessData) -> Result<(), String> {
    let Some(Particle::Rri(rri_particle)) = input else {
        return Err("expected an rri input".into());
    };
    let address = rri_particle.rri.address();
    if witness.is_signed_by(&address.key) {
        Ok(())
    } else {
        Err(format!("not signed by {address}"))
    }
}

/// The canonical one-shot claim of an RRI: consuming the RRI particle
/// produces the claiming particle, authorized by the RRI address's key.
struct RriClaimProcedure;

impl TransitionProcedure for RriClaimProcedure {
    fn precondition(
        &self,
        _input: Option<&Particle>,
        _input_used: &UsedData,
        _output: Option<&Particle>,
        _output_used: &UsedData,
    ) -> Result<(), String> {
        Ok(())
    }

    fn input_witness_validator(
        &self,
        input: Option<&Particle>,
        witness: &dyn WitnessData,
    ) -> Result<(), String> {
        rri_signed(input, witness)
    }

    fn output_witness_validator(
        &self,
        _output: Option<&Particle>,
        _witness: &dyn WitnessData,
    ) -> Result<(), String> {
        Ok(())
    }
}
