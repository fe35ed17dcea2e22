use std::collections::BTreeSet;
use std::sync::Arc;

use spindle_machine::{
    AtomCompute, KernelProcedure, RriMapper, StaticCheck, TransitionProcedure, TransitionToken,
};
use spindle_types::{Address, Particle, ParticleClass};

use crate::error::SysError;

/// Maps a particle to the single address it lives at.
pub type AddressMapper = Arc<dyn Fn(&Particle) -> Address + Send + Sync>;

/// Maps a particle to every address it lives at.
pub type AddressesMapper = Arc<dyn Fn(&Particle) -> BTreeSet<Address> + Send + Sync>;

/// A check across the two particles of a combined transition.
pub type CombinedCheck = Arc<dyn Fn(&Particle, &Particle) -> Result<(), String> + Send + Sync>;

/// Host-supplied validity check for addresses declared by particles.
pub type AddressChecker = Arc<dyn Fn(&Address) -> Result<(), String> + Send + Sync>;

/// The system-call surface constraint scrypts program against.
///
/// Registration is the only way application rules enter the machine; once
/// all scrypts are loaded the accumulated definitions and procedures are
/// compiled and frozen.
pub trait SysCalls {
    /// Primitive registration: every address mapped by `addresses` is run
    /// through the host address checker, empty address sets are rejected,
    /// and `rri_mapper` (when present) must produce an RRI for every
    /// particle of the class.
    fn register_particle_multi(
        &mut self,
        class: ParticleClass,
        addresses: AddressesMapper,
        static_check: StaticCheck,
        rri_mapper: Option<RriMapper>,
    ) -> Result<(), SysError>;

    /// Register a particle living at a single address.
    fn register_particle(
        &mut self,
        class: ParticleClass,
        address: AddressMapper,
        static_check: StaticCheck,
    ) -> Result<(), SysError> {
        self.register_particle_multi(
            class,
            Arc::new(move |particle: &Particle| BTreeSet::from([address(particle)])),
            static_check,
            None,
        )
    }

    /// Register a particle living at several addresses.
    fn register_particle_multiple_addresses(
        &mut self,
        class: ParticleClass,
        addresses: AddressesMapper,
        static_check: StaticCheck,
    ) -> Result<(), SysError> {
        self.register_particle_multi(class, addresses, static_check, None)
    }

    /// Register a particle indexed by a resource identifier.
    fn register_particle_with_rri(
        &mut self,
        class: ParticleClass,
        address: AddressMapper,
        static_check: StaticCheck,
        rri_mapper: RriMapper,
    ) -> Result<(), SysError> {
        self.register_particle_multi(
            class,
            Arc::new(move |particle: &Particle| BTreeSet::from([address(particle)])),
            static_check,
            Some(rri_mapper),
        )
    }

    /// Register the canonical one-shot claim of an RRI by a particle of the
    /// given class: trivially-true precondition, witnessed by the signing
    /// key of the RRI's address.
    fn create_transition_from_rri(&mut self, class: ParticleClass) -> Result<(), SysError>;

    /// Register the three-particle routine consuming one RRI against two
    /// produced particles, validated together by `combined_check`.
    fn create_transition_from_rri_combined(
        &mut self,
        class_a: ParticleClass,
        class_b: ParticleClass,
        combined_check: CombinedCheck,
    ) -> Result<(), SysError>;

    /// Register a custom transition procedure for a token.
    fn create_transition(
        &mut self,
        token: TransitionToken,
        procedure: Box<dyn TransitionProcedure>,
    ) -> Result<(), SysError>;

    /// Run a routine: a macro registering several definitions and
    /// procedures through this same environment.
    fn execute_routine(&mut self, routine: &dyn ConstraintRoutine) -> Result<(), SysError>;
}

/// A script configuring the constraint machine through [`SysCalls`].
pub trait ConstraintScrypt {
    fn main(&self, os: &mut dyn SysCalls) -> Result<(), SysError>;
}

/// A macro callable from scrypts to register several definitions and
/// procedures atomically.
pub trait ConstraintRoutine {
    fn main(&self, calls: &mut dyn SysCalls) -> Result<(), SysError>;
}

/// The kernel-level surface: atom-wide predicates and derived computes.
pub trait KernelCalls {
    /// Add an atom-level predicate. Kernel violations are collected and
    /// reported as a batch.
    fn require(&mut self, check: KernelProcedure);

    /// Register a pure derived summary under a unique key.
    fn compute(&mut self, key: &str, compute: AtomCompute) -> Result<(), SysError>;
}

/// A driver script configuring kernel-level checks through [`KernelCalls`].
pub trait KernelScrypt {
    fn main(&self, kernel: &mut dyn KernelCalls) -> Result<(), SysError>;
}
