//! The constraint scrypt environment.
//!
//! Constraint scrypts program against the [`SysCalls`] surface to register
//! particle definitions and transition procedures; [`AtomOs`] accumulates
//! the registrations of every loaded scrypt and compiles them into the
//! immutable constraint machine, with the standard virtualization
//! transformers installed.

pub mod engine;
pub mod env;
pub mod error;
pub mod fungible;
pub mod os;
pub mod routines;
pub mod scrypts;
pub mod syscalls;

pub use engine::{Engine, EngineError};
pub use env::ConstraintScryptEnv;
pub use error::SysError;
pub use fungible::{AmountMapper, FungibleDefinition, ParticleValueMapper};
pub use os::AtomOs;
pub use routines::CreateCombinedTransitionRoutine;
pub use scrypts::{AtomDriverScrypt, MessagingScrypt, UniqueIdScrypt};
pub use syscalls::{
    AddressChecker, AddressMapper, AddressesMapper, CombinedCheck, ConstraintRoutine,
    ConstraintScrypt, KernelCalls, KernelScrypt, SysCalls,
};
