//! The constraint machine: the transaction-validation core of the ledger.
//!
//! An atom is lowered into a flat transcript of micro-instructions, streamed
//! against a read view of the engine store to verify spin evolution, and its
//! consuming/producing pushes are dispatched pairwise to the transition
//! procedures compiled into the machine. The first failure aborts validation
//! and is surfaced with the offending instruction's coordinates; only
//! kernel-level checks are collected as a batch.
//!
//! A built machine is immutable and freely shareable across validation
//! threads. It never mutates the store; committing an accepted atom is the
//! caller's decision.

pub mod definition;
pub mod error;
pub mod instruction;
pub mod lowering;
pub mod machine;
pub mod procedure;
pub mod virtualize;

pub use definition::{ParticleDefinition, RriMapper, ShardMapper, StaticCheck};
pub use error::{CmError, CmErrorKind};
pub use instruction::{DataPointer, MicroInstruction};
pub use lowering::to_micro_instructions;
pub use machine::{
    ApplicationResult, ConstraintMachine, ConstraintMachineBuilder, MachineBuildError,
};
pub use procedure::{
    AtomCompute, KernelProcedure, TransitionProcedure, TransitionToken, UsedData, UsedKind,
};
pub use virtualize::{SpinPredicate, StateTransformer};
