use thiserror::Error;
use tracing::info;

use spindle_machine::{ApplicationResult, CmError, ConstraintMachine};
use spindle_store::{EngineStore, StoreError};
use spindle_types::Atom;

/// Failures of the validate-then-commit pair.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("constraint machine rejected atom: {0}")]
    Rejected(#[from] CmError),

    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}

/// Owns a built machine and a store, and runs the linearizable
/// validate-then-commit pair. Callers that need finer control over
/// persistence can use [`ConstraintMachine::validate`] directly.
pub struct Engine<S: EngineStore> {
    machine: ConstraintMachine,
    store: S,
}

impl<S: EngineStore> Engine<S> {
    pub fn new(machine: ConstraintMachine, store: S) -> Self {
        Self { machine, store }
    }

    pub fn machine(&self) -> &ConstraintMachine {
        &self.machine
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Validate the atom and, when it passes, commit it to the store.
    pub fn execute(&self, atom: &Atom) -> Result<ApplicationResult, EngineError> {
        let result = self.machine.validate(&self.store, atom)?;
        self.store.store_atom(atom)?;
        info!(aid = %atom.aid(), "atom committed");
        Ok(result)
    }
}
