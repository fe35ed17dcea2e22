//! Engine store contract for the spindle constraint engine.
//!
//! The store is the only mutable resource in the system: a mapping from
//! particle identity to its current spin and the atom that drove it there.
//! The contract is exclusive writer, many readers; accepted atoms are
//! append-only and can never be deleted.

pub mod memory;

use std::collections::BTreeSet;

use thiserror::Error;

use spindle_types::{Atom, AtomId, Euid, Particle, Spin};

pub use memory::InMemoryEngineStore;

/// Errors from an engine store.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),

    #[error("cannot advance {particle} from {from} to {to}")]
    SpinConflict {
        particle: String,
        from: Spin,
        to: Spin,
    },

    #[error("store lock poisoned")]
    Lock,
}

/// A mapping from particle identity to `(current spin, containing atom)`.
pub trait EngineStore: Send + Sync {
    /// Whether this store serves the given shard destinations.
    fn supports(&self, destinations: &BTreeSet<Euid>) -> bool;

    /// The particle's current spin; `Neutral` if never stored.
    fn get_spin(&self, particle: &Particle) -> Result<Spin, StoreError>;

    /// The atom that most recently drove the particle to its current spin.
    /// `None` for a particle at `Neutral`. `is_input` selects the consuming
    /// side; a store keeping only the latest atom may ignore it.
    fn get_atom_containing(
        &self,
        particle: &Particle,
        is_input: bool,
    ) -> Result<Option<Atom>, StoreError>;

    /// Atomically apply all of the atom's pushes, moving each touched
    /// particle to its pushed target spin.
    fn store_atom(&self, atom: &Atom) -> Result<(), StoreError>;

    /// Deletion is not part of the engine contract; accepted atoms are
    /// permanent.
    fn delete_atom(&self, _aid: &AtomId) -> Result<(), StoreError> {
        Err(StoreError::Unsupported("delete_atom"))
    }
}
