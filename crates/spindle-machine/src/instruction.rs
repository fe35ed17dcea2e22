use serde::{Deserialize, Serialize};

use spindle_types::{Particle, Spin};

/// Coordinates of a spun particle within an atom, for error reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataPointer {
    pub group: usize,
    pub index: usize,
}

impl DataPointer {
    pub fn of_particle(group: usize, index: usize) -> Self {
        Self { group, index }
    }
}

impl std::fmt::Display for DataPointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.group, self.index)
    }
}

/// A flat instruction produced by lowering an atom.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MicroInstruction {
    /// Assert that `particle` holds `spin` after this instruction executes.
    Push {
        particle: Particle,
        spin: Spin,
        pointer: DataPointer,
    },
    /// Boundary between two particle groups.
    GroupEnd,
}
