use serde::{Deserialize, Serialize};

/// Lifecycle position of a particle.
///
/// The only legal progression is `Neutral -> Up -> Down`. A particle that was
/// never seen is at `Neutral`; `Up` means created, `Down` means spent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Spin {
    Neutral,
    Up,
    Down,
}

impl Spin {
    /// The successor spin, or `None` for `Down` (a spent particle has no
    /// further lifecycle).
    pub fn next(self) -> Option<Spin> {
        match self {
            Spin::Neutral => Some(Spin::Up),
            Spin::Up => Some(Spin::Down),
            Spin::Down => None,
        }
    }
}

impl std::fmt::Display for Spin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Spin::Neutral => write!(f, "NEUTRAL"),
            Spin::Up => write!(f, "UP"),
            Spin::Down => write!(f, "DOWN"),
        }
    }
}
