use serde::{Deserialize, Serialize};

use spindle_types::{Atom, Particle, ParticleClass, WitnessData};

/// Discriminant of a [`UsedData`] carry, used inside transition tokens.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UsedKind {
    Void,
    Amount,
    Particle,
}

impl std::fmt::Display for UsedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UsedKind::Void => write!(f, "void"),
            UsedKind::Amount => write!(f, "amount"),
            UsedKind::Particle => write!(f, "particle"),
        }
    }
}

/// Residual state threaded between consecutive transitions on a partially
/// consumed side. `Void` means no carry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UsedData {
    Void,
    /// Remaining quantity on a partially consumed fungible side.
    Amount(u128),
    /// A previously matched particle, remembered for a combined check.
    Particle(Particle),
}

impl UsedData {
    pub fn kind(&self) -> UsedKind {
        match self {
            UsedData::Void => UsedKind::Void,
            UsedData::Amount(_) => UsedKind::Amount,
            UsedData::Particle(_) => UsedKind::Particle,
        }
    }
}

/// Identifies a transition procedure: which input class (with which carry)
/// transitions into which output class (with which carry).
///
/// `ParticleClass::Void` marks a side with no particle: creation from
/// nothing, or consumption to nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransitionToken {
    pub input: ParticleClass,
    pub input_used: UsedKind,
    pub output: ParticleClass,
    pub output_used: UsedKind,
}

impl TransitionToken {
    pub fn new(
        input: ParticleClass,
        input_used: UsedKind,
        output: ParticleClass,
        output_used: UsedKind,
    ) -> Self {
        Self {
            input,
            input_used,
            output,
            output_used,
        }
    }

    /// The common case: both sides start with no carry.
    pub fn of(input: ParticleClass, output: ParticleClass) -> Self {
        Self::new(input, UsedKind::Void, output, UsedKind::Void)
    }
}

impl std::fmt::Display for TransitionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}:{} -> {}:{})",
            self.input, self.input_used, self.output, self.output_used
        )
    }
}

/// Application-provided validation bound to one transition token.
///
/// Sides are `None` when the token names `Void` there. Callbacks report
/// failures as messages; the machine classifies them.
pub trait TransitionProcedure: Send + Sync {
    /// Pure validity check over the pair and the incoming carries.
    fn precondition(
        &self,
        input: Option<&Particle>,
        input_used: &UsedData,
        output: Option<&Particle>,
        output_used: &UsedData,
    ) -> Result<(), String>;

    /// Carry left on the input side, or `None` when the input is fully
    /// consumed by this transition.
    fn input_used_compute(
        &self,
        _input: Option<&Particle>,
        _input_used: &UsedData,
        _output: Option<&Particle>,
        _output_used: &UsedData,
    ) -> Option<UsedData> {
        None
    }

    /// Carry left on the output side, or `None` when the output is fully
    /// produced by this transition.
    fn output_used_compute(
        &self,
        _input: Option<&Particle>,
        _input_used: &UsedData,
        _output: Option<&Particle>,
        _output_used: &UsedData,
    ) -> Option<UsedData> {
        None
    }

    /// Authorization check run when the input side completes.
    fn input_witness_validator(
        &self,
        input: Option<&Particle>,
        witness: &dyn WitnessData,
    ) -> Result<(), String>;

    /// Authorization check run when the output side completes.
    fn output_witness_validator(
        &self,
        output: Option<&Particle>,
        witness: &dyn WitnessData,
    ) -> Result<(), String>;
}

/// An atom-level predicate loaded from a kernel scrypt. Returns all
/// violations it finds; kernel errors are batched, not fail-fast.
pub type KernelProcedure = Box<dyn Fn(&Atom) -> Vec<String> + Send + Sync>;

/// A pure derived summary of an accepted atom, keyed by compute name.
pub type AtomCompute = Box<dyn Fn(&Atom) -> serde_json::Value + Send + Sync>;
