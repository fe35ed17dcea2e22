use serde::{Deserialize, Serialize};

use spindle_store::StoreError;

use crate::instruction::DataPointer;

/// Classification of a constraint machine rejection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CmErrorKind {
    /// A particle's class has no registered definition.
    UnknownParticle,
    /// A definition's static check rejected the particle.
    StaticCheckFailed,
    /// Requested target spin is not `next(current)`.
    SpinConflict,
    /// Same particle pushed twice with the same target spin within one atom.
    ParticleConflict,
    /// No transition procedure for the derived token.
    MissingProcedure,
    /// Procedure precondition returned an error.
    PreconditionFailed,
    /// Input and output RRIs differ across an RRI-coupled transition.
    RriMismatch,
    /// A witness validator rejected.
    WitnessFailure,
    /// Both used-computes returned a carry, or a carry had no consumer.
    UsedDataConflict,
    /// Leftover consuming/producing pushes after dispatch.
    UnbalancedGroup,
    /// A kernel-level check failed; batched.
    KernelProcedureError,
    /// A push references a particle with no legitimate provenance.
    MissingDependency,
    /// The underlying store refused an operation.
    UnsupportedOperation,
}

impl std::fmt::Display for CmErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CmErrorKind::UnknownParticle => "UNKNOWN_PARTICLE",
            CmErrorKind::StaticCheckFailed => "STATIC_CHECK_FAILED",
            CmErrorKind::SpinConflict => "SPIN_CONFLICT",
            CmErrorKind::ParticleConflict => "PARTICLE_CONFLICT",
            CmErrorKind::MissingProcedure => "MISSING_PROCEDURE",
            CmErrorKind::PreconditionFailed => "PRECONDITION_FAILED",
            CmErrorKind::RriMismatch => "RRI_MISMATCH",
            CmErrorKind::WitnessFailure => "WITNESS_FAILURE",
            CmErrorKind::UsedDataConflict => "USED_DATA_CONFLICT",
            CmErrorKind::UnbalancedGroup => "UNBALANCED_GROUP",
            CmErrorKind::KernelProcedureError => "KERNEL_PROCEDURE_ERROR",
            CmErrorKind::MissingDependency => "MISSING_DEPENDENCY",
            CmErrorKind::UnsupportedOperation => "UNSUPPORTED_OPERATION",
        };
        write!(f, "{name}")
    }
}

/// A structured rejection: the kind, the offending instruction when one can
/// be named, and a human-readable message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CmError {
    pub kind: CmErrorKind,
    pub pointer: Option<DataPointer>,
    pub message: String,
}

impl CmError {
    /// An error anchored at a specific instruction.
    pub fn at(kind: CmErrorKind, pointer: DataPointer, message: impl Into<String>) -> Self {
        Self {
            kind,
            pointer: Some(pointer),
            message: message.into(),
        }
    }

    /// An atom-level error with no single offending instruction.
    pub fn of(kind: CmErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            pointer: None,
            message: message.into(),
        }
    }

    /// The batched form for kernel procedure failures.
    pub fn kernel(errors: Vec<String>) -> Self {
        Self::of(CmErrorKind::KernelProcedureError, errors.join("; "))
    }

    /// Anchor an unanchored error at the given instruction.
    pub fn with_pointer(mut self, pointer: DataPointer) -> Self {
        self.pointer.get_or_insert(pointer);
        self
    }
}

impl From<StoreError> for CmError {
    fn from(e: StoreError) -> Self {
        Self::of(CmErrorKind::UnsupportedOperation, format!("store: {e}"))
    }
}

impl std::fmt::Display for CmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.pointer {
            Some(pointer) => write!(f, "{} at {}: {}", self.kind, pointer, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for CmError {}
