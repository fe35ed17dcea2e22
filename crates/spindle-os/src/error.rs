use thiserror::Error;

use spindle_machine::{MachineBuildError, TransitionToken};
use spindle_types::ParticleClass;

/// Errors raised while loading constraint scrypts.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SysError {
    #[error("particle {0} is already registered")]
    DuplicateDefinition(ParticleClass),

    #[error("transition {0} already created")]
    DuplicateTransition(TransitionToken),

    #[error("particle {0} is not registered")]
    NotRegistered(ParticleClass),

    #[error("particle {0} can only be used in its registering scrypt")]
    OutsideScrypt(ParticleClass),

    #[error("particle {0} must be registered with an rri mapper")]
    MissingRriMapper(ParticleClass),

    #[error("compute key {0:?} already in use")]
    DuplicateComputeKey(String),

    #[error(transparent)]
    Machine(#[from] MachineBuildError),
}
