use thiserror::Error;

/// Errors raised while assembling atoms and identifiers.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AtomError {
    #[error("particle group must not be empty")]
    EmptyGroup,

    #[error("rri name {0:?} must match [1-9A-Za-z]+")]
    IllegalRriName(String),
}
