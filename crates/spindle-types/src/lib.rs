//! Core type definitions for the spindle constraint engine.
//!
//! This crate provides the shared data model. No business logic, just types.
//! Every spindle crate depends on this crate.

pub mod atom;
pub mod error;
pub mod ids;
pub mod particle;
pub mod spin;
pub mod witness;

// Re-export primary types at crate root for ergonomic use.
pub use atom::{Atom, AtomId, ParticleGroup, SpunParticle};
pub use error::AtomError;
pub use ids::{Address, Euid, PublicKey, Rri, Signature};
pub use particle::{MessageParticle, Particle, ParticleClass, RriParticle, UniqueParticle};
pub use spin::Spin;
pub use witness::{WitnessBundle, WitnessData};
