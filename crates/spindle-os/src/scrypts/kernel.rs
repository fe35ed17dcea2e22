use chrono::{DateTime, Utc};

use spindle_types::Atom;

use crate::error::SysError;
use crate::syscalls::{KernelCalls, KernelScrypt};

/// Kernel driver: atom-wide shape and metadata rules.
///
/// Requires at least one particle group, bounds the total particle count,
/// and requires a parseable millisecond timestamp inside the configured
/// window. Registers the `"timestamp"` and `"particleCount"` computes.
pub struct AtomDriverScrypt {
    max_particle_count: usize,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
}

impl AtomDriverScrypt {
    pub const COMPUTE_TIMESTAMP: &'static str = "timestamp";
    pub const COMPUTE_PARTICLE_COUNT: &'static str = "particleCount";

    pub fn new(max_particle_count: usize) -> Self {
        Self {
            max_particle_count,
            window_start: DateTime::<Utc>::UNIX_EPOCH,
            window_end: DateTime::<Utc>::MAX_UTC,
        }
    }

    /// Restrict accepted timestamps to a window.
    pub fn with_timestamp_window(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.window_start = start;
        self.window_end = end;
        self
    }

    fn parse_timestamp(atom: &Atom) -> Result<DateTime<Utc>, String> {
        let raw = atom
            .metadata()
            .get(Atom::METADATA_TIMESTAMP)
            .ok_or_else(|| "atom metadata is missing a timestamp".to_string())?;
        let millis: i64 = raw
            .parse()
            .map_err(|_| format!("timestamp {raw:?} is not a millisecond value"))?;
        DateTime::<Utc>::from_timestamp_millis(millis)
            .ok_or_else(|| format!("timestamp {millis} is out of range"))
    }
}

impl KernelScrypt for AtomDriverScrypt {
    fn main(&self, kernel: &mut dyn KernelCalls) -> Result<(), SysError> {
        let max_particle_count = self.max_particle_count;
        let window_start = self.window_start;
        let window_end = self.window_end;

        kernel.require(Box::new(move |atom: &Atom| {
            let mut errors = Vec::new();

            if atom.groups().is_empty() {
                errors.push("atom has no particle groups".to_string());
            }
            let count = atom.particle_count();
            if count > max_particle_count {
                errors.push(format!(
                    "atom carries {count} particles, limit is {max_particle_count}"
                ));
            }
            match Self::parse_timestamp(atom) {
                Ok(timestamp) if timestamp < window_start || timestamp > window_end => {
                    errors.push(format!("timestamp {timestamp} outside accepted window"));
                }
                Ok(_) => {}
                Err(message) => errors.push(message),
            }

            errors
        }));

        kernel.compute(
            Self::COMPUTE_TIMESTAMP,
            Box::new(|atom: &Atom| {
                Self::parse_timestamp(atom)
                    .map(|timestamp| serde_json::json!(timestamp.timestamp_millis()))
                    .unwrap_or(serde_json::Value::Null)
            }),
        )?;

        kernel.compute(
            Self::COMPUTE_PARTICLE_COUNT,
            Box::new(|atom: &Atom| serde_json::json!(atom.particle_count())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::os::AtomOs;
    use spindle_machine::CmErrorKind;
    use spindle_store::InMemoryEngineStore;
    use spindle_types::{
        Address, Particle, ParticleGroup, PublicKey, SpunParticle, UniqueParticle,
    };
    use std::sync::Arc;

    fn unique_atom(timestamp: Option<&str>) -> Atom {
        let particle = Particle::Unique(UniqueParticle::new(
            Address::new(2, PublicKey([3; 32])),
            "id",
            0,
        ));
        let atom = Atom::new(vec![
            ParticleGroup::of(vec![SpunParticle::up(particle)]).unwrap()
        ]);
        match timestamp {
            Some(value) => atom.with_metadata(Atom::METADATA_TIMESTAMP, value),
            None => atom,
        }
    }

    fn machine_with_driver(
        driver: AtomDriverScrypt,
    ) -> spindle_machine::ConstraintMachine {
        let mut os = AtomOs::new(2);
        os.load_kernel(&driver).unwrap();
        // Accept the test particle class without transition rules.
        struct Passthrough;
        impl crate::syscalls::ConstraintScrypt for Passthrough {
            fn main(&self, os: &mut dyn crate::syscalls::SysCalls) -> Result<(), SysError> {
                os.register_particle(
                    spindle_types::ParticleClass::Unique,
                    Arc::new(|particle: &Particle| match particle {
                        Particle::Unique(p) => p.address,
                        _ => Address::new(0, PublicKey([0; 32])),
                    }),
                    Arc::new(|_: &Particle| Ok(())),
                )?;
                os.create_transition(
                    spindle_machine::TransitionToken::of(
                        spindle_types::ParticleClass::Void,
                        spindle_types::ParticleClass::Unique,
                    ),
                    Box::new(AlwaysValid),
                )
            }
        }
        struct AlwaysValid;
        impl spindle_machine::TransitionProcedure for AlwaysValid {
            fn precondition(
                &self,
                _input: Option<&Particle>,
                _input_used: &spindle_machine::UsedData,
                _output: Option<&Particle>,
                _output_used: &spindle_machine::UsedData,
            ) -> Result<(), String> {
                Ok(())
            }
            fn input_witness_validator(
                &self,
                _input: Option<&Particle>,
                _witness: &dyn spindle_types::WitnessData,
            ) -> Result<(), String> {
                Ok(())
            }
            fn output_witness_validator(
                &self,
                _output: Option<&Particle>,
                _witness: &dyn spindle_types::WitnessData,
            ) -> Result<(), String> {
                Ok(())
            }
        }
        os.load(&Passthrough).unwrap();
        os.build_machine().unwrap()
    }

    #[test]
    fn missing_timestamp_is_a_kernel_error() {
        let machine = machine_with_driver(AtomDriverScrypt::new(16));
        let store = InMemoryEngineStore::new();

        let err = machine.validate(&store, &unique_atom(None)).unwrap_err();
        assert_eq!(err.kind, CmErrorKind::KernelProcedureError);
        assert!(err.message.contains("timestamp"));
    }

    #[test]
    fn unparseable_timestamp_is_a_kernel_error() {
        let machine = machine_with_driver(AtomDriverScrypt::new(16));
        let store = InMemoryEngineStore::new();

        let err = machine
            .validate(&store, &unique_atom(Some("not-a-number")))
            .unwrap_err();
        assert_eq!(err.kind, CmErrorKind::KernelProcedureError);
    }

    #[test]
    fn oversized_atoms_batch_with_other_kernel_errors() {
        let machine = machine_with_driver(AtomDriverScrypt::new(0));
        let store = InMemoryEngineStore::new();

        let err = machine.validate(&store, &unique_atom(None)).unwrap_err();
        assert_eq!(err.kind, CmErrorKind::KernelProcedureError);
        assert!(err.message.contains("limit is 0"));
        assert!(err.message.contains("timestamp"));
    }

    #[test]
    fn computes_report_timestamp_and_count() {
        let machine = machine_with_driver(AtomDriverScrypt::new(16));
        let store = InMemoryEngineStore::new();

        let result = machine
            .validate(&store, &unique_atom(Some("1700000000000")))
            .unwrap();
        assert_eq!(
            result.get(AtomDriverScrypt::COMPUTE_TIMESTAMP),
            Some(&serde_json::json!(1_700_000_000_000_i64))
        );
        assert_eq!(
            result.get(AtomDriverScrypt::COMPUTE_PARTICLE_COUNT),
            Some(&serde_json::json!(1))
        );
    }
}
