use std::collections::BTreeSet;
use std::sync::Arc;

use spindle_machine::{TransitionProcedure, TransitionToken, UsedData};
use spindle_types::{Particle, ParticleClass, WitnessData};

use crate::error::SysError;
use crate::syscalls::{ConstraintScrypt, SysCalls};

/// Atom model for address-to-address payload delivery.
///
/// A message lives at both its endpoints and is created from nothing,
/// witnessed by the sender. Messages are never consumed.
pub struct MessagingScrypt;

impl ConstraintScrypt for MessagingScrypt {
    fn main(&self, os: &mut dyn SysCalls) -> Result<(), SysError> {
        os.register_particle_multiple_addresses(
            ParticleClass::Message,
            Arc::new(|particle: &Particle| match particle {
                Particle::Message(p) => BTreeSet::from([p.from, p.to]),
                _ => BTreeSet::new(),
            }),
            Arc::new(|particle: &Particle| match particle {
                Particle::Message(p) if p.payload.is_empty() => {
                    Err("message payload is empty".into())
                }
                Particle::Message(_) => Ok(()),
                _ => Err("expected a message particle".into()),
            }),
        )?;

        os.create_transition(
            TransitionToken::of(ParticleClass::Void, ParticleClass::Message),
            Box::new(SendMessage),
        )
    }
}

/// Creation of a message from nothing, authorized by its sender.
struct SendMessage;

impl TransitionProcedure for SendMessage {
    fn precondition(
        &self,
        _input: Option<&Particle>,
        _input_used: &UsedData,
        _output: Option<&Particle>,
        _output_used: &UsedData,
    ) -> Result<(), String> {
        Ok(())
    }

    fn input_witness_validator(
        &self,
        _input: Option<&Particle>,
        _witness: &dyn WitnessData,
    ) -> Result<(), String> {
        Ok(())
    }

    fn output_witness_validator(
        &self,
        output: Option<&Particle>,
        witness: &dyn WitnessData,
    ) -> Result<(), String> {
        let Some(Particle::Message(message)) = output else {
            return Err("expected a message output".into());
        };
        if witness.is_signed_by(&message.from.key) {
            Ok(())
        } else {
            Err(format!("not signed by sender {}", message.from))
        }
    }
}
