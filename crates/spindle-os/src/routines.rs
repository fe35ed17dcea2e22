use spindle_machine::{TransitionProcedure, TransitionToken, UsedData, UsedKind};
use spindle_types::{Particle, ParticleClass, WitnessData};

use crate::env::rri_signed;
use crate::error::SysError;
use crate::syscalls::{CombinedCheck, ConstraintRoutine, SysCalls};

/// Registers the two procedures that let a single RRI be consumed against
/// two produced particles in one group:
///
/// 1. `(rri -> A)` leaves the RRI partially consumed, carrying the produced
///    `A` forward as `UsedData::Particle`;
/// 2. `(rri[particle] -> B)` completes the RRI, running the combined check
///    across the remembered `A` and the produced `B`.
pub struct CreateCombinedTransitionRoutine {
    class_a: ParticleClass,
    class_b: ParticleClass,
    combined_check: CombinedCheck,
}

impl CreateCombinedTransitionRoutine {
    pub fn new(class_a: ParticleClass, class_b: ParticleClass, combined_check: CombinedCheck) -> Self {
        Self {
            class_a,
            class_b,
            combined_check,
        }
    }
}

impl ConstraintRoutine for CreateCombinedTransitionRoutine {
    fn main(&self, calls: &mut dyn SysCalls) -> Result<(), SysError> {
        calls.create_transition(
            TransitionToken::of(ParticleClass::Rri, self.class_a),
            Box::new(CombinedFirst),
        )?;
        calls.create_transition(
            TransitionToken::new(
                ParticleClass::Rri,
                UsedKind::Particle,
                self.class_b,
                UsedKind::Void,
            ),
            Box::new(CombinedSecond {
                combined_check: self.combined_check.clone(),
            }),
        )
    }
}

/// First half: produce `A`, remember it, keep the RRI alive.
struct CombinedFirst;

impl TransitionProcedure for CombinedFirst {
    fn precondition(
        &self,
        _input: Option<&Particle>,
        _input_used: &UsedData,
        _output: Option<&Particle>,
        _output_used: &UsedData,
    ) -> Result<(), String> {
        Ok(())
    }

    fn input_used_compute(
        &self,
        _input: Option<&Particle>,
        _input_used: &UsedData,
        output: Option<&Particle>,
        _output_used: &UsedData,
    ) -> Option<UsedData> {
        output.map(|particle| UsedData::Particle(particle.clone()))
    }

    fn input_witness_validator(
        &self,
        input: Option<&Particle>,
        witness: &dyn WitnessData,
    ) -> Result<(), String> {
        rri_signed(input, witness)
    }

    fn output_witness_validator(
        &self,
        _output: Option<&Particle>,
        _witness: &dyn WitnessData,
    ) -> Result<(), String> {
        Ok(())
    }
}

/// Second half: produce `B`, check it against the remembered `A`, and
/// complete the RRI under its address's signature.
struct CombinedSecond {
    combined_check: CombinedCheck,
}

impl TransitionProcedure for CombinedSecond {
    fn precondition(
        &self,
        _input: Option<&Particle>,
        input_used: &UsedData,
        output: Option<&Particle>,
        _output_used: &UsedData,
    ) -> Result<(), String> {
        let UsedData::Particle(first) = input_used else {
            return Err("combined transition is missing its first output".into());
        };
        let Some(second) = output else {
            return Err("combined transition is missing its second output".into());
        };
        (self.combined_check)(first, second)
    }

    fn input_witness_validator(
        &self,
        input: Option<&Particle>,
        witness: &dyn WitnessData,
    ) -> Result<(), String> {
        rri_signed(input, witness)
    }

    fn output_witness_validator(
        &self,
        _output: Option<&Particle>,
        _witness: &dyn WitnessData,
    ) -> Result<(), String> {
        Ok(())
    }
}
