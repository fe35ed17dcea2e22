use std::collections::{BTreeMap, HashMap};

use thiserror::Error;
use tracing::{debug, warn};

use spindle_store::EngineStore;
use spindle_types::{Atom, Particle, ParticleClass, Spin};

use crate::definition::ParticleDefinition;
use crate::error::{CmError, CmErrorKind};
use crate::instruction::{DataPointer, MicroInstruction};
use crate::lowering::to_micro_instructions;
use crate::procedure::{
    AtomCompute, KernelProcedure, TransitionProcedure, TransitionToken, UsedData,
};
use crate::virtualize::{resolve_spin, StateTransformer};

/// Registration-time failures. A machine that would break the uniqueness
/// invariants is never built.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MachineBuildError {
    #[error("particle {0} is already registered")]
    DuplicateDefinition(ParticleClass),

    #[error("transition {0} already created")]
    DuplicateTransition(TransitionToken),

    #[error("compute key {0:?} already in use")]
    DuplicateComputeKey(String),
}

/// The mutable BUILDING state of the machine. `build()` consumes the builder
/// and freezes everything; the built machine has no mutators.
#[derive(Default)]
pub struct ConstraintMachineBuilder {
    definitions: HashMap<ParticleClass, ParticleDefinition>,
    procedures: HashMap<TransitionToken, Box<dyn TransitionProcedure>>,
    kernel_procedures: Vec<KernelProcedure>,
    computes: BTreeMap<String, AtomCompute>,
    transformers: Vec<StateTransformer>,
}

impl ConstraintMachineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_definition(
        &mut self,
        class: ParticleClass,
        definition: ParticleDefinition,
    ) -> Result<(), MachineBuildError> {
        if self.definitions.contains_key(&class) {
            return Err(MachineBuildError::DuplicateDefinition(class));
        }
        self.definitions.insert(class, definition);
        Ok(())
    }

    pub fn add_procedure(
        &mut self,
        token: TransitionToken,
        procedure: Box<dyn TransitionProcedure>,
    ) -> Result<(), MachineBuildError> {
        if self.procedures.contains_key(&token) {
            return Err(MachineBuildError::DuplicateTransition(token));
        }
        self.procedures.insert(token, procedure);
        Ok(())
    }

    pub fn add_kernel_procedure(&mut self, procedure: KernelProcedure) {
        self.kernel_procedures.push(procedure);
    }

    pub fn add_compute(
        &mut self,
        key: impl Into<String>,
        compute: AtomCompute,
    ) -> Result<(), MachineBuildError> {
        let key = key.into();
        if self.computes.contains_key(&key) {
            return Err(MachineBuildError::DuplicateComputeKey(key));
        }
        self.computes.insert(key, compute);
        Ok(())
    }

    /// Push a state transformer onto the virtualization stack. Transformers
    /// apply in registration order; the last registered has the final word.
    pub fn state_transformer(&mut self, transformer: StateTransformer) {
        self.transformers.push(transformer);
    }

    pub fn build(self) -> ConstraintMachine {
        ConstraintMachine {
            definitions: self.definitions,
            procedures: self.procedures,
            kernel_procedures: self.kernel_procedures,
            computes: self.computes,
            transformers: self.transformers,
        }
    }
}

/// Pure derived summaries computed from an accepted atom, keyed by the
/// compute names registered at build time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ApplicationResult {
    computed: BTreeMap<String, serde_json::Value>,
}

impl ApplicationResult {
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.computed.get(key)
    }

    pub fn computed(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.computed
    }
}

/// The compiled, immutable constraint machine. Shareable across validation
/// threads; `validate` never mutates the store.
pub struct ConstraintMachine {
    definitions: HashMap<ParticleClass, ParticleDefinition>,
    procedures: HashMap<TransitionToken, Box<dyn TransitionProcedure>>,
    kernel_procedures: Vec<KernelProcedure>,
    computes: BTreeMap<String, AtomCompute>,
    transformers: Vec<StateTransformer>,
}

/// One side of the dispatch cursor: a pushed particle and its location.
struct SidePush<'a> {
    particle: &'a Particle,
    pointer: DataPointer,
}

impl ConstraintMachine {
    pub fn definition(&self, class: ParticleClass) -> Option<&ParticleDefinition> {
        self.definitions.get(&class)
    }

    /// Validate an atom against the compiled rule set and a read view of the
    /// store. On success the atom is eligible for `store_atom`; the decision
    /// to persist stays with the caller.
    pub fn validate(
        &self,
        store: &dyn EngineStore,
        atom: &Atom,
    ) -> Result<ApplicationResult, CmError> {
        let result = self.validate_inner(store, atom);
        if let Err(error) = &result {
            warn!(aid = %atom.aid(), %error, "atom rejected");
        }
        result
    }

    fn validate_inner(
        &self,
        store: &dyn EngineStore,
        atom: &Atom,
    ) -> Result<ApplicationResult, CmError> {
        debug!(aid = %atom.aid(), particles = atom.particle_count(), "validating atom");

        let instructions = to_micro_instructions(atom)?;

        self.run_kernel_procedures(atom)?;
        self.run_static_checks(&instructions)?;
        self.run_spin_evolution(store, &instructions)?;
        self.run_transition_dispatch(atom, &instructions)?;

        let mut computed = BTreeMap::new();
        for (key, compute) in &self.computes {
            computed.insert(key.clone(), compute(atom));
        }

        debug!(aid = %atom.aid(), "atom valid");
        Ok(ApplicationResult { computed })
    }

    fn run_kernel_procedures(&self, atom: &Atom) -> Result<(), CmError> {
        let errors: Vec<String> = self
            .kernel_procedures
            .iter()
            .flat_map(|procedure| procedure(atom))
            .collect();
        if !errors.is_empty() {
            return Err(CmError::kernel(errors));
        }
        debug!("kernel checks passed");
        Ok(())
    }

    fn run_static_checks(&self, instructions: &[MicroInstruction]) -> Result<(), CmError> {
        for instruction in instructions {
            let MicroInstruction::Push {
                particle, pointer, ..
            } = instruction
            else {
                continue;
            };

            let definition = self.definitions.get(&particle.class()).ok_or_else(|| {
                CmError::at(
                    CmErrorKind::UnknownParticle,
                    *pointer,
                    format!("no definition for class {}", particle.class()),
                )
            })?;

            definition.check(particle).map_err(|message| {
                CmError::at(CmErrorKind::StaticCheckFailed, *pointer, message)
            })?;
        }
        debug!("static checks passed");
        Ok(())
    }

    fn run_spin_evolution(
        &self,
        store: &dyn EngineStore,
        instructions: &[MicroInstruction],
    ) -> Result<(), CmError> {
        // Spins asserted earlier in this atom shadow the store's answer.
        let mut asserted: HashMap<&Particle, Spin> = HashMap::new();

        for instruction in instructions {
            let MicroInstruction::Push {
                particle,
                spin,
                pointer,
            } = instruction
            else {
                continue;
            };

            let current = match asserted.get(particle) {
                Some(spin) => *spin,
                None => resolve_spin(store, &self.transformers, particle)
                    .map_err(|e| e.with_pointer(*pointer))?,
            };

            match current.next() {
                Some(next) if next == *spin => {
                    asserted.insert(particle, *spin);
                }
                _ => {
                    return Err(CmError::at(
                        CmErrorKind::SpinConflict,
                        *pointer,
                        format!("cannot move {particle} from {current} to {spin}"),
                    ));
                }
            }
        }
        debug!("spin evolution passed");
        Ok(())
    }

    fn run_transition_dispatch(
        &self,
        atom: &Atom,
        instructions: &[MicroInstruction],
    ) -> Result<(), CmError> {
        let mut inputs: Vec<SidePush> = Vec::new();
        let mut outputs: Vec<SidePush> = Vec::new();

        for instruction in instructions {
            match instruction {
                MicroInstruction::Push {
                    particle,
                    spin,
                    pointer,
                } => {
                    let side = SidePush { particle, pointer: *pointer };
                    match spin {
                        Spin::Down => inputs.push(side),
                        _ => outputs.push(side),
                    }
                }
                MicroInstruction::GroupEnd => {
                    self.dispatch_group(atom, &inputs, &outputs)?;
                    inputs.clear();
                    outputs.clear();
                }
            }
        }
        debug!("transition dispatch passed");
        Ok(())
    }

    /// Drive the two-sided cursor over one group's consuming and producing
    /// pushes. Each iteration dispatches exactly one procedure; a side whose
    /// used-compute returns a carry stays in place and threads the carry
    /// into the next token.
    fn dispatch_group(
        &self,
        atom: &Atom,
        inputs: &[SidePush],
        outputs: &[SidePush],
    ) -> Result<(), CmError> {
        let mut input_index = 0;
        let mut output_index = 0;
        let mut input_used = UsedData::Void;
        let mut output_used = UsedData::Void;

        loop {
            let input = inputs.get(input_index);
            let output = outputs.get(output_index);
            let (Some(pointer), token) = Self::cursor_position(
                input,
                &input_used,
                output,
                &output_used,
            ) else {
                return Ok(());
            };

            let Some(procedure) = self.procedures.get(&token) else {
                // A missing procedure on a one-sided token means the group
                // can never balance; with both sides live the rule set is
                // simply missing the pairing.
                let (kind, message) = if input.is_none() || output.is_none() {
                    (
                        CmErrorKind::UnbalancedGroup,
                        format!("leftover push with no procedure for {token}"),
                    )
                } else {
                    (
                        CmErrorKind::MissingProcedure,
                        format!("no procedure for {token}"),
                    )
                };
                return Err(CmError::at(kind, pointer, message));
            };

            let input_particle = input.map(|side| side.particle);
            let output_particle = output.map(|side| side.particle);

            procedure
                .precondition(input_particle, &input_used, output_particle, &output_used)
                .map_err(|message| {
                    CmError::at(CmErrorKind::PreconditionFailed, pointer, message)
                })?;

            self.check_rri_coupling(input_particle, output_particle, pointer)?;

            let input_carry = procedure.input_used_compute(
                input_particle,
                &input_used,
                output_particle,
                &output_used,
            );
            let output_carry = procedure.output_used_compute(
                input_particle,
                &input_used,
                output_particle,
                &output_used,
            );

            if input_carry.is_some() && output_carry.is_some() {
                return Err(CmError::at(
                    CmErrorKind::UsedDataConflict,
                    pointer,
                    "both sides of a transition returned a carry",
                ));
            }
            if input_carry.is_some() && output.is_none() {
                return Err(CmError::at(
                    CmErrorKind::UsedDataConflict,
                    pointer,
                    "input carry has no producing side to consume it",
                ));
            }
            if output_carry.is_some() && input.is_none() {
                return Err(CmError::at(
                    CmErrorKind::UsedDataConflict,
                    pointer,
                    "output carry has no consuming side to consume it",
                ));
            }

            match input_carry {
                Some(carry) => input_used = carry,
                None => {
                    if let Some(side) = input {
                        procedure
                            .input_witness_validator(Some(side.particle), atom.witnesses())
                            .map_err(|message| {
                                CmError::at(CmErrorKind::WitnessFailure, side.pointer, message)
                            })?;
                    }
                    input_index += 1;
                    input_used = UsedData::Void;
                }
            }

            match output_carry {
                Some(carry) => output_used = carry,
                None => {
                    if let Some(side) = output {
                        procedure
                            .output_witness_validator(Some(side.particle), atom.witnesses())
                            .map_err(|message| {
                                CmError::at(CmErrorKind::WitnessFailure, side.pointer, message)
                            })?;
                    }
                    output_index += 1;
                    output_used = UsedData::Void;
                }
            }
        }
    }

    /// Derive the token and error anchor for the current cursor position.
    /// Returns `(None, _)` when both sides are exhausted.
    fn cursor_position(
        input: Option<&SidePush>,
        input_used: &UsedData,
        output: Option<&SidePush>,
        output_used: &UsedData,
    ) -> (Option<DataPointer>, TransitionToken) {
        let token = TransitionToken::new(
            input
                .map(|side| side.particle.class())
                .unwrap_or(ParticleClass::Void),
            input_used.kind(),
            output
                .map(|side| side.particle.class())
                .unwrap_or(ParticleClass::Void),
            output_used.kind(),
        );
        let pointer = input
            .map(|side| side.pointer)
            .or_else(|| output.map(|side| side.pointer));
        (pointer, token)
    }

    fn check_rri_coupling(
        &self,
        input: Option<&Particle>,
        output: Option<&Particle>,
        pointer: DataPointer,
    ) -> Result<(), CmError> {
        let (Some(input), Some(output)) = (input, output) else {
            return Ok(());
        };
        let input_rri = self
            .definitions
            .get(&input.class())
            .and_then(|definition| definition.rri(input));
        let output_rri = self
            .definitions
            .get(&output.class())
            .and_then(|definition| definition.rri(output));

        match (input_rri, output_rri) {
            (Some(input_rri), Some(output_rri)) if input_rri != output_rri => {
                Err(CmError::at(
                    CmErrorKind::RriMismatch,
                    pointer,
                    format!("input {input_rri} != output {output_rri}"),
                ))
            }
            _ => Ok(()),
        }
    }
}
