use std::collections::{HashMap, HashSet};

use spindle_types::{Atom, Particle, Spin};

use crate::error::{CmError, CmErrorKind};
use crate::instruction::{DataPointer, MicroInstruction};

/// Lower an atom into its flat micro-instruction transcript.
///
/// Walks particle groups in order, emitting one `Push` per spun particle and
/// a `GroupEnd` after each group. Intra-atom spin consistency is enforced
/// here, before any store is consulted:
///
/// - the same particle may not appear twice within one group;
/// - the same `(particle, target spin)` may not be pushed twice;
/// - a particle already pushed `Down` may not be pushed again.
///
/// Lowering is pure and deterministic.
pub fn to_micro_instructions(atom: &Atom) -> Result<Vec<MicroInstruction>, CmError> {
    let mut instructions = Vec::with_capacity(atom.particle_count() + atom.groups().len());
    let mut last_spin: HashMap<&Particle, Spin> = HashMap::new();

    for (group_index, group) in atom.groups().iter().enumerate() {
        let mut in_group: HashSet<&Particle> = HashSet::new();

        for (particle_index, spun) in group.particles().iter().enumerate() {
            let pointer = DataPointer::of_particle(group_index, particle_index);

            if !matches!(spun.spin, Spin::Up | Spin::Down) {
                return Err(CmError::at(
                    CmErrorKind::SpinConflict,
                    pointer,
                    format!("{} is not a valid push target", spun.spin),
                ));
            }

            if !in_group.insert(&spun.particle) {
                return Err(CmError::at(
                    CmErrorKind::ParticleConflict,
                    pointer,
                    format!("{} appears twice in one group", spun.particle),
                ));
            }

            match last_spin.get(&spun.particle) {
                Some(previous) if *previous == spun.spin => {
                    return Err(CmError::at(
                        CmErrorKind::ParticleConflict,
                        pointer,
                        format!("{} already pushed {}", spun.particle, spun.spin),
                    ));
                }
                Some(Spin::Down) => {
                    return Err(CmError::at(
                        CmErrorKind::SpinConflict,
                        pointer,
                        format!("{} already spent within this atom", spun.particle),
                    ));
                }
                _ => {}
            }

            last_spin.insert(&spun.particle, spun.spin);
            instructions.push(MicroInstruction::Push {
                particle: spun.particle.clone(),
                spin: spun.spin,
                pointer,
            });
        }

        instructions.push(MicroInstruction::GroupEnd);
    }

    Ok(instructions)
}
