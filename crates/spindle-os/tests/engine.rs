//! Full-stack scenarios: built-in scrypts, kernel driver, in-memory store.

use std::sync::Arc;

use spindle_machine::{
    CmErrorKind, ConstraintMachine, DataPointer, TransitionProcedure, TransitionToken, UsedData,
};
use spindle_os::{
    AtomDriverScrypt, AtomOs, ConstraintScrypt, Engine, EngineError, FungibleDefinition,
    MessagingScrypt, ParticleValueMapper, SysCalls, SysError, UniqueIdScrypt,
};
use spindle_store::{EngineStore, InMemoryEngineStore};
use spindle_types::{
    Address, Atom, MessageParticle, Particle, ParticleClass, ParticleGroup, PublicKey, Rri,
    RriParticle, Signature, Spin, SpunParticle, UniqueParticle, WitnessBundle,
};

const UNIVERSE: u8 = 2;

fn address(fill: u8) -> Address {
    Address::new(UNIVERSE, PublicKey([fill; 32]))
}

fn signed_by(fills: &[u8]) -> WitnessBundle {
    let mut bundle = WitnessBundle::default();
    for fill in fills {
        bundle.add(PublicKey([*fill; 32]), Signature(vec![*fill]));
    }
    bundle
}

fn atom_of(groups: Vec<Vec<SpunParticle>>) -> Atom {
    Atom::new(
        groups
            .into_iter()
            .map(|group| ParticleGroup::of(group).unwrap())
            .collect(),
    )
    .with_metadata(Atom::METADATA_TIMESTAMP, "1700000000000")
}

/// The full stack: kernel driver plus both built-in atom models.
fn full_machine() -> ConstraintMachine {
    let mut os = AtomOs::new(UNIVERSE);
    os.load_kernel(&AtomDriverScrypt::new(64)).unwrap();
    os.load(&UniqueIdScrypt).unwrap();
    os.load(&MessagingScrypt).unwrap();
    os.build_machine().unwrap()
}

fn message(fill_from: u8, payload: &[u8], nonce: u64) -> Particle {
    Particle::Message(MessageParticle::new(
        address(fill_from),
        address(9),
        payload.to_vec(),
        nonce,
    ))
}

// --- Scenario 1: a single up is accepted and committed ---------------------

#[test]
fn single_up_is_accepted_and_stored() {
    let engine = Engine::new(full_machine(), InMemoryEngineStore::new());
    let particle = message(1, b"hello", 0);
    let atom = atom_of(vec![vec![SpunParticle::up(particle.clone())]])
        .with_witnesses(signed_by(&[1]));

    engine.execute(&atom).unwrap();

    assert_eq!(engine.store().get_spin(&particle).unwrap(), Spin::Up);
}

// --- Scenario 2: up then down within one atom ------------------------------

/// Registers a unique-particle lifecycle owned entirely by its address:
/// creation from nothing and consumption to nothing, both witnessed.
struct LifecycleScrypt;

struct OwnerWitnessed;

impl TransitionProcedure for OwnerWitnessed {
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
        input: Option<&Particle>,
        witness: &dyn spindle_types::WitnessData,
    ) -> Result<(), String> {
        match input {
            Some(Particle::Unique(p)) if witness.is_signed_by(&p.address.key) => Ok(()),
            Some(Particle::Unique(p)) => Err(format!("not signed by {}", p.address)),
            None => Ok(()),
            _ => Err("expected a unique particle".into()),
        }
    }

    fn output_witness_validator(
        &self,
        output: Option<&Particle>,
        witness: &dyn spindle_types::WitnessData,
    ) -> Result<(), String> {
        match output {
            Some(Particle::Unique(p)) if witness.is_signed_by(&p.address.key) => Ok(()),
            Some(Particle::Unique(p)) => Err(format!("not signed by {}", p.address)),
            None => Ok(()),
            _ => Err("expected a unique particle".into()),
        }
    }
}

impl ConstraintScrypt for LifecycleScrypt {
    fn main(&self, os: &mut dyn SysCalls) -> Result<(), SysError> {
        os.register_particle(
            ParticleClass::Unique,
            Arc::new(|particle: &Particle| match particle {
                Particle::Unique(p) => p.address,
                _ => Address::new(0, PublicKey([0; 32])),
            }),
            Arc::new(|_: &Particle| Ok(())),
        )?;
        os.create_transition(
            TransitionToken::of(ParticleClass::Void, ParticleClass::Unique),
            Box::new(OwnerWitnessed),
        )?;
        os.create_transition(
            TransitionToken::of(ParticleClass::Unique, ParticleClass::Void),
            Box::new(OwnerWitnessed),
        )
    }
}

fn lifecycle_machine() -> ConstraintMachine {
    let mut os = AtomOs::new(UNIVERSE);
    os.load(&LifecycleScrypt).unwrap();
    os.build_machine().unwrap()
}

#[test]
fn up_then_down_within_one_atom_is_accepted() {
    let machine = lifecycle_machine();
    let store = InMemoryEngineStore::new();
    let particle = Particle::Unique(UniqueParticle::new(address(3), "id", 0));
    let atom = atom_of(vec![
        vec![SpunParticle::up(particle.clone())],
        vec![SpunParticle::down(particle.clone())],
    ])
    .with_witnesses(signed_by(&[3]));

    machine.validate(&store, &atom).unwrap();
    store.store_atom(&atom).unwrap();
    assert_eq!(store.get_spin(&particle).unwrap(), Spin::Down);
}

// --- Scenarios 3 & 4: repeated pushes of the same target spin --------------

#[test]
fn up_then_up_is_a_particle_conflict_at_the_second_push() {
    let machine = full_machine();
    let store = InMemoryEngineStore::new();
    let particle = message(1, b"hi", 0);
    let atom = atom_of(vec![
        vec![SpunParticle::up(particle.clone())],
        vec![SpunParticle::up(particle)],
    ]);

    let err = machine.validate(&store, &atom).unwrap_err();
    assert_eq!(err.kind, CmErrorKind::ParticleConflict);
    assert_eq!(err.pointer, Some(DataPointer::of_particle(1, 0)));
}

#[test]
fn down_then_down_is_a_particle_conflict() {
    let machine = full_machine();
    let store = InMemoryEngineStore::new();
    let particle = message(1, b"hi", 0);
    let atom = atom_of(vec![
        vec![SpunParticle::down(particle.clone())],
        vec![SpunParticle::down(particle)],
    ]);

    let err = machine.validate(&store, &atom).unwrap_err();
    assert_eq!(err.kind, CmErrorKind::ParticleConflict);
}

// --- Scenario 5: down before up against an empty store ---------------------

#[test]
fn down_of_a_legitimate_but_unseen_particle_is_a_spin_conflict() {
    let machine = full_machine();
    let store = InMemoryEngineStore::new();
    let atom = atom_of(vec![vec![SpunParticle::down(message(1, b"hi", 0))]]);

    let err = machine.validate(&store, &atom).unwrap_err();
    assert_eq!(err.kind, CmErrorKind::SpinConflict);
    assert_eq!(err.pointer, Some(DataPointer::of_particle(0, 0)));
}

#[test]
fn down_of_a_tampered_particle_is_a_missing_dependency() {
    let machine = full_machine();
    let store = InMemoryEngineStore::new();
    let mut tampered = MessageParticle::new(address(1), address(9), b"hi".to_vec(), 0);
    tampered.destinations = std::collections::BTreeSet::from([address(8).euid()]);
    let atom = atom_of(vec![vec![SpunParticle::down(Particle::Message(tampered))]]);

    let err = machine.validate(&store, &atom).unwrap_err();
    assert_eq!(err.kind, CmErrorKind::MissingDependency);
    assert_eq!(err.pointer, Some(DataPointer::of_particle(0, 0)));
}

// --- Scenario 6: duplicate particle within a single group ------------------

#[test]
fn duplicate_particle_within_one_group_is_a_particle_conflict() {
    let machine = full_machine();
    let store = InMemoryEngineStore::new();
    let particle = message(1, b"hi", 0);
    let atom = atom_of(vec![vec![
        SpunParticle::up(particle.clone()),
        SpunParticle::down(particle),
    ]]);

    let err = machine.validate(&store, &atom).unwrap_err();
    assert_eq!(err.kind, CmErrorKind::ParticleConflict);
}

// --- Scenario 7: rri mismatch across an rri-coupled transition -------------

#[test]
fn claiming_a_unique_under_a_foreign_rri_is_a_mismatch() {
    let machine = full_machine();
    let store = InMemoryEngineStore::new();
    let owner = address(7);
    let rri = Rri::of(owner, "nameA").unwrap();
    let atom = atom_of(vec![vec![
        SpunParticle::down(Particle::Rri(RriParticle::new(rri))),
        SpunParticle::up(Particle::Unique(UniqueParticle::new(owner, "nameB", 0))),
    ]])
    .with_witnesses(signed_by(&[7]));

    let err = machine.validate(&store, &atom).unwrap_err();
    assert_eq!(err.kind, CmErrorKind::RriMismatch);
}

#[test]
fn claiming_a_unique_under_its_own_rri_is_accepted_once() {
    let engine = Engine::new(full_machine(), InMemoryEngineStore::new());
    let owner = address(7);
    let rri = Rri::of(owner, "myid").unwrap();
    let rri_particle = Particle::Rri(RriParticle::new(rri));
    let unique = Particle::Unique(UniqueParticle::new(owner, "myid", 0));
    let atom = atom_of(vec![vec![
        SpunParticle::down(rri_particle.clone()),
        SpunParticle::up(unique.clone()),
    ]])
    .with_witnesses(signed_by(&[7]));

    engine.execute(&atom).unwrap();
    assert_eq!(engine.store().get_spin(&unique).unwrap(), Spin::Up);
    assert_eq!(engine.store().get_spin(&rri_particle).unwrap(), Spin::Down);

    // The same claim again: the rri is spent, its virtual Up is gone.
    let replay = atom_of(vec![vec![
        SpunParticle::down(rri_particle.clone()),
        SpunParticle::up(Particle::Unique(UniqueParticle::new(owner, "myid", 1))),
    ]])
    .with_witnesses(signed_by(&[7]));
    let err = engine.execute(&replay).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Rejected(e) if e.kind == CmErrorKind::SpinConflict
    ));
}

// --- Scenario 8: value mapper fallback -------------------------------------

#[test]
fn value_mapper_resolves_covered_classes_and_rejects_unregistered_ones() {
    let mapper = ParticleValueMapper::from(&[FungibleDefinition::new(
        ParticleClass::Message,
        Arc::new(|particle: &Particle| match particle {
            Particle::Message(p) => p.payload.len() as u128,
            _ => 0,
        }),
    )
    .covering(ParticleClass::Unique)]);

    let msg = message(1, b"abcd", 0);
    assert_eq!(mapper.amount(&msg).unwrap(), 4);

    // A covered class resolves through the declared chain.
    let unique = Particle::Unique(UniqueParticle::new(address(1), "id", 0));
    assert_eq!(mapper.amount(&unique).unwrap(), 4);

    // A class outside every chain has no registered ancestor.
    let rri = Particle::Rri(RriParticle::new(Rri::of(address(1), "x").unwrap()));
    let err = mapper.amount(&rri).unwrap_err();
    assert_eq!(err.kind, CmErrorKind::UnknownParticle);
}

// --- Determinism across the full stack -------------------------------------

#[test]
fn validation_is_a_pure_function_of_atom_and_store() {
    let machine = full_machine();
    let store = InMemoryEngineStore::new();
    let atom = atom_of(vec![vec![SpunParticle::up(message(1, b"hello", 0))]])
        .with_witnesses(signed_by(&[1]));

    let first = machine.validate(&store, &atom);
    let second = machine.validate(&store, &atom);
    assert_eq!(first, second);
    assert!(store.is_empty());
}
