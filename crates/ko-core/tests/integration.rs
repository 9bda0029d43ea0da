//! Cross-module scenarios: memory evolution driving traits, traits
//! driving the simulator, and the embedding pipeline feeding semantic
//! gravity.

use std::collections::HashMap;

use proptest::prelude::*;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use uuid::Uuid;

use ko_core::constants::{
    ENTROPY_MAX, ENTROPY_MIN, EVOLUTION_HISTORY_CAP, MASS_MAX, MASS_MIN,
};
use ko_core::time::MILLIS_PER_DAY;
use ko_core::{
    derive_traits, record_collision, record_observation, CollisionOutcome, Embedder, Memory,
    Physics, SeededEncoder, SimilarityIndex, Simulator, Vec2, Vocabulary,
};

fn pair() -> (Uuid, Memory, Physics, Uuid, Memory, Physics) {
    (
        Uuid::new_v4(),
        Memory::new(),
        Physics::at(Vec2::ZERO),
        Uuid::new_v4(),
        Memory::new(),
        Physics::at(Vec2::new(100.0, 0.0)),
    )
}

#[test]
fn observation_lifecycle_clears_forgotten_and_builds_weight() {
    let mut memory = Memory::new();
    let mut physics = Physics::at(Vec2::ZERO);
    let now = 100 * MILLIS_PER_DAY;

    assert!(derive_traits(&memory, &physics, now).forgotten);

    record_observation(&mut memory, &mut physics, 2000, now);
    assert!(!memory.traits.forgotten);
    assert_eq!(memory.observation_count, 1);
    assert!(physics.entropy < ENTROPY_MAX);
    assert!(physics.mass > MASS_MIN);
}

#[test]
fn heavy_use_produces_ancient() {
    let mut memory = Memory::new();
    let mut physics = Physics::at(Vec2::ZERO);

    for i in 0..60u64 {
        record_observation(&mut memory, &mut physics, 1000, i * 1000);
    }

    assert!(memory.traits.ancient, "60 observations should exceed both thresholds");
    assert_eq!(physics.entropy, ENTROPY_MIN);
}

#[test]
fn synthesis_partners_produce_magnetic_hub() {
    let hub = Uuid::new_v4();
    let mut hub_memory = Memory::new();
    let hub_physics = Physics::at(Vec2::ZERO);

    // Affinities with six distinct partners cross the magnetic threshold.
    for n in 0..6u64 {
        let other = Uuid::new_v4();
        let mut other_memory = Memory::new();
        let other_physics = Physics::at(Vec2::ZERO);
        record_collision(
            hub,
            &mut hub_memory,
            &hub_physics,
            other,
            &mut other_memory,
            &other_physics,
            CollisionOutcome::Synthesis,
            n * 1000,
        );
    }

    assert_eq!(hub_memory.affinity.len(), 6);
    assert!(hub_memory.traits.magnetic);
}

#[test]
fn dismissals_produce_volatile() {
    let a = Uuid::new_v4();
    let mut ma = Memory::new();
    let pa = Physics::at(Vec2::ZERO);

    // Rivalries with four distinct partners cross the volatile threshold.
    for _ in 0..4 {
        let other = Uuid::new_v4();
        let mut mo = Memory::new();
        let po = Physics::at(Vec2::ZERO);
        record_collision(a, &mut ma, &pa, other, &mut mo, &po, CollisionOutcome::Dismiss, 0);
    }

    assert_eq!(ma.rivalry.len(), 4);
    assert!(ma.traits.volatile);
}

#[test]
fn ignore_never_changes_scores() {
    let (a, mut ma, pa, b, mut mb, pb) = pair();

    for i in 0..50u64 {
        record_collision(a, &mut ma, &pa, b, &mut mb, &pb, CollisionOutcome::Ignore, i);
    }

    assert_eq!(ma.collision_count, 50);
    assert!(ma.affinity.is_empty() && ma.rivalry.is_empty());
    assert!(mb.affinity.is_empty() && mb.rivalry.is_empty());
    assert!(ma.history.is_empty());
}

#[test]
fn embeddings_drive_semantic_gravity() {
    let vocab = Vocabulary::from_lines([
        "[PAD]", "[UNK]", "[CLS]", "[SEP]", "rust", "borrow", "checker", "sourdough", "bread",
    ]);
    let embedder = Embedder::new(vocab, SeededEncoder::default());

    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let mut index = SimilarityIndex::new();
    index.insert(a, embedder.embed("rust borrow checker").unwrap());
    index.insert(b, embedder.embed("rust borrow checker").unwrap());

    // Identical text means similarity 1.0: redundant, so the pair repels.
    assert!(index.similarity(a, b) > 0.9);

    let mut sim = Simulator::new();
    let mut pa = Physics::at(Vec2::new(-20.0, 0.0));
    let mut pb = Physics::at(Vec2::new(20.0, 0.0));
    pa.entropy = 0.0;
    pb.entropy = 0.0;
    sim.insert_body(a, pa);
    sim.insert_body(b, pb);

    let mut rng = SmallRng::seed_from_u64(42);
    for _ in 0..300 {
        sim.tick(16.0, &mut index, &mut rng);
    }

    let dist = sim
        .body(a)
        .unwrap()
        .physics
        .position
        .distance(sim.body(b).unwrap().physics.position);
    assert!(dist > 40.0, "redundant pair should separate, ended at {dist}");
}

#[test]
fn close_pair_attracts_by_gravity_not_affinity() {
    // Two unit vectors at a controlled angle: dot = 0.8, in the
    // attractive band.
    fn unit(x: f32, y: f32) -> Vec<f32> {
        let mut v = vec![0.0f32; 384];
        let norm = (x * x + y * y).sqrt();
        v[0] = x / norm;
        v[1] = y / norm;
        v
    }

    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let mut index = SimilarityIndex::new();
    index.insert(a, unit(1.0, 0.0));
    index.insert(b, unit(0.8, 0.6));
    assert!((index.similarity(a, b) - 0.8).abs() < 1e-6);

    // Distance 40 is inside the affinity suppression radius.
    let mut sim = Simulator::new();
    let mut pa = Physics::at(Vec2::new(-20.0, 0.0));
    let mut pb = Physics::at(Vec2::new(20.0, 0.0));
    pa.entropy = 0.0;
    pb.entropy = 0.0;
    sim.insert_body(a, pa);
    sim.insert_body(b, pb);
    let mut affinity = HashMap::new();
    affinity.insert(b, 0.8);
    sim.set_relationships(a, affinity, HashMap::new());
    let mut reverse = HashMap::new();
    reverse.insert(a, 0.8);
    sim.set_relationships(b, reverse, HashMap::new());

    let mut rng = SmallRng::seed_from_u64(42);
    for _ in 0..200 {
        sim.tick(16.0, &mut index, &mut rng);
    }

    let dist = sim
        .body(a)
        .unwrap()
        .physics
        .position
        .distance(sim.body(b).unwrap().physics.position);
    assert!(dist < 40.0, "similar pair should close in, ended at {dist}");
}

#[test]
fn simulator_tracks_memory_traits() {
    let id = Uuid::new_v4();
    let mut memory = Memory::new();
    let mut physics = Physics::at(Vec2::ZERO);
    record_observation(&mut memory, &mut physics, 1000, 0);

    let mut sim = Simulator::new();
    sim.insert_body(id, physics);
    sim.set_traits(id, memory.traits);
    sim.set_relationships(id, memory.affinity.clone(), memory.rivalry.clone());

    let snap = sim.snapshot();
    assert_eq!(snap.len(), 1);
    assert_eq!(snap[0].traits, memory.traits);
}

proptest! {
    #[test]
    fn affinity_and_rivalry_stay_in_unit_range(outcomes in prop::collection::vec(0u8..3, 1..60)) {
        let (a, mut ma, pa, b, mut mb, pb) = pair();

        for (i, o) in outcomes.iter().enumerate() {
            let outcome = match o {
                0 => CollisionOutcome::Synthesis,
                1 => CollisionOutcome::Dismiss,
                _ => CollisionOutcome::Ignore,
            };
            record_collision(a, &mut ma, &pa, b, &mut mb, &pb, outcome, i as u64);
        }

        for v in ma.affinity.values().chain(ma.rivalry.values()) {
            prop_assert!((0.0..=1.0).contains(v));
        }
        prop_assert_eq!(ma.collision_count, outcomes.len() as u64);
        prop_assert_eq!(ma.collision_count, mb.collision_count);
        // Score changes are always symmetric.
        prop_assert_eq!(ma.affinity.get(&b), mb.affinity.get(&a));
        prop_assert_eq!(ma.rivalry.get(&b), mb.rivalry.get(&a));
    }

    #[test]
    fn observation_keeps_physics_bounded(durations in prop::collection::vec(0u64..100_000, 1..200)) {
        let mut memory = Memory::new();
        let mut physics = Physics::at(Vec2::ZERO);

        for (i, d) in durations.iter().enumerate() {
            record_observation(&mut memory, &mut physics, *d, i as u64 * 1000);
        }

        prop_assert!((ENTROPY_MIN..=ENTROPY_MAX).contains(&physics.entropy));
        prop_assert!((MASS_MIN..=MASS_MAX).contains(&physics.mass));
        prop_assert!(memory.history.len() <= EVOLUTION_HISTORY_CAP);
        prop_assert_eq!(memory.observation_count, durations.len() as u64);
        prop_assert_eq!(memory.total_observation_ms, durations.iter().sum::<u64>());
    }
}
