//! Per-KO memory: interaction counters, relationship scores, and the
//! evolution log.
//!
//! All mutation goes through [`record_observation`], [`record_collision`],
//! and [`record_drift`] so the trait recompute and history cap can
//! never be skipped.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{
    AFFINITY_SYNTHESIS_DELTA, ENTROPY_MIN, ENTROPY_OBSERVATION_DROP, EVOLUTION_HISTORY_CAP,
    MASS_MAX, MASS_OBSERVATION_GAIN, RIVALRY_DISMISS_DELTA,
};
use crate::physics::Physics;
use crate::traits::{derive_traits, Traits};
use crate::vec2::clamp_unit;

/// How a surfaced collision was resolved by the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionOutcome {
    /// A bridge note was created; both sides gain affinity.
    Synthesis,
    /// The pairing was rejected; both sides gain rivalry.
    Dismiss,
    /// No decision; only the counters move.
    Ignore,
}

impl CollisionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Synthesis => "synthesis",
            Self::Dismiss => "dismiss",
            Self::Ignore => "ignore",
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "synthesis" => Self::Synthesis,
            "dismiss" => Self::Dismiss,
            _ => Self::Ignore,
        }
    }
}

/// One entry in a KO's evolution log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvolutionEvent {
    pub timestamp: u64,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    Observed { duration_ms: u64 },
    Collision { with: Uuid, outcome: CollisionOutcome },
    Synthesis { with: Uuid },
}

/// Accumulated interaction history for one KO.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Memory {
    pub observation_count: u64,
    pub collision_count: u64,
    /// Unix millis of the most recent observation. None until first observed.
    pub last_observed: Option<u64>,
    /// Total milliseconds of observation time across all sessions.
    pub total_observation_ms: u64,
    /// Accumulated spatial travel, in world units. Feeds the restless
    /// trait; only ever grows.
    pub drift_distance: f64,
    /// Affinity toward other KOs, keyed by their id, each in [0, 1].
    pub affinity: HashMap<Uuid, f64>,
    /// Rivalry toward other KOs, keyed by their id, each in [0, 1].
    pub rivalry: HashMap<Uuid, f64>,
    /// Capped FIFO of evolution events, oldest first.
    pub history: VecDeque<EvolutionEvent>,
    pub traits: Traits,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event, evicting the oldest once the cap is reached.
    pub fn push_event(&mut self, timestamp: u64, kind: EventKind) {
        self.history.push_back(EvolutionEvent { timestamp, kind });
        while self.history.len() > EVOLUTION_HISTORY_CAP {
            self.history.pop_front();
        }
    }

    fn bump_affinity(&mut self, other: Uuid, delta: f64) {
        let entry = self.affinity.entry(other).or_insert(0.0);
        *entry = clamp_unit(*entry + delta);
    }

    fn bump_rivalry(&mut self, other: Uuid, delta: f64) {
        let entry = self.rivalry.entry(other).or_insert(0.0);
        *entry = clamp_unit(*entry + delta);
    }
}

/// Record that a KO was observed for `duration_ms`. Observation
/// collapses entropy toward its floor, adds mass, logs the event, and
/// recomputes traits.
pub fn record_observation(memory: &mut Memory, physics: &mut Physics, duration_ms: u64, now_ms: u64) {
    memory.observation_count += 1;
    memory.last_observed = Some(now_ms);
    memory.total_observation_ms += duration_ms;

    physics.entropy = (physics.entropy - ENTROPY_OBSERVATION_DROP).max(ENTROPY_MIN);
    physics.mass = (physics.mass + MASS_OBSERVATION_GAIN).min(MASS_MAX);

    memory.push_event(now_ms, EventKind::Observed { duration_ms });
    memory.traits = derive_traits(memory, physics, now_ms);
}

/// Fold simulated travel into a KO's memory and recompute traits.
/// The simulator reports per-run travel; this is where it accumulates.
pub fn record_drift(memory: &mut Memory, physics: &Physics, distance: f64, now_ms: u64) {
    memory.drift_distance += distance.max(0.0);
    memory.traits = derive_traits(memory, physics, now_ms);
}

/// Record the resolution of a collision between two KOs. Both sides
/// count the collision; synthesis and dismiss additionally move the
/// relationship scores symmetrically. Ignore moves counters only.
#[allow(clippy::too_many_arguments)]
pub fn record_collision(
    a_id: Uuid,
    a_memory: &mut Memory,
    a_physics: &Physics,
    b_id: Uuid,
    b_memory: &mut Memory,
    b_physics: &Physics,
    outcome: CollisionOutcome,
    now_ms: u64,
) {
    a_memory.collision_count += 1;
    b_memory.collision_count += 1;

    match outcome {
        CollisionOutcome::Synthesis => {
            a_memory.bump_affinity(b_id, AFFINITY_SYNTHESIS_DELTA);
            b_memory.bump_affinity(a_id, AFFINITY_SYNTHESIS_DELTA);
            a_memory.push_event(now_ms, EventKind::Synthesis { with: b_id });
            b_memory.push_event(now_ms, EventKind::Synthesis { with: a_id });
        }
        CollisionOutcome::Dismiss => {
            a_memory.bump_rivalry(b_id, RIVALRY_DISMISS_DELTA);
            b_memory.bump_rivalry(a_id, RIVALRY_DISMISS_DELTA);
            a_memory.push_event(
                now_ms,
                EventKind::Collision { with: b_id, outcome: CollisionOutcome::Dismiss },
            );
            b_memory.push_event(
                now_ms,
                EventKind::Collision { with: a_id, outcome: CollisionOutcome::Dismiss },
            );
        }
        CollisionOutcome::Ignore => {}
    }

    a_memory.traits = derive_traits(a_memory, a_physics, now_ms);
    b_memory.traits = derive_traits(b_memory, b_physics, now_ms);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{ENTROPY_MAX, MASS_MIN};
    use crate::vec2::Vec2;

    #[test]
    fn test_observation_updates_counters_and_physics() {
        let mut memory = Memory::new();
        let mut physics = Physics::at(Vec2::ZERO);

        record_observation(&mut memory, &mut physics, 1500, 42_000);

        assert_eq!(memory.observation_count, 1);
        assert_eq!(memory.last_observed, Some(42_000));
        assert_eq!(memory.total_observation_ms, 1500);
        assert!((physics.entropy - (ENTROPY_MAX - ENTROPY_OBSERVATION_DROP)).abs() < 1e-12);
        assert!((physics.mass - (MASS_MIN + MASS_OBSERVATION_GAIN)).abs() < 1e-12);
        assert_eq!(memory.history.len(), 1);
    }

    #[test]
    fn test_entropy_floor_and_mass_ceiling() {
        let mut memory = Memory::new();
        let mut physics = Physics::at(Vec2::ZERO);

        for i in 0..300 {
            record_observation(&mut memory, &mut physics, 100, i);
        }

        assert_eq!(physics.entropy, ENTROPY_MIN);
        assert_eq!(physics.mass, MASS_MAX);
    }

    #[test]
    fn test_history_cap() {
        let mut memory = Memory::new();
        let mut physics = Physics::at(Vec2::ZERO);

        for i in 0..150u64 {
            record_observation(&mut memory, &mut physics, 1, i);
        }

        assert_eq!(memory.history.len(), EVOLUTION_HISTORY_CAP);
        // Oldest events were evicted first.
        assert_eq!(memory.history.front().map(|e| e.timestamp), Some(50));
        assert_eq!(memory.history.back().map(|e| e.timestamp), Some(149));
    }

    #[test]
    fn test_synthesis_is_symmetric() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut ma = Memory::new();
        let mut mb = Memory::new();
        let pa = Physics::at(Vec2::ZERO);
        let pb = Physics::at(Vec2::ZERO);

        record_collision(a, &mut ma, &pa, b, &mut mb, &pb, CollisionOutcome::Synthesis, 1000);

        assert_eq!(ma.collision_count, 1);
        assert_eq!(mb.collision_count, 1);
        assert_eq!(ma.affinity.get(&b), Some(&AFFINITY_SYNTHESIS_DELTA));
        assert_eq!(mb.affinity.get(&a), Some(&AFFINITY_SYNTHESIS_DELTA));
        assert!(ma.rivalry.is_empty());
        assert_eq!(ma.history.len(), 1);
        assert_eq!(mb.history.len(), 1);
    }

    #[test]
    fn test_dismiss_builds_rivalry() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut ma = Memory::new();
        let mut mb = Memory::new();
        let pa = Physics::at(Vec2::ZERO);
        let pb = Physics::at(Vec2::ZERO);

        record_collision(a, &mut ma, &pa, b, &mut mb, &pb, CollisionOutcome::Dismiss, 1000);

        assert_eq!(ma.rivalry.get(&b), Some(&RIVALRY_DISMISS_DELTA));
        assert_eq!(mb.rivalry.get(&a), Some(&RIVALRY_DISMISS_DELTA));
        assert!(ma.affinity.is_empty());
    }

    #[test]
    fn test_ignore_only_counts() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut ma = Memory::new();
        let mut mb = Memory::new();
        let pa = Physics::at(Vec2::ZERO);
        let pb = Physics::at(Vec2::ZERO);

        record_collision(a, &mut ma, &pa, b, &mut mb, &pb, CollisionOutcome::Ignore, 1000);

        assert_eq!(ma.collision_count, 1);
        assert_eq!(mb.collision_count, 1);
        assert!(ma.affinity.is_empty() && ma.rivalry.is_empty());
        assert!(ma.history.is_empty());
        assert!(mb.history.is_empty());
    }

    #[test]
    fn test_affinity_clamped_at_one() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut ma = Memory::new();
        let mut mb = Memory::new();
        let pa = Physics::at(Vec2::ZERO);
        let pb = Physics::at(Vec2::ZERO);

        for i in 0..20 {
            record_collision(a, &mut ma, &pa, b, &mut mb, &pb, CollisionOutcome::Synthesis, i);
        }

        assert_eq!(ma.affinity.get(&b), Some(&1.0));
        assert_eq!(mb.affinity.get(&a), Some(&1.0));
    }

    #[test]
    fn test_drift_accumulates_and_flips_restless() {
        let mut memory = Memory::new();
        let physics = Physics::at(Vec2::ZERO);

        record_drift(&mut memory, &physics, 300.0, 0);
        assert_eq!(memory.drift_distance, 300.0);
        assert!(!memory.traits.restless);

        record_drift(&mut memory, &physics, 250.0, 0);
        assert_eq!(memory.drift_distance, 550.0);
        assert!(memory.traits.restless, "unobserved KO past 500 units of travel");

        // Negative deltas never shrink the total.
        record_drift(&mut memory, &physics, -10.0, 0);
        assert_eq!(memory.drift_distance, 550.0);
    }

    #[test]
    fn test_event_kind_serialization() {
        let event = EvolutionEvent {
            timestamp: 5,
            kind: EventKind::Observed { duration_ms: 100 },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "observed");
        assert_eq!(json["duration_ms"], 100);
        assert_eq!(json["timestamp"], 5);

        let back: EvolutionEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
