//! Persistent physics state for one KO.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::{ENTROPY_MAX, MASS_MIN, SPAWN_EXTENT};
use crate::vec2::Vec2;

/// The physics record persisted per KO. The simulator reads and writes
/// this; the memory layer only adjusts entropy and mass.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Physics {
    pub position: Vec2,
    pub velocity: Vec2,
    /// Uncertainty in [ENTROPY_MIN, ENTROPY_MAX]. High entropy drifts more.
    pub entropy: f64,
    /// Inertia in [MASS_MIN, MASS_MAX]. Heavy bodies resist forces.
    pub mass: f64,
}

impl Physics {
    /// Spawn at a random position within the default extent, centered
    /// on the origin.
    pub fn spawn<R: Rng>(rng: &mut R) -> Self {
        Self::at(Vec2::new(
            (rng.random::<f64>() - 0.5) * SPAWN_EXTENT,
            (rng.random::<f64>() - 0.5) * SPAWN_EXTENT,
        ))
    }

    /// Spawn at a known position. Entropy and mass start at their
    /// creation defaults.
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            entropy: ENTROPY_MAX,
            mass: MASS_MIN,
        }
    }
}

impl Default for Physics {
    fn default() -> Self {
        Self::at(Vec2::ZERO)
    }
}
