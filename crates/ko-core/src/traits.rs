//! Derived behavioral traits.
//!
//! Traits are a pure function of memory counters and physics state,
//! recomputed after every observation or collision. They are stored
//! alongside the memory record so the simulator and query layers can
//! read them without re-deriving.

use serde::{Deserialize, Serialize};

use crate::constants::{FORGOTTEN_AFTER_DAYS, RESTLESS_DRIFT_DISTANCE};
use crate::memory::Memory;
use crate::physics::Physics;
use crate::time::MILLIS_PER_DAY;

/// The six derived traits. All default to false on a fresh KO.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Traits {
    /// Barely observed but has drifted far: wants attention.
    pub restless: bool,
    /// Well observed with several affinity partners.
    pub stable: bool,
    /// Enough affinity partners to pull other bodies in.
    pub magnetic: bool,
    /// Rivalries with several other KOs.
    pub volatile: bool,
    /// Not observed in over a month (or never observed at all).
    pub forgotten: bool,
    /// Heavily observed and heavy: the old guard of the corpus.
    pub ancient: bool,
}

const STABLE_MIN_OBSERVATIONS: u64 = 10;
const STABLE_MIN_AFFINITY_PARTNERS: usize = 3;
const MAGNETIC_MIN_AFFINITY_PARTNERS: usize = 5;
const VOLATILE_MIN_RIVALRY_PARTNERS: usize = 3;
const RESTLESS_MAX_OBSERVATIONS: u64 = 3;
const ANCIENT_MIN_OBSERVATIONS: u64 = 20;
const ANCIENT_MIN_MASS: f64 = 2.0;

/// Recompute all six traits from the current memory and physics state.
/// Relationship traits count distinct partners, not score totals.
pub fn derive_traits(memory: &Memory, physics: &Physics, now_ms: u64) -> Traits {
    let affinity_partners = memory.affinity.len();
    let rivalry_partners = memory.rivalry.len();

    let days_since_observed = match memory.last_observed {
        Some(last) => now_ms.saturating_sub(last) as f64 / MILLIS_PER_DAY as f64,
        // Never observed counts as forgotten from the start.
        None => f64::INFINITY,
    };

    Traits {
        restless: memory.observation_count < RESTLESS_MAX_OBSERVATIONS
            && memory.drift_distance > RESTLESS_DRIFT_DISTANCE,
        stable: memory.observation_count > STABLE_MIN_OBSERVATIONS
            && affinity_partners > STABLE_MIN_AFFINITY_PARTNERS,
        magnetic: affinity_partners > MAGNETIC_MIN_AFFINITY_PARTNERS,
        volatile: rivalry_partners > VOLATILE_MIN_RIVALRY_PARTNERS,
        forgotten: days_since_observed > FORGOTTEN_AFTER_DAYS,
        ancient: memory.observation_count > ANCIENT_MIN_OBSERVATIONS
            && physics.mass > ANCIENT_MIN_MASS,
    }
}

impl Traits {
    /// Active trait names, for display and event payloads.
    pub fn active(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.restless {
            names.push("restless");
        }
        if self.stable {
            names.push("stable");
        }
        if self.magnetic {
            names.push("magnetic");
        }
        if self.volatile {
            names.push("volatile");
        }
        if self.forgotten {
            names.push("forgotten");
        }
        if self.ancient {
            names.push("ancient");
        }
        names
    }
}
