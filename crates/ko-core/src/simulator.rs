//! Force-field simulator.
//!
//! Each tick runs two phases: forces are computed for every body from
//! a position snapshot, then integrated all at once, so within a tick
//! no body sees another body's partially updated position. Forces are
//! already scaled by the tick duration; integration divides by mass,
//! applies air friction, and advances positions.

use std::collections::HashMap;

use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

use crate::constants::{
    AFFINITY_FORCE_SCALE, AFFINITY_MIN_SEPARATION, AIR_FRICTION, CHAIN_REACTION_IMPULSE,
    CHAIN_REACTION_PROBABILITY, CHAIN_REACTION_RADIUS, COLLISION_COOLDOWN_MS, DRIFT_BASE_NOISE,
    DRIFT_FORGOTTEN_FACTOR, DRIFT_RESTLESS_FACTOR, DRIFT_STABLE_FACTOR, DRIFT_VOLATILE_BASE,
    EMERGENT_FORCE_SCALE, EMERGENT_MIN_SEPARATION, FORGOTTEN_EDGE_BIAS, GRAVITY_ATTRACT_SCALE,
    GRAVITY_DISSIMILAR_FORCE, GRAVITY_REDUNDANT_FORCE, MAGNETIC_FORCE_SCALE,
    MAGNETIC_MIN_SEPARATION, RIVALRY_FORCE_SCALE, RIVALRY_MAX_SEPARATION, SIMILARITY_ATTRACT,
    SIMILARITY_REDUNDANT, VOLATILE_IMPULSE_BASE, VOLATILE_IMPULSE_PROBABILITY,
    VOLATILE_IMPULSE_SPREAD,
};
use crate::physics::Physics;
use crate::similarity::SimilarityIndex;
use crate::spring::Spring2;
use crate::traits::Traits;
use crate::vec2::Vec2;

/// How a body responds to forces.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyState {
    /// Fully simulated.
    #[default]
    Free,
    /// Position controlled by the user; exerts forces but ignores them.
    Dragged,
    /// Pinned in place; exerts forces but never moves or collides.
    Anchored,
}

/// One simulated body. Relationship scores are pushed in from the
/// memory layer whenever they change.
pub struct Body {
    pub id: Uuid,
    pub physics: Physics,
    pub traits: Traits,
    /// Set externally for bodies participating in an emergent cluster.
    pub emergent: bool,
    pub state: BodyState,
    pub affinity: HashMap<Uuid, f64>,
    pub rivalry: HashMap<Uuid, f64>,
    /// Travel accumulated since the body was inserted. Callers fold
    /// this back into the KO's memory when they persist a run.
    pub drift_distance: f64,
    spring: Option<Spring2>,
}

impl Body {
    fn new(id: Uuid, physics: Physics) -> Self {
        Self {
            id,
            physics,
            traits: Traits::default(),
            emergent: false,
            state: BodyState::Free,
            affinity: HashMap::new(),
            rivalry: HashMap::new(),
            drift_distance: 0.0,
            spring: None,
        }
    }

    fn strongest_affinity(&self) -> Option<(Uuid, f64)> {
        self.affinity
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(id, strength)| (*id, *strength))
    }
}

/// Read-only view of a body for rendering and API responses.
#[derive(Clone, Debug, Serialize)]
pub struct BodySnapshot {
    pub id: Uuid,
    pub position: Vec2,
    pub velocity: Vec2,
    pub entropy: f64,
    pub mass: f64,
    /// Travel since the body was inserted, not a lifetime total.
    pub drift_distance: f64,
    pub traits: Traits,
    pub emergent: bool,
    pub state: BodyState,
}

#[derive(Default)]
pub struct Simulator {
    bodies: Vec<Body>,
    index: HashMap<Uuid, usize>,
    /// Last notification time per sorted pair.
    cooldowns: HashMap<(Uuid, Uuid), u64>,
}

impl Simulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn insert_body(&mut self, id: Uuid, physics: Physics) {
        match self.index.get(&id) {
            Some(&i) => self.bodies[i].physics = physics,
            None => {
                self.index.insert(id, self.bodies.len());
                self.bodies.push(Body::new(id, physics));
            }
        }
    }

    pub fn remove_body(&mut self, id: Uuid) {
        let Some(i) = self.index.remove(&id) else {
            return;
        };
        self.bodies.remove(i);
        for (j, body) in self.bodies.iter().enumerate() {
            self.index.insert(body.id, j);
        }
        self.cooldowns.retain(|(a, b), _| *a != id && *b != id);
    }

    pub fn body(&self, id: Uuid) -> Option<&Body> {
        self.index.get(&id).map(|&i| &self.bodies[i])
    }

    fn body_mut(&mut self, id: Uuid) -> Option<&mut Body> {
        self.index.get(&id).copied().map(|i| &mut self.bodies[i])
    }

    pub fn set_traits(&mut self, id: Uuid, traits: Traits) {
        if let Some(body) = self.body_mut(id) {
            body.traits = traits;
        }
    }

    pub fn set_emergent(&mut self, id: Uuid, emergent: bool) {
        if let Some(body) = self.body_mut(id) {
            body.emergent = emergent;
        }
    }

    pub fn set_relationships(
        &mut self,
        id: Uuid,
        affinity: HashMap<Uuid, f64>,
        rivalry: HashMap<Uuid, f64>,
    ) {
        if let Some(body) = self.body_mut(id) {
            body.affinity = affinity;
            body.rivalry = rivalry;
        }
    }

    /// Begin dragging: the body stops responding to forces.
    pub fn drag(&mut self, id: Uuid) {
        if let Some(body) = self.body_mut(id) {
            body.state = BodyState::Dragged;
            body.spring = None;
            body.physics.velocity = Vec2::ZERO;
        }
    }

    /// Move a dragged body. Ignored unless the body is being dragged.
    pub fn drag_to(&mut self, id: Uuid, position: Vec2) {
        if let Some(body) = self.body_mut(id) {
            if body.state == BodyState::Dragged {
                let before = body.physics.position;
                body.physics.position = position;
                body.drift_distance += before.distance(position);
            }
        }
    }

    /// Release a dragged body. With `anchor` set the body stays pinned
    /// where it was dropped, otherwise it resumes free simulation with
    /// its velocity reset.
    pub fn release(&mut self, id: Uuid, anchor: bool) {
        if let Some(body) = self.body_mut(id) {
            if body.state == BodyState::Dragged {
                body.physics.velocity = Vec2::ZERO;
                body.state = if anchor { BodyState::Anchored } else { BodyState::Free };
            }
        }
    }

    /// Pin a body in place.
    pub fn anchor(&mut self, id: Uuid, position: Vec2) {
        if let Some(body) = self.body_mut(id) {
            body.state = BodyState::Anchored;
            body.spring = None;
            body.physics.position = position;
            body.physics.velocity = Vec2::ZERO;
        }
    }

    pub fn unanchor(&mut self, id: Uuid) {
        if let Some(body) = self.body_mut(id) {
            if body.state == BodyState::Anchored {
                body.state = BodyState::Free;
            }
        }
    }

    /// Smoothly steer a body toward an authoritative position instead
    /// of snapping it. The body follows a damped spring until it
    /// settles, then resumes free simulation.
    pub fn set_authoritative_position(&mut self, id: Uuid, target: Vec2) {
        if let Some(body) = self.body_mut(id) {
            if body.state != BodyState::Free {
                return;
            }
            let mut spring = body
                .spring
                .unwrap_or_else(|| Spring2::new(body.physics.position));
            spring.set_target(target);
            body.spring = Some(spring);
        }
    }

    /// Advance the simulation by `dt_ms`.
    pub fn tick<R: Rng>(&mut self, dt_ms: f64, similarity: &mut SimilarityIndex, rng: &mut R) {
        let positions: Vec<Vec2> = self.bodies.iter().map(|b| b.physics.position).collect();
        let centroid = centroid(&positions);

        let mut forces = vec![Vec2::ZERO; self.bodies.len()];
        let mut impulses: Vec<(usize, Vec2)> = Vec::new();

        for i in 0..self.bodies.len() {
            let body = &self.bodies[i];
            // Static bodies exert forces on others but compute none of
            // their own, and never originate impulses.
            if body.state != BodyState::Free {
                continue;
            }
            let pos = positions[i];
            let force = &mut forces[i];

            // Entropy drift, scaled by active traits.
            let mut noise = body.physics.entropy * DRIFT_BASE_NOISE;
            if body.traits.restless {
                noise *= DRIFT_RESTLESS_FACTOR;
            }
            if body.traits.stable {
                noise *= DRIFT_STABLE_FACTOR;
            }
            if body.traits.volatile {
                noise *= DRIFT_VOLATILE_BASE + rng.random::<f64>();
            }
            if body.traits.forgotten {
                noise *= DRIFT_FORGOTTEN_FACTOR;
            }
            force.x += (rng.random::<f64>() - 0.5) * noise * dt_ms;
            force.y += (rng.random::<f64>() - 0.5) * noise * dt_ms;

            // Forgotten bodies are nudged toward the periphery.
            if body.traits.forgotten {
                force.x += pos.x.signum() * FORGOTTEN_EDGE_BIAS * dt_ms;
                force.y += pos.y.signum() * FORGOTTEN_EDGE_BIAS * dt_ms;
            }

            // Semantic gravity against every other body.
            for (j, other) in self.bodies.iter().enumerate() {
                if i == j {
                    continue;
                }
                let dist = pos.distance(positions[j]);
                if dist < 1.0 {
                    continue;
                }
                let score = similarity.similarity(body.id, other.id);
                let magnitude = if score > SIMILARITY_REDUNDANT {
                    GRAVITY_REDUNDANT_FORCE
                } else if score > SIMILARITY_ATTRACT {
                    score * GRAVITY_ATTRACT_SCALE
                } else {
                    GRAVITY_DISSIMILAR_FORCE
                };
                let dir = (positions[j] - pos).normalized();
                *force += dir * (magnitude * dt_ms);
            }

            // Affinity attraction, suppressed at close range.
            for (other, strength) in &body.affinity {
                if let Some(&j) = self.index.get(other) {
                    let dist = pos.distance(positions[j]);
                    if dist > AFFINITY_MIN_SEPARATION {
                        let dir = (positions[j] - pos).normalized();
                        *force += dir * (strength * AFFINITY_FORCE_SCALE * dt_ms);
                    }
                }
            }

            // Rivalry repulsion, local only.
            for (other, strength) in &body.rivalry {
                if let Some(&j) = self.index.get(other) {
                    let dist = pos.distance(positions[j]);
                    if dist < RIVALRY_MAX_SEPARATION {
                        let dir = (pos - positions[j]).normalized();
                        *force += dir * (strength * RIVALRY_FORCE_SCALE * dt_ms);
                    }
                }
            }

            // Magnetic bodies chase their strongest affinity.
            if body.traits.magnetic {
                if let Some((target, strength)) = body.strongest_affinity() {
                    if let Some(&j) = self.index.get(&target) {
                        let dist = pos.distance(positions[j]);
                        if dist > MAGNETIC_MIN_SEPARATION {
                            let dir = (positions[j] - pos).normalized();
                            *force += dir * (strength * MAGNETIC_FORCE_SCALE * dt_ms);
                        }
                    }
                }
            }

            // Volatile bodies fire rare random impulses, sometimes
            // chaining to nearby volatile bodies.
            if body.traits.volatile && rng.random::<f64>() < VOLATILE_IMPULSE_PROBABILITY {
                let magnitude = VOLATILE_IMPULSE_BASE + rng.random::<f64>() * VOLATILE_IMPULSE_SPREAD;
                let direction =
                    Vec2::new(rng.random::<f64>() - 0.5, rng.random::<f64>() - 0.5).normalized();
                impulses.push((i, direction * magnitude));

                for (j, neighbor) in self.bodies.iter().enumerate() {
                    if j == i || !neighbor.traits.volatile {
                        continue;
                    }
                    if pos.distance(positions[j]) < CHAIN_REACTION_RADIUS
                        && rng.random::<f64>() < CHAIN_REACTION_PROBABILITY
                    {
                        // Chained bodies are knocked back toward the source.
                        let toward = (pos - positions[j]).normalized();
                        impulses.push((j, toward * CHAIN_REACTION_IMPULSE));
                    }
                }
            }

            // Emergent cluster members settle around the centroid.
            if body.emergent {
                if let Some(center) = centroid {
                    let dist = pos.distance(center);
                    if dist > EMERGENT_MIN_SEPARATION {
                        let dir = (center - pos).normalized();
                        *force += dir * (EMERGENT_FORCE_SCALE * dt_ms);
                    }
                }
            }
        }

        for (i, impulse) in impulses {
            if self.bodies[i].state == BodyState::Free {
                self.bodies[i].physics.velocity += impulse;
            }
        }

        for (i, body) in self.bodies.iter_mut().enumerate() {
            if body.state != BodyState::Free {
                continue;
            }

            // Bodies converging on an authoritative position follow the
            // spring instead of the force field.
            if let Some(mut spring) = body.spring.take() {
                let before = body.physics.position;
                body.physics.position = spring.update(dt_ms);
                body.drift_distance += before.distance(body.physics.position);
                body.physics.velocity = Vec2::ZERO;
                if !spring.is_at_rest() {
                    body.spring = Some(spring);
                }
                continue;
            }

            body.physics.velocity += forces[i] * (1.0 / body.physics.mass);
            body.physics.velocity = body.physics.velocity * (1.0 - AIR_FRICTION);
            let before = body.physics.position;
            body.physics.position += body.physics.velocity * dt_ms;
            body.drift_distance += before.distance(body.physics.position);
        }
    }

    /// Report that two bodies touched. Returns true when a collision
    /// notification should be emitted, false while the pair is cooling
    /// down. Static bodies (dragged or anchored) never emit.
    pub fn report_contact(&mut self, a: Uuid, b: Uuid, now_ms: u64) -> bool {
        let (Some(body_a), Some(body_b)) = (self.body(a), self.body(b)) else {
            return false;
        };
        if body_a.state != BodyState::Free || body_b.state != BodyState::Free {
            return false;
        }
        let key = pair_key(a, b);
        if let Some(&last) = self.cooldowns.get(&key) {
            if now_ms.saturating_sub(last) < COLLISION_COOLDOWN_MS {
                return false;
            }
        }
        // Timer starts only when a notification is actually emitted.
        self.cooldowns.insert(key, now_ms);
        true
    }

    /// Drop cooldown entries old enough to be irrelevant.
    pub fn evict_stale(&mut self, now_ms: u64) {
        self.cooldowns
            .retain(|_, &mut last| now_ms.saturating_sub(last) < 2 * COLLISION_COOLDOWN_MS);
    }

    pub fn snapshot(&self) -> Vec<BodySnapshot> {
        self.bodies
            .iter()
            .map(|b| BodySnapshot {
                id: b.id,
                position: b.physics.position,
                velocity: b.physics.velocity,
                entropy: b.physics.entropy,
                mass: b.physics.mass,
                drift_distance: b.drift_distance,
                traits: b.traits,
                emergent: b.emergent,
                state: b.state,
            })
            .collect()
    }
}

fn pair_key(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b { (a, b) } else { (b, a) }
}

fn centroid(positions: &[Vec2]) -> Option<Vec2> {
    if positions.is_empty() {
        return None;
    }
    let sum = positions.iter().fold(Vec2::ZERO, |acc, p| acc + *p);
    Some(sum * (1.0 / positions.len() as f64))
}
