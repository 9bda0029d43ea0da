//! Critically-damped spring smoothing.
//!
//! Authoritative positions propagated from the store are treated as a
//! target to damp toward, never snapped to, so event delivery jitter
//! never produces visible discontinuities.

use crate::constants::{SPRING_DAMPING, SPRING_PRECISION, SPRING_STIFFNESS};
use crate::vec2::Vec2;

/// One-dimensional damped spring.
#[derive(Clone, Copy, Debug)]
pub struct Spring {
    pub current: f64,
    pub target: f64,
    pub velocity: f64,
    stiffness: f64,
    damping: f64,
    precision: f64,
}

impl Spring {
    pub fn new(initial: f64) -> Self {
        Self {
            current: initial,
            target: initial,
            velocity: 0.0,
            stiffness: SPRING_STIFFNESS,
            damping: SPRING_DAMPING,
            precision: SPRING_PRECISION,
        }
    }

    /// Advance the spring by `dt_ms` and return the new current value.
    /// Snaps to the target once both displacement and velocity fall
    /// under the precision threshold.
    pub fn update(&mut self, dt_ms: f64) -> f64 {
        let dt = dt_ms / 1000.0;

        let spring_force = (self.target - self.current) * self.stiffness;
        let damping_force = self.velocity * self.damping;
        let acceleration = spring_force - damping_force;

        self.velocity += acceleration * dt;
        self.current += self.velocity * dt;

        if (self.target - self.current).abs() < self.precision
            && self.velocity.abs() < self.precision
        {
            self.current = self.target;
            self.velocity = 0.0;
        }

        self.current
    }

    pub fn set_target(&mut self, value: f64) {
        self.target = value;
    }

    /// Jump to a value immediately, killing any in-flight motion.
    pub fn set(&mut self, value: f64) {
        self.current = value;
        self.target = value;
        self.velocity = 0.0;
    }

    pub fn is_at_rest(&self) -> bool {
        self.current == self.target && self.velocity == 0.0
    }
}

/// Two-dimensional spring for position smoothing.
#[derive(Clone, Copy, Debug)]
pub struct Spring2 {
    pub x: Spring,
    pub y: Spring,
}

impl Spring2 {
    pub fn new(initial: Vec2) -> Self {
        Self {
            x: Spring::new(initial.x),
            y: Spring::new(initial.y),
        }
    }

    pub fn update(&mut self, dt_ms: f64) -> Vec2 {
        Vec2::new(self.x.update(dt_ms), self.y.update(dt_ms))
    }

    pub fn set_target(&mut self, target: Vec2) {
        self.x.set_target(target.x);
        self.y.set_target(target.y);
    }

    pub fn set(&mut self, value: Vec2) {
        self.x.set(value.x);
        self.y.set(value.y);
    }

    pub fn current(&self) -> Vec2 {
        Vec2::new(self.x.current, self.y.current)
    }

    pub fn is_at_rest(&self) -> bool {
        self.x.is_at_rest() && self.y.is_at_rest()
    }
}
