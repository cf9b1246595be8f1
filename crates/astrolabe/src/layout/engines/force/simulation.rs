//! Damped spring/repulsion integrator.
//!
//! [`Simulation`] is plain data with no threads or channels; the worker loop
//! drives it frame by frame, and tests step it directly.

use std::time::Duration;

use indexmap::IndexMap;
use log::trace;
use rand::{Rng, SeedableRng, rngs::StdRng};
use thiserror::Error;

use astrolabe_core::{
    geometry::{EPSILON, Vec3},
    identifier::Id,
};

use super::{
    ForceSettings,
    protocol::{BodyRecord, SpringRecord},
};

/// Simulated time credited per step when frames are not paced
const NOMINAL_FRAME: Duration = Duration::from_millis(16);

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SimulationError {
    #[error("simulation produced a non-finite state for node '{0}'")]
    NonFinite(Id),
}

/// Result of advancing the simulation by one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Moving,
    /// Energy stayed under the threshold long enough, or the step cap was hit
    Settled,
}

#[derive(Debug, Clone)]
struct Body {
    position: Vec3,
    velocity: Vec3,
    mass: f32,
    radius: f32,
    is_fixed: bool,
    is_pinned: bool,
}

impl Body {
    fn is_locked(&self) -> bool {
        self.is_fixed || self.is_pinned
    }
}

impl From<BodyRecord> for Body {
    fn from(record: BodyRecord) -> Self {
        Self {
            position: record.position,
            velocity: Vec3::ZERO,
            mass: if record.mass > 0.0 { record.mass } else { 1.0 },
            radius: record.radius,
            is_fixed: record.is_fixed,
            is_pinned: record.is_pinned,
        }
    }
}

/// Force-directed simulation state.
#[derive(Debug, Clone)]
pub struct Simulation {
    settings: ForceSettings,
    bodies: IndexMap<Id, Body>,
    springs: IndexMap<Id, SpringRecord>,
    rng: StdRng,
    energy: f32,
    calm_for: Duration,
    steps: u64,
}

impl Simulation {
    pub fn new(settings: ForceSettings) -> Self {
        Self {
            rng: StdRng::seed_from_u64(settings.seed),
            settings,
            bodies: IndexMap::new(),
            springs: IndexMap::new(),
            energy: 0.0,
            calm_for: Duration::ZERO,
            steps: 0,
        }
    }

    /// Replaces every body and spring and resets the clock
    pub fn load(&mut self, bodies: Vec<BodyRecord>, springs: Vec<SpringRecord>) {
        self.bodies = bodies
            .into_iter()
            .map(|record| (record.id, Body::from(record)))
            .collect();
        self.springs = springs.into_iter().map(|spring| (spring.id, spring)).collect();
        self.rng = StdRng::seed_from_u64(self.settings.seed);
        self.energy = 0.0;
        self.calm_for = Duration::ZERO;
        self.steps = 0;
    }

    pub fn settings(&self) -> &ForceSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: ForceSettings) {
        self.settings = settings;
    }

    pub fn add_body(&mut self, record: BodyRecord) {
        self.bodies.insert(record.id, Body::from(record));
        self.calm_for = Duration::ZERO;
    }

    /// Removes a body and every spring attached to it
    pub fn remove_body(&mut self, id: Id) {
        self.bodies.shift_remove(&id);
        self.springs
            .retain(|_, spring| spring.source != id && spring.target != id);
    }

    pub fn add_spring(&mut self, spring: SpringRecord) {
        self.springs.insert(spring.id, spring);
        self.calm_for = Duration::ZERO;
    }

    pub fn remove_spring(&mut self, id: Id) {
        self.springs.shift_remove(&id);
    }

    /// Updates the hold flags of a body, optionally teleporting it
    pub fn update_body_state(
        &mut self,
        id: Id,
        is_fixed: bool,
        is_pinned: bool,
        position: Option<Vec3>,
    ) {
        if let Some(body) = self.bodies.get_mut(&id) {
            body.is_fixed = is_fixed;
            body.is_pinned = is_pinned;
            if let Some(position) = position {
                body.position = position;
            }
            body.velocity = Vec3::ZERO;
        }
        self.calm_for = Duration::ZERO;
    }

    /// Adds a random velocity to every free body, scaled by `intensity`
    pub fn kick(&mut self, intensity: f32) {
        let speed = intensity.max(0.0) * self.settings.max_velocity * 0.5;
        for body in self.bodies.values_mut() {
            if !body.is_locked() {
                body.velocity += random_unit(&mut self.rng).scale(speed);
            }
        }
        self.calm_for = Duration::ZERO;
    }

    /// Forgets any accumulated settle time
    pub fn reset_calm(&mut self) {
        self.calm_for = Duration::ZERO;
    }

    /// Total kinetic energy after the last step
    pub fn energy(&self) -> f32 {
        self.energy
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn position(&self, id: Id) -> Option<Vec3> {
        self.bodies.get(&id).map(|body| body.position)
    }

    /// Current position of every body in insertion order
    pub fn positions(&self) -> Vec<(Id, Vec3)> {
        self.bodies
            .iter()
            .map(|(id, body)| (*id, body.position))
            .collect()
    }

    /// Integrates one step and returns the resulting kinetic energy
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::NonFinite`] if a body's position or velocity
    /// stops being finite; no body is updated by a failed step.
    pub fn step(&mut self) -> Result<f32, SimulationError> {
        let positions: Vec<Vec3> = self.bodies.values().map(|body| body.position).collect();
        let mut forces = vec![Vec3::ZERO; positions.len()];

        self.accumulate_repulsion(&positions, &mut forces);
        self.accumulate_springs(&positions, &mut forces);

        let settings = &self.settings;
        for (force, position) in forces.iter_mut().zip(&positions) {
            *force += (settings.gravity_center - *position).scale(settings.gravity);
        }

        let dt = settings.time_step;
        let mut next = Vec::with_capacity(forces.len());
        for ((id, body), force) in self.bodies.iter().zip(&forces) {
            if body.is_locked() {
                next.push((Vec3::ZERO, body.position));
                continue;
            }
            let acceleration = *force / body.mass;
            let velocity = (body.velocity + acceleration.scale(dt))
                .scale(settings.damping)
                .clamp_length(settings.max_velocity);
            let position = body.position + velocity.scale(dt);
            if !velocity.is_finite() || !position.is_finite() {
                return Err(SimulationError::NonFinite(*id));
            }
            next.push((velocity, position));
        }

        let mut energy = 0.0;
        for (body, (velocity, position)) in self.bodies.values_mut().zip(next) {
            body.velocity = velocity;
            body.position = position;
            energy += 0.5 * body.mass * velocity.length_squared();
        }

        self.energy = energy;
        self.steps += 1;
        trace!(step = self.steps, energy; "Simulation step");
        Ok(energy)
    }

    /// Steps once and updates settle tracking
    pub fn advance(&mut self) -> Result<StepOutcome, SimulationError> {
        let energy = self.step()?;

        let frame = match self.settings.frame_interval_ms {
            0 => NOMINAL_FRAME,
            ms => Duration::from_millis(ms),
        };
        if energy < self.settings.min_energy_threshold {
            self.calm_for += frame;
        } else {
            self.calm_for = Duration::ZERO;
        }

        let capped = self.settings.max_steps > 0 && self.steps >= self.settings.max_steps;
        if capped || self.calm_for >= Duration::from_millis(self.settings.auto_stop_delay_ms) {
            Ok(StepOutcome::Settled)
        } else {
            Ok(StepOutcome::Moving)
        }
    }

    /// Advances until settled or `limit` steps have run; returns the steps taken
    pub fn run_until_settled(&mut self, limit: u64) -> Result<u64, SimulationError> {
        for taken in 1..=limit {
            if self.advance()? == StepOutcome::Settled {
                return Ok(taken);
            }
        }
        Ok(limit)
    }

    fn accumulate_repulsion(&mut self, positions: &[Vec3], forces: &mut [Vec3]) {
        let repulsion = self.settings.repulsion;
        if repulsion == 0.0 {
            return;
        }
        let min_distance = self.settings.min_distance.max(EPSILON);
        for i in 0..positions.len() {
            for j in (i + 1)..positions.len() {
                let delta = positions[i] - positions[j];
                let distance = delta.length();
                let direction = if distance < EPSILON {
                    random_unit(&mut self.rng)
                } else {
                    delta / distance
                };
                let d = distance.max(min_distance);
                let push = direction.scale(repulsion / (d * d));
                forces[i] += push;
                forces[j] -= push;
            }
        }
    }

    fn accumulate_springs(&self, positions: &[Vec3], forces: &mut [Vec3]) {
        for spring in self.springs.values() {
            let (Some((si, _, source)), Some((ti, _, target))) = (
                self.bodies.get_full(&spring.source),
                self.bodies.get_full(&spring.target),
            ) else {
                continue;
            };
            if si == ti {
                continue;
            }
            let delta = positions[ti] - positions[si];
            let distance = delta.length();
            if distance < EPSILON {
                continue;
            }
            let (length, stiffness) = self.settings.spring_for(
                spring.constraint_type,
                spring.constraint_params,
                source.radius + target.radius,
            );
            let pull = (delta / distance).scale(stiffness * (distance - length));
            forces[si] += pull;
            forces[ti] -= pull;
        }
    }
}

/// A random unit vector; falls back to +x for a degenerate draw
fn random_unit(rng: &mut StdRng) -> Vec3 {
    let v = Vec3::new(
        rng.random_range(-1.0..1.0),
        rng.random_range(-1.0..1.0),
        rng.random_range(-1.0..1.0),
    );
    let unit = v.normalize_or_zero();
    if unit.is_zero() { Vec3::X } else { unit }
}
