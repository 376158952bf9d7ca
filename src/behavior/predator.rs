//! Predator hunt/rest cycle.
//!
//! Predators run the ordinary avoidance and flocking stages first; this
//! overlay then updates their state machine and bends the flocking result
//! toward the hunt point, or slows it down while resting.

use super::flocking::FlockingOutput;
use crate::agent::{AgentRecord, PredatorState};
use crate::math::{safe_normalize, slerp_towards};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Predator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredatorConfig {
    /// Prey farther than this is not noticed
    pub hunting_radius: f32,
    /// Energy lost per second while hunting
    pub energy_decay_rate: f32,
    /// Seconds spent resting after a hunt
    pub rest_duration: f32,
    /// Longest a single hunt may last
    pub hunting_duration: f32,
    pub base_acceleration: f32,
    pub hunting_acceleration: f32,
    /// A hunt is abandoned once the hunt point is farther than this
    pub lose_interest_distance: f32,
    /// Energy at or below which a hunt ends in exhaustion
    pub exhaustion_threshold: f32,
    /// Energy needed before a new hunt may start
    pub min_hunt_energy: f32,
    /// Blend of the hunt direction into the desired heading
    pub hunt_blend: f32,
    pub hunt_turn_speed: f32,
    /// Fraction of the desired heading removed while resting
    pub rest_damping: f32,
    pub rest_turn_speed: f32,
    /// Fraction of `base_acceleration` used while resting
    pub rest_acceleration_factor: f32,
}

impl Default for PredatorConfig {
    fn default() -> Self {
        Self {
            hunting_radius: 15.0,
            energy_decay_rate: 0.1,
            rest_duration: 5.0,
            hunting_duration: 10.0,
            base_acceleration: 4.0,
            hunting_acceleration: 12.0,
            lose_interest_distance: 30.0,
            exhaustion_threshold: 0.2,
            min_hunt_energy: 0.3,
            hunt_blend: 0.8,
            hunt_turn_speed: 6.0,
            rest_damping: 0.5,
            rest_turn_speed: 2.0,
            rest_acceleration_factor: 0.3,
        }
    }
}

/// Nearest live prey within `radius` of `position`
pub fn find_prey(position: Vec3, agents: &[AgentRecord], radius: f32) -> Option<Vec3> {
    let radius_sq = radius * radius;
    agents
        .iter()
        .filter(|a| !a.is_virtual() && !a.is_predator())
        .map(|a| (position.distance_squared(a.position), a.position))
        .filter(|(d, _)| *d <= radius_sq)
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, p)| p)
}

fn start_resting(state: &mut PredatorState, config: &PredatorConfig) {
    state.is_hunting = false;
    state.hunt_timer = 0.0;
    state.is_resting = true;
    state.rest_timer = config.rest_duration;
}

/// Advance one predator's state machine by `elapsed` seconds.
///
/// `agents` are the live agents of the current snapshot; virtual agents and
/// other predators are never treated as prey.
pub fn update_state(
    state: &PredatorState,
    position: Vec3,
    agents: &[AgentRecord],
    elapsed: f32,
    config: &PredatorConfig,
) -> PredatorState {
    let dt = elapsed.max(0.0);
    let mut next = *state;

    if next.is_hunting {
        next.energy_level = (next.energy_level - config.energy_decay_rate * dt).max(0.0);
        next.hunt_timer -= dt;
        if next.energy_level <= config.exhaustion_threshold || next.hunt_timer <= 0.0 {
            start_resting(&mut next, config);
            log::trace!("Predator at {:?} resting, energy {:.2}", position, next.energy_level);
        }
    } else if next.is_resting {
        next.rest_timer -= dt;
        next.energy_level += config.energy_decay_rate * 0.5 * dt;
        if next.rest_timer <= 0.0 || next.energy_level >= 1.0 {
            next.is_resting = false;
            next.rest_timer = 0.0;
        }
        next.energy_level = next.energy_level.min(1.0);
    } else {
        next.energy_level = (next.energy_level + config.energy_decay_rate * 0.3 * dt).min(1.0);
    }

    if next.is_resting || next.energy_level <= config.min_hunt_energy {
        return next;
    }

    if let Some(prey) = find_prey(position, agents, config.hunting_radius) {
        if !next.is_hunting {
            next.is_hunting = true;
            next.hunt_point = prey;
            next.hunt_timer = config.hunting_duration;
            log::trace!("Predator at {:?} hunting toward {:?}", position, prey);
        }
    }

    if next.is_hunting && position.distance(next.hunt_point) > config.lose_interest_distance {
        next.is_hunting = false;
        next.hunt_timer = 0.0;
    }

    next
}

/// Bend a predator's flocking result according to its (already updated) state
pub fn apply_overlay(
    state: &PredatorState,
    position: Vec3,
    flocking: &FlockingOutput,
    elapsed: f32,
    config: &PredatorConfig,
) -> FlockingOutput {
    let dt = elapsed.max(0.0);

    if state.is_hunting {
        let hunt_dir = safe_normalize(state.hunt_point - position);
        FlockingOutput {
            desired_heading: safe_normalize(flocking.desired_heading.lerp(hunt_dir, config.hunt_blend)),
            smoothed_heading: slerp_towards(flocking.smoothed_heading, hunt_dir, dt * config.hunt_turn_speed),
            acceleration: config.hunting_acceleration,
            ..*flocking
        }
    } else if state.is_resting {
        let desired = flocking.desired_heading.lerp(Vec3::ZERO, config.rest_damping);
        FlockingOutput {
            desired_heading: desired,
            smoothed_heading: slerp_towards(flocking.smoothed_heading, desired, dt * config.rest_turn_speed),
            acceleration: config.base_acceleration * config.rest_acceleration_factor,
            ..*flocking
        }
    } else {
        *flocking
    }
}
