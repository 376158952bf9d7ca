//! Boundary avoidance with direction hysteresis.
//!
//! Ordinary obstacles are handled by virtual agents in the flocking stage;
//! this stage only reacts to the extreme world boundaries and keeps a short
//! memory of the last avoidance direction so agents do not snap straight
//! back toward danger.

use crate::agent::{AgentRecord, AvoidanceMemory};
use crate::math::{is_zero, safe_normalize};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Boundary avoidance configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvoidanceConfig {
    /// |x| and |z| beyond which agents are pushed back
    pub horizontal_extreme: f32,
    /// |y| beyond which agents are pushed back
    pub vertical_extreme: f32,
    /// Distance inside an extreme that counts as an emergency
    pub emergency_margin: f32,
    /// Seconds the avoidance memory lasts after the trigger clears
    pub memory_time: f32,
    /// Look-ahead used to decide whether the path to the target is clear
    pub clear_path_distance: f32,
    /// Rate at which the held direction blends toward a new one
    pub blend_speed: f32,
    /// Seconds a stable direction is held
    pub hold_time: f32,
    /// Seconds a stable direction is held during an emergency
    pub emergency_hold_time: f32,
}

impl Default for AvoidanceConfig {
    fn default() -> Self {
        Self {
            horizontal_extreme: 100.0,
            vertical_extreme: 50.0,
            emergency_margin: 5.0,
            memory_time: 2.0,
            clear_path_distance: 8.0,
            blend_speed: 2.0,
            hold_time: 1.2,
            emergency_hold_time: 0.5,
        }
    }
}

/// Per-agent avoidance result
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AvoidanceOutput {
    pub direction: Vec3,
    pub avoiding: bool,
    pub in_emergency: bool,
    /// Memory to carry into the next tick
    pub memory: AvoidanceMemory,
}

/// Push-back direction from the world boundaries alone (zero when inside)
pub fn boundary_direction(position: Vec3, config: &AvoidanceConfig) -> Vec3 {
    fn axis(value: f32, extreme: f32) -> f32 {
        if value > extreme {
            -1.0
        } else if value < -extreme {
            1.0
        } else {
            0.0
        }
    }

    safe_normalize(Vec3::new(
        axis(position.x, config.horizontal_extreme),
        axis(position.y, config.vertical_extreme),
        axis(position.z, config.horizontal_extreme),
    ))
}

/// Any axis within the emergency margin of its extreme
pub fn is_emergency(position: Vec3, config: &AvoidanceConfig) -> bool {
    let horizontal = config.horizontal_extreme - config.emergency_margin;
    let vertical = config.vertical_extreme - config.emergency_margin;
    position.x.abs() > horizontal || position.z.abs() > horizontal || position.y.abs() > vertical
}

/// Projects `direction` forward and checks the point stays inside the boundaries
pub fn is_path_clear(position: Vec3, direction: Vec3, config: &AvoidanceConfig) -> bool {
    if is_zero(direction) {
        return true;
    }
    let probe = position + direction * config.clear_path_distance;
    probe.x.abs() < config.horizontal_extreme
        && probe.z.abs() < config.horizontal_extreme
        && probe.y.abs() < config.vertical_extreme
}

/// Decay timers by `elapsed`. `has_memory` drops exactly when the timer hits zero.
fn decay(memory: &mut AvoidanceMemory, elapsed: f32) {
    if memory.direction_hold_timer > 0.0 {
        memory.direction_hold_timer = (memory.direction_hold_timer - elapsed).max(0.0);
    }
    if memory.has_memory {
        memory.memory_timer = (memory.memory_timer - elapsed).max(0.0);
        if memory.memory_timer <= 0.0 {
            memory.has_memory = false;
        }
    }
}

/// Compute avoidance for one agent. Reads only the agent itself.
pub fn compute(agent: &AgentRecord, elapsed: f32, config: &AvoidanceConfig) -> AvoidanceOutput {
    if agent.is_virtual() {
        return AvoidanceOutput::default();
    }

    let elapsed = elapsed.max(0.0);
    let mut memory = agent.memory;
    decay(&mut memory, elapsed);

    let instant = boundary_direction(agent.position, config);
    if !is_zero(instant) {
        let in_emergency = is_emergency(agent.position, config);

        // A zero-length tick reports the flags but leaves the memory alone
        if elapsed == 0.0 {
            let direction = if is_zero(memory.stable_direction) {
                instant
            } else {
                memory.stable_direction
            };
            return AvoidanceOutput {
                direction,
                avoiding: true,
                in_emergency,
                memory,
            };
        }

        if is_zero(memory.stable_direction) || memory.direction_hold_timer <= 0.0 {
            memory.stable_direction = instant;
            memory.direction_hold_timer = if in_emergency {
                config.emergency_hold_time
            } else {
                config.hold_time
            };
        } else {
            let blend = (elapsed * config.blend_speed).min(1.0);
            let blended = safe_normalize(memory.stable_direction.lerp(instant, blend));
            memory.stable_direction = if is_zero(blended) { instant } else { blended };
        }

        memory.memory_timer = config.memory_time;
        memory.has_memory = config.memory_time > 0.0;
        memory.last_direction = memory.stable_direction;

        return AvoidanceOutput {
            direction: memory.stable_direction,
            avoiding: true,
            in_emergency,
            memory,
        };
    }

    if memory.has_memory {
        let target_dir = agent
            .target
            .map_or(Vec3::ZERO, |target| safe_normalize(target - agent.position));

        if !is_path_clear(agent.position, target_dir, config) {
            let strength = if config.memory_time > 0.0 {
                (memory.memory_timer / config.memory_time).clamp(0.0, 1.0)
            } else {
                0.0
            };
            return AvoidanceOutput {
                direction: memory.last_direction * strength,
                avoiding: true,
                in_emergency: false,
                memory,
            };
        }
    }

    AvoidanceOutput {
        direction: Vec3::ZERO,
        avoiding: false,
        in_emergency: false,
        memory,
    }
}
