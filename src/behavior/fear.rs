//! Fear of nearby predators.

use crate::agent::AgentRecord;
use crate::math::safe_normalize;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Fear configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FearConfig {
    /// Compute fear at all
    pub enabled: bool,
    /// Predators farther than this are ignored
    pub fear_radius: f32,
    /// Fear lost per second once the predator is gone
    pub decay_rate: f32,
    /// Proximity multiplier when the closest predator is hunting
    pub hunting_multiplier: f32,
    /// Weight of the flee direction in the flocking sum, scaled by fear
    pub flee_weight: f32,
    /// Extra acceleration fraction at full fear
    pub acceleration_boost: f32,
}

impl Default for FearConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fear_radius: 12.0,
            decay_rate: 0.5,
            hunting_multiplier: 1.5,
            flee_weight: 2.0,
            acceleration_boost: 0.5,
        }
    }
}

/// Fear level and the direction away from the threat
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FearReading {
    pub level: f32,
    pub flee: Vec3,
}

/// Assess fear for `agent` against the predators at `predators` in `agents`.
pub fn assess(
    agent: &AgentRecord,
    agents: &[AgentRecord],
    predators: &[usize],
    elapsed: f32,
    config: &FearConfig,
) -> FearReading {
    if !config.enabled || agent.is_virtual() || agent.is_predator() || config.fear_radius <= 0.0 {
        return FearReading::default();
    }

    let nearest = predators
        .iter()
        .filter_map(|&idx| agents.get(idx))
        .map(|p| (agent.position.distance(p.position), p))
        .filter(|(d, _)| *d < config.fear_radius)
        .min_by(|a, b| a.0.total_cmp(&b.0));

    let decayed = (agent.fear_level - config.decay_rate * elapsed.max(0.0)).max(0.0);

    match nearest {
        Some((distance, predator)) => {
            let mut proximity = 1.0 - distance / config.fear_radius;
            if predator.predator_state().is_some_and(|s| s.is_hunting) {
                proximity *= config.hunting_multiplier;
            }
            FearReading {
                level: proximity.max(decayed).clamp(0.0, 1.0),
                flee: safe_normalize(agent.position - predator.position),
            }
        }
        None => FearReading {
            level: decayed.min(1.0),
            flee: Vec3::ZERO,
        },
    }
}
