//! Agent records shared by every pipeline stage.
//!
//! Fish, predators and the synthetic obstacle agents all use the same
//! [`AgentRecord`]; the behavior differences live in [`AgentKind`].

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Species tag. Values at or above [`Species::VIRTUAL_THRESHOLD`] are
/// synthetic obstacle agents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Species(pub u16);

impl Species {
    pub const TUNA: Species = Species(0);
    pub const GOLDEN_TREVALLY: Species = Species(1);
    pub const CLOWN_FISH: Species = Species(2);
    pub const YELLOWTAIL_SNAPPER: Species = Species(3);
    pub const ANGELFISH: Species = Species(4);
    pub const GROUPER: Species = Species(5);
    pub const SHARK: Species = Species(6);
    pub const DRAGON: Species = Species(7);

    /// First species value reserved for virtual agents
    pub const VIRTUAL_THRESHOLD: u16 = 998;
    /// Ring agents placed around an obstacle
    pub const VIRTUAL_EXTERIOR: Species = Species(998);
    /// Core agents placed inside an obstacle
    pub const VIRTUAL_INTERIOR: Species = Species(999);

    /// Fish species used when spawning mixed schools
    pub const FISH: [Species; 7] = [
        Species::TUNA,
        Species::GOLDEN_TREVALLY,
        Species::CLOWN_FISH,
        Species::YELLOWTAIL_SNAPPER,
        Species::ANGELFISH,
        Species::GROUPER,
        Species::SHARK,
    ];

    #[inline]
    pub fn is_virtual(self) -> bool {
        self.0 >= Self::VIRTUAL_THRESHOLD
    }

    #[inline]
    pub fn is_interior(self) -> bool {
        self.0 >= Self::VIRTUAL_INTERIOR.0
    }
}

/// Hysteresis state that keeps an agent turning away from a threat for a
/// while after the trigger clears
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AvoidanceMemory {
    /// Direction reported the last time avoidance was actively triggered
    pub last_direction: Vec3,
    /// Seconds of memory left
    pub memory_timer: f32,
    /// False exactly when `memory_timer <= 0`
    pub has_memory: bool,
    /// Direction held (or slowly blended) to suppress per-tick jitter
    pub stable_direction: Vec3,
    /// Seconds before `stable_direction` may be replaced outright
    pub direction_hold_timer: f32,
}

/// Which leg of the hunt cycle a predator is in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredatorPhase {
    Patrol,
    Hunting,
    Resting,
}

/// Predator-only sub-state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredatorState {
    /// 0.0 (exhausted) to 1.0 (fresh)
    pub energy_level: f32,
    pub is_hunting: bool,
    pub is_resting: bool,
    /// Prey position captured when the hunt started
    pub hunt_point: Vec3,
    pub rest_timer: f32,
    pub hunt_timer: f32,
}

impl Default for PredatorState {
    fn default() -> Self {
        Self {
            energy_level: 1.0,
            is_hunting: false,
            is_resting: false,
            hunt_point: Vec3::ZERO,
            rest_timer: 0.0,
            hunt_timer: 0.0,
        }
    }
}

impl PredatorState {
    pub fn phase(&self) -> PredatorPhase {
        if self.is_resting {
            PredatorPhase::Resting
        } else if self.is_hunting {
            PredatorPhase::Hunting
        } else {
            PredatorPhase::Patrol
        }
    }
}

/// Behavior tag dispatched on by the stages
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AgentKind {
    Fish,
    Predator(PredatorState),
    /// Synthetic repulsion point around an obstacle
    Obstacle,
}

/// One entry of the per-tick snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub position: Vec3,
    pub velocity: Vec3,
    pub species: Species,
    pub size: f32,
    pub target: Option<Vec3>,
    pub smoothed_heading: Vec3,
    pub memory: AvoidanceMemory,
    pub avoiding: bool,
    pub in_emergency: bool,
    pub fear_level: f32,
    pub kind: AgentKind,
}

impl AgentRecord {
    fn blank(species: Species, size: f32, position: Vec3, kind: AgentKind) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
            species,
            size,
            target: None,
            smoothed_heading: Vec3::ZERO,
            memory: AvoidanceMemory::default(),
            avoiding: false,
            in_emergency: false,
            fear_level: 0.0,
            kind,
        }
    }

    pub fn fish(species: Species, size: f32, position: Vec3) -> Self {
        Self::blank(species, size, position, AgentKind::Fish)
    }

    pub fn predator(size: f32, position: Vec3) -> Self {
        Self::blank(
            Species::DRAGON,
            size,
            position,
            AgentKind::Predator(PredatorState::default()),
        )
    }

    /// Synthetic obstacle agent. Never carries a target.
    pub fn obstacle(species: Species, size: f32, position: Vec3) -> Self {
        debug_assert!(species.is_virtual());
        Self::blank(species, size, position, AgentKind::Obstacle)
    }

    #[inline]
    pub fn is_virtual(&self) -> bool {
        self.species.is_virtual()
    }

    #[inline]
    pub fn is_predator(&self) -> bool {
        matches!(self.kind, AgentKind::Predator(_))
    }

    pub fn predator_state(&self) -> Option<&PredatorState> {
        match &self.kind {
            AgentKind::Predator(state) => Some(state),
            _ => None,
        }
    }

    /// Energy for read-out; ordinary fish are always fresh
    pub fn energy_level(&self) -> f32 {
        self.predator_state().map_or(1.0, |s| s.energy_level)
    }
}

/// Registration request handed to the orchestrator by a spawner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentSpawn {
    pub species: Species,
    pub size: f32,
    pub position: Vec3,
    pub velocity: Vec3,
    pub target: Option<Vec3>,
    pub predator: bool,
}

impl AgentSpawn {
    pub fn fish(species: Species, size: f32, position: Vec3) -> Self {
        Self {
            species,
            size,
            position,
            velocity: Vec3::ZERO,
            target: None,
            predator: false,
        }
    }

    pub fn predator(size: f32, position: Vec3) -> Self {
        Self {
            species: Species::DRAGON,
            size,
            position,
            velocity: Vec3::ZERO,
            target: None,
            predator: true,
        }
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_target(mut self, target: Vec3) -> Self {
        self.target = Some(target);
        self
    }

    pub fn into_record(self) -> AgentRecord {
        let mut record = if self.predator {
            let mut r = AgentRecord::predator(self.size, self.position);
            r.species = self.species;
            r
        } else {
            AgentRecord::fish(self.species, self.size, self.position)
        };
        record.velocity = self.velocity;
        record.target = self.target;
        record
    }
}

/// Per-agent output read by the movement integrator and renderer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub desired_heading: Vec3,
    pub smoothed_heading: Vec3,
    pub acceleration: f32,
    pub avoiding: bool,
    pub in_emergency: bool,
    pub fear_level: f32,
    pub energy_level: f32,
    pub is_hunting: bool,
    pub is_resting: bool,
}

impl Default for AgentResult {
    fn default() -> Self {
        Self {
            desired_heading: Vec3::ZERO,
            smoothed_heading: Vec3::ZERO,
            acceleration: 0.0,
            avoiding: false,
            in_emergency: false,
            fear_level: 0.0,
            energy_level: 1.0,
            is_hunting: false,
            is_resting: false,
        }
    }
}

impl AgentResult {
    /// Assemble a result from a committed record plus the flocking outputs
    pub fn from_record(record: &AgentRecord, desired_heading: Vec3, acceleration: f32) -> Self {
        let predator = record.predator_state();
        Self {
            desired_heading,
            smoothed_heading: record.smoothed_heading,
            acceleration,
            avoiding: record.avoiding,
            in_emergency: record.in_emergency,
            fear_level: record.fear_level,
            energy_level: record.energy_level(),
            is_hunting: predator.is_some_and(|s| s.is_hunting),
            is_resting: predator.is_some_and(|s| s.is_resting),
        }
    }
}
