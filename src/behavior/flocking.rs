//! Boids flocking stage.
//!
//! Separation, alignment, cohesion and target seeking, blended with the
//! avoidance stage's output and smoothed by spherical interpolation.

use super::avoidance::AvoidanceOutput;
use super::fear::{self, FearConfig, FearReading};
use super::StageContext;
use crate::agent::AgentRecord;
use crate::math::{safe_normalize, slerp_towards};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Neighbor indices gathered for one agent
pub type Neighbors = SmallVec<[usize; 32]>;

/// Separation radius scale for larger, different-species neighbors
const LARGER_SPECIES_RADIUS_SCALE: f32 = 1.5;
/// Radius and force scale for exterior virtual agents
const EXTERIOR_RADIUS_SCALE: f32 = 2.5;
const EXTERIOR_FORCE_SCALE: f32 = 3.0;
/// Radius and force scale for interior virtual agents
const INTERIOR_RADIUS_SCALE: f32 = 3.0;
const INTERIOR_FORCE_SCALE: f32 = 5.0;
/// Distance factor in the virtual repulsion falloff
const VIRTUAL_DISTANCE_FACTOR: f32 = 0.3;

/// Flocking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlockingConfig {
    pub neighbor_radius: f32,
    pub separation_radius: f32,
    pub separation_weight: f32,
    pub alignment_weight: f32,
    pub cohesion_weight: f32,
    pub target_weight: f32,
    pub base_acceleration: f32,
    pub boost_acceleration: f32,
    /// Cap on live neighbors
    pub max_neighbors: usize,
    /// Cap on virtual neighbors, counted apart from live ones
    #[serde(default = "default_max_virtual_neighbors")]
    pub max_virtual_neighbors: usize,
    /// Only align and cohere with the same species
    pub same_species_only: bool,
    /// Give larger species a wider berth
    pub avoid_larger_species: bool,
    /// Separation magnitude that switches to the crowded blend
    pub crowding_threshold: f32,
    /// Upper bound on a single virtual agent's repulsion
    pub max_virtual_repulsion: f32,
    /// Heading slerp rate per second
    pub smoothing_speed: f32,
    /// Heading slerp rate per second during an emergency
    pub emergency_smoothing_speed: f32,
}

impl Default for FlockingConfig {
    fn default() -> Self {
        Self {
            neighbor_radius: 4.0,
            separation_radius: 1.2,
            separation_weight: 1.5,
            alignment_weight: 2.0,
            cohesion_weight: 2.5,
            target_weight: 3.0,
            base_acceleration: 2.0,
            boost_acceleration: 6.0,
            max_neighbors: 12,
            max_virtual_neighbors: default_max_virtual_neighbors(),
            same_species_only: true,
            avoid_larger_species: true,
            crowding_threshold: 0.3,
            max_virtual_repulsion: 10.0,
            smoothing_speed: 3.0,
            emergency_smoothing_speed: 6.0,
        }
    }
}

fn default_max_virtual_neighbors() -> usize {
    12
}

/// Raw steering forces for one agent
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Forces {
    pub separation: Vec3,
    pub alignment: Vec3,
    pub cohesion: Vec3,
    pub target: Vec3,
}

/// Per-agent flocking result
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FlockingOutput {
    pub desired_heading: Vec3,
    pub smoothed_heading: Vec3,
    pub acceleration: f32,
    pub fear_level: f32,
}

/// Agents within `neighbor_radius`, excluding `index`: up to
/// `max_neighbors` live ones plus up to `max_virtual_neighbors` virtual ones
pub fn gather_neighbors(index: usize, ctx: &StageContext<'_>) -> Neighbors {
    let config = &ctx.config.flocking;
    let agent = &ctx.agents[index];
    let radius_sq = config.neighbor_radius * config.neighbor_radius;
    let cell = ctx.grid.cell_of(agent.position);

    let mut neighbors = Neighbors::new();
    let (mut live, mut virtual_count) = (0usize, 0usize);
    for ni in ctx.grid.block(cell) {
        if live >= config.max_neighbors && virtual_count >= config.max_virtual_neighbors {
            break;
        }
        if ni == index {
            continue;
        }
        let Some(other) = ctx.agents.get(ni) else {
            continue;
        };
        if agent.position.distance_squared(other.position) > radius_sq {
            continue;
        }

        let slots = if other.is_virtual() { &mut virtual_count } else { &mut live };
        let cap = if other.is_virtual() { config.max_virtual_neighbors } else { config.max_neighbors };
        if *slots < cap {
            *slots += 1;
            neighbors.push(ni);
        }
    }
    neighbors
}

/// Whether `other` counts toward `agent`'s alignment and cohesion
#[inline]
fn schools_with(agent: &AgentRecord, other: &AgentRecord, config: &FlockingConfig) -> bool {
    if other.is_virtual() {
        return false;
    }
    if other.is_predator() && !agent.is_predator() {
        return false;
    }
    !config.same_species_only || other.species == agent.species
}

/// Inverse-distance repulsion, averaged then normalized
pub fn separation(agent: &AgentRecord, neighbors: &[usize], agents: &[AgentRecord], config: &FlockingConfig) -> Vec3 {
    let mut sum = Vec3::ZERO;
    let mut count = 0usize;

    for other in neighbors.iter().filter_map(|&ni| agents.get(ni)) {
        let diff = agent.position - other.position;
        let dist = diff.length();

        let (radius_scale, force_scale, is_virtual) = if other.species.is_interior() {
            (INTERIOR_RADIUS_SCALE, INTERIOR_FORCE_SCALE, true)
        } else if other.is_virtual() {
            (EXTERIOR_RADIUS_SCALE, EXTERIOR_FORCE_SCALE, true)
        } else if config.avoid_larger_species && other.species != agent.species && other.size > agent.size {
            (LARGER_SPECIES_RADIUS_SCALE, 1.0, false)
        } else {
            (1.0, 1.0, false)
        };

        let effective_radius = config.separation_radius * radius_scale;
        if dist <= 0.0 || dist >= effective_radius {
            continue;
        }

        let away = safe_normalize(diff);
        let push = if is_virtual {
            (away / (dist * VIRTUAL_DISTANCE_FACTOR) * force_scale).clamp_length_max(config.max_virtual_repulsion)
        } else {
            away / dist
        };
        sum += push;
        count += 1;
    }

    if count > 0 {
        safe_normalize(sum / count as f32)
    } else {
        Vec3::ZERO
    }
}

/// Mean heading of schooling neighbors
pub fn alignment(agent: &AgentRecord, neighbors: &[usize], agents: &[AgentRecord], config: &FlockingConfig) -> Vec3 {
    let mut sum = Vec3::ZERO;
    let mut count = 0usize;

    for other in neighbors.iter().filter_map(|&ni| agents.get(ni)) {
        if schools_with(agent, other, config) {
            sum += safe_normalize(other.velocity);
            count += 1;
        }
    }

    if count > 0 {
        safe_normalize(sum / count as f32)
    } else {
        Vec3::ZERO
    }
}

/// Direction to the centroid of schooling neighbors
pub fn cohesion(agent: &AgentRecord, neighbors: &[usize], agents: &[AgentRecord], config: &FlockingConfig) -> Vec3 {
    let mut center = Vec3::ZERO;
    let mut count = 0usize;

    for other in neighbors.iter().filter_map(|&ni| agents.get(ni)) {
        if schools_with(agent, other, config) {
            center += other.position;
            count += 1;
        }
    }

    if count == 0 {
        return Vec3::ZERO;
    }
    safe_normalize(center / count as f32 - agent.position)
}

/// Unit vector toward the target, zero without one
#[inline]
pub fn target_seek(agent: &AgentRecord) -> Vec3 {
    agent
        .target
        .map_or(Vec3::ZERO, |target| safe_normalize(target - agent.position))
}

/// All four steering forces for the agent at `index`
pub fn forces(index: usize, ctx: &StageContext<'_>) -> Forces {
    let agent = &ctx.agents[index];
    let config = &ctx.config.flocking;
    let neighbors = gather_neighbors(index, ctx);

    Forces {
        separation: separation(agent, &neighbors, ctx.agents, config),
        alignment: alignment(agent, &neighbors, ctx.agents, config),
        cohesion: cohesion(agent, &neighbors, ctx.agents, config),
        target: target_seek(agent),
    }
}

/// Blend forces and avoidance into a steering vector and acceleration
pub fn combine(
    forces: &Forces,
    avoidance: &AvoidanceOutput,
    fear: &FearReading,
    config: &FlockingConfig,
    fear_config: &FearConfig,
) -> (Vec3, f32) {
    let sep = forces.separation;
    let ali = forces.alignment;
    let coh = forces.cohesion;
    let tgt = forces.target;

    if avoidance.in_emergency {
        return (avoidance.direction, config.boost_acceleration * 1.5);
    }

    if avoidance.avoiding {
        let force = avoidance.direction * 3.0
            + sep * config.separation_weight
            + tgt * (config.target_weight * 0.5);
        return (force, config.boost_acceleration);
    }

    let flee = fear.flee * (fear_config.flee_weight * fear.level);
    let fear_boost = 1.0 + fear_config.acceleration_boost * fear.level;

    if sep.length() > config.crowding_threshold {
        // Strong local crowding, including pressure from virtual agents
        let force = sep * (config.separation_weight * 2.2)
            + ali * (config.alignment_weight * 0.8)
            + coh * (config.cohesion_weight * 0.6)
            + tgt * config.target_weight
            + flee;
        (force, config.base_acceleration * 1.4 * fear_boost)
    } else {
        let force = sep * config.separation_weight
            + ali * config.alignment_weight
            + coh * config.cohesion_weight
            + tgt * config.target_weight
            + flee;
        (force, config.base_acceleration * fear_boost)
    }
}

/// Slerp the carried heading toward the new desired heading.
///
/// A zero desired heading keeps the carried one; a zero carried heading
/// snaps to the desired one.
pub fn smooth_heading(previous: Vec3, desired: Vec3, elapsed: f32, in_emergency: bool, config: &FlockingConfig) -> Vec3 {
    let speed = if in_emergency {
        config.emergency_smoothing_speed
    } else {
        config.smoothing_speed
    };
    slerp_towards(previous, desired, elapsed.max(0.0) * speed)
}

/// Flocking for the agent at `index`, given its avoidance result
pub fn compute(index: usize, ctx: &StageContext<'_>, avoidance: &AvoidanceOutput) -> FlockingOutput {
    let agent = &ctx.agents[index];
    if agent.is_virtual() {
        return FlockingOutput::default();
    }

    let config = &ctx.config.flocking;
    let forces = forces(index, ctx);
    let fear = fear::assess(agent, ctx.agents, ctx.predators, ctx.elapsed, &ctx.config.fear);
    let (force, acceleration) = combine(&forces, avoidance, &fear, config, &ctx.config.fear);

    let desired_heading = safe_normalize(force);
    let smoothed_heading = smooth_heading(
        agent.smoothed_heading,
        desired_heading,
        ctx.elapsed,
        avoidance.in_emergency,
        config,
    );

    FlockingOutput {
        desired_heading,
        smoothed_heading,
        acceleration,
        fear_level: fear.level,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Species;
    use crate::config::Config;
    use crate::grid::SpatialHash;
    use crate::snapshot::Snapshot;

    struct Fixture {
        snapshot: Snapshot,
        grid: SpatialHash,
        predators: Vec<usize>,
        config: Config,
    }

    impl Fixture {
        fn new(agents: &[AgentRecord]) -> Self {
            let mut config = Config::default();
            config.flocking.separation_radius = 1.5;
            config.flocking.neighbor_radius = 5.0;

            let mut snapshot = Snapshot::with_capacity(64);
            for agent in agents.iter().filter(|a| !a.is_virtual()) {
                snapshot.push_real(*agent);
            }
            for agent in agents.iter().filter(|a| a.is_virtual()) {
                snapshot.push_virtual(*agent);
            }

            let mut grid = SpatialHash::from_config(&config.grid);
            snapshot.index_into(&mut grid);
            let predators = snapshot.predator_indices().collect();

            Self {
                snapshot,
                grid,
                predators,
                config,
            }
        }

        fn ctx(&self) -> StageContext<'_> {
            StageContext {
                agents: self.snapshot.agents(),
                grid: &self.grid,
                predators: &self.predators,
                config: &self.config,
                elapsed: 0.1,
            }
        }
    }

    fn fish(x: f32) -> AgentRecord {
        AgentRecord::fish(Species::TUNA, 1.0, Vec3::new(x, 0.0, 0.0))
    }

    #[test]
    fn test_lone_agent() {
        let fixture = Fixture::new(&[fish(0.0)]);
        let out = compute(0, &fixture.ctx(), &AvoidanceOutput::default());

        assert_eq!(out.desired_heading, Vec3::ZERO);
        assert_eq!(out.acceleration, fixture.config.flocking.base_acceleration);
        assert_eq!(out.fear_level, 0.0);
    }

    #[test]
    fn test_pair_separates() {
        let fixture = Fixture::new(&[fish(0.0), fish(1.0)]);
        let ctx = fixture.ctx();

        let a = forces(0, &ctx);
        let b = forces(1, &ctx);

        assert_eq!(a.separation, Vec3::new(-1.0, 0.0, 0.0));
        assert_eq!(b.separation, Vec3::new(1.0, 0.0, 0.0));
        // Zero velocities give no alignment
        assert_eq!(a.alignment, Vec3::ZERO);
        assert_eq!(b.alignment, Vec3::ZERO);
    }

    #[test]
    fn test_alignment_and_cohesion_same_species_only() {
        let mut other = AgentRecord::fish(Species::GROUPER, 1.0, Vec3::new(3.0, 0.0, 0.0));
        other.velocity = Vec3::Z;
        let mut mate = fish(-3.0);
        mate.velocity = Vec3::X;

        let fixture = Fixture::new(&[fish(0.0), other, mate]);
        let f = forces(0, &fixture.ctx());

        assert_eq!(f.alignment, Vec3::X);
        assert_eq!(f.cohesion, Vec3::new(-1.0, 0.0, 0.0));
    }

    #[test]
    fn test_virtual_agents_only_repel() {
        let mut rock = AgentRecord::obstacle(Species::VIRTUAL_EXTERIOR, 3.0, Vec3::new(2.0, 0.0, 0.0));
        rock.velocity = Vec3::Y;

        let fixture = Fixture::new(&[fish(0.0), rock]);
        let ctx = fixture.ctx();
        let f = forces(0, &ctx);

        // 2.0 is outside the plain separation radius but inside the widened one
        assert_eq!(f.separation, Vec3::new(-1.0, 0.0, 0.0));
        assert_eq!(f.alignment, Vec3::ZERO);
        assert_eq!(f.cohesion, Vec3::ZERO);

        let out = compute(1, &ctx, &AvoidanceOutput::default());
        assert_eq!(out, FlockingOutput::default());
    }

    #[test]
    fn test_virtual_repulsion_dominates() {
        // Fish between a schoolmate on the left and a rock core on the right
        let rock = AgentRecord::obstacle(Species::VIRTUAL_INTERIOR, 6.0, Vec3::new(0.5, 0.0, 0.0));
        let fixture = Fixture::new(&[fish(0.0), fish(-0.5), rock]);
        let f = forces(0, &fixture.ctx());

        assert!(f.separation.x < 0.0);
    }

    #[test]
    fn test_larger_species_widens_radius() {
        let shark = AgentRecord::fish(Species::SHARK, 4.0, Vec3::new(2.0, 0.0, 0.0));
        let fixture = Fixture::new(&[fish(0.0), shark]);
        let ctx = fixture.ctx();

        // 2.0 < 1.5 * 1.5
        assert_eq!(forces(0, &ctx).separation, Vec3::new(-1.0, 0.0, 0.0));
        // The shark does not widen its radius for the small fish
        assert_eq!(forces(1, &ctx).separation, Vec3::ZERO);
    }

    #[test]
    fn test_predator_excluded_from_schooling() {
        let mut dragon = AgentRecord::predator(8.0, Vec3::new(3.0, 0.0, 0.0));
        dragon.species = Species::TUNA;
        dragon.velocity = Vec3::Z;

        let fixture = Fixture::new(&[fish(0.0), dragon]);
        let f = forces(0, &fixture.ctx());

        assert_eq!(f.alignment, Vec3::ZERO);
        assert_eq!(f.cohesion, Vec3::ZERO);
    }

    #[test]
    fn test_max_neighbors_respected() {
        let agents: Vec<_> = (0..20).map(|i| fish(i as f32 * 0.1)).collect();
        let fixture = Fixture::new(&agents);
        let neighbors = gather_neighbors(0, &fixture.ctx());

        assert_eq!(neighbors.len(), fixture.config.flocking.max_neighbors);
        assert!(!neighbors.contains(&0));
    }

    #[test]
    fn test_crowded_school_still_sees_rock() {
        // Twenty schoolmates fill the live budget before the rock ring is reached
        let mut agents: Vec<_> = (1..=20).map(|i| fish(i as f32 * -0.1)).collect();
        agents.insert(0, fish(0.0));
        agents.push(AgentRecord::obstacle(Species::VIRTUAL_EXTERIOR, 3.0, Vec3::new(2.0, 0.0, 0.0)));
        let fixture = Fixture::new(&agents);
        let ctx = fixture.ctx();

        let neighbors = gather_neighbors(0, &ctx);
        let rock = agents.len() - 1;
        assert!(neighbors.contains(&rock));
        assert_eq!(neighbors.len(), fixture.config.flocking.max_neighbors + 1);
    }

    #[test]
    fn test_combination_priority() {
        let config = FlockingConfig::default();
        let fear_config = FearConfig::default();
        let forces = Forces {
            separation: Vec3::X,
            alignment: Vec3::Y,
            cohesion: Vec3::Z,
            target: Vec3::X,
        };
        let calm = FearReading::default();

        let emergency = AvoidanceOutput {
            direction: -Vec3::Z,
            avoiding: true,
            in_emergency: true,
            ..AvoidanceOutput::default()
        };
        let (force, accel) = combine(&forces, &emergency, &calm, &config, &fear_config);
        assert_eq!(force, -Vec3::Z);
        assert_eq!(accel, config.boost_acceleration * 1.5);

        let avoiding = AvoidanceOutput {
            direction: -Vec3::Z,
            avoiding: true,
            ..AvoidanceOutput::default()
        };
        let (force, accel) = combine(&forces, &avoiding, &calm, &config, &fear_config);
        let expected = -Vec3::Z * 3.0 + Vec3::X * config.separation_weight + Vec3::X * (config.target_weight * 0.5);
        assert!((force - expected).length() < 1e-5);
        assert_eq!(accel, config.boost_acceleration);

        let (_, accel) = combine(&forces, &AvoidanceOutput::default(), &calm, &config, &fear_config);
        assert!((accel - config.base_acceleration * 1.4).abs() < 1e-5);

        let relaxed = Forces {
            separation: Vec3::ZERO,
            ..forces
        };
        let (_, accel) = combine(&relaxed, &AvoidanceOutput::default(), &calm, &config, &fear_config);
        assert_eq!(accel, config.base_acceleration);
    }

    #[test]
    fn test_fear_boosts_acceleration() {
        let config = FlockingConfig::default();
        let fear_config = FearConfig::default();
        let scared = FearReading {
            level: 1.0,
            flee: Vec3::X,
        };

        let (force, accel) = combine(&Forces::default(), &AvoidanceOutput::default(), &scared, &config, &fear_config);
        assert_eq!(force, Vec3::X * fear_config.flee_weight);
        assert!(accel > config.base_acceleration);
    }

    #[test]
    fn test_smoothed_heading_is_unit() {
        let config = FlockingConfig::default();
        let desired = safe_normalize(Vec3::new(1.0, 0.5, -0.3));

        let first = smooth_heading(Vec3::ZERO, desired, 0.016, false, &config);
        assert!((first - desired).length() < 1e-6);

        let turned = smooth_heading(Vec3::Z, desired, 0.016, false, &config);
        assert!((turned.length() - 1.0).abs() < 1e-4);
        assert!(turned.dot(desired) > Vec3::Z.dot(desired));

        let faster = smooth_heading(Vec3::Z, desired, 0.016, true, &config);
        assert!(faster.dot(desired) > turned.dot(desired));
    }

    #[test]
    fn test_zero_desired_keeps_heading() {
        let config = FlockingConfig::default();

        assert_eq!(smooth_heading(Vec3::X, Vec3::ZERO, 0.016, false, &config), Vec3::X);
        assert_eq!(smooth_heading(Vec3::ZERO, Vec3::ZERO, 0.016, false, &config), Vec3::ZERO);
    }

    #[test]
    fn test_virtual_repulsion_capped() {
        // Schoolmate pushes +x at 1 / 0.3, the rock core pushes -x far harder
        let rock = AgentRecord::obstacle(Species::VIRTUAL_INTERIOR, 6.0, Vec3::new(0.01, 0.0, 0.0));
        let mut fixture = Fixture::new(&[fish(0.0), fish(-0.3), rock]);

        assert_eq!(forces(0, &fixture.ctx()).separation, Vec3::new(-1.0, 0.0, 0.0));

        // Capped below the schoolmate's push, the rock no longer wins
        fixture.config.flocking.max_virtual_repulsion = 1.0;
        assert_eq!(forces(0, &fixture.ctx()).separation, Vec3::new(1.0, 0.0, 0.0));
    }
}
