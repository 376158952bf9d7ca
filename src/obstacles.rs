//! Virtual obstacle agents.
//!
//! Obstacles are turned into rings of synthetic, heavy agents so that
//! obstacle avoidance falls out of the ordinary separation force. Rings are
//! regenerated every tick and only around obstacles that have a live agent
//! nearby.

use crate::agent::{AgentRecord, Species};
use crate::snapshot::Snapshot;
use glam::{Vec2, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

/// Configuration for virtual obstacle agent generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObstacleConfig {
    /// Generate virtual agents at all
    pub enabled: bool,
    /// An obstacle is active when a live agent is this close to its bounds
    pub detection_radius: f32,
    /// Concentric rings per obstacle
    pub ring_count: usize,
    /// Radial distance between rings
    pub ring_spacing: f32,
    /// Agents on the innermost ring
    pub agents_per_ring: usize,
    /// Extra agents per additional ring
    pub ring_growth: usize,
    /// Angular jitter as a fraction of the slot angle
    pub angular_jitter: f32,
    /// Radial jitter in world units
    pub radial_jitter: f32,
    /// Size of outermost ring agents
    pub exterior_size: f32,
    /// Size added per ring moving inward
    pub size_falloff: f32,
    /// Agents placed inside the bounds
    pub interior_count: usize,
    /// Size of interior agents
    pub interior_size: f32,
}

impl Default for ObstacleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            detection_radius: 15.0,
            ring_count: 3,
            ring_spacing: 1.0,
            agents_per_ring: 12,
            ring_growth: 6,
            angular_jitter: 0.3,
            radial_jitter: 0.25,
            exterior_size: 2.0,
            size_falloff: 1.0,
            interior_count: 4,
            interior_size: 6.0,
        }
    }
}

/// World-space axis-aligned bounds supplied by the obstacle collaborator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObstacleBounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl ObstacleBounds {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_center_size(center: Vec3, size: Vec3) -> Self {
        let half = size * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Finite, not inverted, and not collapsed to a point
    pub fn is_usable(&self) -> bool {
        self.min.is_finite()
            && self.max.is_finite()
            && self.max.cmpge(self.min).all()
            && (self.max - self.min).max_element() > 0.0
    }

    /// Radius of the circle enclosing the horizontal footprint
    pub fn footprint_radius(&self) -> f32 {
        let half = self.half_extents();
        Vec2::new(half.x, half.z).length()
    }

    /// Distance from `point` to the closest point of the box (0 inside)
    pub fn distance_to(&self, point: Vec3) -> f32 {
        point.clamp(self.min, self.max).distance(point)
    }
}

/// What one generation pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationReport {
    /// Obstacles with a live agent in range
    pub active_obstacles: usize,
    /// Obstacles dropped for unusable geometry
    pub skipped_obstacles: usize,
    /// Virtual agents appended this tick
    pub generated: usize,
    /// The population cap stopped generation early
    pub truncated: bool,
}

#[inline]
fn jitter(rng: &mut impl Rng, half_range: f32) -> f32 {
    if half_range > 0.0 {
        rng.gen_range(-half_range..=half_range)
    } else {
        0.0
    }
}

/// Append virtual agents for every active obstacle to `snapshot`.
///
/// Must run after the live agents are in the snapshot. Stops as soon as
/// `max_virtual` agents exist or the snapshot is full.
pub fn populate(
    snapshot: &mut Snapshot,
    obstacles: &[ObstacleBounds],
    config: &ObstacleConfig,
    max_virtual: usize,
    rng: &mut impl Rng,
) -> GenerationReport {
    let mut report = GenerationReport::default();
    if !config.enabled {
        return report;
    }

    'obstacles: for bounds in obstacles {
        if !bounds.is_usable() {
            log::debug!("Skipping obstacle with unusable bounds {:?}", bounds);
            report.skipped_obstacles += 1;
            continue;
        }

        let nearby = snapshot
            .real_agents()
            .iter()
            .any(|a| bounds.distance_to(a.position) <= config.detection_radius);
        if !nearby {
            continue;
        }
        report.active_obstacles += 1;

        let center = bounds.center();
        let half = bounds.half_extents();
        let footprint = bounds.footprint_radius();

        // Exterior shell: inner rings are heavier
        for ring in 0..config.ring_count {
            let radius = footprint + config.ring_spacing * (ring as f32 + 1.0);
            let count = config.agents_per_ring + ring * config.ring_growth;
            if count == 0 {
                continue;
            }
            let slot = TAU / count as f32;
            let size = config.exterior_size
                + config.size_falloff * (config.ring_count - 1 - ring) as f32;

            for i in 0..count {
                if report.generated >= max_virtual {
                    report.truncated = true;
                    break 'obstacles;
                }

                let angle = slot * i as f32 + jitter(rng, config.angular_jitter * slot);
                let r = (radius + jitter(rng, config.radial_jitter)).max(0.0);
                let position = Vec3::new(
                    center.x + r * angle.cos(),
                    center.y + jitter(rng, half.y),
                    center.z + r * angle.sin(),
                );

                if !snapshot.push_virtual(AgentRecord::obstacle(Species::VIRTUAL_EXTERIOR, size, position)) {
                    report.truncated = true;
                    break 'obstacles;
                }
                report.generated += 1;
            }
        }

        // Interior core in case an agent ends up inside the bounds
        for _ in 0..config.interior_count {
            if report.generated >= max_virtual {
                report.truncated = true;
                break 'obstacles;
            }

            let position = center
                + Vec3::new(jitter(rng, half.x), jitter(rng, half.y), jitter(rng, half.z));
            if !snapshot.push_virtual(AgentRecord::obstacle(
                Species::VIRTUAL_INTERIOR,
                config.interior_size,
                position,
            )) {
                report.truncated = true;
                break 'obstacles;
            }
            report.generated += 1;
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rock() -> ObstacleBounds {
        ObstacleBounds::from_center_size(Vec3::new(20.0, 0.0, 0.0), Vec3::new(4.0, 6.0, 4.0))
    }

    fn snapshot_with_fish_at(position: Vec3) -> Snapshot {
        let mut snapshot = Snapshot::with_capacity(1024);
        snapshot.push_real(AgentRecord::fish(Species::TUNA, 1.0, position));
        snapshot
    }

    fn expected_total(config: &ObstacleConfig) -> usize {
        (0..config.ring_count)
            .map(|r| config.agents_per_ring + r * config.ring_growth)
            .sum::<usize>()
            + config.interior_count
    }

    #[test]
    fn test_idle_obstacle_generates_nothing() {
        let config = ObstacleConfig::default();
        let mut snapshot = snapshot_with_fish_at(Vec3::new(-80.0, 0.0, 0.0));
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let report = populate(&mut snapshot, &[rock()], &config, 500, &mut rng);

        assert_eq!(report.generated, 0);
        assert_eq!(report.active_obstacles, 0);
        assert_eq!(snapshot.virtual_count(), 0);
    }

    #[test]
    fn test_rings_and_core() {
        let config = ObstacleConfig::default();
        let mut snapshot = snapshot_with_fish_at(Vec3::new(10.0, 0.0, 0.0));
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let bounds = rock();

        let report = populate(&mut snapshot, &[bounds], &config, 500, &mut rng);

        assert_eq!(report.generated, expected_total(&config));
        assert!(!report.truncated);

        let exterior: Vec<_> = snapshot
            .virtual_agents()
            .iter()
            .filter(|a| a.species == Species::VIRTUAL_EXTERIOR)
            .collect();
        let interior: Vec<_> = snapshot
            .virtual_agents()
            .iter()
            .filter(|a| a.species == Species::VIRTUAL_INTERIOR)
            .collect();
        assert_eq!(interior.len(), config.interior_count);

        let center = bounds.center();
        let half = bounds.half_extents();
        for agent in &exterior {
            assert!(agent.target.is_none());
            assert!((agent.position.y - center.y).abs() <= half.y + 1e-4);
            let horizontal = Vec2::new(agent.position.x - center.x, agent.position.z - center.z).length();
            assert!(horizontal > bounds.footprint_radius());
        }
        for agent in &interior {
            assert!(bounds.distance_to(agent.position) < 1e-4);
            assert!(exterior.iter().all(|e| agent.size > e.size));
        }

        // Innermost ring is heavier than the outermost
        let max_size = exterior.iter().map(|a| a.size).fold(0.0f32, f32::max);
        let min_size = exterior.iter().map(|a| a.size).fold(f32::MAX, f32::min);
        assert!(max_size > min_size);
    }

    #[test]
    fn test_cap_truncates() {
        let config = ObstacleConfig::default();
        let mut snapshot = snapshot_with_fish_at(Vec3::new(20.0, 0.0, 0.0));
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let report = populate(&mut snapshot, &[rock(), rock()], &config, 10, &mut rng);

        assert!(report.truncated);
        assert_eq!(report.generated, 10);
        assert_eq!(snapshot.virtual_count(), 10);
    }

    #[test]
    fn test_unusable_bounds_skipped() {
        let config = ObstacleConfig::default();
        let mut snapshot = snapshot_with_fish_at(Vec3::ZERO);
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let bad = [
            ObstacleBounds::new(Vec3::ONE, Vec3::ZERO),
            ObstacleBounds::new(Vec3::ZERO, Vec3::new(f32::NAN, 1.0, 1.0)),
            ObstacleBounds::new(Vec3::ZERO, Vec3::ZERO),
        ];

        let report = populate(&mut snapshot, &bad, &config, 500, &mut rng);

        assert_eq!(report.skipped_obstacles, 3);
        assert_eq!(report.generated, 0);
    }

    #[test]
    fn test_distance_to_bounds() {
        let bounds = ObstacleBounds::new(Vec3::ZERO, Vec3::splat(2.0));
        assert_eq!(bounds.distance_to(Vec3::ONE), 0.0);
        assert!((bounds.distance_to(Vec3::new(5.0, 1.0, 1.0)) - 3.0).abs() < 1e-5);
    }
}
