//! Reference host loop.
//!
//! The core never moves agents. `Scene` plays the part of the engine: it
//! spawns schools and predators, animates their targets, feeds transforms
//! and obstacles into the [`World`], and integrates motion from the results.

use crate::agent::{AgentResult, AgentSpawn, Species};
use crate::config::Config;
use crate::math::is_zero;
use crate::obstacles::ObstacleBounds;
use crate::world::{AgentHandle, World};
use glam::Vec3;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

/// Path followed by an animated target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetPattern {
    StraightLine,
    Circle,
    Square,
    Figure8,
}

impl TargetPattern {
    pub const ALL: [TargetPattern; 4] = [
        TargetPattern::StraightLine,
        TargetPattern::Circle,
        TargetPattern::Square,
        TargetPattern::Figure8,
    ];

    /// Offset from the path origin at phase `t`
    pub fn offset(self, t: f32, radius: f32) -> Vec3 {
        match self {
            TargetPattern::StraightLine => Vec3::X * (ping_pong(t, radius * 2.0) - radius),
            TargetPattern::Circle => Vec3::new(t.cos() * radius, 0.0, t.sin() * radius),
            TargetPattern::Square => {
                let right = Vec3::X * radius;
                let forward = Vec3::Z * radius;
                let s = t.rem_euclid(4.0) / 4.0;
                if s < 0.25 {
                    Vec3::ZERO.lerp(right, s * 4.0)
                } else if s < 0.5 {
                    right.lerp(right + forward, (s - 0.25) * 4.0)
                } else if s < 0.75 {
                    (right + forward).lerp(forward, (s - 0.5) * 4.0)
                } else {
                    forward.lerp(Vec3::ZERO, (s - 0.75) * 4.0)
                }
            }
            TargetPattern::Figure8 => Vec3::new(t.sin() * radius, 0.0, (2.0 * t).sin() * radius * 0.5),
        }
    }
}

/// Bounce `t` back and forth over `[0, length]`
fn ping_pong(t: f32, length: f32) -> f32 {
    if length <= 0.0 {
        return 0.0;
    }
    let m = t.rem_euclid(length * 2.0);
    length - (m - length).abs()
}

/// A target moving along a [`TargetPattern`]
#[derive(Debug, Clone)]
pub struct TargetAnimator {
    pub pattern: TargetPattern,
    pub origin: Vec3,
    pub speed: f32,
    pub radius: f32,
    phase_offset: f32,
    time: f32,
}

impl TargetAnimator {
    pub fn new(pattern: TargetPattern, origin: Vec3, speed: f32, radius: f32, phase_offset: f32) -> Self {
        Self {
            pattern,
            origin,
            speed,
            radius,
            phase_offset,
            time: 0.0,
        }
    }

    pub fn advance(&mut self, elapsed: f32) -> Vec3 {
        self.time += elapsed * self.speed;
        self.position()
    }

    pub fn position(&self) -> Vec3 {
        self.origin + self.pattern.offset(self.time + self.phase_offset, self.radius)
    }
}

/// Movement integration constants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionConfig {
    pub max_speed: f32,
    pub water_friction: f32,
    /// Speed cap multiplier in a boundary emergency
    pub emergency_speed_factor: f32,
    pub predator_max_speed: f32,
    pub predator_friction: f32,
    /// Speed cap multiplier while hunting
    pub hunting_speed_factor: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            max_speed: 5.0,
            water_friction: 1.0,
            emergency_speed_factor: 1.3,
            predator_max_speed: 8.0,
            predator_friction: 0.5,
            hunting_speed_factor: 1.2,
        }
    }
}

/// Population and layout of the demo scene
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneConfig {
    pub fish_count: usize,
    pub predator_count: usize,
    /// Schools, one species and one animated target each
    pub school_count: usize,
    pub spawn_radius: f32,
    /// Horizontal extent within which schools and obstacles are placed
    pub layout_extent: f32,
    pub target_speed: f32,
    pub target_radius: f32,
    pub patrol_radius: f32,
    pub obstacle_count: usize,
    pub obstacle_size: f32,
    pub motion: MotionConfig,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            fish_count: 300,
            predator_count: 2,
            school_count: 3,
            spawn_radius: 8.0,
            layout_extent: 60.0,
            target_speed: 0.4,
            target_radius: 20.0,
            patrol_radius: 40.0,
            obstacle_count: 4,
            obstacle_size: 8.0,
            motion: MotionConfig::default(),
        }
    }
}

/// Body size for each fish species
pub fn species_size(species: Species) -> f32 {
    match species {
        Species::TUNA => 1.0,
        Species::GOLDEN_TREVALLY => 1.2,
        Species::CLOWN_FISH => 0.5,
        Species::YELLOWTAIL_SNAPPER => 0.8,
        Species::ANGELFISH => 0.7,
        Species::GROUPER => 2.0,
        Species::SHARK => 3.0,
        _ => 1.0,
    }
}

/// Host-side state of one spawned agent
#[derive(Debug, Clone)]
pub struct Body {
    pub handle: AgentHandle,
    pub position: Vec3,
    pub velocity: Vec3,
    pub predator: bool,
    /// Index into the scene's targets
    pub target: usize,
}

/// Demo host driving a [`World`]
pub struct Scene {
    pub world: World,
    pub config: SceneConfig,
    bodies: Vec<Body>,
    targets: Vec<TargetAnimator>,
    obstacles: Vec<ObstacleBounds>,
    rng: ChaCha8Rng,
}

fn random_in_sphere(rng: &mut impl Rng) -> Vec3 {
    loop {
        let v = Vec3::new(
            rng.gen_range(-1.0..=1.0),
            rng.gen_range(-1.0..=1.0),
            rng.gen_range(-1.0..=1.0),
        );
        if v.length_squared() <= 1.0 {
            return v;
        }
    }
}

impl Scene {
    /// Build a scene with its world seeded from `seed`
    pub fn new(config: Config, scene: SceneConfig, seed: u64) -> Self {
        let world = World::new_with_seed(config, seed);
        let rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(1));

        let mut this = Self {
            world,
            config: scene,
            bodies: Vec::new(),
            targets: Vec::new(),
            obstacles: Vec::new(),
            rng,
        };
        this.spawn();
        this
    }

    fn random_horizontal(&mut self, extent: f32) -> Vec3 {
        if extent <= 0.0 {
            return Vec3::ZERO;
        }
        Vec3::new(
            self.rng.gen_range(-extent..=extent),
            0.0,
            self.rng.gen_range(-extent..=extent),
        )
    }

    fn spawn(&mut self) {
        let extent = self.config.layout_extent;
        let schools = self.config.school_count.max(1);

        // One animated target per school
        for s in 0..schools {
            let origin = self.random_horizontal(extent * 0.5);
            let offset = self.rng.gen_range(0.0..TAU);
            self.targets.push(TargetAnimator::new(
                TargetPattern::ALL[s % TargetPattern::ALL.len()],
                origin,
                self.config.target_speed,
                self.config.target_radius,
                offset,
            ));
        }

        for i in 0..self.config.fish_count {
            let school = i % schools;
            let species = Species::FISH[school % Species::FISH.len()];
            let target = self.targets[school].position();
            let position = target + random_in_sphere(&mut self.rng) * self.config.spawn_radius;
            let spawn = AgentSpawn::fish(species, species_size(species), position).with_target(target);

            let Some(handle) = self.world.register_agent(spawn) else {
                log::warn!("Agent capacity reached after {} fish", i);
                break;
            };
            self.bodies.push(Body {
                handle,
                position,
                velocity: Vec3::ZERO,
                predator: false,
                target: school,
            });
        }

        for _ in 0..self.config.predator_count {
            let offset = self.rng.gen_range(0.0..TAU);
            let patrol = TargetAnimator::new(
                TargetPattern::Circle,
                Vec3::ZERO,
                self.config.target_speed * 0.5,
                self.config.patrol_radius,
                offset,
            );
            let position = patrol.position();
            let spawn = AgentSpawn::predator(species_size(Species::SHARK) * 2.0, position).with_target(position);

            let Some(handle) = self.world.register_agent(spawn) else {
                log::warn!("Agent capacity reached before all predators spawned");
                break;
            };
            self.targets.push(patrol);
            self.bodies.push(Body {
                handle,
                position,
                velocity: Vec3::ZERO,
                predator: true,
                target: self.targets.len() - 1,
            });
        }

        for _ in 0..self.config.obstacle_count {
            let center = self.random_horizontal(extent);
            let size = Vec3::new(
                self.rng.gen_range(2.0..=self.config.obstacle_size.max(2.0)),
                self.rng.gen_range(2.0..=self.config.obstacle_size.max(2.0)),
                self.rng.gen_range(2.0..=self.config.obstacle_size.max(2.0)),
            );
            self.obstacles.push(ObstacleBounds::from_center_size(center, size));
        }

        log::info!(
            "Scene spawned {} agents, {} targets, {} obstacles",
            self.bodies.len(),
            self.targets.len(),
            self.obstacles.len()
        );
    }

    /// Advance targets, tick the world and integrate motion
    pub fn step(&mut self, elapsed: f32) {
        for target in &mut self.targets {
            target.advance(elapsed);
        }

        for body in &self.bodies {
            let target = self.targets.get(body.target).map(TargetAnimator::position);
            self.world.set_transform(body.handle, body.position, body.velocity);
            self.world.set_target(body.handle, target);
        }
        self.world.submit_obstacle_bounds(&self.obstacles);

        self.world.tick(elapsed);

        let motion = &self.config.motion;
        for body in &mut self.bodies {
            if let Some(result) = self.world.read_result(body.handle) {
                integrate(body, &result, elapsed, motion);
            }
        }
    }

    /// Run for `steps` ticks of `elapsed` seconds
    pub fn run(&mut self, steps: u64, elapsed: f32) {
        self.run_with_callback(steps, elapsed, |_| {});
    }

    /// Run with a callback after every tick
    pub fn run_with_callback<F>(&mut self, steps: u64, elapsed: f32, mut callback: F)
    where
        F: FnMut(&Scene),
    {
        for _ in 0..steps {
            self.step(elapsed);
            callback(&*self);
        }
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn obstacles(&self) -> &[ObstacleBounds] {
        &self.obstacles
    }

    pub fn targets(&self) -> &[TargetAnimator] {
        &self.targets
    }
}

/// Friction, thrust along the smoothed heading, then a speed cap
pub fn integrate(body: &mut Body, result: &AgentResult, elapsed: f32, motion: &MotionConfig) {
    let dt = elapsed.max(0.0);
    let (friction, max_speed) = if body.predator {
        let factor = if result.is_hunting { motion.hunting_speed_factor } else { 1.0 };
        (motion.predator_friction, motion.predator_max_speed * factor)
    } else {
        let factor = if result.in_emergency { motion.emergency_speed_factor } else { 1.0 };
        (motion.water_friction, motion.max_speed * factor)
    };

    body.velocity -= body.velocity * (friction * dt).min(1.0);

    let heading = if is_zero(result.smoothed_heading) {
        result.desired_heading
    } else {
        result.smoothed_heading
    };
    body.velocity += heading * result.acceleration * dt;
    body.velocity = body.velocity.clamp_length_max(max_speed);
    body.position += body.velocity * dt;
}
