//! # Shoal
//!
//! Data-parallel boids core for large schools of fish.
//!
//! ## Features
//!
//! - **Fast**: spatial hash neighbor search, hundreds of agents per tick
//! - **Parallel**: avoidance and flocking stages run on all cores via Rayon
//! - **Obstacles**: obstacles become rings of virtual agents that only repel
//! - **Predators**: hunt/rest overlay with energy, plus fear in nearby prey
//! - **Configurable**: YAML configuration files
//!
//! The core never moves anything. The host registers agents, feeds their
//! transforms each tick and integrates motion from the results.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use shoal::{AgentSpawn, Config, Species, World};
//! use glam::Vec3;
//!
//! let mut world = World::new(Config::default());
//! let fish = world
//!     .register_agent(AgentSpawn::fish(Species::TUNA, 1.0, Vec3::ZERO).with_target(Vec3::X * 10.0))
//!     .unwrap();
//!
//! world.tick(1.0 / 60.0);
//!
//! let result = world.read_result(fish).unwrap();
//! println!("heading {:?}, accel {}", result.smoothed_heading, result.acceleration);
//! ```
//!
//! ## Demo host
//!
//! ```rust,no_run
//! use shoal::{Config, Scene, SceneConfig};
//!
//! let mut scene = Scene::new(Config::default(), SceneConfig::default(), 42);
//! scene.run(600, 1.0 / 60.0);
//! println!("{}", scene.world.stats.summary());
//! ```

pub mod agent;
pub mod behavior;
pub mod config;
pub mod grid;
pub mod math;
pub mod obstacles;
pub mod scene;
pub mod snapshot;
pub mod stats;
pub mod world;

// Re-export main types
pub use agent::{AgentRecord, AgentResult, AgentSpawn, Species};
pub use config::{Config, ConfigError};
pub use obstacles::ObstacleBounds;
pub use scene::{Scene, SceneConfig};
pub use world::{AgentHandle, World};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run a quick benchmark of the demo scene
pub fn benchmark(steps: u64, agents: usize) -> BenchmarkResult {
    use std::time::Instant;

    let mut config = Config::default();
    config.safety.max_agents = config.safety.max_agents.max(agents);

    let scene_config = SceneConfig {
        fish_count: agents.saturating_sub(2),
        predator_count: 2.min(agents),
        ..SceneConfig::default()
    };
    let mut scene = Scene::new(config, scene_config, 42);

    let start = Instant::now();
    scene.run(steps, 1.0 / 60.0);
    let elapsed = start.elapsed();

    BenchmarkResult {
        steps,
        agents: scene.world.agent_count(),
        peak_virtual_agents: scene
            .world
            .stats_history
            .snapshots
            .iter()
            .map(|s| s.virtual_agents)
            .max()
            .unwrap_or(0)
            .max(scene.world.virtual_agent_count()),
        elapsed_secs: elapsed.as_secs_f64(),
        ticks_per_second: steps as f64 / elapsed.as_secs_f64(),
    }
}

/// Benchmark result
#[derive(Debug, Clone)]
pub struct BenchmarkResult {
    pub steps: u64,
    pub agents: usize,
    pub peak_virtual_agents: usize,
    pub elapsed_secs: f64,
    pub ticks_per_second: f64,
}

impl std::fmt::Display for BenchmarkResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Benchmark Results ===")?;
        writeln!(f, "Ticks: {}", self.steps)?;
        writeln!(f, "Agents: {}", self.agents)?;
        writeln!(f, "Peak virtual agents: {}", self.peak_virtual_agents)?;
        writeln!(f, "Time: {:.3}s", self.elapsed_secs)?;
        writeln!(f, "Speed: {:.1} ticks/s", self.ticks_per_second)?;
        Ok(())
    }
}
