//! Configuration system for the shoal simulation.
//!
//! Supports YAML configuration files with sensible defaults.

use crate::behavior::{AvoidanceConfig, FearConfig, FlockingConfig, PredatorConfig};
use crate::obstacles::ObstacleConfig;
use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading or validating a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub grid: GridConfig,
    pub flocking: FlockingConfig,
    pub avoidance: AvoidanceConfig,
    #[serde(default)]
    pub obstacles: ObstacleConfig,
    #[serde(default)]
    pub predator: PredatorConfig,
    #[serde(default)]
    pub fear: FearConfig,
    pub safety: SafetyConfig,
    pub logging: LoggingConfig,
}

/// Spatial hash layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    /// Edge length of one cell
    pub cell_size: f32,
    /// Cells along x
    pub width: usize,
    /// Cells along z
    pub height: usize,
    /// World (x, z) of cell (0, 0); centered on the world origin when absent
    #[serde(default)]
    pub origin: Option<[f32; 2]>,
}

impl GridConfig {
    pub fn origin(&self) -> Vec2 {
        match self.origin {
            Some([x, z]) => Vec2::new(x, z),
            None => Vec2::new(
                -(self.width as f32 * self.cell_size) * 0.5,
                -(self.height as f32 * self.cell_size) * 0.5,
            ),
        }
    }
}

/// Safety limits to prevent runaway simulations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// Maximum registered agents
    pub max_agents: usize,
    /// Maximum virtual obstacle agents per tick
    pub max_virtual_agents: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Ticks between stats snapshots
    pub stats_interval: u64,
    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cell_size: 5.0,
            width: 100,
            height: 100,
            origin: None,
        }
    }
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            max_agents: 1000,
            max_virtual_agents: 2000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            stats_interval: 50,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Snapshot capacity: every live agent plus every virtual agent
    pub fn snapshot_capacity(&self) -> usize {
        self.safety.max_agents + self.safety.max_virtual_agents
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if !self.grid.cell_size.is_finite() || self.grid.cell_size <= 0.0 {
            return invalid("grid.cell_size must be > 0");
        }
        if self.grid.width == 0 || self.grid.height == 0 {
            return invalid("grid dimensions must be > 0");
        }
        if self.safety.max_agents == 0 {
            return invalid("max_agents must be > 0");
        }
        if self.flocking.neighbor_radius <= 0.0 || self.flocking.separation_radius <= 0.0 {
            return invalid("flocking radii must be > 0");
        }
        if self.flocking.neighbor_radius > self.grid.cell_size {
            // The 3x3 block only covers one cell in every direction
            return invalid("neighbor_radius cannot exceed grid.cell_size");
        }
        if self.flocking.max_virtual_repulsion <= 0.0 {
            return invalid("max_virtual_repulsion must be > 0");
        }
        if self.avoidance.horizontal_extreme <= self.avoidance.emergency_margin
            || self.avoidance.vertical_extreme <= self.avoidance.emergency_margin
        {
            return invalid("boundary extremes must exceed emergency_margin");
        }
        if self.avoidance.memory_time < 0.0 || self.avoidance.hold_time < 0.0 {
            return invalid("avoidance timers must be >= 0");
        }
        if self.predator.rest_duration <= 0.0 || self.predator.hunting_duration <= 0.0 {
            return invalid("predator durations must be > 0");
        }
        if self.logging.stats_interval == 0 {
            return invalid("stats_interval must be > 0");
        }
        Ok(())
    }
}
