//! Statistics tracking for the simulation.

use crate::agent::AgentResult;
use crate::obstacles::GenerationReport;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Statistics snapshot for one tick
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TickStats {
    /// Ticks committed so far
    pub tick: u64,
    /// Registered agents
    pub agents: usize,
    /// Virtual obstacle agents generated this tick
    pub virtual_agents: usize,
    /// Obstacles with a live agent nearby
    pub active_obstacles: usize,
    /// Agents steering away from a boundary
    pub avoiding: usize,
    /// Agents in a boundary emergency
    pub emergencies: usize,
    /// Predators currently hunting
    pub hunting: usize,
    /// Predators currently resting
    pub resting: usize,
    /// Mean fear across agents
    pub mean_fear: f32,
    /// Mean acceleration across agents
    pub mean_acceleration: f32,
    /// Virtual generation hit the population cap
    pub truncated: bool,
}

impl TickStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update stats from this tick's results
    pub fn update<'a, I>(&mut self, tick: u64, results: I, report: &GenerationReport)
    where
        I: IntoIterator<Item = &'a AgentResult>,
    {
        *self = Self {
            tick,
            virtual_agents: report.generated,
            active_obstacles: report.active_obstacles,
            truncated: report.truncated,
            ..Self::default()
        };

        let mut fear_sum = 0.0f32;
        let mut accel_sum = 0.0f32;

        for result in results {
            self.agents += 1;
            self.avoiding += result.avoiding as usize;
            self.emergencies += result.in_emergency as usize;
            self.hunting += result.is_hunting as usize;
            self.resting += result.is_resting as usize;
            fear_sum += result.fear_level;
            accel_sum += result.acceleration;
        }

        if self.agents > 0 {
            self.mean_fear = fear_sum / self.agents as f32;
            self.mean_acceleration = accel_sum / self.agents as f32;
        }
    }

    /// Save stats to JSON file
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }

    /// Format stats as a one-line summary
    pub fn summary(&self) -> String {
        format!(
            "T:{:6} | Agents:{:5} | Virtual:{:5} | Avoid:{:4} | Emerg:{:3} | Hunt:{:2} Rest:{:2} | Fear:{:.2} | Accel:{:.2}",
            self.tick,
            self.agents,
            self.virtual_agents,
            self.avoiding,
            self.emergencies,
            self.hunting,
            self.resting,
            self.mean_fear,
            self.mean_acceleration,
        )
    }
}

/// Historical statistics tracker
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StatsHistory {
    /// All recorded stats snapshots
    pub snapshots: Vec<TickStats>,
    /// Recording interval in ticks
    pub interval: u64,
}

impl StatsHistory {
    /// Create new history with recording interval
    pub fn new(interval: u64) -> Self {
        Self {
            snapshots: Vec::new(),
            interval: interval.max(1),
        }
    }

    /// Record `stats` if its tick falls on the interval
    pub fn maybe_record(&mut self, stats: &TickStats) -> bool {
        if stats.tick % self.interval != 0 {
            return false;
        }
        self.snapshots.push(stats.clone());
        true
    }

    /// Get stats at a specific tick (approximate)
    pub fn get_at(&self, tick: u64) -> Option<&TickStats> {
        let index = (tick / self.interval) as usize;
        self.snapshots.get(index.saturating_sub(1))
    }

    /// Avoiding agents over time
    pub fn avoiding_series(&self) -> Vec<(u64, usize)> {
        self.snapshots.iter().map(|s| (s.tick, s.avoiding)).collect()
    }

    /// Mean fear over time
    pub fn fear_series(&self) -> Vec<(u64, f32)> {
        self.snapshots.iter().map(|s| (s.tick, s.mean_fear)).collect()
    }

    /// Save history to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json)
    }

    /// Load history from file
    pub fn load<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}
