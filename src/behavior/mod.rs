//! Per-agent behavior stages.
//!
//! Each stage is a pure function of the immutable tick snapshot and the
//! previous stage's output, so the orchestrator can map it over agent
//! indices in parallel.

pub mod avoidance;
pub mod fear;
pub mod flocking;
pub mod predator;

pub use avoidance::{AvoidanceConfig, AvoidanceOutput};
pub use fear::{FearConfig, FearReading};
pub use flocking::{FlockingConfig, FlockingOutput, Forces};
pub use predator::PredatorConfig;

use crate::agent::AgentRecord;
use crate::config::Config;
use crate::grid::SpatialHash;

/// Read-only view shared by every worker during a tick
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    /// Full snapshot, live agents first
    pub agents: &'a [AgentRecord],
    pub grid: &'a SpatialHash,
    /// Snapshot indices of predators
    pub predators: &'a [usize],
    pub config: &'a Config,
    pub elapsed: f32,
}
