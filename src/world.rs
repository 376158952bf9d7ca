//! World tick orchestrator.
//!
//! Owns the agent registry and every per-tick buffer. A tick is an explicit
//! `begin_tick` / `compute` / `commit` cycle driven by the host loop:
//! `begin_tick` rebuilds the snapshot and spatial hash, `compute` runs the
//! behavior stages in parallel over private output slots, and `commit`
//! scatters the outputs back into the registry.

use crate::agent::{AgentKind, AgentRecord, AgentResult, AgentSpawn, PredatorState};
use crate::behavior::{avoidance, flocking, predator, AvoidanceOutput, FlockingOutput, StageContext};
use crate::config::Config;
use crate::grid::SpatialHash;
use crate::obstacles::{self, GenerationReport, ObstacleBounds};
use crate::snapshot::Snapshot;
use crate::stats::{StatsHistory, TickStats};
use glam::Vec3;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Generational handle returned by [`World::register_agent`]
    pub struct AgentHandle;
}

/// Where the world is inside the tick cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickPhase {
    Idle,
    Begun,
    Computed,
}

/// Registry entry: carried state plus the last committed result
#[derive(Clone, Debug)]
struct LiveAgent {
    record: AgentRecord,
    result: AgentResult,
}

/// The simulation world
pub struct World {
    // Configuration
    pub config: Config,

    // Registry, capped at the output buffer size fixed at construction
    registry: SlotMap<AgentHandle, LiveAgent>,
    max_agents: usize,
    order: Vec<AgentHandle>,

    // Per-tick buffers, allocated once
    snapshot: Snapshot,
    grid: SpatialHash,
    tick_handles: Vec<AgentHandle>,
    predators: Vec<usize>,
    avoidance: Vec<AvoidanceOutput>,
    flocking: Vec<FlockingOutput>,
    predator_updates: Vec<(usize, PredatorState)>,

    // Obstacles submitted by the host for the next tick
    obstacles: Vec<ObstacleBounds>,

    // State
    pub time: u64,
    elapsed: f32,
    phase: TickPhase,
    last_report: GenerationReport,

    // Statistics
    pub stats: TickStats,
    pub stats_history: StatsHistory,

    // Random number generator (seeded for reproducibility)
    rng: ChaCha8Rng,
    seed: u64,
}

impl World {
    /// Create a new world with the given configuration
    pub fn new(config: Config) -> Self {
        let seed = rand::thread_rng().gen();
        Self::new_with_seed(config, seed)
    }

    /// Create a new world with a specific seed for reproducibility
    pub fn new_with_seed(config: Config, seed: u64) -> Self {
        let max_agents = config.safety.max_agents;
        let capacity = config.snapshot_capacity();

        log::info!(
            "World created: seed {}, max agents {}, snapshot capacity {}",
            seed,
            max_agents,
            capacity
        );

        Self {
            registry: SlotMap::with_capacity_and_key(max_agents),
            max_agents,
            order: Vec::with_capacity(max_agents),
            snapshot: Snapshot::with_capacity(capacity),
            grid: SpatialHash::from_config(&config.grid),
            tick_handles: Vec::with_capacity(max_agents),
            predators: Vec::with_capacity(max_agents),
            avoidance: vec![AvoidanceOutput::default(); max_agents],
            flocking: vec![FlockingOutput::default(); max_agents],
            predator_updates: Vec::with_capacity(max_agents),
            obstacles: Vec::new(),
            time: 0,
            elapsed: 0.0,
            phase: TickPhase::Idle,
            last_report: GenerationReport::default(),
            stats: TickStats::new(),
            stats_history: StatsHistory::new(config.logging.stats_interval),
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
            config,
        }
    }

    /// Register an agent. Returns `None` once `max_agents` are registered or
    /// when the species is reserved for virtual agents.
    pub fn register_agent(&mut self, spawn: AgentSpawn) -> Option<AgentHandle> {
        if spawn.species.is_virtual() {
            log::debug!("Refusing registration of reserved species {:?}", spawn.species);
            return None;
        }
        if self.registry.len() >= self.max_agents {
            log::debug!("Agent capacity {} reached, registration refused", self.max_agents);
            return None;
        }

        let handle = self.registry.insert(LiveAgent {
            record: spawn.into_record(),
            result: AgentResult::default(),
        });
        self.order.push(handle);
        Some(handle)
    }

    /// Remove an agent. Returns false for stale handles.
    pub fn unregister_agent(&mut self, handle: AgentHandle) -> bool {
        if self.registry.remove(handle).is_none() {
            return false;
        }
        self.order.retain(|&h| h != handle);
        true
    }

    /// Read in the host's position and velocity for an agent
    pub fn set_transform(&mut self, handle: AgentHandle, position: Vec3, velocity: Vec3) -> bool {
        match self.registry.get_mut(handle) {
            Some(live) => {
                live.record.position = position;
                live.record.velocity = velocity;
                true
            }
            None => false,
        }
    }

    /// Set or clear an agent's target
    pub fn set_target(&mut self, handle: AgentHandle, target: Option<Vec3>) -> bool {
        match self.registry.get_mut(handle) {
            Some(live) => {
                live.record.target = target;
                true
            }
            None => false,
        }
    }

    /// Overwrite a predator's hunt state. False for stale handles and
    /// agents that are not predators.
    pub fn set_predator_state(&mut self, handle: AgentHandle, state: PredatorState) -> bool {
        match self.registry.get_mut(handle) {
            Some(LiveAgent {
                record: AgentRecord {
                    kind: AgentKind::Predator(current),
                    ..
                },
                ..
            }) => {
                *current = state;
                true
            }
            _ => false,
        }
    }

    /// Replace the obstacle set used from the next `begin_tick` on
    pub fn submit_obstacle_bounds(&mut self, bounds: &[ObstacleBounds]) {
        self.obstacles.clear();
        self.obstacles.extend_from_slice(bounds);
    }

    /// Rebuild the snapshot, virtual agents and spatial hash for this tick
    pub fn begin_tick(&mut self, elapsed: f32) {
        if self.phase == TickPhase::Computed {
            log::debug!("Discarding uncommitted tick outputs");
        }
        self.elapsed = if elapsed.is_finite() { elapsed.max(0.0) } else { 0.0 };

        // Phase 1: Copy live agents in registry order
        self.snapshot.clear();
        self.tick_handles.clear();
        for &handle in &self.order {
            if let Some(live) = self.registry.get(handle) {
                if self.snapshot.push_real(live.record) {
                    self.tick_handles.push(handle);
                }
            }
        }

        // Phase 2: Virtual agents around active obstacles
        self.last_report = obstacles::populate(
            &mut self.snapshot,
            &self.obstacles,
            &self.config.obstacles,
            self.config.safety.max_virtual_agents,
            &mut self.rng,
        );
        if self.last_report.truncated {
            log::debug!(
                "Virtual agent cap {} reached, generation truncated",
                self.config.safety.max_virtual_agents
            );
        }

        // Phase 3: Spatial hash and predator index
        self.snapshot.index_into(&mut self.grid);
        self.predators.clear();
        self.predators.extend(self.snapshot.predator_indices());

        self.phase = TickPhase::Begun;
    }

    /// Run the behavior stages for every live agent in the snapshot
    pub fn compute(&mut self) {
        if self.phase != TickPhase::Begun {
            log::debug!("compute() called without begin_tick(); ignored");
            return;
        }

        let n = self.snapshot.real_count();
        let elapsed = self.elapsed;
        let agents = self.snapshot.agents();

        // Phase 1: Avoidance, reading only each agent's own record
        let avoidance_config = &self.config.avoidance;
        self.avoidance[..n]
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, out)| *out = avoidance::compute(&agents[i], elapsed, avoidance_config));

        // Phase 2: Flocking over the snapshot and the joined avoidance outputs
        let ctx = StageContext {
            agents,
            grid: &self.grid,
            predators: &self.predators,
            config: &self.config,
            elapsed,
        };
        let avoidance_out = &self.avoidance;
        self.flocking[..n]
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, out)| *out = flocking::compute(i, &ctx, &avoidance_out[i]));

        // Phase 3: Predator overlay
        self.predator_updates.clear();
        let real_agents = self.snapshot.real_agents();
        for &i in &self.predators {
            let agent = &agents[i];
            if let Some(state) = agent.predator_state() {
                let next = predator::update_state(state, agent.position, real_agents, elapsed, &self.config.predator);
                self.flocking[i] =
                    predator::apply_overlay(&next, agent.position, &self.flocking[i], elapsed, &self.config.predator);
                self.predator_updates.push((i, next));
            }
        }

        self.phase = TickPhase::Computed;
    }

    /// Scatter the computed outputs back into the registry
    pub fn commit(&mut self) {
        if self.phase != TickPhase::Computed {
            log::debug!("commit() called without compute(); ignored");
            return;
        }

        // Predator states first so results read the new state
        for &(i, state) in &self.predator_updates {
            if let Some(live) = self.tick_handles.get(i).and_then(|&h| self.registry.get_mut(h)) {
                live.record.kind = AgentKind::Predator(state);
            }
        }

        for (i, &handle) in self.tick_handles.iter().enumerate() {
            // Agents unregistered mid-tick are skipped
            let Some(live) = self.registry.get_mut(handle) else {
                continue;
            };
            let avoid = &self.avoidance[i];
            let flock = &self.flocking[i];

            live.record.memory = avoid.memory;
            live.record.avoiding = avoid.avoiding;
            live.record.in_emergency = avoid.in_emergency;
            live.record.smoothed_heading = flock.smoothed_heading;
            live.record.fear_level = flock.fear_level;
            live.result = AgentResult::from_record(&live.record, flock.desired_heading, flock.acceleration);
        }

        self.time += 1;
        self.phase = TickPhase::Idle;
        self.update_stats();
    }

    /// begin_tick + compute + commit
    pub fn tick(&mut self, elapsed: f32) {
        self.begin_tick(elapsed);
        self.compute();
        self.commit();
    }

    /// Update statistics
    fn update_stats(&mut self) {
        let results = self.tick_handles.iter().filter_map(|&h| self.registry.get(h)).map(|l| &l.result);
        self.stats.update(self.time, results, &self.last_report);

        if self.stats_history.maybe_record(&self.stats) {
            log::debug!("{}", self.stats.summary());
        }
        log::trace!("{}", self.stats.summary());
    }

    /// Last committed result for an agent
    pub fn read_result(&self, handle: AgentHandle) -> Option<AgentResult> {
        self.registry.get(handle).map(|live| live.result)
    }

    /// Carried state of an agent
    pub fn record(&self, handle: AgentHandle) -> Option<&AgentRecord> {
        self.registry.get(handle).map(|live| &live.record)
    }

    /// Handles in registry order
    pub fn handles(&self) -> &[AgentHandle] {
        &self.order
    }

    /// Get current registered agent count
    pub fn agent_count(&self) -> usize {
        self.registry.len()
    }

    /// Registration cap, fixed when the world was created
    pub fn max_agents(&self) -> usize {
        self.max_agents
    }

    /// Virtual agents generated by the last `begin_tick`
    pub fn virtual_agent_count(&self) -> usize {
        self.snapshot.virtual_count()
    }

    /// What the last virtual generation pass did
    pub fn generation_report(&self) -> &GenerationReport {
        &self.last_report
    }

    /// The current tick snapshot
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn phase(&self) -> TickPhase {
        self.phase
    }

    pub fn stats(&self) -> &TickStats {
        &self.stats
    }

    pub fn stats_history(&self) -> &StatsHistory {
        &self.stats_history
    }

    /// Get seed for reproducibility
    pub fn seed(&self) -> u64 {
        self.seed
    }
}
