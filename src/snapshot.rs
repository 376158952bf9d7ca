//! Per-tick agent snapshot.
//!
//! One flat array per tick: live agents first, then the virtual obstacle
//! agents appended behind them. The stages only ever read this array, which
//! is what makes the per-agent work safe to run in parallel.

use crate::agent::AgentRecord;
use crate::grid::SpatialHash;

/// Fixed-capacity snapshot array
#[derive(Clone, Debug)]
pub struct Snapshot {
    agents: Vec<AgentRecord>,
    real_count: usize,
    capacity: usize,
}

impl Snapshot {
    /// Allocate the snapshot once; it is never grown afterwards
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            agents: Vec::with_capacity(capacity),
            real_count: 0,
            capacity,
        }
    }

    /// Drop the previous tick's contents
    pub fn clear(&mut self) {
        self.agents.clear();
        self.real_count = 0;
    }

    /// Append a live agent. Refused once virtual agents have been appended
    /// or the capacity is reached.
    pub fn push_real(&mut self, record: AgentRecord) -> bool {
        if self.agents.len() != self.real_count || self.is_full() || record.is_virtual() {
            return false;
        }
        self.agents.push(record);
        self.real_count += 1;
        true
    }

    /// Append a virtual obstacle agent behind the live agents
    pub fn push_virtual(&mut self, record: AgentRecord) -> bool {
        if self.is_full() || !record.is_virtual() {
            return false;
        }
        self.agents.push(record);
        true
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.agents.len() >= self.capacity
    }

    /// Every agent, real then virtual
    #[inline]
    pub fn agents(&self) -> &[AgentRecord] {
        &self.agents
    }

    #[inline]
    pub fn real_agents(&self) -> &[AgentRecord] {
        &self.agents[..self.real_count]
    }

    #[inline]
    pub fn virtual_agents(&self) -> &[AgentRecord] {
        &self.agents[self.real_count..]
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&AgentRecord> {
        self.agents.get(index)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    #[inline]
    pub fn real_count(&self) -> usize {
        self.real_count
    }

    #[inline]
    pub fn virtual_count(&self) -> usize {
        self.agents.len() - self.real_count
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Snapshot indices of predator agents
    pub fn predator_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.real_agents()
            .iter()
            .enumerate()
            .filter(|(_, a)| a.is_predator())
            .map(|(idx, _)| idx)
    }

    /// Rebuild `grid` from every agent in the snapshot
    pub fn index_into(&self, grid: &mut SpatialHash) {
        grid.clear();
        for (idx, agent) in self.agents.iter().enumerate() {
            grid.insert_at(agent.position, idx);
        }
    }
}
