//! Random activation of the live agents, one pass per tick.
use indexmap::IndexSet;
use log::debug;

use crate::agent::AgentId;
use crate::define_rng;
use crate::error::SirdError;
use crate::random::RandomSource;

define_rng!(ActivationRng);

/// Holds the set of live agents and the simulation clock.
///
/// Each call to [`Scheduler::step`] activates the registered agents in a freshly shuffled order
/// and then advances the clock by one tick.
#[derive(Debug, Default)]
pub struct Scheduler {
    agents: IndexSet<AgentId>,
    tick: u64,
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Scheduler::default()
    }

    /// The current tick: the number of completed steps.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Registers `agent`. Returns false if it was already registered.
    pub fn add(&mut self, agent: AgentId) -> bool {
        self.agents.insert(agent)
    }

    /// Unregisters `agent`. Removing an agent that isn't registered is a no-op; returns
    /// whether anything was removed.
    pub fn remove(&mut self, agent: AgentId) -> bool {
        let removed = self.agents.swap_remove(&agent);
        if removed {
            debug!("unscheduled {agent} at tick {}", self.tick);
        }
        removed
    }

    #[must_use]
    pub fn contains(&self, agent: AgentId) -> bool {
        self.agents.contains(&agent)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// The registered agents, in registration order (not activation order).
    pub fn agents(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.agents.iter().copied()
    }

    /// Activates every registered agent exactly once and then advances the tick.
    ///
    /// The activation order is a snapshot shuffled at the start of the call. `activate` may
    /// remove agents from the scheduler; an agent removed before its turn in the snapshot is
    /// skipped and agents added during the pass wait for the next step.
    ///
    /// # Errors
    /// The first error returned by `activate` is propagated and the tick is not advanced.
    pub fn step<F>(&mut self, random: &mut RandomSource, mut activate: F) -> Result<(), SirdError>
    where
        F: FnMut(&mut Scheduler, &mut RandomSource, AgentId) -> Result<(), SirdError>,
    {
        let mut order: Vec<AgentId> = self.agents.iter().copied().collect();
        random.shuffle(ActivationRng, &mut order);
        for agent in order {
            if !self.agents.contains(&agent) {
                continue;
            }
            activate(self, random, agent)?;
        }
        self.tick += 1;
        Ok(())
    }
}
