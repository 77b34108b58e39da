//! Individual epidemiological state and the per-tick decisions an agent makes.
//!
//! An agent moves through `Susceptible -> Infected -> {Recovered, Dead}`. `Recovered` and
//! `Dead` are terminal: there is no reinfection and no return to `Susceptible`. The model
//! drives the order of operations each tick (progression, then movement, then transmission);
//! this module only decides what happens at each stage.
use std::fmt::{self, Display};

use log::trace;
use serde::{Deserialize, Serialize};

use crate::define_rng;
use crate::grid::{Coord, Grid};
use crate::random::RandomSource;

define_rng!(MovementRng);
define_rng!(MortalityRng);
define_rng!(TransmissionRng);

/// Identifies an agent for its whole lifetime. Ids are dense indices into the model's agent list.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub usize);

impl AgentId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "agent {}", self.0)
    }
}

#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
)]
pub enum HealthStatus {
    #[default]
    Susceptible,
    Infected,
    Recovered,
    Dead,
}

impl HealthStatus {
    /// `Recovered` and `Dead` never change again.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, HealthStatus::Recovered | HealthStatus::Dead)
    }
}

/// Outcome of the mortality/recovery stage of an agent's activation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Progression {
    /// The agent was not infected; nothing happened.
    NotInfected,
    Died,
    Recovered,
    StillInfected,
}

#[derive(Clone, Debug)]
pub struct Agent {
    id: AgentId,
    status: HealthStatus,
    infection_onset: Option<u64>,
    position: Coord,
    die_rate: f64,
    max_infection_time: u64,
}

impl Agent {
    /// A new susceptible agent standing at `position`.
    #[must_use]
    pub fn new(id: AgentId, position: Coord, die_rate: f64, max_infection_time: u64) -> Self {
        Agent {
            id,
            status: HealthStatus::Susceptible,
            infection_onset: None,
            position,
            die_rate,
            max_infection_time,
        }
    }

    #[must_use]
    pub fn id(&self) -> AgentId {
        self.id
    }

    #[must_use]
    pub fn status(&self) -> HealthStatus {
        self.status
    }

    #[must_use]
    pub fn position(&self) -> Coord {
        self.position
    }

    /// The tick at which this agent became infected, if it ever was.
    #[must_use]
    pub fn infection_onset(&self) -> Option<u64> {
        self.infection_onset
    }

    #[must_use]
    pub fn die_rate(&self) -> f64 {
        self.die_rate
    }

    #[must_use]
    pub fn max_infection_time(&self) -> u64 {
        self.max_infection_time
    }

    pub(crate) fn set_position(&mut self, position: Coord) {
        self.position = position;
    }

    /// Infects a susceptible agent at `tick`. Returns whether the status changed; agents that
    /// are already infected, recovered or dead are left alone.
    pub fn infect(&mut self, tick: u64) -> bool {
        if self.status != HealthStatus::Susceptible {
            return false;
        }
        trace!("{} infected at tick {tick}", self.id);
        self.status = HealthStatus::Infected;
        self.infection_onset = Some(tick);
        true
    }

    /// How long this agent has been infected as of `tick`.
    #[must_use]
    pub fn ticks_infected(&self, tick: u64) -> Option<u64> {
        match self.status {
            HealthStatus::Infected => self.infection_onset.map(|onset| tick.saturating_sub(onset)),
            _ => None,
        }
    }

    /// Runs the mortality draw for an infected agent and, if it survives, recovers it once it
    /// has been infected for `max_infection_time` ticks.
    pub fn resolve_progression(&mut self, tick: u64, random: &mut RandomSource) -> Progression {
        if self.status != HealthStatus::Infected {
            return Progression::NotInfected;
        }
        if random.sample_bool(MortalityRng, self.die_rate) {
            trace!("{} died at tick {tick}", self.id);
            self.status = HealthStatus::Dead;
            return Progression::Died;
        }
        match self.ticks_infected(tick) {
            Some(elapsed) if elapsed >= self.max_infection_time => {
                trace!("{} recovered at tick {tick} after {elapsed} ticks", self.id);
                self.status = HealthStatus::Recovered;
                Progression::Recovered
            }
            _ => Progression::StillInfected,
        }
    }

    /// Picks the cell this agent moves to: a uniformly random member of its Moore neighborhood.
    /// An agent on a grid with no neighboring cells stays where it is.
    #[must_use]
    pub fn choose_step(&self, grid: &Grid, random: &mut RandomSource) -> Coord {
        let candidates = grid.neighbors(self.position);
        random
            .choose(MovementRng, &candidates)
            .unwrap_or(self.position)
    }
}

/// One contact between an infected agent and a cellmate. The attempt proceeds with
/// probability `infection_rate`; if it does and `target` is susceptible, `target` is
/// infected at `tick`. Returns whether `target` became infected.
pub fn attempt_transmission(
    target: &mut Agent,
    infection_rate: f64,
    tick: u64,
    random: &mut RandomSource,
) -> bool {
    if !random.sample_bool(TransmissionRng, infection_rate) {
        return false;
    }
    target.infect(tick)
}
