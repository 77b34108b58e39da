//! The population model: owns the agents, the grid and the scheduler, and composes one tick.
//!
//! A step runs in three phases:
//! 1. aggregate the four counts from the live agents plus the dead-agent record,
//! 2. push that snapshot to the time series and any attached recorders,
//! 3. let the scheduler activate every live agent in a shuffled order.
//!
//! The counts recorded for tick `T` therefore describe the population before any of `T`'s
//! activations.
use log::{debug, info, trace};

use crate::agent::{attempt_transmission, Agent, AgentId, HealthStatus, Progression};
use crate::config::SimulationConfig;
use crate::define_rng;
use crate::error::SirdError;
use crate::grid::{Coord, Grid};
use crate::random::RandomSource;
use crate::report::{CountSnapshot, TimeSeries, TimeSeriesRecorder};
use crate::scheduler::Scheduler;

define_rng!(PlacementRng);
define_rng!(SeedingRng);

/// Everything an agent's activation can touch, split from the scheduler so both can be
/// borrowed mutably during a step.
struct World {
    agents: Vec<Agent>,
    grid: Grid,
    dead_agents: Vec<AgentId>,
    infection_rate: f64,
}

fn agent_mut(agents: &mut [Agent], id: AgentId) -> Result<&mut Agent, SirdError> {
    agents.get_mut(id.index()).ok_or_else(|| {
        SirdError::InconsistentAgentState(format!("{id} does not exist"))
    })
}

impl World {
    /// Runs one agent's turn: mortality or recovery, then movement, then transmission.
    fn activate(
        &mut self,
        scheduler: &mut Scheduler,
        random: &mut RandomSource,
        id: AgentId,
    ) -> Result<(), SirdError> {
        let tick = scheduler.tick();
        let agent = agent_mut(&mut self.agents, id)?;
        if agent.status() == HealthStatus::Dead {
            return Err(SirdError::InconsistentAgentState(format!(
                "{id} is dead but still scheduled"
            )));
        }
        let from = agent.position();
        if self.grid.position_of(id) != Some(from) {
            return Err(SirdError::InconsistentAgentState(format!(
                "{id} believes it is at {from} but the grid disagrees"
            )));
        }

        match agent.resolve_progression(tick, random) {
            Progression::Died => {
                scheduler.remove(id);
                self.grid.remove(id)?;
                self.dead_agents.push(id);
                return Ok(());
            }
            Progression::Recovered | Progression::StillInfected | Progression::NotInfected => {}
        }

        let to = agent.choose_step(&self.grid, random);
        self.grid.move_agent(id, to)?;
        agent.set_position(to);
        trace!("{id} moved {from} -> {to}");

        if agent.status() == HealthStatus::Infected {
            self.spread_from(id, to, tick, random)?;
        }
        Ok(())
    }

    /// Exposes every other occupant of `cell` to the infected agent `source`.
    fn spread_from(
        &mut self,
        source: AgentId,
        cell: Coord,
        tick: u64,
        random: &mut RandomSource,
    ) -> Result<(), SirdError> {
        let cellmates = self.grid.occupants_at(cell)?;
        if cellmates.len() < 2 {
            return Ok(());
        }
        let cellmates = cellmates.to_vec();
        for other in cellmates.into_iter().filter(|&other| other != source) {
            let target = agent_mut(&mut self.agents, other)?;
            if attempt_transmission(target, self.infection_rate, tick, random) {
                trace!("{source} infected {other} at {cell}");
            }
        }
        Ok(())
    }

    fn aggregate(&self, scheduler: &Scheduler) -> Result<CountSnapshot, SirdError> {
        let mut counts = CountSnapshot {
            tick: scheduler.tick(),
            ..CountSnapshot::default()
        };
        for id in scheduler.agents() {
            let agent = self.agents.get(id.index()).ok_or_else(|| {
                SirdError::InconsistentAgentState(format!("scheduler holds unknown {id}"))
            })?;
            counts.count(agent.status());
        }
        counts.dead += self.dead_agents.len();
        Ok(counts)
    }
}

pub struct Model {
    config: SimulationConfig,
    random: RandomSource,
    scheduler: Scheduler,
    world: World,
    counts: CountSnapshot,
    time_series: TimeSeries,
    recorders: Vec<Box<dyn TimeSeriesRecorder>>,
    running: bool,
}

impl Model {
    /// Builds a model seeded from `config.seed`.
    ///
    /// # Errors
    /// Returns `InvalidConfiguration` if `config` fails validation.
    pub fn from_config(config: SimulationConfig) -> Result<Self, SirdError> {
        let random = RandomSource::new(config.seed);
        Model::new(config, random)
    }

    /// Creates `config.population` agents at uniformly random cells. Each starts infected (with
    /// onset tick 0) with probability `config.initial_infected_fraction`, otherwise susceptible.
    ///
    /// # Errors
    /// Returns `InvalidConfiguration` before any agent is created if `config` fails validation.
    pub fn new(config: SimulationConfig, mut random: RandomSource) -> Result<Self, SirdError> {
        config.validate()?;
        info!(
            "initializing {} agents on a {}x{} {:?} grid (seed {})",
            config.population,
            config.width,
            config.height,
            config.boundary,
            random.base_seed()
        );

        let mut grid = Grid::new(config.width, config.height, config.boundary);
        let mut scheduler = Scheduler::new();
        let mut agents = Vec::with_capacity(config.population);
        for index in 0..config.population {
            let id = AgentId(index);
            let position = Coord::new(
                random.sample_range(PlacementRng, 0..config.width),
                random.sample_range(PlacementRng, 0..config.height),
            );
            let mut agent = Agent::new(id, position, config.die_rate, config.max_infection_time);
            if random.sample_bool(SeedingRng, config.initial_infected_fraction) {
                agent.infect(0);
            }
            grid.place(id, position)?;
            scheduler.add(id);
            agents.push(agent);
        }

        let world = World {
            agents,
            grid,
            dead_agents: Vec::new(),
            infection_rate: config.infection_rate,
        };
        let counts = world.aggregate(&scheduler)?;
        debug!("initial counts: {counts:?}");

        Ok(Model {
            config,
            random,
            scheduler,
            world,
            counts,
            time_series: TimeSeries::new(),
            recorders: Vec::new(),
            running: true,
        })
    }

    /// Infects a susceptible agent directly, with the current tick as its onset, e.g. to start
    /// an outbreak from a chosen index case. Returns whether the agent's status changed.
    ///
    /// Works at any point: a model that stopped because its epidemic ended runs again, and
    /// [`Model::counts`] includes the new case right away.
    ///
    /// # Errors
    /// `InconsistentAgentState` if no agent has this id.
    pub fn seed_infection(&mut self, id: AgentId) -> Result<bool, SirdError> {
        let tick = self.scheduler.tick();
        if !agent_mut(&mut self.world.agents, id)?.infect(tick) {
            return Ok(false);
        }
        self.counts = self.world.aggregate(&self.scheduler)?;
        self.running = true;
        debug!("seeded {id} at tick {tick}");
        Ok(true)
    }

    /// Attaches a recorder that receives every snapshot from the next step on.
    pub fn add_recorder(&mut self, recorder: Box<dyn TimeSeriesRecorder>) {
        self.recorders.push(recorder);
    }

    /// Advances the simulation by one tick.
    ///
    /// # Errors
    /// Any error leaves the model mid-step; it should be discarded.
    pub fn step(&mut self) -> Result<(), SirdError> {
        let counts = self.world.aggregate(&self.scheduler)?;
        self.counts = counts;
        info!(
            "tick {}: susceptible {} infected {} recovered {} dead {}",
            counts.tick, counts.susceptible, counts.infected, counts.recovered, counts.dead
        );

        self.time_series.record(&counts)?;
        for recorder in &mut self.recorders {
            recorder.record(&counts)?;
        }

        let world = &mut self.world;
        self.scheduler
            .step(&mut self.random, |scheduler, random, agent| {
                world.activate(scheduler, random, agent)
            })?;

        if counts.infected == 0 {
            debug!("no infected agents at tick {}; epidemic over", counts.tick);
            self.running = false;
        }
        Ok(())
    }

    /// False once a step has observed no infected agents or `max_ticks` steps have run.
    #[must_use]
    pub fn is_running(&self) -> bool {
        let under_limit = self
            .config
            .max_ticks
            .is_none_or(|max_ticks| self.scheduler.tick() < max_ticks);
        self.running && under_limit
    }

    /// Steps until [`Model::is_running`] is false and returns the final tick.
    ///
    /// # Errors
    /// Propagates the first step error.
    pub fn run(&mut self) -> Result<u64, SirdError> {
        while self.is_running() {
            self.step()?;
        }
        info!("finished at tick {}", self.tick());
        Ok(self.tick())
    }

    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Number of completed steps.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.scheduler.tick()
    }

    /// The counts from the most recent aggregation.
    #[must_use]
    pub fn counts(&self) -> CountSnapshot {
        self.counts
    }

    #[must_use]
    pub fn count(&self, status: HealthStatus) -> usize {
        self.counts.get(status)
    }

    #[must_use]
    pub fn time_series(&self) -> &TimeSeries {
        &self.time_series
    }

    /// Every agent ever created, dead ones included, indexed by `AgentId`.
    #[must_use]
    pub fn agents(&self) -> &[Agent] {
        &self.world.agents
    }

    #[must_use]
    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.world.agents.get(id.index())
    }

    /// Agents still on the grid and in the scheduler.
    pub fn live_agents(&self) -> impl Iterator<Item = &Agent> + '_ {
        self.scheduler
            .agents()
            .filter_map(|id| self.world.agents.get(id.index()))
    }

    /// Dead agents in the order they died.
    #[must_use]
    pub fn dead_agents(&self) -> &[AgentId] {
        &self.world.dead_agents
    }

    #[must_use]
    pub fn grid(&self) -> &Grid {
        &self.world.grid
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn small_config() -> SimulationConfig {
        SimulationConfig {
            population: 60,
            width: 8,
            height: 8,
            infection_rate: 0.5,
            initial_infected_fraction: 0.2,
            die_rate: 0.05,
            max_infection_time: 6,
            seed: 17,
            ..SimulationConfig::default()
        }
    }

    fn assert_consistent(model: &Model) {
        for agent in model.live_agents() {
            assert_ne!(agent.status(), HealthStatus::Dead);
            assert_eq!(model.grid().position_of(agent.id()), Some(agent.position()));
            assert!(model
                .grid()
                .occupants_at(agent.position())
                .unwrap()
                .contains(&agent.id()));
        }
        for &id in model.dead_agents() {
            assert_eq!(model.agent(id).unwrap().status(), HealthStatus::Dead);
            assert_eq!(model.grid().position_of(id), None);
            assert!(!model.scheduler().contains(id));
        }
        assert_eq!(model.grid().len(), model.scheduler().len());
    }

    #[test]
    fn invalid_config_creates_nothing() {
        let config = SimulationConfig {
            die_rate: 2.0,
            ..small_config()
        };
        assert!(matches!(
            Model::from_config(config),
            Err(SirdError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn initialization_places_everyone() {
        let model = Model::from_config(small_config()).unwrap();
        assert_eq!(model.agents().len(), 60);
        assert_eq!(model.grid().len(), 60);
        assert_eq!(model.scheduler().len(), 60);
        assert_eq!(model.tick(), 0);
        assert_eq!(model.counts().total(), 60);
        for agent in model.agents() {
            assert!(model.grid().contains(agent.position()));
            match agent.status() {
                HealthStatus::Infected => assert_eq!(agent.infection_onset(), Some(0)),
                HealthStatus::Susceptible => assert_eq!(agent.infection_onset(), None),
                status => panic!("unexpected initial status {status}"),
            }
        }
        assert_consistent(&model);
    }

    #[test]
    fn seeding_extremes() {
        let all = Model::from_config(SimulationConfig {
            initial_infected_fraction: 1.0,
            ..small_config()
        })
        .unwrap();
        assert_eq!(all.count(HealthStatus::Infected), 60);

        let none = Model::from_config(SimulationConfig {
            initial_infected_fraction: 0.0,
            ..small_config()
        })
        .unwrap();
        assert_eq!(none.count(HealthStatus::Susceptible), 60);
    }

    #[test]
    fn counts_lag_activation() {
        let mut model = Model::from_config(small_config()).unwrap();
        let before = model.counts();
        model.step().unwrap();

        // The recorded row for tick 0 is the state before tick 0's activations
        let row = model.time_series().rows()[0];
        assert_eq!(row, before);
        assert_eq!(row.tick, 0);
        assert_eq!(model.tick(), 1);
    }

    #[test]
    fn conservation_and_consistency_over_many_steps() {
        let mut model = Model::from_config(small_config()).unwrap();
        for _ in 0..40 {
            model.step().unwrap();
            assert_eq!(model.counts().total(), 60);
            assert_consistent(&model);
        }
        for (tick, row) in model.time_series().rows().iter().enumerate() {
            assert_eq!(row.tick, tick as u64);
            assert_eq!(row.total(), 60);
        }
    }

    #[test]
    fn certain_death_next_activation() {
        let mut model = Model::from_config(SimulationConfig {
            die_rate: 1.0,
            infection_rate: 0.0,
            ..small_config()
        })
        .unwrap();
        let infected: Vec<AgentId> = model
            .agents()
            .iter()
            .filter(|agent| agent.status() == HealthStatus::Infected)
            .map(Agent::id)
            .collect();
        model.step().unwrap();
        for id in &infected {
            assert_eq!(model.agent(*id).unwrap().status(), HealthStatus::Dead);
        }
        assert_eq!(model.dead_agents().len(), infected.len());
        model.step().unwrap();
        assert_eq!(model.count(HealthStatus::Dead), infected.len());
        assert_eq!(model.count(HealthStatus::Infected), 0);
        assert_consistent(&model);
    }

    #[test]
    fn dead_agents_do_not_move() {
        let mut model = Model::from_config(SimulationConfig {
            die_rate: 1.0,
            infection_rate: 0.0,
            initial_infected_fraction: 1.0,
            ..small_config()
        })
        .unwrap();
        let positions: Vec<Coord> = model.agents().iter().map(Agent::position).collect();
        model.step().unwrap();
        for (agent, before) in model.agents().iter().zip(positions) {
            assert_eq!(agent.status(), HealthStatus::Dead);
            assert_eq!(agent.position(), before);
        }
        assert!(model.grid().is_empty());
        assert!(model.scheduler().is_empty());
    }

    #[test]
    fn movement_is_local() {
        let mut model = Model::from_config(SimulationConfig {
            die_rate: 0.0,
            ..small_config()
        })
        .unwrap();
        for _ in 0..20 {
            let before: Vec<Coord> = model.agents().iter().map(Agent::position).collect();
            model.step().unwrap();
            for (agent, from) in model.agents().iter().zip(before) {
                let to = agent.position();
                assert!(model.grid().contains(to));
                assert!(from.x.abs_diff(to.x) <= 1 && from.y.abs_diff(to.y) <= 1);
            }
        }
    }

    #[test]
    fn recovery_is_time_based() {
        let mut model = Model::from_config(SimulationConfig {
            die_rate: 0.0,
            infection_rate: 0.0,
            max_infection_time: 3,
            ..small_config()
        })
        .unwrap();
        let seeded = model.count(HealthStatus::Infected);
        assert!(seeded > 0);
        // Ticks 0..=2 leave the seeded agents infected, tick 3 recovers them
        for _ in 0..3 {
            model.step().unwrap();
        }
        assert_eq!(
            model.agents()
                .iter()
                .filter(|a| a.status() == HealthStatus::Infected)
                .count(),
            seeded
        );
        model.step().unwrap();
        model.step().unwrap();
        assert_eq!(model.count(HealthStatus::Recovered), seeded);
        assert_eq!(model.count(HealthStatus::Infected), 0);
    }

    #[test]
    fn run_stops_when_epidemic_ends() {
        let mut model = Model::from_config(SimulationConfig {
            max_infection_time: 2,
            ..small_config()
        })
        .unwrap();
        let final_tick = model.run().unwrap();
        assert!(!model.is_running());
        assert_eq!(model.count(HealthStatus::Infected), 0);
        assert_eq!(model.time_series().len() as u64, final_tick);
    }

    #[test]
    fn run_respects_max_ticks() {
        let mut model = Model::from_config(SimulationConfig {
            die_rate: 0.0,
            max_infection_time: 1_000,
            max_ticks: Some(5),
            ..small_config()
        })
        .unwrap();
        assert_eq!(model.run().unwrap(), 5);
        assert_eq!(model.time_series().len(), 5);
    }

    struct SharedRecorder(Rc<RefCell<Vec<CountSnapshot>>>);

    impl TimeSeriesRecorder for SharedRecorder {
        fn record(&mut self, snapshot: &CountSnapshot) -> Result<(), SirdError> {
            self.0.borrow_mut().push(*snapshot);
            Ok(())
        }
    }

    #[test]
    fn attached_recorders_see_every_snapshot() {
        let rows = Rc::new(RefCell::new(Vec::new()));
        let mut model = Model::from_config(small_config()).unwrap();
        model.add_recorder(Box::new(SharedRecorder(Rc::clone(&rows))));
        for _ in 0..4 {
            model.step().unwrap();
        }
        assert_eq!(rows.borrow().as_slice(), model.time_series().rows());
    }

    #[test]
    fn seed_infection_only_touches_susceptible() {
        let mut model = Model::from_config(SimulationConfig {
            initial_infected_fraction: 0.0,
            ..small_config()
        })
        .unwrap();
        model.step().unwrap();
        assert!(model.seed_infection(AgentId(3)).unwrap());
        assert_eq!(model.agent(AgentId(3)).unwrap().infection_onset(), Some(1));
        assert!(!model.seed_infection(AgentId(3)).unwrap());
        assert!(matches!(
            model.seed_infection(AgentId(600)),
            Err(SirdError::InconsistentAgentState(_))
        ));
    }

    #[test]
    fn seeding_restarts_a_finished_epidemic() {
        let mut model = Model::from_config(SimulationConfig {
            infection_rate: 0.0,
            die_rate: 0.0,
            max_infection_time: 2,
            ..small_config()
        })
        .unwrap();
        let stopped_at = model.run().unwrap();
        assert!(!model.is_running());

        let index_case = model
            .agents()
            .iter()
            .find(|agent| agent.status() == HealthStatus::Susceptible)
            .map(Agent::id)
            .unwrap();
        assert!(model.seed_infection(index_case).unwrap());
        assert!(model.is_running());
        assert_eq!(model.count(HealthStatus::Infected), 1);
        assert_eq!(model.counts().tick, stopped_at);

        let resumed_at = model.run().unwrap();
        assert!(resumed_at > stopped_at);
        assert_eq!(
            model.agent(index_case).unwrap().status(),
            HealthStatus::Recovered
        );
    }

    #[test]
    fn injected_random_source_overrides_config_seed() {
        let a = Model::new(small_config(), RandomSource::new(1)).unwrap();
        let b = Model::new(
            SimulationConfig {
                seed: 999,
                ..small_config()
            },
            RandomSource::new(1),
        )
        .unwrap();
        let positions = |m: &Model| m.agents().iter().map(Agent::position).collect::<Vec<_>>();
        assert_eq!(positions(&a), positions(&b));
    }
}
