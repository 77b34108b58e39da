//! An agent-based SIR-with-death epidemic simulation on a 2-D grid.
//!
//! A fixed population of agents wanders a grid one cell at a time. Agents that share a cell
//! with an infected agent may catch the infection; infected agents either die or, after a fixed
//! number of ticks, recover for good. The central object is the [`Model`], which owns:
//! * the [`Agent`]s, each with a health status and a position,
//! * the [`Grid`] indexing which agents stand in which cell,
//! * the [`Scheduler`] that activates every live agent once per tick in a random order,
//! * the aggregate counts and the [`TimeSeries`] they are recorded into.
//!
//! All randomness is drawn from a [`RandomSource`] handed to the model at construction, so a
//! run is fully determined by its [`SimulationConfig`] and seed:
//!
//! ```rust
//! use sird_grid::{HealthStatus, Model, SimulationConfig};
//!
//! let config = SimulationConfig {
//!     population: 100,
//!     width: 10,
//!     height: 10,
//!     seed: 42,
//!     ..SimulationConfig::default()
//! };
//! let mut model = Model::from_config(config).unwrap();
//! model.run().unwrap();
//! assert_eq!(model.count(HealthStatus::Infected), 0);
//! ```
pub mod agent;
pub mod config;
pub mod error;
pub mod grid;
pub mod hashing;
pub mod log;
pub mod model;
pub mod random;
pub mod report;
pub mod runner;
pub mod scheduler;

pub use agent::{Agent, AgentId, HealthStatus};
pub use config::{Calibration, SimulationConfig};
pub use error::SirdError;
pub use grid::{Boundary, Coord, Grid};
pub use model::Model;
pub use random::{RandomSource, RngId};
pub use report::{CountSnapshot, CsvReport, TimeSeries, TimeSeriesRecorder};
pub use scheduler::Scheduler;

// Re-exports for use by `define_rng!`
pub use paste;
pub use rand;
