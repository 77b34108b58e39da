//! Simulation parameters, loaded once and passed to the model at construction.
//!
//! A config can be written out in full or only in part; missing fields take the values in
//! [`SimulationConfig::default`], which reproduce a London-calibrated run:
//!
//! ```json
//! {
//!     "population": 1000,
//!     "width": 50,
//!     "height": 50,
//!     "infection_rate": 0.3,
//!     "boundary": "toroidal"
//! }
//! ```
use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::agent::AgentId;
use crate::error::SirdError;
use crate::grid::Boundary;

/// Observed case and death totals used to derive mortality and density parameters.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub confirmed_cases: u64,
    pub deaths: u64,
    /// People per square meter.
    pub population_density: f64,
    /// Agents placed per person-sized patch of grid.
    pub agents_per_cell: f64,
}

impl Calibration {
    pub const LONDON: Calibration = Calibration {
        confirmed_cases: 27_354,
        deaths: 6_079,
        population_density: 5_701.0 / 1_000_000.0,
        agents_per_cell: 2.0,
    };

    /// The case fatality ratio spread evenly over the infectious period, as a per-tick
    /// probability.
    #[must_use]
    pub fn die_rate(&self, max_infection_time: u64) -> f64 {
        if self.confirmed_cases == 0 || max_infection_time == 0 {
            return 0.0;
        }
        (self.deaths as f64 / self.confirmed_cases as f64) / max_infection_time as f64
    }

    /// Number of agents for a `width` x `height` grid at this density.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn population(&self, width: usize, height: usize) -> usize {
        (self.population_density * (width * height) as f64 * self.agents_per_cell).round() as usize
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    pub population: usize,
    pub width: usize,
    pub height: usize,
    /// Probability that an infected agent infects a given susceptible cellmate in one tick.
    pub infection_rate: f64,
    /// Probability that each agent starts out infected.
    pub initial_infected_fraction: f64,
    /// Probability that an infected agent dies in one tick.
    pub die_rate: f64,
    /// Ticks after onset at which a surviving infected agent recovers.
    pub max_infection_time: u64,
    pub boundary: Boundary,
    pub seed: u64,
    /// Stop after this many steps even if the epidemic is still going.
    pub max_ticks: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        const WIDTH: usize = 200;
        const HEIGHT: usize = 200;
        const MAX_INFECTION_TIME: u64 = 14;
        let calibration = Calibration::LONDON;
        SimulationConfig {
            population: calibration.population(WIDTH, HEIGHT),
            width: WIDTH,
            height: HEIGHT,
            infection_rate: 0.5,
            initial_infected_fraction: 0.1,
            die_rate: calibration.die_rate(MAX_INFECTION_TIME),
            max_infection_time: MAX_INFECTION_TIME,
            boundary: Boundary::Bounded,
            seed: 0,
            max_ticks: None,
        }
    }
}

fn check_probability(name: &str, value: f64) -> Result<(), SirdError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SirdError::InvalidConfiguration(format!(
            "{name} must be a probability in [0, 1], got {value}"
        )))
    }
}

impl SimulationConfig {
    /// # Errors
    /// Returns a `JsonError` if the text is not a valid config.
    pub fn from_json_str(json: &str) -> Result<Self, SirdError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a JSON config file. Fields absent from the file keep their defaults.
    ///
    /// # Errors
    /// Returns an `IoError` if the file can't be read or a `JsonError` if it doesn't parse.
    pub fn from_json_file(path: &Path) -> Result<Self, SirdError> {
        info!("loading simulation config from {}", path.display());
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Checks every rate is a probability and the population and grid are non-empty.
    ///
    /// # Errors
    /// Returns `InvalidConfiguration` naming the first offending field.
    pub fn validate(&self) -> Result<(), SirdError> {
        if self.population == 0 {
            return Err(SirdError::InvalidConfiguration(
                "population must be at least 1".to_string(),
            ));
        }
        if self.width == 0 || self.height == 0 {
            return Err(SirdError::InvalidConfiguration(format!(
                "grid dimensions must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        let cell_bytes = self
            .width
            .checked_mul(self.height)
            .and_then(|cells| cells.checked_mul(size_of::<Vec<AgentId>>()));
        if cell_bytes.is_none_or(|bytes| bytes > isize::MAX as usize) {
            return Err(SirdError::InvalidConfiguration(format!(
                "a {}x{} grid has more cells than can be addressed",
                self.width, self.height
            )));
        }
        check_probability("infection_rate", self.infection_rate)?;
        check_probability("initial_infected_fraction", self.initial_infected_fraction)?;
        check_probability("die_rate", self.die_rate)?;
        Ok(())
    }
}
