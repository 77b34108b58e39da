//! Population-level counts and the recorders that receive one snapshot per tick.
use std::io::Write;

use csv::Writer;
use serde::{Deserialize, Serialize};

use crate::agent::HealthStatus;
use crate::error::SirdError;

/// The four aggregate counts as of the start of `tick`, before that tick's activations.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountSnapshot {
    pub tick: u64,
    pub susceptible: usize,
    pub infected: usize,
    pub recovered: usize,
    pub dead: usize,
}

impl CountSnapshot {
    #[must_use]
    pub fn total(&self) -> usize {
        self.susceptible + self.infected + self.recovered + self.dead
    }

    #[must_use]
    pub fn get(&self, status: HealthStatus) -> usize {
        match status {
            HealthStatus::Susceptible => self.susceptible,
            HealthStatus::Infected => self.infected,
            HealthStatus::Recovered => self.recovered,
            HealthStatus::Dead => self.dead,
        }
    }

    pub(crate) fn count(&mut self, status: HealthStatus) {
        match status {
            HealthStatus::Susceptible => self.susceptible += 1,
            HealthStatus::Infected => self.infected += 1,
            HealthStatus::Recovered => self.recovered += 1,
            HealthStatus::Dead => self.dead += 1,
        }
    }
}

/// Receives the aggregate snapshot the model takes at the start of every step.
pub trait TimeSeriesRecorder {
    /// # Errors
    /// Recorders that write somewhere may fail; the error aborts the step.
    fn record(&mut self, snapshot: &CountSnapshot) -> Result<(), SirdError>;
}

/// Keeps every snapshot in memory. The model always carries one of these.
#[derive(Debug, Default, Clone)]
pub struct TimeSeries {
    rows: Vec<CountSnapshot>,
}

impl TimeSeries {
    #[must_use]
    pub fn new() -> Self {
        TimeSeries::default()
    }

    #[must_use]
    pub fn rows(&self) -> &[CountSnapshot] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn last(&self) -> Option<&CountSnapshot> {
        self.rows.last()
    }

    /// The column for one status, in tick order.
    #[must_use]
    pub fn series(&self, status: HealthStatus) -> Vec<usize> {
        self.rows.iter().map(|row| row.get(status)).collect()
    }

    /// The largest number of simultaneously infected agents seen so far.
    #[must_use]
    pub fn peak_infected(&self) -> Option<&CountSnapshot> {
        self.rows.iter().max_by_key(|row| row.infected)
    }
}

impl TimeSeriesRecorder for TimeSeries {
    fn record(&mut self, snapshot: &CountSnapshot) -> Result<(), SirdError> {
        self.rows.push(*snapshot);
        Ok(())
    }
}

/// Streams snapshots as CSV rows (`tick,susceptible,infected,recovered,dead`) to a writer.
/// The header is written with the first row.
pub struct CsvReport<W: Write> {
    writer: Writer<W>,
}

impl<W: Write> CsvReport<W> {
    pub fn new(inner: W) -> Self {
        CsvReport {
            writer: Writer::from_writer(inner),
        }
    }

    /// Flushes and hands back the underlying writer.
    ///
    /// # Errors
    /// Returns an error if the final flush fails.
    pub fn into_inner(self) -> Result<W, SirdError> {
        self.writer
            .into_inner()
            .map_err(|error| SirdError::IoError(error.into_error()))
    }
}

impl<W: Write> TimeSeriesRecorder for CsvReport<W> {
    fn record(&mut self, snapshot: &CountSnapshot) -> Result<(), SirdError> {
        self.writer.serialize(snapshot)?;
        self.writer.flush()?;
        Ok(())
    }
}
