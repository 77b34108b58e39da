use std::fmt::{self, Debug, Display};
use std::io;

use crate::agent::AgentId;
use crate::grid::Coord;

/// Provides `SirdError` and maps other errors to
/// convert to a `SirdError`.
///
/// Every variant other than the wrapped I/O errors is fatal to a simulation run:
/// a step either completes or the model should be discarded.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub enum SirdError {
    /// A rate outside `[0, 1]`, an empty population or a zero grid dimension.
    InvalidConfiguration(String),
    /// An agent was placed or moved to a cell outside the grid.
    OutOfBounds {
        coord: Coord,
        width: usize,
        height: usize,
    },
    /// An agent was moved to a cell that is not in its Moore neighborhood.
    IllegalMove {
        agent: AgentId,
        from: Coord,
        to: Coord,
    },
    /// `place` was called for an agent that already occupies a cell.
    AlreadyPlaced(AgentId),
    /// The grid or scheduler refer to an agent that isn't live.
    InconsistentAgentState(String),
    IoError(io::Error),
    JsonError(serde_json::Error),
    CsvError(csv::Error),
}

impl From<io::Error> for SirdError {
    fn from(error: io::Error) -> Self {
        SirdError::IoError(error)
    }
}

impl From<serde_json::Error> for SirdError {
    fn from(error: serde_json::Error) -> Self {
        SirdError::JsonError(error)
    }
}

impl From<csv::Error> for SirdError {
    fn from(error: csv::Error) -> Self {
        SirdError::CsvError(error)
    }
}

impl std::error::Error for SirdError {}

impl Display for SirdError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SirdError::InvalidConfiguration(msg) => write!(f, "invalid configuration: {msg}"),
            SirdError::OutOfBounds {
                coord,
                width,
                height,
            } => write!(f, "cell {coord} is outside the {width}x{height} grid"),
            SirdError::IllegalMove { agent, from, to } => {
                write!(f, "{agent} cannot move from {from} to {to}")
            }
            SirdError::AlreadyPlaced(agent) => write!(f, "{agent} is already on the grid"),
            SirdError::InconsistentAgentState(msg) => {
                write!(f, "inconsistent agent state: {msg}")
            }
            SirdError::IoError(error) => write!(f, "I/O error: {error}"),
            SirdError::JsonError(error) => write!(f, "JSON error: {error}"),
            SirdError::CsvError(error) => write!(f, "CSV error: {error}"),
        }
    }
}
