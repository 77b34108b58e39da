//! A fixed-size 2-D lattice that indexes which agents occupy which cell.
//!
//! Any number of agents may share a cell. The grid keeps its own record of each placed agent's
//! cell so that `move_agent` and `remove` can find the old cell without consulting the agent;
//! the model keeps that record in step with `Agent::position`.
use std::fmt::{self, Display};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::agent::AgentId;
use crate::error::SirdError;
use crate::hashing::HashMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    pub x: usize,
    pub y: usize,
}

impl Coord {
    #[must_use]
    pub const fn new(x: usize, y: usize) -> Self {
        Coord { x, y }
    }
}

impl Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// What happens to a Moore neighborhood at the edge of the grid.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Boundary {
    /// Neighbors outside the grid are dropped, so edge cells have 5 and corner cells 3.
    #[default]
    Bounded,
    /// Coordinates wrap around; every cell of a grid at least 3 wide and tall has 8 neighbors.
    Toroidal,
}

pub struct Grid {
    width: usize,
    height: usize,
    boundary: Boundary,
    // Row-major, `y * width + x`
    cells: Vec<Vec<AgentId>>,
    positions: HashMap<AgentId, Coord>,
}

impl Grid {
    /// # Panics
    /// If `width * height` overflows `usize`. `SimulationConfig::validate` rejects such grids.
    #[must_use]
    pub fn new(width: usize, height: usize, boundary: Boundary) -> Self {
        Grid {
            width,
            height,
            boundary,
            cells: vec![Vec::new(); width * height],
            positions: HashMap::default(),
        }
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    #[must_use]
    pub fn boundary(&self) -> Boundary {
        self.boundary
    }

    #[must_use]
    pub fn contains(&self, coord: Coord) -> bool {
        coord.x < self.width && coord.y < self.height
    }

    fn cell_index(&self, coord: Coord) -> Result<usize, SirdError> {
        if self.contains(coord) {
            Ok(coord.y * self.width + coord.x)
        } else {
            Err(SirdError::OutOfBounds {
                coord,
                width: self.width,
                height: self.height,
            })
        }
    }

    /// Registers `agent` at `coord`. The agent must not already be on the grid.
    ///
    /// # Errors
    /// `OutOfBounds` if `coord` is outside the grid, `AlreadyPlaced` if the agent has a cell.
    pub fn place(&mut self, agent: AgentId, coord: Coord) -> Result<(), SirdError> {
        let index = self.cell_index(coord)?;
        if self.positions.contains_key(&agent) {
            return Err(SirdError::AlreadyPlaced(agent));
        }
        self.cells[index].push(agent);
        self.positions.insert(agent, coord);
        Ok(())
    }

    /// Moves `agent` from its current cell to `to`, which must be in the current cell's
    /// neighborhood or be the current cell itself.
    ///
    /// # Errors
    /// `OutOfBounds` for a target outside the grid, `IllegalMove` for a target that is not
    /// adjacent and `InconsistentAgentState` if the agent isn't on the grid.
    pub fn move_agent(&mut self, agent: AgentId, to: Coord) -> Result<(), SirdError> {
        let to_index = self.cell_index(to)?;
        let from = self.position_of(agent).ok_or_else(|| {
            SirdError::InconsistentAgentState(format!("{agent} moved without being placed"))
        })?;
        if from == to {
            return Ok(());
        }
        if !self.is_adjacent(from, to) {
            return Err(SirdError::IllegalMove { agent, from, to });
        }
        let from_index = self.cell_index(from)?;
        self.detach(agent, from_index)?;
        self.cells[to_index].push(agent);
        self.positions.insert(agent, to);
        Ok(())
    }

    /// Takes `agent` off the grid and returns the cell it occupied.
    ///
    /// # Errors
    /// `InconsistentAgentState` if the agent isn't on the grid.
    pub fn remove(&mut self, agent: AgentId) -> Result<Coord, SirdError> {
        let coord = self.positions.remove(&agent).ok_or_else(|| {
            SirdError::InconsistentAgentState(format!("{agent} removed without being placed"))
        })?;
        let index = self.cell_index(coord)?;
        self.detach(agent, index)?;
        debug!("removed {agent} from {coord}");
        Ok(coord)
    }

    // Keeps the remaining occupants in insertion order so contact resolution stays
    // reproducible for a given seed.
    fn detach(&mut self, agent: AgentId, index: usize) -> Result<(), SirdError> {
        let cell = &mut self.cells[index];
        let slot = cell.iter().position(|&a| a == agent).ok_or_else(|| {
            SirdError::InconsistentAgentState(format!(
                "{agent} is missing from the cell it is recorded in"
            ))
        })?;
        cell.remove(slot);
        Ok(())
    }

    /// The up-to-8 cells around `coord`, excluding `coord` itself. With a `Bounded` boundary
    /// cells outside the grid are clipped; with `Toroidal` they wrap, and duplicates produced
    /// by grids narrower than 3 cells are dropped.
    ///
    /// The order is fixed: rows from top to bottom, then columns from left to right.
    #[must_use]
    pub fn neighbors(&self, coord: Coord) -> Vec<Coord> {
        let mut result = Vec::with_capacity(8);
        let width = self.width as isize;
        let height = self.height as isize;
        for dy in -1_isize..=1 {
            for dx in -1_isize..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let x = coord.x as isize + dx;
                let y = coord.y as isize + dy;
                let neighbor = match self.boundary {
                    Boundary::Bounded => {
                        if x < 0 || y < 0 || x >= width || y >= height {
                            continue;
                        }
                        Coord::new(x as usize, y as usize)
                    }
                    Boundary::Toroidal => Coord::new(
                        x.rem_euclid(width) as usize,
                        y.rem_euclid(height) as usize,
                    ),
                };
                if neighbor != coord && !result.contains(&neighbor) {
                    result.push(neighbor);
                }
            }
        }
        result
    }

    /// Whether `to` is in the Moore neighborhood of `from` under this grid's boundary rule.
    #[must_use]
    pub fn is_adjacent(&self, from: Coord, to: Coord) -> bool {
        let dx = axis_distance(from.x, to.x, self.width, self.boundary);
        let dy = axis_distance(from.y, to.y, self.height, self.boundary);
        dx.max(dy) == 1
    }

    /// All agents at `coord`, in the order they arrived.
    ///
    /// # Errors
    /// `OutOfBounds` if `coord` is outside the grid.
    pub fn occupants_at(&self, coord: Coord) -> Result<&[AgentId], SirdError> {
        let index = self.cell_index(coord)?;
        Ok(&self.cells[index])
    }

    #[must_use]
    pub fn position_of(&self, agent: AgentId) -> Option<Coord> {
        self.positions.get(&agent).copied()
    }

    /// Number of agents currently on the grid.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

fn axis_distance(a: usize, b: usize, extent: usize, boundary: Boundary) -> usize {
    let direct = a.abs_diff(b);
    match boundary {
        Boundary::Bounded => direct,
        Boundary::Toroidal => direct.min(extent - direct),
    }
}
