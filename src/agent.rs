use crate::cell::{Cell, CellId};
use crate::error::{precondition, CellGridError, Result};
use log::trace;
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Stable handle for agents backed by a generational slot map.
    pub struct AgentId;
}

/// Where an agent stands in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Residency {
    Unbound,
    Resident(CellId),
    /// Terminal. A retired agent is never bound to a cell again.
    Retired,
}

/// A mobile entity living on at most one cell and belonging to one population.
///
/// Residence and coordinates are private: they only change through
/// [`move_in`](Agent::move_in), [`move_out`](Agent::move_out),
/// [`move_to_this_cell`](Agent::move_to_this_cell) and [`die`](Agent::die),
/// which keep the cell registries in step.
#[derive(Debug, Clone)]
pub struct Agent<A = ()> {
    id: AgentId,
    residence: Option<CellId>,
    x: Option<usize>,
    y: Option<usize>,
    population: String,
    retired: bool,
    /// Domain-specific state attached by the agent factory.
    pub state: A,
}

impl<A> Agent<A> {
    pub(crate) fn new(id: AgentId, population: &str, state: A) -> Self {
        Self {
            id,
            residence: None,
            x: None,
            y: None,
            population: population.to_owned(),
            retired: false,
            state,
        }
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn residence(&self) -> Option<CellId> {
        self.residence
    }

    pub fn x(&self) -> Option<usize> {
        self.x
    }

    pub fn y(&self) -> Option<usize> {
        self.y
    }

    pub fn position(&self) -> Option<(usize, usize)> {
        self.x.zip(self.y)
    }

    /// Name of the population list this agent was created into.
    pub fn population(&self) -> &str {
        &self.population
    }

    pub fn is_retired(&self) -> bool {
        self.retired
    }

    pub fn residency(&self) -> Residency {
        match (self.retired, self.residence) {
            (true, _) => Residency::Retired,
            (false, Some(cell)) => Residency::Resident(cell),
            (false, None) => Residency::Unbound,
        }
    }

    /// Registers this agent on `cell_id` and takes over its coordinates.
    /// The agent becomes the cell's main resident if the cell has none.
    ///
    /// The agent must be unbound; moving an agent that already lives somewhere
    /// goes through [`move_to_this_cell`](Agent::move_to_this_cell).
    pub fn move_in<C>(&mut self, cell_id: CellId, cells: &mut [Cell<C>]) -> Result<()> {
        if self.retired {
            return Err(precondition("a retired agent cannot move in"));
        }
        if let Some(current) = self.residence {
            return Err(precondition(format!(
                "agent already resides on cell {} and must move out first",
                current.index()
            )));
        }
        let cell = cells
            .get_mut(cell_id.index())
            .ok_or(CellGridError::UnknownCell(cell_id.index()))?;

        cell.register(self.id);
        self.residence = Some(cell_id);
        self.x = Some(cell.x());
        self.y = Some(cell.y());
        trace!("Agent {:?} moved in at ({}, {}).", self.id, cell.x(), cell.y());
        Ok(())
    }

    /// Leaves the current cell. If this agent was the cell's main resident the
    /// slot is cleared and left empty, even when other residents remain.
    /// Does nothing for an unbound agent.
    pub fn move_out<C>(&mut self, cells: &mut [Cell<C>]) -> Result<()> {
        let Some(cell_id) = self.residence else {
            return Ok(());
        };
        let cell = cells
            .get_mut(cell_id.index())
            .ok_or(CellGridError::UnknownCell(cell_id.index()))?;
        if !cell.has_resident(self.id) {
            return Err(precondition(format!(
                "agent claims cell ({}, {}) but is missing from its registry",
                cell.x(),
                cell.y()
            )));
        }

        cell.unregister(self.id);
        self.residence = None;
        self.x = None;
        self.y = None;
        trace!("Agent {:?} moved out of ({}, {}).", self.id, cell.x(), cell.y());
        Ok(())
    }

    /// Moves out of the current cell and into `cell_id` in one call.
    ///
    /// The target is checked before anything changes, so a failed call leaves
    /// the agent where it was.
    pub fn move_to_this_cell<C>(&mut self, cell_id: CellId, cells: &mut [Cell<C>]) -> Result<()> {
        if self.retired {
            return Err(precondition("a retired agent cannot move"));
        }
        if cell_id.index() >= cells.len() {
            return Err(CellGridError::UnknownCell(cell_id.index()));
        }
        self.move_out(cells)?;
        self.move_in(cell_id, cells)
    }

    /// Retires this agent: leaves its cell, is removed from `population` and
    /// appended to `heaven`.
    ///
    /// Fails if the agent is not a member of `population`, which also rejects a
    /// second call on an already retired agent.
    pub fn die<C>(
        &mut self,
        population: &mut Vec<AgentId>,
        heaven: &mut Vec<AgentId>,
        cells: &mut [Cell<C>],
    ) -> Result<()> {
        let Some(index) = population.iter().position(|&a| a == self.id) else {
            return Err(precondition(format!(
                "agent {:?} is not a member of population '{}'",
                self.id, self.population
            )));
        };

        self.move_out(cells)?;
        population.remove(index);
        heaven.push(self.id);
        self.retired = true;
        trace!("Agent {:?} of '{}' retired.", self.id, self.population);
        Ok(())
    }

    /// Every member of `population` whose projected attribute equals this agent's.
    /// The agent itself is included when it is a member.
    pub fn get_agents_like_me<V, F>(
        &self,
        attribute: F,
        population: &[AgentId],
        agents: &SlotMap<AgentId, Agent<A>>,
    ) -> Vec<AgentId>
    where
        V: PartialEq,
        F: Fn(&Agent<A>) -> V,
    {
        let mine = attribute(self);
        population
            .iter()
            .copied()
            .filter(|id| agents.get(*id).is_some_and(|other| attribute(other) == mine))
            .collect()
    }
}
