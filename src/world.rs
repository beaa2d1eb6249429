use crate::agent::{Agent, AgentId};
use crate::cell::{Cell, CellId, Neighborhood};
use crate::error::{precondition, CellGridError, Result};
use cellgrid_common::{GridParams, PlacementRule};
use log::{debug, trace, warn};
use rand::seq::IndexedRandom;
use rand::Rng;
use slotmap::SlotMap;
use std::collections::BTreeMap;

/// One of the four fixed partitions of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quadrant {
    NW,
    NE,
    SW,
    SE,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [Quadrant::NW, Quadrant::NE, Quadrant::SW, Quadrant::SE];

    #[inline(always)]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Quadrant of a position relative to the floor-halved grid extents.
    pub fn of(x: usize, y: usize, half_x: usize, half_y: usize) -> Self {
        match (x < half_x, y < half_y) {
            (true, true) => Quadrant::NW,
            (true, false) => Quadrant::SW,
            (false, true) => Quadrant::NE,
            (false, false) => Quadrant::SE,
        }
    }
}

/// Owns the grid of cells, every agent, the named populations and the retired agents.
///
/// Cells live in a row-major arena addressed by [`CellId`]; agents live in a
/// slot map addressed by [`AgentId`]. Neither side owns the other, so cell
/// registries and agent residences are plain handles.
#[derive(Debug)]
pub struct World<C = (), A = ()> {
    xlen: usize,
    ylen: usize,
    half_x: usize,
    half_y: usize,
    cells: Vec<Cell<C>>,
    grid_as_matrix: Vec<Vec<CellId>>,
    grid_as_flat_list: Vec<CellId>,
    quadrants: [Vec<CellId>; 4],
    agents: SlotMap<AgentId, Agent<A>>,
    populations: BTreeMap<String, Vec<AgentId>>,
    heaven: Vec<AgentId>,
}

impl<C, A> World<C, A> {
    /// Creates an empty world of `xlen` x `ylen`. The grid itself is built by
    /// [`create_grid`](World::create_grid).
    pub fn new(xlen: usize, ylen: usize) -> Result<Self> {
        if xlen == 0 || ylen == 0 {
            return Err(CellGridError::InvalidArgument(format!(
                "grid extents must be positive, got {}x{}",
                xlen, ylen
            )));
        }
        Ok(Self {
            xlen,
            ylen,
            half_x: xlen / 2,
            half_y: ylen / 2,
            cells: Vec::new(),
            grid_as_matrix: Vec::new(),
            grid_as_flat_list: Vec::new(),
            quadrants: Default::default(),
            agents: SlotMap::with_key(),
            populations: BTreeMap::new(),
            heaven: Vec::new(),
        })
    }

    pub fn from_params(params: &GridParams) -> Result<Self> {
        Self::new(params.xlen, params.ylen)
    }

    pub fn xlen(&self) -> usize {
        self.xlen
    }

    pub fn ylen(&self) -> usize {
        self.ylen
    }

    pub fn is_grid_created(&self) -> bool {
        !self.cells.is_empty()
    }

    /// Builds the cell grid row by row (y outer, x inner) with `cell_factory(x, y)`
    /// providing each cell's domain state, and sorts every cell into its quadrant.
    pub fn create_grid<F>(&mut self, mut cell_factory: F) -> Result<()>
    where
        F: FnMut(usize, usize) -> C,
    {
        if self.is_grid_created() {
            return Err(precondition("the grid has already been created"));
        }

        let num_cells = self.xlen * self.ylen;
        self.cells.reserve_exact(num_cells);
        self.grid_as_flat_list.reserve_exact(num_cells);
        self.grid_as_matrix.reserve_exact(self.ylen);

        for y in 0..self.ylen {
            let mut row = Vec::with_capacity(self.xlen);
            for x in 0..self.xlen {
                let id = CellId(self.cells.len());
                self.cells.push(Cell::new(x, y, cell_factory(x, y)));
                row.push(id);
                self.grid_as_flat_list.push(id);
                self.quadrants[Quadrant::of(x, y, self.half_x, self.half_y).index()].push(id);
            }
            self.grid_as_matrix.push(row);
        }

        debug!(
            "Created {}x{} grid ({} cells; quadrants NW={} NE={} SW={} SE={}).",
            self.xlen,
            self.ylen,
            num_cells,
            self.quadrants[0].len(),
            self.quadrants[1].len(),
            self.quadrants[2].len(),
            self.quadrants[3].len()
        );
        Ok(())
    }

    /// Resolves and caches the neighbor list of every cell.
    pub fn resolve_neighbor_cells(
        &mut self,
        neighborhood: &Neighborhood,
        torus: bool,
    ) -> Result<()> {
        self.require_grid()?;
        if self.cells.iter().any(|cell| cell.neighbors_resolved()) {
            return Err(precondition("neighbor cells have already been resolved"));
        }

        let resolved: Vec<Vec<Option<CellId>>> = self
            .cells
            .iter()
            .map(|cell| {
                let (xlen, ylen) = (self.xlen, self.ylen);
                cell.find_arounding_cells(neighborhood, xlen, ylen, &self.grid_as_matrix, torus)
            })
            .collect();
        for (cell, neighbor_cells) in self.cells.iter_mut().zip(resolved) {
            cell.set_neighbor_cells(neighbor_cells)?;
        }

        debug!(
            "Resolved {} neighbors per cell ({:?}, torus={}).",
            neighborhood.offsets().len(),
            neighborhood,
            torus
        );
        Ok(())
    }

    // --- Read access ---

    pub fn cells(&self) -> &[Cell<C>] {
        &self.cells
    }

    pub fn cell(&self, id: CellId) -> Option<&Cell<C>> {
        self.cells.get(id.index())
    }

    /// Mutable access to a cell's `walkable` flag and domain state.
    pub fn cell_mut(&mut self, id: CellId) -> Option<&mut Cell<C>> {
        self.cells.get_mut(id.index())
    }

    pub fn cell_at(&self, x: usize, y: usize) -> Option<CellId> {
        self.grid_as_matrix.get(y)?.get(x).copied()
    }

    pub fn grid_as_matrix(&self) -> &[Vec<CellId>] {
        &self.grid_as_matrix
    }

    pub fn grid_as_flat_list(&self) -> &[CellId] {
        &self.grid_as_flat_list
    }

    pub fn quadrant(&self, quadrant: Quadrant) -> &[CellId] {
        &self.quadrants[quadrant.index()]
    }

    pub fn quadrant_of(&self, id: CellId) -> Option<Quadrant> {
        self.cell(id)
            .map(|cell| Quadrant::of(cell.x(), cell.y(), self.half_x, self.half_y))
    }

    pub fn agents(&self) -> &SlotMap<AgentId, Agent<A>> {
        &self.agents
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent<A>> {
        self.agents.get(id)
    }

    /// Mutable access to an agent's domain state. Residency only changes through
    /// the movement operations on `World`.
    pub fn agent_state_mut(&mut self, id: AgentId) -> Option<&mut A> {
        self.agents.get_mut(id).map(|agent| &mut agent.state)
    }

    pub fn populations(&self) -> &BTreeMap<String, Vec<AgentId>> {
        &self.populations
    }

    pub fn population(&self, name: &str) -> Option<&[AgentId]> {
        self.populations.get(name).map(Vec::as_slice)
    }

    /// Retired agents in the order they died.
    pub fn heaven(&self) -> &[AgentId] {
        &self.heaven
    }

    /// Every cell without a resident, in flat-list order.
    pub fn get_empty_cells(&self) -> Vec<CellId> {
        self.grid_as_flat_list
            .iter()
            .copied()
            .filter(|id| self.cells[id.index()].is_empty())
            .collect()
    }

    /// Main resident of every cell, laid out like the grid matrix.
    pub fn main_resident_matrix(&self) -> Vec<Vec<Option<AgentId>>> {
        self.grid_as_matrix
            .iter()
            .map(|row| row.iter().map(|id| self.cells[id.index()].main_resident()).collect())
            .collect()
    }

    /// Number of resident agents inside `quadrant`.
    pub fn quadrant_occupancy(&self, quadrant: Quadrant) -> usize {
        self.quadrant(quadrant)
            .iter()
            .map(|id| self.cells[id.index()].residents().len())
            .sum()
    }

    // --- Populations ---

    /// Creates `count` agents into the population `population_name`, in order.
    ///
    /// With `overwrite` an existing population of that name is discarded: its
    /// agents leave their cells and are dropped from the world. Without it the
    /// new agents are appended.
    pub fn create_agents<F>(
        &mut self,
        population_name: &str,
        mut agent_factory: F,
        count: usize,
        overwrite: bool,
    ) -> Result<Vec<AgentId>>
    where
        F: FnMut() -> A,
    {
        if overwrite {
            if let Some(discarded) = self.populations.remove(population_name) {
                if !discarded.is_empty() {
                    warn!(
                        "Overwriting population '{}' and discarding {} agents.",
                        population_name,
                        discarded.len()
                    );
                }
                for id in discarded {
                    if let Some(mut agent) = self.agents.remove(id) {
                        agent.move_out(&mut self.cells)?;
                    }
                }
            }
        }

        let mut created = Vec::with_capacity(count);
        for _ in 0..count {
            let state = agent_factory();
            let id = self
                .agents
                .insert_with_key(|id| Agent::new(id, population_name, state));
            created.push(id);
        }
        self.populations
            .entry(population_name.to_owned())
            .or_default()
            .extend_from_slice(&created);

        debug!("Created {} agents in population '{}'.", count, population_name);
        Ok(created)
    }

    /// Places every member of `population_name` on the grid according to `rule`.
    ///
    /// Fails with [`CellGridError::CapacityExceeded`] before touching any agent
    /// when there are fewer empty cells than members.
    pub fn place_agents_on_grid<R>(
        &mut self,
        population_name: &str,
        rule: PlacementRule,
        rng: &mut R,
    ) -> Result<()>
    where
        R: Rng + ?Sized,
    {
        let members = self
            .populations
            .get(population_name)
            .ok_or_else(|| CellGridError::UnknownPopulation(population_name.to_owned()))?
            .clone();
        self.place_agents(&members, rule, rng)?;
        debug!(
            "Placed {} agents of '{}' ({:?}).",
            members.len(),
            population_name,
            rule
        );
        Ok(())
    }

    /// Creates `count` new agents in `population_name` and places only those,
    /// checking the empty-cell capacity before anything is created.
    pub fn create_and_place_agents<F, R>(
        &mut self,
        population_name: &str,
        agent_factory: F,
        count: usize,
        rule: PlacementRule,
        rng: &mut R,
    ) -> Result<Vec<AgentId>>
    where
        F: FnMut() -> A,
        R: Rng + ?Sized,
    {
        self.require_grid()?;
        let available = self.get_empty_cells().len();
        if available < count {
            return Err(CellGridError::CapacityExceeded { requested: count, available });
        }
        let created = self.create_agents(population_name, agent_factory, count, false)?;
        self.place_agents(&created, rule, rng)?;
        Ok(created)
    }

    fn place_agents<R>(
        &mut self,
        members: &[AgentId],
        rule: PlacementRule,
        rng: &mut R,
    ) -> Result<()>
    where
        R: Rng + ?Sized,
    {
        self.require_grid()?;
        if self.grid_as_flat_list.len() < members.len() {
            return Err(CellGridError::CapacityExceeded {
                requested: members.len(),
                available: self.grid_as_flat_list.len(),
            });
        }

        match rule {
            PlacementRule::RandomOnEmptyCells => {
                let available = self.get_empty_cells().len();
                if available < members.len() {
                    return Err(CellGridError::CapacityExceeded {
                        requested: members.len(),
                        available,
                    });
                }

                for &id in members {
                    // The pool shrinks by one with every placement.
                    let pool = self.get_empty_cells();
                    let target = *pool
                        .choose(rng)
                        .ok_or(CellGridError::CapacityExceeded { requested: 1, available: 0 })?;
                    let agent = self.agents.get_mut(id).ok_or(CellGridError::UnknownAgent)?;
                    agent.move_out(&mut self.cells)?;
                    agent.move_in(target, &mut self.cells)?;
                }
            }
        }
        Ok(())
    }

    // --- Residency, by handle ---

    pub fn move_in(&mut self, agent: AgentId, cell: CellId) -> Result<()> {
        self.agents
            .get_mut(agent)
            .ok_or(CellGridError::UnknownAgent)?
            .move_in(cell, &mut self.cells)
    }

    pub fn move_out(&mut self, agent: AgentId) -> Result<()> {
        self.agents
            .get_mut(agent)
            .ok_or(CellGridError::UnknownAgent)?
            .move_out(&mut self.cells)
    }

    pub fn move_to_this_cell(&mut self, agent: AgentId, cell: CellId) -> Result<()> {
        self.agents
            .get_mut(agent)
            .ok_or(CellGridError::UnknownAgent)?
            .move_to_this_cell(cell, &mut self.cells)
    }

    /// Retires `agent` into heaven. See [`Agent::die`].
    pub fn die(&mut self, agent: AgentId) -> Result<()> {
        let agent = self.agents.get_mut(agent).ok_or(CellGridError::UnknownAgent)?;
        let Some(population) = self.populations.get_mut(agent.population()) else {
            return Err(precondition(format!(
                "population '{}' of agent {:?} no longer exists",
                agent.population(),
                agent.id()
            )));
        };
        agent.die(population, &mut self.heaven, &mut self.cells)
    }

    /// Members of `population_name` sharing `agent`'s projected attribute.
    pub fn get_agents_like_me<V, F>(
        &self,
        agent: AgentId,
        attribute: F,
        population_name: &str,
    ) -> Result<Vec<AgentId>>
    where
        V: PartialEq,
        F: Fn(&Agent<A>) -> V,
    {
        let me = self.agents.get(agent).ok_or(CellGridError::UnknownAgent)?;
        let population = self
            .populations
            .get(population_name)
            .ok_or_else(|| CellGridError::UnknownPopulation(population_name.to_owned()))?;
        Ok(me.get_agents_like_me(attribute, population, &self.agents))
    }

    pub fn count_attribute_values_of_neighbor_cells<V, F>(
        &self,
        cell: CellId,
        attribute: F,
        value: &V,
    ) -> Result<usize>
    where
        V: PartialEq,
        F: Fn(&Cell<C>) -> V,
    {
        let cell = self.cell(cell).ok_or(CellGridError::UnknownCell(cell.index()))?;
        Ok(cell.count_attribute_values_of_neighbor_cells(&self.cells, attribute, value))
    }

    /// Every agent registered on the cached neighbor cells of `agent`'s residence,
    /// in neighbor order. Empty for an unbound agent.
    pub fn residents_of_neighbor_cells(&self, agent: AgentId) -> Result<Vec<AgentId>> {
        let agent = self.agents.get(agent).ok_or(CellGridError::UnknownAgent)?;
        let Some(residence) = agent.residence() else {
            return Ok(Vec::new());
        };
        let cell = &self.cells[residence.index()];
        Ok(cell
            .neighbor_cells()
            .iter()
            .flatten()
            .flat_map(|id| self.cells[id.index()].residents().iter().copied())
            .collect())
    }

    /// Moves `agent` to a uniformly chosen empty cell.
    pub fn relocate_to_random_empty_cell<R>(
        &mut self,
        agent: AgentId,
        rng: &mut R,
    ) -> Result<CellId>
    where
        R: Rng + ?Sized,
    {
        let target = *self
            .get_empty_cells()
            .choose(rng)
            .ok_or(CellGridError::CapacityExceeded { requested: 1, available: 0 })?;
        self.move_to_this_cell(agent, target)?;
        trace!("Relocated agent {:?} to cell {}.", agent, target.index());
        Ok(target)
    }

    /// Verifies that cell registries, main residents, agent residences,
    /// populations and heaven all agree. Returns the first disagreement found.
    pub fn check_consistency(&self) -> Result<()> {
        for (index, cell) in self.cells.iter().enumerate() {
            let here = CellId(index);
            if let Some(main) = cell.main_resident() {
                if !cell.has_resident(main) {
                    return Err(precondition(format!(
                        "main resident of ({}, {}) is not registered there",
                        cell.x(),
                        cell.y()
                    )));
                }
            }
            for (pos, &id) in cell.residents().iter().enumerate() {
                if cell.residents()[..pos].contains(&id) {
                    return Err(precondition(format!(
                        "agent {:?} is registered twice on ({}, {})",
                        id,
                        cell.x(),
                        cell.y()
                    )));
                }
                let agent = self.agents.get(id).ok_or(CellGridError::UnknownAgent)?;
                let at_home = agent.residence() == Some(here);
                if !at_home || agent.position() != Some((cell.x(), cell.y())) {
                    return Err(precondition(format!(
                        "agent {:?} is registered on ({}, {}) but resides at {:?}",
                        id,
                        cell.x(),
                        cell.y(),
                        agent.position()
                    )));
                }
            }
        }

        for (id, agent) in &self.agents {
            match agent.residence() {
                Some(cell) => {
                    let registered = self.cell(cell).is_some_and(|c| c.has_resident(id));
                    if !registered || agent.is_retired() {
                        return Err(precondition(format!(
                            "agent {:?} claims cell {} without a matching registration",
                            id,
                            cell.index()
                        )));
                    }
                }
                None if agent.position().is_some() => {
                    return Err(precondition(format!(
                        "unbound agent {:?} still has coordinates",
                        id
                    )));
                }
                None => {}
            }

            let memberships = self
                .populations
                .get(agent.population())
                .map_or(0, |members| members.iter().filter(|&&m| m == id).count());
            let in_heaven = self.heaven.iter().filter(|&&h| h == id).count();
            let expected = if agent.is_retired() { (0, 1) } else { (1, 0) };
            if (memberships, in_heaven) != expected {
                return Err(precondition(format!(
                    "agent {:?} appears {} times in '{}' and {} times in heaven",
                    id,
                    memberships,
                    agent.population(),
                    in_heaven
                )));
            }
        }

        for (name, members) in &self.populations {
            for &id in members {
                match self.agents.get(id) {
                    Some(agent) if agent.population() == name => {}
                    _ => {
                        return Err(precondition(format!(
                            "population '{}' lists an agent that does not belong to it",
                            name
                        )))
                    }
                }
            }
        }
        Ok(())
    }

    fn require_grid(&self) -> Result<()> {
        if self.is_grid_created() {
            Ok(())
        } else {
            Err(precondition("the grid has not been created yet"))
        }
    }
}

impl<C: Default, A> World<C, A> {
    /// Builds the grid with default cell state.
    pub fn create_default_grid(&mut self) -> Result<()> {
        self.create_grid(|_, _| C::default())
    }
}
