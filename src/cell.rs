use crate::agent::AgentId;
use crate::error::{precondition, CellGridError, Result};
use cellgrid_common::{GridConfig, NeighborhoodKind};
use std::str::FromStr;

/// Index of a cell in the world's row-major cell arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(pub(crate) usize);

impl CellId {
    #[inline(always)]
    pub fn index(self) -> usize {
        self.0
    }
}

// Relative positions, N E S W
const VON_NEUMANN_OFFSETS: [(i64, i64); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

// Relative positions, clockwise from the north-west corner
const MOORE_OFFSETS: [(i64, i64); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
];

/// Which relative positions count as neighbors of a cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Neighborhood {
    VonNeumann,
    Moore,
    /// Explicit (dx, dy) offsets, resolved in the given order.
    Custom(Vec<(i64, i64)>),
}

impl Neighborhood {
    pub fn offsets(&self) -> &[(i64, i64)] {
        match self {
            Neighborhood::VonNeumann => &VON_NEUMANN_OFFSETS[..],
            Neighborhood::Moore => &MOORE_OFFSETS[..],
            Neighborhood::Custom(offsets) => offsets.as_slice(),
        }
    }

    pub fn from_config(grid: &GridConfig) -> Self {
        match grid.neighborhood {
            NeighborhoodKind::VonNeumann => Neighborhood::VonNeumann,
            NeighborhoodKind::Moore => Neighborhood::Moore,
            NeighborhoodKind::Custom => {
                Neighborhood::Custom(grid.offsets.iter().map(|[dx, dy]| (*dx, *dy)).collect())
            }
        }
    }
}

impl FromStr for Neighborhood {
    type Err = CellGridError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "von-neumann" | "neumann" => Ok(Neighborhood::VonNeumann),
            "moore" => Ok(Neighborhood::Moore),
            other => Err(CellGridError::InvalidArgument(format!(
                "unknown neighborhood pattern '{}'",
                other
            ))),
        }
    }
}

/// A fixed position on the grid that can host any number of agents.
#[derive(Debug, Clone)]
pub struct Cell<C = ()> {
    x: usize,
    y: usize,
    /// Whether agents may walk onto this cell. Not enforced by the residency operations.
    pub walkable: bool,
    main_resident: Option<AgentId>,
    residents: Vec<AgentId>, // arrival order
    neighbor_cells: Option<Vec<Option<CellId>>>,
    /// Domain-specific state attached by the cell factory.
    pub state: C,
}

impl<C> Cell<C> {
    pub fn new(x: usize, y: usize, state: C) -> Self {
        Self {
            x,
            y,
            walkable: true,
            main_resident: None,
            residents: Vec::new(),
            neighbor_cells: None,
            state,
        }
    }

    #[inline(always)]
    pub fn x(&self) -> usize {
        self.x
    }

    #[inline(always)]
    pub fn y(&self) -> usize {
        self.y
    }

    pub fn main_resident(&self) -> Option<AgentId> {
        self.main_resident
    }

    /// Every agent currently registered on this cell, in arrival order.
    pub fn residents(&self) -> &[AgentId] {
        &self.residents
    }

    pub fn is_empty(&self) -> bool {
        self.residents.is_empty()
    }

    pub fn has_resident(&self, agent: AgentId) -> bool {
        self.residents.contains(&agent)
    }

    /// The cached neighbor list; empty until it has been resolved.
    pub fn neighbor_cells(&self) -> &[Option<CellId>] {
        self.neighbor_cells.as_deref().unwrap_or(&[])
    }

    pub fn neighbors_resolved(&self) -> bool {
        self.neighbor_cells.is_some()
    }

    /// Caches the neighbor list. The topology of a built grid never changes,
    /// so this may only happen once.
    pub fn set_neighbor_cells(&mut self, neighbor_cells: Vec<Option<CellId>>) -> Result<()> {
        if self.neighbor_cells.is_some() {
            return Err(precondition(format!(
                "neighbor cells of ({}, {}) are already resolved",
                self.x, self.y
            )));
        }
        self.neighbor_cells = Some(neighbor_cells);
        Ok(())
    }

    /// Resolves the cell at offset (`dx`, `dy`) from this one.
    ///
    /// On a torus both axes wrap. Otherwise an offset past the edge yields `None`,
    /// which is a normal outcome for border cells.
    pub fn look_around(
        &self,
        dx: i64,
        dy: i64,
        xlen: usize,
        ylen: usize,
        grid: &[Vec<CellId>],
        torus: bool,
    ) -> Option<CellId> {
        if xlen == 0 || ylen == 0 {
            return None;
        }
        let (target_x, target_y) = if torus {
            // Reduce the offset first so huge offsets cannot overflow.
            let (xlen, ylen) = (xlen as i64, ylen as i64);
            (
                (self.x as i64 + dx.rem_euclid(xlen)).rem_euclid(xlen),
                (self.y as i64 + dy.rem_euclid(ylen)).rem_euclid(ylen),
            )
        } else {
            ((self.x as i64).checked_add(dx)?, (self.y as i64).checked_add(dy)?)
        };
        if target_x < 0 || target_y < 0 {
            return None;
        }
        grid.get(target_y as usize)?.get(target_x as usize).copied()
    }

    /// Resolves every offset of `neighborhood` in order, keeping `None` entries
    /// for positions that fall off a bounded grid.
    pub fn find_arounding_cells(
        &self,
        neighborhood: &Neighborhood,
        xlen: usize,
        ylen: usize,
        grid: &[Vec<CellId>],
        torus: bool,
    ) -> Vec<Option<CellId>> {
        neighborhood
            .offsets()
            .iter()
            .map(|&(dx, dy)| self.look_around(dx, dy, xlen, ylen, grid, torus))
            .collect()
    }

    /// Counts cached neighbors whose projected attribute equals `value`.
    pub fn count_attribute_values_of_neighbor_cells<V, F>(
        &self,
        cells: &[Cell<C>],
        attribute: F,
        value: &V,
    ) -> usize
    where
        V: PartialEq,
        F: Fn(&Cell<C>) -> V,
    {
        self.neighbor_cells()
            .iter()
            .flatten()
            .filter_map(|id| cells.get(id.0))
            .filter(|&neighbor| attribute(neighbor) == *value)
            .count()
    }

    // --- Residency bookkeeping, driven only by the agent state machine ---

    pub(crate) fn register(&mut self, agent: AgentId) {
        self.residents.push(agent);
        if self.main_resident.is_none() {
            self.main_resident = Some(agent);
        }
    }

    /// Removes `agent` from the registry. A departing main resident is not
    /// replaced by any remaining resident.
    pub(crate) fn unregister(&mut self, agent: AgentId) -> bool {
        if self.main_resident == Some(agent) {
            self.main_resident = None;
        }
        match self.residents.iter().position(|&a| a == agent) {
            Some(pos) => {
                self.residents.remove(pos);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(xlen: usize, ylen: usize) -> (Vec<Cell<u8>>, Vec<Vec<CellId>>) {
        let mut cells = Vec::new();
        let mut grid = Vec::new();
        for y in 0..ylen {
            let mut row = Vec::new();
            for x in 0..xlen {
                row.push(CellId(cells.len()));
                cells.push(Cell::new(x, y, 0u8));
            }
            grid.push(row);
        }
        (cells, grid)
    }

    fn coords(cells: &[Cell<u8>], id: Option<CellId>) -> Option<(usize, usize)> {
        id.map(|id| (cells[id.0].x(), cells[id.0].y()))
    }

    #[test]
    fn von_neumann_on_torus_wraps_to_opposite_edges() {
        let (cells, grid) = build(5, 5);
        let origin = &cells[grid[0][0].0];
        let found = origin.find_arounding_cells(&Neighborhood::VonNeumann, 5, 5, &grid, true);
        let found: Vec<_> = found.into_iter().map(|id| coords(&cells, id)).collect();
        assert_eq!(
            found,
            vec![Some((0, 4)), Some((1, 0)), Some((0, 1)), Some((4, 0))]
        );

        let again = origin.find_arounding_cells(&Neighborhood::VonNeumann, 5, 5, &grid, true);
        let again: Vec<_> = again.into_iter().map(|id| coords(&cells, id)).collect();
        assert_eq!(found, again);
    }

    #[test]
    fn bounded_grid_yields_absent_entries_at_edges() {
        let (cells, grid) = build(4, 3);
        let corner = &cells[grid[2][3].0];
        let found = corner.find_arounding_cells(&Neighborhood::VonNeumann, 4, 3, &grid, false);
        let found: Vec<_> = found.into_iter().map(|id| coords(&cells, id)).collect();
        assert_eq!(found, vec![Some((3, 1)), None, None, Some((2, 2))]);
    }

    #[test]
    fn negative_offsets_do_not_wrap_without_torus() {
        let (cells, grid) = build(3, 3);
        let origin = &cells[grid[0][0].0];
        assert_eq!(origin.look_around(-1, 0, 3, 3, &grid, false), None);
        assert_eq!(origin.look_around(0, -1, 3, 3, &grid, false), None);
        assert_eq!(origin.look_around(-1, -1, 3, 3, &grid, true), Some(grid[2][2]));
    }

    #[test]
    fn extreme_offsets_do_not_overflow() {
        let (cells, grid) = build(3, 1);
        let last = &cells[grid[0][2].0];
        assert_eq!(last.look_around(i64::MAX, 0, 3, 1, &grid, false), None);
        assert_eq!(last.look_around(i64::MIN, 0, 3, 1, &grid, false), None);
        // i64::MAX % 3 == 1, so the wrap lands one step right of (2, 0).
        assert_eq!(last.look_around(i64::MAX, 0, 3, 1, &grid, true), Some(grid[0][0]));
        // i64::MIN rem_euclid 3 == 1 as well.
        assert_eq!(last.look_around(i64::MIN, 0, 3, 1, &grid, true), Some(grid[0][0]));
    }

    #[test]
    fn moore_order_is_clockwise_from_north_west() {
        let (cells, grid) = build(3, 3);
        let center = &cells[grid[1][1].0];
        let found = center.find_arounding_cells(&Neighborhood::Moore, 3, 3, &grid, false);
        let found: Vec<_> = found.into_iter().map(|id| coords(&cells, id).unwrap()).collect();
        assert_eq!(
            found,
            vec![(0, 0), (1, 0), (2, 0), (2, 1), (2, 2), (1, 2), (0, 2), (0, 1)]
        );
    }

    #[test]
    fn custom_offsets_keep_caller_order() {
        let (cells, grid) = build(6, 1);
        let cell = &cells[grid[0][1].0];
        let pattern = Neighborhood::Custom(vec![(2, 0), (-2, 0)]);
        let found = cell.find_arounding_cells(&pattern, 6, 1, &grid, true);
        assert_eq!(found, vec![Some(grid[0][3]), Some(grid[0][5])]);
    }

    #[test]
    fn neighborhood_parses_pattern_names() {
        assert_eq!("von-neumann".parse::<Neighborhood>().unwrap(), Neighborhood::VonNeumann);
        assert_eq!("neumann".parse::<Neighborhood>().unwrap(), Neighborhood::VonNeumann);
        assert_eq!("moore".parse::<Neighborhood>().unwrap(), Neighborhood::Moore);
        assert!("hex".parse::<Neighborhood>().is_err());
    }

    #[test]
    fn neighbor_cache_is_set_once() {
        let (mut cells, grid) = build(3, 3);
        let list = cells[4].find_arounding_cells(&Neighborhood::VonNeumann, 3, 3, &grid, false);
        assert!(cells[4].neighbor_cells().is_empty());
        cells[4].set_neighbor_cells(list.clone()).unwrap();
        assert_eq!(cells[4].neighbor_cells(), list.as_slice());
        assert!(matches!(
            cells[4].set_neighbor_cells(list),
            Err(CellGridError::PreconditionViolation(_))
        ));
    }

    #[test]
    fn counts_neighbor_attribute_values() {
        let (mut cells, grid) = build(3, 3);
        cells[1].walkable = false;
        cells[3].state = 7;
        cells[5].state = 7;
        let list = cells[0].find_arounding_cells(&Neighborhood::Moore, 3, 3, &grid, false);
        cells[0].set_neighbor_cells(list).unwrap();
        let list = cells[4].find_arounding_cells(&Neighborhood::VonNeumann, 3, 3, &grid, false);
        cells[4].set_neighbor_cells(list).unwrap();

        let center = &cells[4];
        let walkable = |c: &Cell<u8>| c.walkable;
        let blocked = center.count_attribute_values_of_neighbor_cells(&cells, walkable, &false);
        assert_eq!(blocked, 1);
        let sevens = center.count_attribute_values_of_neighbor_cells(&cells, |c| c.state, &7);
        assert_eq!(sevens, 2);
        // Absent entries off the bounded edge are skipped.
        let corner = &cells[0];
        let open = corner.count_attribute_values_of_neighbor_cells(&cells, walkable, &true);
        assert_eq!(open, 2);
    }
}
