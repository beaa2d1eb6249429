use serde::{Serialize, Deserialize};
use std::collections::BTreeMap;

/// Occupancy statistics of the world at a specific tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Number of completed ticks when the snapshot was taken.
    pub tick: u32,
    /// Living agents per population name.
    pub population_sizes: BTreeMap<String, u32>,
    /// Cells with an empty resident registry.
    pub empty_cells: u32,
    /// Size of the retired ("heaven") list.
    pub retired: u32,
    /// Resident agents per quadrant, ordered NW, NE, SW, SE.
    pub quadrant_occupancy: [u32; 4],
}

impl Snapshot {
    pub fn living_agents(&self) -> u32 {
        self.population_sizes.values().sum()
    }
}
