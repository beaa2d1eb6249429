use serde::{Deserialize, Serialize};

/// Grid parameters derived from the configuration, fixed for the lifetime of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridParams {
    pub xlen: usize,
    pub ylen: usize,
    pub half_x: usize, // floor(xlen / 2), west/east split
    pub half_y: usize, // floor(ylen / 2), north/south split
    pub num_cells: usize,
    pub torus: bool,
}
