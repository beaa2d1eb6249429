pub mod config;
pub mod grid_params;
pub mod snapshot;

// Re-export key types for easier use by dependent crates
pub use config::{
    BehaviorConfig, GridConfig, NeighborhoodKind, OutputConfig, PlacementRule, PopulationConfig,
    RunConfig, SimulationConfig,
};
pub use grid_params::GridParams;
pub use snapshot::Snapshot;
