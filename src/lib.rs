//! Cell-grid agent simulation toolkit.
//!
//! A [`World`] owns a rectangular (optionally toroidal) grid of [`Cell`]s and
//! any number of named agent populations. Agents move between cells through the
//! residency operations on [`World`] / [`Agent`], which keep cell registries,
//! main residents and agent positions in step.

pub mod agent;
pub mod cell;
pub mod error;
pub mod geometry;
pub mod simulation;
pub mod world;

pub use agent::{Agent, AgentId, Residency};
pub use cell::{Cell, CellId, Neighborhood};
pub use cellgrid_common::{GridParams, PlacementRule, SimulationConfig, Snapshot};
pub use error::{CellGridError, Result};
pub use simulation::{Simulation, Walker};
pub use world::{Quadrant, World};
