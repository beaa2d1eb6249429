use crate::agent::AgentId;
use crate::cell::{CellId, Neighborhood};
use crate::world::{Quadrant, World};
use anyhow::Result;
use cellgrid_common::{GridParams, SimulationConfig, Snapshot};
use log::{debug, info, trace};
use rand::prelude::*;
use rand::seq::IndexedRandom;

/// Per-agent state carried by the headless driver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Walker {
    /// Number of successful moves since creation.
    pub moves: u32,
}

/// Drives a world from a configuration: random walks onto empty neighbor
/// cells and random retirement, one tick at a time.
pub struct Simulation {
    /// The run configuration.
    pub config: SimulationConfig,
    /// Grid parameters derived from the configuration.
    params: GridParams,
    world: World<(), Walker>,
    /// Host-side RNG for placement and per-tick decisions.
    pub rng: StdRng,
    /// Number of completed ticks.
    pub current_tick: u32,
    recorded_snapshots: Vec<Snapshot>,
}

impl Simulation {
    /// Builds the grid, resolves neighbors and places every configured population.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        // The seed drives placement and every later tick, so a config replays exactly.
        let mut rng = StdRng::seed_from_u64(config.run.seed);
        let params = config.get_grid_params();
        let neighborhood = Neighborhood::from_config(&config.grid);

        let mut world: World<(), Walker> = World::from_params(&params)?;
        world.create_default_grid()?;
        world.resolve_neighbor_cells(&neighborhood, params.torus)?;

        for population in &config.populations {
            let count = population.count as usize;
            world.create_agents(&population.name, Walker::default, count, true)?;
            world.place_agents_on_grid(&population.name, population.placement, &mut rng)?;
            info!(
                "Population '{}': {} agents placed ({:?}).",
                population.name, population.count, population.placement
            );
        }

        Ok(Self {
            config,
            params,
            world,
            rng,
            current_tick: 0,
            recorded_snapshots: Vec::new(),
        })
    }

    /// Advances the simulation by one tick.
    ///
    /// Populations are visited in name order and agents in population order.
    /// Each agent first rolls for retirement, then for a move.
    pub fn step(&mut self) -> Result<()> {
        let retire_probability = self.config.behavior.retire_probability;
        let move_probability = self.config.behavior.move_probability;
        let names: Vec<String> = self.world.populations().keys().cloned().collect();

        let mut retired = 0;
        let mut moved = 0;
        for name in names {
            let members = self.world.population(&name).map(<[AgentId]>::to_vec).unwrap_or_default();
            for id in members {
                if retire_probability > 0.0 && self.rng.random_bool(retire_probability) {
                    self.world.die(id)?;
                    retired += 1;
                    continue;
                }
                let wants_to_move =
                    move_probability > 0.0 && self.rng.random_bool(move_probability);
                if wants_to_move && self.move_to_free_neighbor(id)? {
                    moved += 1;
                }
            }
        }

        if self.config.output.check_consistency {
            self.world.check_consistency()?;
        }
        self.current_tick += 1;
        trace!("Tick {}: {} moved, {} retired.", self.current_tick, moved, retired);
        Ok(())
    }

    /// Moves `id` onto a uniformly chosen empty, walkable neighbor cell.
    /// Returns false when the agent is unbound or boxed in.
    fn move_to_free_neighbor(&mut self, id: AgentId) -> Result<bool> {
        let Some(residence) = self.world.agent(id).and_then(|agent| agent.residence()) else {
            return Ok(false);
        };
        let cells = self.world.cells();
        let candidates: Vec<CellId> = cells[residence.index()]
            .neighbor_cells()
            .iter()
            .flatten()
            .copied()
            .filter(|target| {
                let cell = &cells[target.index()];
                cell.walkable && cell.is_empty()
            })
            .collect();

        let Some(&target) = candidates.choose(&mut self.rng) else {
            return Ok(false);
        };
        self.world.move_to_this_cell(id, target)?;
        if let Some(walker) = self.world.agent_state_mut(id) {
            walker.moves += 1;
        }
        Ok(true)
    }

    /// Records occupancy statistics for the current tick.
    pub fn record_snapshot(&mut self) -> Result<()> {
        let population_sizes = self
            .world
            .populations()
            .iter()
            .map(|(name, members)| (name.clone(), members.len() as u32))
            .collect();
        let mut quadrant_occupancy = [0u32; 4];
        for quadrant in Quadrant::ALL {
            quadrant_occupancy[quadrant.index()] = self.world.quadrant_occupancy(quadrant) as u32;
        }

        let snapshot = Snapshot {
            tick: self.current_tick,
            population_sizes,
            empty_cells: self.world.get_empty_cells().len() as u32,
            retired: self.world.heaven().len() as u32,
            quadrant_occupancy,
        };
        debug!(
            "Snapshot at tick {}: {} living, {} retired, {} empty cells.",
            snapshot.tick,
            snapshot.living_agents(),
            snapshot.retired,
            snapshot.empty_cells
        );
        self.recorded_snapshots.push(snapshot);
        Ok(())
    }

    /// Provides access to the recorded snapshots.
    pub fn get_recorded_snapshots(&self) -> &[Snapshot] {
        &self.recorded_snapshots
    }

    pub fn world(&self) -> &World<(), Walker> {
        &self.world
    }

    pub fn params(&self) -> &GridParams {
        &self.params
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn living_agent_count(&self) -> usize {
        self.world.populations().values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(move_probability: f64, retire_probability: f64) -> SimulationConfig {
        let text = format!(
            r#"
            [grid]
            width = 8
            height = 6
            torus = false
            neighborhood = "moore"

            [run]
            seed = 2024
            ticks = 10

            [behavior]
            move_probability = {move_probability:?}
            retire_probability = {retire_probability:?}

            [[populations]]
            name = "blue"
            count = 10

            [[populations]]
            name = "red"
            count = 6

            [output]
            check_consistency = true
            "#
        );
        SimulationConfig::from_toml_str(&text).unwrap()
    }

    fn positions(sim: &Simulation) -> Vec<Option<(usize, usize)>> {
        let world = sim.world();
        ["blue", "red"]
            .iter()
            .flat_map(|name| world.population(name).unwrap_or(&[]).to_vec())
            .map(|id| world.agent(id).and_then(|agent| agent.position()))
            .collect()
    }

    #[test]
    fn new_places_every_population() {
        let sim = Simulation::new(config(0.0, 0.0)).unwrap();
        assert_eq!(sim.living_agent_count(), 16);
        assert_eq!(sim.world().get_empty_cells().len(), 48 - 16);
        assert!(positions(&sim).iter().all(Option::is_some));
        sim.world().check_consistency().unwrap();
    }

    #[test]
    fn random_walk_keeps_world_consistent() {
        let mut sim = Simulation::new(config(0.8, 0.0)).unwrap();
        for _ in 0..25 {
            sim.step().unwrap();
        }
        assert_eq!(sim.current_tick, 25);
        assert_eq!(sim.living_agent_count(), 16);
        assert!(sim.world().cells().iter().all(|cell| cell.residents().len() <= 1));
        let total_moves: u32 = sim.world().agents().values().map(|agent| agent.state.moves).sum();
        assert!(total_moves > 0);
    }

    #[test]
    fn same_seed_replays_identically() {
        let run = || {
            let mut sim = Simulation::new(config(0.5, 0.05)).unwrap();
            for _ in 0..10 {
                sim.step().unwrap();
            }
            (positions(&sim), sim.world().heaven().len())
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn certain_retirement_empties_the_grid() {
        let mut sim = Simulation::new(config(0.0, 1.0)).unwrap();
        sim.step().unwrap();
        assert_eq!(sim.living_agent_count(), 0);
        assert_eq!(sim.world().heaven().len(), 16);
        assert_eq!(sim.world().get_empty_cells().len(), 48);
    }

    #[test]
    fn snapshots_track_occupancy() {
        let mut sim = Simulation::new(config(0.3, 0.0)).unwrap();
        sim.record_snapshot().unwrap();
        sim.step().unwrap();
        sim.record_snapshot().unwrap();

        let snapshots = sim.get_recorded_snapshots();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[1].tick, 1);
        assert_eq!(snapshots[1].population_sizes["blue"], 10);
        assert_eq!(snapshots[1].living_agents(), 16);
        assert_eq!(snapshots[1].quadrant_occupancy.iter().sum::<u32>(), 16);
        assert_eq!(snapshots[1].empty_cells, 32);
    }
}
