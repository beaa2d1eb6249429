use serde::{Deserialize, Serialize};
use anyhow::Result;
use crate::grid_params::GridParams;
use std::collections::HashSet;
use std::path::Path;

// Grid extents and topology
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct GridConfig {
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_torus")]
    pub torus: bool,
    #[serde(default = "default_neighborhood")]
    pub neighborhood: NeighborhoodKind,
    /// Relative (dx, dy) offsets, only read when `neighborhood = "custom"`.
    #[serde(default)]
    pub offsets: Vec<[i64; 2]>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum NeighborhoodKind {
    #[serde(alias = "neumann")]
    VonNeumann,
    Moore,
    Custom,
}

// Seed and tick budget for a headless run
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RunConfig {
    pub seed: u64,
    pub ticks: u32,
    #[serde(default = "default_record_interval_ticks")]
    pub record_interval_ticks: u32,
}

/// Per-tick probabilities used by the headless driver.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct BehaviorConfig {
    #[serde(default)]
    pub move_probability: f64,
    #[serde(default)]
    pub retire_probability: f64,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlacementRule {
    #[default]
    RandomOnEmptyCells,
}

impl std::str::FromStr for PlacementRule {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "random_on_empty_cells" => Ok(PlacementRule::RandomOnEmptyCells),
            other => anyhow::bail!("Unknown placement rule '{}'", other),
        }
    }
}

// One named population to create and place at start-up
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PopulationConfig {
    pub name: String,
    pub count: u32,
    #[serde(default)]
    pub placement: PlacementRule,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct OutputConfig {
    /// Print the recorded snapshots as JSON on stdout when the run ends.
    #[serde(default)]
    pub print_summary: bool,
    /// Run the full residency consistency check after every tick.
    #[serde(default)]
    pub check_consistency: bool,
}

fn default_torus() -> bool {
    true
}

fn default_neighborhood() -> NeighborhoodKind {
    NeighborhoodKind::VonNeumann
}

fn default_record_interval_ticks() -> u32 {
    1
}

// Main run configuration, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SimulationConfig {
    pub grid: GridConfig,
    pub run: RunConfig,
    #[serde(default)]
    pub behavior: BehaviorConfig,
    #[serde(default)]
    pub populations: Vec<PopulationConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

impl SimulationConfig {
    /// Loads the run configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref).map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e)
        })?;
        Self::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Invalid config '{}': {}", path_ref.display(), e))
    }

    /// Parses and validates a configuration held in memory.
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: SimulationConfig = toml::from_str(config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.grid.width == 0 || self.grid.height == 0 {
            anyhow::bail!("grid width and height must be greater than 0.");
        }
        if self.grid.neighborhood == NeighborhoodKind::Custom && self.grid.offsets.is_empty() {
            anyhow::bail!("custom neighborhood requires at least one offset.");
        }
        if self.run.record_interval_ticks == 0 {
            anyhow::bail!("record_interval_ticks must be greater than 0.");
        }
        for (label, p) in [
            ("move_probability", self.behavior.move_probability),
            ("retire_probability", self.behavior.retire_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                anyhow::bail!("{} must lie in [0, 1], got {}.", label, p);
            }
        }

        let mut seen = HashSet::new();
        for population in &self.populations {
            if !seen.insert(population.name.as_str()) {
                anyhow::bail!("population '{}' is declared twice.", population.name);
            }
        }

        let total: u64 = self.populations.iter().map(|p| p.count as u64).sum();
        let num_cells = self.grid.width as u64 * self.grid.height as u64;
        if total > num_cells {
            anyhow::bail!(
                "populations request {} agents but the grid only has {} cells.",
                total,
                num_cells
            );
        }
        Ok(())
    }

    /// Derives the grid parameters used at runtime.
    pub fn get_grid_params(&self) -> GridParams {
        let xlen = self.grid.width as usize;
        let ylen = self.grid.height as usize;
        GridParams {
            xlen,
            ylen,
            half_x: xlen / 2,
            half_y: ylen / 2,
            num_cells: xlen * ylen,
            torus: self.grid.torus,
        }
    }
}
