use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use log::{info, warn, error, debug, trace};

use cellgrid_engine::{Simulation, SimulationConfig};

/// Headless cell-grid agent simulation.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the TOML run configuration.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Override the number of ticks from the configuration.
    #[arg(long)]
    ticks: Option<u32>,

    /// Override the RNG seed from the configuration.
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();
    let args = Args::parse();

    info!("Starting cell-grid simulation...");

    // --- Load Configuration ---
    let mut config = SimulationConfig::load(&args.config)?;
    if let Some(ticks) = args.ticks {
        config.run.ticks = ticks;
    }
    if let Some(seed) = args.seed {
        config.run.seed = seed;
    }

    // --- Initialize World ---
    let mut sim = Simulation::new(config)?;
    info!(
        "World initialized: {}x{} grid (torus={}), {} agents.",
        sim.params().xlen,
        sim.params().ylen,
        sim.params().torus,
        sim.living_agent_count()
    );
    debug!("Grid parameters: {:#?}", sim.params());

    let total_ticks = sim.config().run.ticks;
    let record_interval_ticks = sim.config().run.record_interval_ticks;
    if record_interval_ticks > total_ticks && total_ticks > 0 {
        warn!(
            "Record interval ({} ticks) exceeds the run length ({} ticks); only the first and last ticks are recorded.",
            record_interval_ticks, total_ticks
        );
    }

    // --- Initial Snapshot (tick = 0) ---
    sim.record_snapshot()?;

    info!("Starting simulation loop for {} ticks...", total_ticks);
    let start_time = Instant::now();

    for tick in 0..total_ticks {
        let tick_start_time = Instant::now();
        if let Err(e) = sim.step() {
            error!("Error during tick {}: {}", tick + 1, e);
            anyhow::bail!("Simulation tick failed.");
        }
        let tick_duration = tick_start_time.elapsed();

        let is_record_tick = (tick + 1) % record_interval_ticks == 0;
        let is_last_tick = tick + 1 == total_ticks;
        if is_record_tick || is_last_tick {
            sim.record_snapshot()?;
            info!(
                "Tick [{}/{}] | Living: {} | Retired: {} | Empty cells: {} | Tick Time: {:6.2} ms",
                tick + 1,
                total_ticks,
                sim.living_agent_count(),
                sim.world().heaven().len(),
                sim.world().get_empty_cells().len(),
                tick_duration.as_secs_f64() * 1000.0
            );
        } else {
            trace!(
                "Tick [{}/{}] completed in {:.2} ms",
                tick + 1,
                total_ticks,
                tick_duration.as_secs_f64() * 1000.0
            );
        }
    }

    info!(
        "Simulation finished in {:.3} seconds ({} snapshots recorded).",
        start_time.elapsed().as_secs_f64(),
        sim.get_recorded_snapshots().len()
    );

    if sim.config().output.print_summary {
        println!("{}", serde_json::to_string_pretty(sim.get_recorded_snapshots())?);
    } else {
        info!("Skipping summary output as per config (print_summary is false).");
    }

    info!("Simulation Complete.");
    Ok(())
}
