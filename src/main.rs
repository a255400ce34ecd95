//! Botworld headless runner
//!
//! Runs a seeded simulation and exports a snapshot, or compares two exported
//! snapshots with the parity verifier.

use std::path::PathBuf;
use std::process::ExitCode;

use botworld::consts::{FACTION_A, FACTION_B};
use botworld::parity::{ParityInput, Snapshot, verify_parity};
use botworld::sim::components::Position;
use botworld::sim::{Behavior, TileMap};
use botworld::{SimConfig, Simulation};
use clap::{Parser, Subcommand};

/// Headless deterministic bot simulation
#[derive(Parser, Debug)]
#[command(name = "botworld")]
#[command(about = "Run seeded bot simulations and verify parity between runs")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a simulation and print its final snapshot as JSON
    Run {
        /// Random seed for deterministic runs
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Number of tics to simulate
        #[arg(long, default_value_t = 400)]
        tics: u64,

        /// Tic duration in milliseconds
        #[arg(long, default_value_t = 50.0)]
        dt_ms: f32,

        /// Wandering bots to place
        #[arg(long, default_value_t = 16)]
        bots: usize,

        /// Destination-seeking bots to place
        #[arg(long, default_value_t = 0)]
        seekers: usize,

        /// Arm wandering bots in two hostile factions with one food each
        #[arg(long)]
        armed: bool,

        /// Map width in tiles (generated maps only)
        #[arg(long, default_value_t = 32)]
        width: u32,

        /// Map height in tiles (generated maps only)
        #[arg(long, default_value_t = 24)]
        height: u32,

        /// Percentage of interior tiles turned into walls (generated maps only)
        #[arg(long, default_value_t = 8)]
        walls: u32,

        /// ASCII map file (`.` floor, `#` wall, space void)
        #[arg(long)]
        map: Option<PathBuf>,

        /// JSON config file; missing fields use defaults
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print the state hash instead of the snapshot
        #[arg(long)]
        hash: bool,
    },

    /// Compare two snapshot files and print the parity report as JSON
    Parity {
        legacy: PathBuf,
        unified: PathBuf,

        /// Max allowed distance between matching bots
        #[arg(long, default_value_t = 0.5)]
        tolerance: f32,
    },

    /// Verify a prepared parity input file (expected ids, both maps, counts)
    Verify { input: PathBuf },
}

#[allow(clippy::too_many_arguments)]
fn run(
    seed: u64,
    tics: u64,
    dt_ms: f32,
    bots: usize,
    seekers: usize,
    armed: bool,
    terrain: TileMap,
    config: SimConfig,
) -> botworld::Result<Simulation> {
    let mut sim = Simulation::new(seed, terrain, config)?;
    let wanderers = sim.populate(bots, Behavior::Wander);
    sim.populate(seekers, Behavior::Seek);

    if armed {
        for (i, &id) in wanderers.iter().enumerate() {
            let (faction, enemy) = if i % 2 == 0 { (FACTION_A, FACTION_B) } else { (FACTION_B, FACTION_A) };
            sim.arm(id, faction, enemy)?;
            if let Some(home) = sim.store.get::<Position>(id).map(|p| p.0) {
                let food = sim.spawn_food(home);
                sim.load_canon(id, food, 1)?;
            }
        }
    }

    sim.advance_tics(tics, dt_ms)?;
    log::info!("Simulated {tics} tics with {} bots", sim.bot_count());
    Ok(sim)
}

fn execute(command: Command) -> botworld::Result<bool> {
    match command {
        Command::Run {
            seed,
            tics,
            dt_ms,
            bots,
            seekers,
            armed,
            width,
            height,
            walls,
            map,
            config,
            hash,
        } => {
            let config = match config {
                Some(path) => SimConfig::load(path)?,
                None => SimConfig::default(),
            };
            let terrain = match map {
                Some(path) => TileMap::from_ascii(&std::fs::read_to_string(path)?)?,
                None => TileMap::generate(seed, width, height, walls),
            };

            let sim = run(seed, tics, dt_ms, bots, seekers, armed, terrain, config)?;
            if hash {
                println!("{:016x}", sim.state_hash());
            } else {
                println!("{}", serde_json::to_string_pretty(&sim.snapshot())?);
            }
            Ok(true)
        }
        Command::Parity {
            legacy,
            unified,
            tolerance,
        } => {
            let legacy = Snapshot::load(legacy)?;
            let unified = Snapshot::load(unified)?;
            let report = verify_parity(&ParityInput::from_snapshots(&legacy, &unified, tolerance));
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(report.ok)
        }
        Command::Verify { input } => {
            let input: ParityInput = serde_json::from_str(&std::fs::read_to_string(input)?)?;
            let report = verify_parity(&input);
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(report.ok)
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match execute(args.command) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            log::error!("{e}");
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}
