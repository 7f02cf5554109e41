use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[clap(
    version = "0.1.0",
    name = "gravrace",
    about = "Race simulation core of an anti-gravity racing game"
)]
pub struct SimOpts {
    // FLAGS ---------------------------------------------------------------------------------------
    /// Activate debug logging and periodic progress output
    #[clap(short, long)]
    pub debug: bool,

    /// Simulate a single race in real-time and print the HUD
    #[clap(short = 'R', long)]
    pub realtime: bool,

    /// Write the race result(s) as JSON next to the text output
    #[clap(short, long)]
    pub json: bool,

    // OPTIONS -------------------------------------------------------------------------------------
    /// Set number of simulation runs (only for non-real-time mode)
    #[clap(short, long, default_value = "1")]
    pub no_sim_runs: u32,

    /// Set path to the simulation parameter file
    #[clap(short, long, default_value = "input/parameters/default_race.json")]
    pub parfile_path: PathBuf,

    /// Set real-time factor (only relevant in real-time mode)
    #[clap(short, long, default_value = "1.0")]
    pub realtime_factor: f64,

    /// Set simulation timestep size in seconds, should be in the range [0.001, 0.2]
    #[clap(short, long, default_value = "0.016666666666666666")]
    pub timestep_size: f64,

    /// Override the RNG seed of the parameter file (run i uses seed + i)
    #[clap(short, long)]
    pub seed: Option<u64>,

    /// Set path of the text result file (default output/last_run.txt)
    #[clap(short, long)]
    pub output: Option<PathBuf>,
}
