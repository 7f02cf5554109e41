use anyhow::{anyhow, Context};
use clap::Parser;
use gravrace::core::handle_race::handle_race;
use gravrace::core::race::RaceStatus;
use gravrace::interfaces::hud_interface::HudState;
use gravrace::post::race_result::{format_time, RaceResult};
use gravrace::pre::read_sim_pars::read_sim_pars;
use gravrace::pre::sim_opts::SimOpts;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}

/// result_path returns the text result path of run idx. With several runs the index is appended to
/// the file stem.
fn result_path(output: Option<&Path>, idx: usize, no_runs: usize) -> Option<PathBuf> {
    if no_runs <= 1 {
        return output.map(Path::to_path_buf);
    }
    let base = output.map_or_else(|| PathBuf::from("output/last_run.txt"), Path::to_path_buf);
    let stem = base
        .file_stem()
        .map_or("run".into(), |s| s.to_string_lossy().into_owned());
    Some(base.with_file_name(format!("{}_{}.txt", stem, idx + 1)))
}

fn save_result(
    result: &RaceResult,
    output: Option<&Path>,
    json: bool,
) -> anyhow::Result<()> {
    let written = result.write_lap_and_race_times_to_file(output)?;
    info!("Result written to {}", written);

    if json {
        let json_path = Path::new(&written).with_extension("json");
        result.write_json_to_file(&json_path)?;
        info!("JSON result written to {}", json_path.display());
    }
    Ok(())
}

fn print_hud(hud: &HudState) {
    let status = match hud.status {
        RaceStatus::Idle => "idle".to_owned(),
        RaceStatus::Countdown { remaining } => format!("start in {:.0}", remaining.ceil()),
        RaceStatus::Racing => "racing".to_owned(),
        RaceStatus::Finished => "finished".to_owned(),
    };
    let lap = hud
        .craft_states
        .iter()
        .find(|c| c.is_player)
        .map_or(0, |c| c.lap_count);

    println!(
        "{:8.2}s | {:12} | lap {} | place {}/{} | speed {:5.2}{}{} | lap {} | total {}",
        hud.race_time_s,
        status,
        lap + 1,
        hud.player_place(),
        hud.craft_states.len(),
        hud.speed,
        if hud.accelerating { " +" } else { "" },
        if hud.braking { " -" } else { "" },
        format_time(hud.lap_time_ms),
        format_time(hud.total_time_ms)
    );
}

fn main() -> anyhow::Result<()> {
    // PRE-PROCESSING ------------------------------------------------------------------------------
    // get simulation options from the command line arguments
    let sim_opts: SimOpts = SimOpts::parse();
    init_logging(sim_opts.debug);

    // get simulation parameters
    info!("Reading simulation parameters from {}", sim_opts.parfile_path.display());
    let mut sim_pars = read_sim_pars(&sim_opts.parfile_path)?;
    if sim_opts.seed.is_some() {
        sim_pars.race_pars.seed = sim_opts.seed;
    }

    if !(0.001..=0.2).contains(&sim_opts.timestep_size) {
        warn!(
            "Time step size {}s is outside of [0.001, 0.2], ticks are clamped to {}s",
            sim_opts.timestep_size, sim_pars.race_pars.max_timestep
        );
    }

    // print race details
    info!(
        "Simulating {} laps on {} with {} bots and a time step size of {:.4}s",
        sim_pars.race_pars.total_laps,
        sim_pars.track_pars.name,
        sim_pars.bot_pars_all.len(),
        sim_opts.timestep_size
    );

    // EXECUTION -----------------------------------------------------------------------------------
    if !sim_opts.realtime {
        let t_start = Instant::now();
        let no_runs = sim_opts.no_sim_runs.max(1) as usize;

        // every run gets its own seed so batch runs differ but stay reproducible
        let race_results = (0..no_runs)
            .into_par_iter()
            .map(|i| {
                let mut sim_pars_run = sim_pars.clone();
                sim_pars_run.race_pars.seed =
                    sim_pars.race_pars.seed.map(|seed| seed.wrapping_add(i as u64));
                handle_race(
                    &sim_pars_run,
                    sim_opts.timestep_size,
                    sim_opts.debug && no_runs == 1,
                    None,
                    1.0,
                )
                .context(format!("Simulation run {} failed!", i + 1))
            })
            .collect::<anyhow::Result<Vec<RaceResult>>>()?;

        info!("Execution time: {}ms", t_start.elapsed().as_millis());

        // POST-PROCESSING -------------------------------------------------------------------------
        if let [race_result] = race_results.as_slice() {
            race_result.print_lap_and_race_times();
        } else {
            for (i, race_result) in race_results.iter().enumerate() {
                let winner = race_result.standings.iter().next();
                let player_place = race_result
                    .crafts
                    .iter()
                    .find(|c| c.is_player)
                    .map(|c| c.place);
                println!(
                    "RESULT: Run {:3}: winner {:?} in {}, player place {:?}",
                    i + 1,
                    winner.map(|s| s.id),
                    winner.map_or_else(|| "-".to_owned(), |s| format_time(s.time_ms)),
                    player_place
                );
            }
        }

        for (i, race_result) in race_results.iter().enumerate() {
            let path = result_path(sim_opts.output.as_deref(), i, no_runs);
            save_result(race_result, path.as_deref(), sim_opts.json)?;
        }
    } else {
        info!("Starting real-time simulation...");

        // create channel between simulation thread and HUD output
        let (tx, rx) = flume::unbounded();

        // run simulation in a separate thread
        let sim_opts_thread = sim_opts.clone();
        let sim_pars_thread = sim_pars.clone();

        let sim_handle = thread::spawn(move || {
            handle_race(
                &sim_pars_thread,
                sim_opts_thread.timestep_size,
                false,
                Some(&tx),
                sim_opts_thread.realtime_factor,
            )
        });

        // the channel is closed when the simulation thread returns
        for hud in rx.iter() {
            match hud.final_result {
                Some(_) => info!("Final result received"),
                None => print_hud(&hud),
            }
        }

        let race_result = sim_handle
            .join()
            .map_err(|_| anyhow!("Simulation thread panicked!"))??;

        race_result.print_lap_and_race_times();
        save_result(&race_result, sim_opts.output.as_deref(), sim_opts.json)?;
    }

    Ok(())
}
