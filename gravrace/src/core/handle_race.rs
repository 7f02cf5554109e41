use crate::core::flight::ControlInput;
use crate::core::pilot::ChasePilot;
use crate::core::race::Race;
use crate::interfaces::hud_interface::{HudState, MAX_HUD_UPDATE_FREQUENCY};
use crate::post::race_result::RaceResult;
use crate::pre::read_sim_pars::SimPars;
use anyhow::Context;
use flume::Sender;
use std::thread::sleep;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// handle_race creates and simulates a race on the basis of the inserted parameters, and returns
/// the results for post-processing. The player craft is flown by the chase pilot.
pub fn handle_race(
    sim_pars: &SimPars,
    timestep_size: f64,
    print_debug: bool,
    tx: Option<&Sender<HudState>>,
    realtime_factor: f64,
) -> anyhow::Result<RaceResult> {
    let mut race = Race::new(
        &sim_pars.race_pars,
        &sim_pars.track_pars,
        &sim_pars.flight_pars,
        &sim_pars.bot_pars_all,
    )
    .context(format!("Failed to set up race on track {}!", sim_pars.track_pars.name))?;

    let pilot = sim_pars.pilot_pars;
    let max_race_time = sim_pars.race_pars.max_race_time;
    let mut t_race_update_print = 0.0;
    let mut t_race_update_hud = 0.0;

    race.start_countdown();

    while !race.get_all_finished() {
        if race.cur_racetime >= max_race_time {
            warn!(
                max_race_time,
                "Race stopped before all crafts finished, maximum race time reached"
            );
            break;
        }

        let t_start = Instant::now();
        let input = pilot_input(&race, &pilot);
        let report = race.simulate_timestep(timestep_size, &input);

        if report.race_completed_now {
            debug!(racetime = race.cur_racetime, "race completed latch set");
        }

        if print_debug && race.cur_racetime > t_race_update_print + 0.9999 {
            let leader = race.standings().iter().next().map(|s| s.id);
            info!(
                "Simulating... Current race time is {:.3}s, leader is craft {:?}",
                race.cur_racetime, leader
            );
            t_race_update_print = race.cur_racetime;
        }

        // check if sender was inserted -> in that case simulate in real-time for the HUD
        if let Some(tx) = tx {
            if race.cur_racetime > t_race_update_hud + 1.0 / MAX_HUD_UPDATE_FREQUENCY - 0.001 {
                tx.send(HudState::from_race(&mut race))
                    .context("Failed to send HUD state!")?;
                t_race_update_hud = race.cur_racetime;
            }

            // sleep until time step is finished in real-time as well (calculation in ms)
            let t_sleep = (timestep_size * 1000.0 / realtime_factor) as i64
                - t_start.elapsed().as_millis() as i64;

            if t_sleep > 0 {
                sleep(Duration::from_millis(t_sleep as u64));
            } else {
                warn!("Could not keep up with real-time!")
            }
        }
    }

    let result = race.get_race_result();

    // after the real-time loop finishes, send the final result once
    if let Some(tx) = tx {
        let mut final_msg = HudState::from_race(&mut race);
        final_msg.final_result = Some(result.clone());
        tx.send(final_msg)
            .context("Failed to send final race result to HUD!")?;
    }

    info!(
        race_time = race.cur_racetime,
        completed = result.race_completed,
        "Race finished"
    );

    Ok(result)
}

/// pilot_input lets the chase pilot steer the player craft while it is flown manually.
fn pilot_input(race: &Race, pilot: &ChasePilot) -> ControlInput {
    let player = match race.player() {
        Some(player) if player.flight_state().is_some() => player,
        _ => return ControlInput::default(),
    };
    let progress = race.estimator().estimate(player.pose.position);
    pilot.steer(race.track(), progress, &player.pose)
}
