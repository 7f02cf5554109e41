use gravrace::core::bot::BotPars;
use gravrace::core::checkpoint::LapDetection;
use gravrace::core::craft::CraftPose;
use gravrace::core::flight::{ControlInput, FlightPars};
use gravrace::core::handle_race::handle_race;
use gravrace::core::pilot::ChasePilot;
use gravrace::core::race::{Race, RacePars, RaceStatus};
use gravrace::core::race_state::CraftId;
use gravrace::core::track::TrackPars;
use gravrace::post::race_result::RaceResult;
use gravrace::pre::read_sim_pars::SimPars;

const TIMESTEP: f64 = 1.0 / 60.0;

fn bot(id: CraftId, speed_multiplier: f64) -> BotPars {
    BotPars {
        id,
        name: format!("Bot {}", id),
        speed_multiplier,
        noise_amplitude: 5.0,
        noise_frequency: 1.5,
        start_t: 0.0,
    }
}

fn bots_only_pars(lap_detection: LapDetection) -> SimPars {
    SimPars {
        race_pars: RacePars {
            total_laps: 2,
            lap_detection,
            countdown: 0.5,
            seed: Some(1),
            player_id: None,
            ..RacePars::default()
        },
        track_pars: TrackPars::generated("Test loop", Some(0.0)),
        flight_pars: FlightPars::default(),
        pilot_pars: ChasePilot::default(),
        bot_pars_all: vec![bot(1, 4.0), bot(2, 4.5), bot(3, 5.0)],
    }
}

fn assert_consistent(result: &RaceResult) {
    // every craft once, places 1..N
    let mut places: Vec<u32> = result.standings.iter().map(|s| s.place).collect();
    places.sort_unstable();
    let expected: Vec<u32> = (1..=result.crafts.len() as u32).collect();
    assert_eq!(places, expected);

    for craft in result.crafts.iter() {
        for (i, lap) in craft.history.iter().enumerate() {
            assert_eq!(lap.lap_number, i as u32 + 1);
            assert!(lap.time_ms > 0.0);
        }
        assert!(craft.history.len() <= result.total_laps as usize);
    }
}

#[test]
fn checkpoint_race_finishes_in_speed_order() {
    let result = handle_race(&bots_only_pars(LapDetection::Checkpoint), TIMESTEP, false, None, 1.0)
        .unwrap();

    assert!(result.race_completed);
    assert_eq!(result.standings.finished.len(), 3);
    assert!(result.standings.in_progress.is_empty());

    let order: Vec<CraftId> = result.standings.finished.iter().map(|s| s.id).collect();
    assert_eq!(order, vec![3, 2, 1]);
    assert_consistent(&result);

    for craft in result.crafts.iter() {
        assert_eq!(craft.lap_count, 2);
    }
}

#[test]
fn progress_wrap_race_counts_every_lap_once() {
    let result = handle_race(
        &bots_only_pars(LapDetection::ProgressWrap),
        TIMESTEP,
        false,
        None,
        1.0,
    )
    .unwrap();

    assert!(result.race_completed);
    assert_consistent(&result);
    for craft in result.crafts.iter() {
        assert_eq!(craft.history.len(), 2);
    }
    assert_eq!(result.standings.finished[0].id, 3);
}

#[test]
fn hud_snapshots_are_throttled_and_end_with_the_result() {
    let (tx, rx) = flume::unbounded();
    let result = handle_race(
        &bots_only_pars(LapDetection::Checkpoint),
        TIMESTEP,
        false,
        Some(&tx),
        1000.0,
    )
    .unwrap();
    drop(tx);

    let snapshots: Vec<_> = rx.iter().collect();
    let (last, updates) = snapshots.split_last().unwrap();

    assert_eq!(last.final_result.as_ref(), Some(&result));
    assert!(updates.iter().all(|hud| hud.final_result.is_none()));
    for pair in updates.windows(2) {
        assert!(pair[1].race_time_s - pair[0].race_time_s >= 0.049 - 1e-9);
    }
}

#[test]
fn race_stops_at_the_maximum_race_time() {
    let mut sim_pars = bots_only_pars(LapDetection::Checkpoint);
    sim_pars.race_pars.player_id = Some(0);
    sim_pars.race_pars.total_laps = 3;
    sim_pars.race_pars.max_race_time = 5.0;

    let result = handle_race(&sim_pars, TIMESTEP, false, None, 1.0).unwrap();

    assert!(!result.race_completed);
    assert!(result.race_time_s >= 5.0 && result.race_time_s < 5.1);
    assert_eq!(result.crafts.len(), 4);
    assert!(result.standings.finished.is_empty());
    assert_consistent(&result);
}

#[test]
fn player_speed_saturates_within_twenty_ticks() {
    let mut track_pars = TrackPars::generated("Open loop", Some(0.0));
    track_pars.tube_radius = 0.0;
    let race_pars = RacePars {
        countdown: 0.0,
        ..RacePars::default()
    };
    let mut race = Race::new(&race_pars, &track_pars, &FlightPars::default(), &[]).unwrap();
    race.start_countdown();
    assert_eq!(race.status(), RaceStatus::Racing);

    let input = ControlInput {
        accelerate: true,
        ..ControlInput::default()
    };
    let reports: Vec<_> = (0..50)
        .map(|_| race.simulate_timestep(TIMESTEP, &input))
        .collect();

    let speeds: Vec<f64> = reports
        .iter()
        .map(|r| r.flight.as_ref().unwrap().speed)
        .collect();
    assert!(speeds.iter().all(|&s| s <= 2.0));
    assert!((speeds[19] - 2.0).abs() < 1e-9);
    assert!(speeds[20..].iter().all(|&s| s == 2.0));

    let edges = reports
        .iter()
        .filter(|r| r.flight.as_ref().unwrap().accelerating_changed)
        .count();
    assert_eq!(edges, 1);
}

#[test]
fn restart_mid_race_clears_laps_and_timer() {
    let sim_pars = bots_only_pars(LapDetection::Checkpoint);
    let mut race = Race::new(
        &sim_pars.race_pars,
        &sim_pars.track_pars,
        &sim_pars.flight_pars,
        &sim_pars.bot_pars_all,
    )
    .unwrap();
    race.start_countdown();

    let mut laps = 0;
    while laps == 0 {
        laps += race
            .simulate_timestep(TIMESTEP, &ControlInput::default())
            .laps
            .len();
    }
    assert!(race.race_state().lap_time_ms() > 0.0);

    race.restart();

    assert_eq!(race.status(), RaceStatus::Idle);
    assert!(!race.race_state().race_completed());
    assert_eq!(race.race_state().lap_time_ms(), 0.0);
    assert_eq!(race.race_state().total_time_ms(), 0.0);
    assert!(race.race_state().finished_crafts().is_empty());
    assert!(race
        .race_state()
        .race_data()
        .values()
        .all(|entry| entry.lap_count == 0 && entry.history.is_empty()));
}

#[test]
fn player_finish_hands_over_to_autopilot_and_freezes_the_timer() {
    let mut track_pars = TrackPars::generated("Flat loop", Some(0.0));
    track_pars.height_variation = 0.0;
    let race_pars = RacePars {
        total_laps: 1,
        countdown: 0.0,
        seed: Some(3),
        ..RacePars::default()
    };
    // a slow bot keeps the race running after the player is through
    let mut race = Race::new(
        &race_pars,
        &track_pars,
        &FlightPars::default(),
        &[bot(1, 1.0)],
    )
    .unwrap();

    // start just short of the finish line
    let start = CraftPose::start_pose(race.track(), 0.96);
    race.crafts
        .iter_mut()
        .find(|craft| craft.is_player)
        .unwrap()
        .pose = start;
    race.start_countdown();

    let pilot = ChasePilot::default();
    let mut finish_place = None;
    for _ in 0..600 {
        let input = match race.player() {
            Some(player) if player.flight_state().is_some() => {
                let progress = race.estimator().estimate(player.pose.position);
                pilot.steer(race.track(), progress, &player.pose)
            }
            _ => ControlInput::default(),
        };
        let report = race.simulate_timestep(TIMESTEP, &input);
        if report.race_completed_now {
            finish_place = report
                .laps
                .iter()
                .find(|lap| lap.id == 0)
                .and_then(|lap| lap.finished_place);
            break;
        }
    }

    assert_eq!(finish_place, Some(1));
    assert!(race.race_state().race_completed());
    assert!(race.player().unwrap().flight_state().is_none());

    let history = race.race_state().entry(0).unwrap().history.to_owned();
    assert_eq!(history.len(), 1);
    let total_time_ms = race.race_state().total_time_ms();
    assert!((total_time_ms - history[0].time_ms).abs() < 1e-9);

    let lap_time_ms = race.race_state().lap_time_ms();
    let frozen_position = race.race_state().entry(0).unwrap().position;
    let pose_at_finish = race.player().unwrap().pose.position;

    let mut further_completions = 0;
    for _ in 0..120 {
        let report = race.simulate_timestep(TIMESTEP, &ControlInput::default());
        if report.race_completed_now {
            further_completions += 1;
        }
    }

    assert_eq!(further_completions, 0);
    assert_eq!(race.status(), RaceStatus::Racing);
    assert_eq!(race.race_state().total_time_ms(), total_time_ms);
    assert_eq!(race.race_state().lap_time_ms(), lap_time_ms);
    assert_eq!(race.race_state().entry(0).unwrap().position, frozen_position);
    // the autopilot keeps flying the craft
    assert!(race.player().unwrap().pose.position.distance(pose_at_finish) > 10.0);
    assert_eq!(race.race_state().entry(0).unwrap().history.len(), 1);
}
