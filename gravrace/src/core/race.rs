use crate::core::aabb::Aabb;
use crate::core::bot::{BotPars, PathFollower, BOT_SPEED};
use crate::core::checkpoint::{LapDetection, LapTracker};
use crate::core::craft::{Controller, Craft, CraftPhase, CraftPose};
use crate::core::flight::{ControlInput, FlightPars, FlightReport};
use crate::core::progress::ProgressEstimator;
use crate::core::race_state::{CraftId, LapRecord, RaceState};
use crate::core::standings::{Standings, StandingsCache};
use crate::core::track::{TrackCurve, TrackPars};
use crate::core::tunnel::{Containment, TubeTunnel, TUNNEL_SEGMENTS};
use crate::error::SimError;
use crate::post::race_result::{CraftResult, RaceResult};
use glam::DVec3;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

/// * `total_laps` - Number of laps to complete the race
/// * `checkpoint_cooldown` - (s) Time the checkpoint stays armed off after a lap was counted
/// * `lap_detection` - Lap detection strategy (checkpoint volume or progress wrap)
/// * `progress_update_interval` - (s) Interval positions and progress are pushed to the race state
/// * `max_timestep` - (s) Upper limit of a single tick, larger deltas are clamped
/// * `countdown` - (s) Duration of the start countdown
/// * `progress_samples` - Number of curve samples used by the progress estimator
/// * `max_race_time` - (s) Headless races are stopped after this race time
/// * `seed` - Seed for track phase and bot speed jitter, random if not set
/// * `bot_speed_jitter` - Standard deviation of the normal distributed bot speed factor (0 = off)
/// * `player_name` - Display name of the player craft
/// * `player_id` - Craft id of the player, no player craft if null
#[derive(Debug, Deserialize, Clone)]
pub struct RacePars {
    #[serde(default = "default_total_laps")]
    pub total_laps: u32,
    #[serde(default = "default_checkpoint_cooldown")]
    pub checkpoint_cooldown: f64,
    #[serde(default)]
    pub lap_detection: LapDetection,
    #[serde(default = "default_progress_update_interval")]
    pub progress_update_interval: f64,
    #[serde(default = "default_max_timestep")]
    pub max_timestep: f64,
    #[serde(default = "default_countdown")]
    pub countdown: f64,
    #[serde(default = "default_progress_samples")]
    pub progress_samples: usize,
    #[serde(default = "default_max_race_time")]
    pub max_race_time: f64,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub bot_speed_jitter: f64,
    #[serde(default = "default_player_name")]
    pub player_name: String,
    #[serde(default = "default_player_id")]
    pub player_id: Option<CraftId>,
}

fn default_total_laps() -> u32 {
    3
}

fn default_checkpoint_cooldown() -> f64 {
    2.0
}

fn default_progress_update_interval() -> f64 {
    0.2
}

fn default_max_timestep() -> f64 {
    0.2
}

fn default_countdown() -> f64 {
    3.0
}

fn default_progress_samples() -> usize {
    1000
}

fn default_max_race_time() -> f64 {
    600.0
}

fn default_player_name() -> String {
    "Player".to_owned()
}

fn default_player_id() -> Option<CraftId> {
    Some(0)
}

impl Default for RacePars {
    fn default() -> Self {
        RacePars {
            total_laps: default_total_laps(),
            checkpoint_cooldown: default_checkpoint_cooldown(),
            lap_detection: LapDetection::default(),
            progress_update_interval: default_progress_update_interval(),
            max_timestep: default_max_timestep(),
            countdown: default_countdown(),
            progress_samples: default_progress_samples(),
            max_race_time: default_max_race_time(),
            seed: None,
            bot_speed_jitter: 0.0,
            player_name: default_player_name(),
            player_id: default_player_id(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RaceStatus {
    Idle,
    Countdown { remaining: f64 },
    Racing,
    Finished,
}

/// LapEvent is emitted once per completed lap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LapEvent {
    pub id: CraftId,
    pub record: LapRecord,
    /// Finish place if this lap completed the race for the craft.
    pub finished_place: Option<u32>,
}

/// TickReport is everything that changed during one tick, for the presentation layer to diff
/// against its previous snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    pub timestep_size: f64,
    pub status: RaceStatus,
    pub flight: Option<FlightReport>,
    pub laps: Vec<LapEvent>,
    pub race_completed_now: bool,
    pub progress_updated: bool,
}

#[derive(Debug)]
pub struct Race {
    pub cur_racetime: f64,
    pars: RacePars,
    flight_pars: FlightPars,
    track: TrackCurve,
    estimator: ProgressEstimator,
    tunnel: Option<TubeTunnel>,
    obstacles: Vec<Aabb>,
    checkpoint_volume: Option<Aabb>,
    pub crafts: Vec<Craft>,
    start_grid: Vec<Craft>,
    race_state: RaceState,
    status: RaceStatus,
    progress_timer: f64,
    standings_cache: StandingsCache,
}

impl Race {
    pub fn new(
        race_pars: &RacePars,
        track_pars: &TrackPars,
        flight_pars: &FlightPars,
        bot_pars_all: &[BotPars],
    ) -> Result<Race, SimError> {
        check_race_pars(race_pars)?;

        let mut rng = match race_pars.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        // geometry
        let track = TrackCurve::from_pars(track_pars, &mut rng)?;
        let estimator = ProgressEstimator::new(&track, race_pars.progress_samples)?;

        let tunnel = if track_pars.tube_radius > 0.0 {
            Some(TubeTunnel::new(&track, track_pars.tube_radius, TUNNEL_SEGMENTS)?)
        } else {
            None
        };

        let checkpoint_volume = if track_pars.checkpoint_radius > 0.0 {
            Some(Aabb::from_center_half_extents(
                track.point_at(track_pars.checkpoint_t),
                DVec3::splat(track_pars.checkpoint_radius),
            ))
        } else {
            None
        };

        let obstacles = track_pars
            .obstacles
            .iter()
            .map(|o| {
                Aabb::from_center_half_extents(
                    track.point_at(o.t) + DVec3::from_array(o.offset),
                    DVec3::from_array(o.half_extents),
                )
            })
            .collect();

        // crafts
        let mut ids = HashSet::with_capacity(bot_pars_all.len() + 1);
        let mut crafts = Vec::with_capacity(bot_pars_all.len() + 1);
        let lap_tracker = LapTracker::new(race_pars.lap_detection, race_pars.checkpoint_cooldown);

        if let Some(player_id) = race_pars.player_id {
            ids.insert(player_id);
            crafts.push(Craft::new_player(
                player_id,
                &race_pars.player_name,
                CraftPose::start_pose(&track, 0.0),
                lap_tracker.clone(),
            ));
        }

        let jitter = if race_pars.bot_speed_jitter > 0.0 {
            Some(Normal::new(1.0, race_pars.bot_speed_jitter).map_err(|e| {
                SimError::InvalidParameter {
                    name: "bot_speed_jitter",
                    reason: e.to_string(),
                }
            })?)
        } else {
            None
        };

        for bot_pars in bot_pars_all.iter() {
            if !ids.insert(bot_pars.id) {
                return Err(SimError::DuplicateCraftId(bot_pars.id));
            }

            let mut follower = PathFollower::from_pars(bot_pars);
            if let Some(normal) = &jitter {
                let factor = normal.sample(&mut rng).max(0.5);
                follower = PathFollower::new(
                    bot_pars.start_t,
                    BOT_SPEED * bot_pars.speed_multiplier * factor,
                    bot_pars.noise_amplitude,
                    bot_pars.noise_frequency,
                );
            }

            crafts.push(Craft::new_bot(
                bot_pars.id,
                &bot_pars.name,
                &track,
                follower,
                lap_tracker.clone(),
            ));
        }

        let mut race = Race {
            cur_racetime: 0.0,
            pars: race_pars.to_owned(),
            flight_pars: flight_pars.to_owned(),
            track,
            estimator,
            tunnel,
            obstacles,
            checkpoint_volume,
            start_grid: crafts.clone(),
            crafts,
            race_state: RaceState::new(race_pars.total_laps, 0.0),
            status: RaceStatus::Idle,
            progress_timer: 0.0,
            standings_cache: StandingsCache::new(),
        };
        race.register_crafts();

        debug!(
            crafts = race.crafts.len(),
            track_length = race.track.length(),
            "race created"
        );
        Ok(race)
    }

    /// register_crafts creates the race entries of all crafts at their start positions.
    fn register_crafts(&mut self) {
        if let Some(player_id) = self.pars.player_id {
            self.race_state.set_player_id(player_id);
        }

        let positions: Vec<(CraftId, DVec3)> =
            self.crafts.iter().map(|c| (c.id, c.pose.position)).collect();
        let progresses: Vec<(CraftId, f64)> = self
            .crafts
            .iter()
            .map(|c| (c.id, self.craft_progress(c)))
            .collect();

        self.race_state.update_race_positions(&positions);
        self.race_state.update_progresses(&progresses);
        self.refresh_places();
    }

    // ---------------------------------------------------------------------------------------------
    // MAIN METHOD ---------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// start_countdown leaves Idle. With a zero countdown the race starts immediately.
    pub fn start_countdown(&mut self) {
        if self.status != RaceStatus::Idle {
            return;
        }
        if self.pars.countdown > 0.0 {
            self.status = RaceStatus::Countdown {
                remaining: self.pars.countdown,
            };
            debug!(countdown = self.pars.countdown, "countdown started");
        } else {
            self.start_racing();
        }
    }

    fn start_racing(&mut self) {
        self.status = RaceStatus::Racing;
        self.race_state.set_lap_start_time(self.now_ms());
        for craft in self.crafts.iter_mut() {
            craft.set_phase(CraftPhase::Racing);
        }
        info!(racetime = self.cur_racetime, "race started");
    }

    /// simulate_frame is simulate_timestep for a host that may be hidden. Hidden frames are skipped
    /// entirely.
    pub fn simulate_frame(
        &mut self,
        timestep_size: f64,
        visible: bool,
        input: &ControlInput,
    ) -> Option<TickReport> {
        if !visible {
            return None;
        }
        Some(self.simulate_timestep(timestep_size, input))
    }

    /// Method simulates one time step. input controls the player craft while it is flown manually.
    pub fn simulate_timestep(&mut self, timestep_size: f64, input: &ControlInput) -> TickReport {
        let timestep_size = if timestep_size.is_finite() {
            timestep_size.clamp(0.0, self.pars.max_timestep)
        } else {
            0.0
        };

        // increment discretization variable
        self.cur_racetime += timestep_size;

        let mut report = TickReport {
            timestep_size,
            status: self.status,
            flight: None,
            laps: Vec::new(),
            race_completed_now: false,
            progress_updated: false,
        };

        match self.status {
            RaceStatus::Idle | RaceStatus::Finished => return report,
            RaceStatus::Countdown { remaining } => {
                let remaining = remaining - timestep_size;
                if remaining <= 0.0 {
                    self.start_racing();
                } else {
                    self.status = RaceStatus::Countdown { remaining };
                }
                report.status = self.status;
                return report;
            }
            RaceStatus::Racing => {}
        }

        // move crafts and run the per-tick lap detection
        let mut lap_idxs = Vec::new();
        let tunnel = self.tunnel.as_ref().map(|t| t as &dyn Containment);
        let craft_half_extents = DVec3::from_array(self.flight_pars.half_extents);

        for (idx, craft) in self.crafts.iter_mut().enumerate() {
            if craft.phase() == CraftPhase::Idle {
                continue;
            }

            match &mut craft.controller {
                Controller::Flight(state) => {
                    let flight_report = state.integrate(
                        &mut craft.pose,
                        input,
                        &self.flight_pars,
                        tunnel,
                        &self.obstacles,
                    );
                    if craft.is_player {
                        report.flight = Some(flight_report);
                    }
                }
                Controller::Path(follower) => {
                    follower.advance(&self.track, timestep_size, &mut craft.pose)
                }
            }

            if craft.phase() == CraftPhase::Racing {
                let intersecting = self
                    .checkpoint_volume
                    .as_ref()
                    .map(|volume| craft.pose.bounding_box(craft_half_extents).intersects(volume));

                if craft.lap_tracker.on_tick(timestep_size, intersecting) {
                    lap_idxs.push(idx);
                }
            }
        }

        for idx in lap_idxs {
            self.handle_lap(idx, &mut report);
        }

        // push positions and progress to the race state at a reduced rate
        self.progress_timer += timestep_size;
        if self.progress_timer >= self.pars.progress_update_interval {
            self.progress_timer = 0.0;
            self.update_progress(&mut report);
            report.progress_updated = true;
        }

        self.race_state.update_lap_timer(self.now_ms());

        if self.get_all_finished() {
            // a race without player completes with its last craft
            if self.race_state.complete_race() {
                report.race_completed_now = true;
            }
            self.status = RaceStatus::Finished;
            info!(racetime = self.cur_racetime, "all crafts finished");
        }

        self.refresh_places();
        report.status = self.status;
        report
    }

    // ---------------------------------------------------------------------------------------------
    // RACE SIMULATOR PARTS ------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// update_progress pushes positions and progresses of all racing crafts and feeds the
    /// progress based lap detection.
    fn update_progress(&mut self, report: &mut TickReport) {
        let positions: Vec<(CraftId, DVec3)> = self
            .crafts
            .iter()
            .map(|c| (c.id, c.pose.position))
            .collect();
        let progresses: Vec<(CraftId, f64)> = self
            .crafts
            .iter()
            .map(|c| (c.id, self.craft_progress(c)))
            .collect();

        self.race_state.update_race_positions(&positions);
        self.race_state.update_progresses(&progresses);

        let mut lap_idxs = Vec::new();
        for (idx, craft) in self.crafts.iter_mut().enumerate() {
            if craft.phase() != CraftPhase::Racing {
                continue;
            }
            let last = self.race_state.last_progresses().get(&craft.id).copied();
            let current = self.race_state.entry(craft.id).map(|e| e.progress);

            if let (Some(last), Some(current)) = (last, current) {
                if craft.lap_tracker.on_progress(last, current) {
                    lap_idxs.push(idx);
                }
            }
        }

        for idx in lap_idxs {
            self.handle_lap(idx, report);
        }
    }

    /// handle_lap books a completed lap of crafts[idx] and handles the finish of the craft.
    fn handle_lap(&mut self, idx: usize, report: &mut TickReport) {
        let now_ms = self.now_ms();
        let id = self.crafts[idx].id;

        let record = match self.race_state.complete_lap(id, now_ms) {
            Some(record) => record,
            None => return,
        };

        let mut finished_place = None;
        if record.lap_number >= self.pars.total_laps {
            finished_place = self.race_state.mark_finished(id);
            self.crafts[idx].set_phase(CraftPhase::Finished);
            info!(craft = id, place = ?finished_place, "craft finished the race");

            if self.crafts[idx].is_player {
                // the timer freezes with the latch, so bring it up to the finish first
                self.race_state.update_lap_timer(now_ms);
                if self.race_state.complete_race() {
                    report.race_completed_now = true;
                }
                self.engage_player_autopilot(idx);
            }
        }

        report.laps.push(LapEvent {
            id,
            record,
            finished_place,
        });
    }

    /// engage_player_autopilot lets the player craft cruise on from where it crossed the line.
    fn engage_player_autopilot(&mut self, idx: usize) {
        let start_t = self.estimator.estimate(self.crafts[idx].pose.position);
        self.crafts[idx].engage_autopilot(PathFollower::new(start_t, BOT_SPEED, 0.0, 0.0));
    }

    fn refresh_places(&mut self) {
        let revision = self.race_state.revision();
        let race_state = &self.race_state;
        let standings = self.standings_cache.get(revision, || race_state.standings());
        self.race_state.apply_places(standings);
    }

    // ---------------------------------------------------------------------------------------------
    // METHODS (HELPERS) ---------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// craft_progress returns the exact curve parameter for path followers and the estimated
    /// progress for flown crafts.
    fn craft_progress(&self, craft: &Craft) -> f64 {
        craft
            .curve_progress()
            .unwrap_or_else(|| self.estimator.estimate(craft.pose.position))
    }

    fn now_ms(&self) -> f64 {
        self.cur_racetime * 1000.0
    }

    /// restart puts all crafts back on the start grid and clears the race state.
    pub fn restart(&mut self) {
        self.cur_racetime = 0.0;
        self.crafts = self.start_grid.clone();
        self.race_state.reset(0.0);
        self.status = RaceStatus::Idle;
        self.progress_timer = 0.0;
        self.standings_cache.invalidate();
        self.register_crafts();
        info!("race restarted");
    }

    pub fn get_all_finished(&self) -> bool {
        !self.crafts.is_empty()
            && self
                .crafts
                .iter()
                .all(|craft| craft.phase() == CraftPhase::Finished)
    }

    pub fn status(&self) -> RaceStatus {
        self.status
    }

    pub fn pars(&self) -> &RacePars {
        &self.pars
    }

    pub fn track(&self) -> &TrackCurve {
        &self.track
    }

    pub fn estimator(&self) -> &ProgressEstimator {
        &self.estimator
    }

    pub fn race_state(&self) -> &RaceState {
        &self.race_state
    }

    pub fn player(&self) -> Option<&Craft> {
        self.crafts.iter().find(|craft| craft.is_player)
    }

    pub fn player_progress(&self) -> Option<f64> {
        self.player().map(|craft| self.craft_progress(craft))
    }

    pub fn standings(&mut self) -> &Standings {
        let revision = self.race_state.revision();
        let race_state = &self.race_state;
        self.standings_cache.get(revision, || race_state.standings())
    }

    pub fn get_race_result(&mut self) -> RaceResult {
        let standings = self.standings().to_owned();
        let crafts = self
            .crafts
            .iter()
            .map(|craft| {
                let entry = self.race_state.entry(craft.id);
                CraftResult {
                    id: craft.id,
                    name: craft.name.to_owned(),
                    is_player: craft.is_player,
                    place: standings.place_of(craft.id).unwrap_or(0),
                    lap_count: entry.map_or(0, |e| e.lap_count),
                    history: entry.map(|e| e.history.to_owned()).unwrap_or_default(),
                }
            })
            .collect();

        RaceResult {
            total_laps: self.pars.total_laps,
            crafts,
            standings,
            race_completed: self.race_state.race_completed(),
            race_time_s: self.cur_racetime,
        }
    }
}

fn check_race_pars(race_pars: &RacePars) -> Result<(), SimError> {
    let invalid = |name: &'static str, reason: &str| SimError::InvalidParameter {
        name,
        reason: reason.to_owned(),
    };

    if race_pars.total_laps == 0 {
        return Err(invalid("total_laps", "must be at least 1"));
    }
    if !(race_pars.checkpoint_cooldown >= 0.0) {
        return Err(invalid("checkpoint_cooldown", "must not be negative"));
    }
    if !(race_pars.max_timestep > 0.0) {
        return Err(invalid("max_timestep", "must be positive"));
    }
    if !(race_pars.progress_update_interval >= 0.0) {
        return Err(invalid("progress_update_interval", "must not be negative"));
    }
    if !(race_pars.countdown >= 0.0) {
        return Err(invalid("countdown", "must not be negative"));
    }
    if !(race_pars.bot_speed_jitter >= 0.0) {
        return Err(invalid("bot_speed_jitter", "must not be negative"));
    }
    Ok(())
}
