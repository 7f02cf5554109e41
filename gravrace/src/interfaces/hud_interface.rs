use crate::core::craft::Controller;
use crate::core::race::{Race, RaceStatus};
use crate::core::race_state::CraftId;
use crate::core::standings::Standings;
use crate::post::race_result::RaceResult;
use serde::Serialize;

pub const MAX_HUD_UPDATE_FREQUENCY: f64 = 20.0;

#[derive(Debug, Clone, Default, Serialize)]
pub struct CraftState {
    pub id: CraftId,
    pub name: String,
    pub is_player: bool,
    pub position: [f64; 3],
    pub progress: f64,
    pub lap_count: u32,
    pub place: u32,
    // (m/tick)
    pub speed: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HudState {
    pub craft_states: Vec<CraftState>,
    pub status: RaceStatus,
    pub race_time_s: f64,

    // player readouts
    pub speed: f64,
    pub accelerating: bool,
    pub braking: bool,
    pub lap_time_ms: f64,
    pub total_time_ms: f64,

    pub race_completed: bool,
    pub standings: Standings,

    // final results payload (sent once when the race finishes)
    pub final_result: Option<RaceResult>,
}

impl HudState {
    pub fn from_race(race: &mut Race) -> HudState {
        let standings = race.standings().to_owned();
        let race_state = race.race_state();

        let craft_states = race
            .crafts
            .iter()
            .map(|craft| {
                let entry = race_state.entry(craft.id);
                let speed = match &craft.controller {
                    Controller::Flight(state) => state.speed(),
                    Controller::Path(_) => craft.pose.velocity.length(),
                };
                CraftState {
                    id: craft.id,
                    name: craft.name.to_owned(),
                    is_player: craft.is_player,
                    position: craft.pose.position.to_array(),
                    progress: entry.map_or(0.0, |e| e.progress),
                    lap_count: entry.map_or(0, |e| e.lap_count),
                    place: entry.map_or(0, |e| e.place),
                    speed,
                }
            })
            .collect();

        let player = race.player();
        let flight = player.and_then(|craft| craft.flight_state());

        HudState {
            craft_states,
            status: race.status(),
            race_time_s: race.cur_racetime,
            speed: player.map_or(0.0, |craft| match flight {
                Some(state) => state.speed(),
                None => craft.pose.velocity.length(),
            }),
            accelerating: flight.map_or(false, |state| state.accelerating()),
            braking: flight.map_or(false, |state| state.braking()),
            lap_time_ms: race_state.lap_time_ms(),
            total_time_ms: race_state.total_time_ms(),
            race_completed: race_state.race_completed(),
            standings,
            final_result: None,
        }
    }

    /// player_place returns the current place of the player, 0 if unplaced or without player.
    pub fn player_place(&self) -> u32 {
        self.craft_states
            .iter()
            .find(|c| c.is_player)
            .map_or(0, |c| c.place)
    }
}
