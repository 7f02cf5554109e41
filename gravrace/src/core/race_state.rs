use crate::core::standings::{compute_standings, Standings};
use glam::DVec3;
use helpers::general::wrap_unit;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Craft ids of real racers are >= 0. Negative ids are reserved for non-racing entries and are
/// left out of the standings.
pub type CraftId = i32;

/// * `lap_number` - Number of the completed lap (starts at 1)
/// * `time_ms` - (ms) Duration of the lap
/// * `timestamp_ms` - (ms) Race clock at lap completion
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct LapRecord {
    pub lap_number: u32,
    pub time_ms: f64,
    pub timestamp_ms: f64,
}

/// RaceEntry is the race bookkeeping of one craft. place is 0 while unplaced.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RaceEntry {
    pub position: DVec3,
    pub progress: f64,
    pub place: u32,
    pub lap_count: u32,
    pub is_player: bool,
    pub history: Vec<LapRecord>,
}

impl Default for RaceEntry {
    fn default() -> Self {
        RaceEntry {
            position: DVec3::ZERO,
            progress: 0.0,
            place: 0,
            lap_count: 0,
            is_player: false,
            history: Vec::new(),
        }
    }
}

impl RaceEntry {
    /// elapsed_ms sums the lap times of at most the first total_laps laps.
    pub fn elapsed_ms(&self, total_laps: u32) -> f64 {
        self.history
            .iter()
            .take(total_laps as usize)
            .map(|lap| lap.time_ms)
            .sum()
    }

    /// finish_timestamp_ms returns the race clock at which the final lap was completed.
    pub fn finish_timestamp_ms(&self, total_laps: u32) -> Option<f64> {
        if total_laps == 0 {
            return None;
        }
        self.history
            .get(total_laps as usize - 1)
            .map(|lap| lap.timestamp_ms)
    }
}

/// RaceEntryUpdate is a partial update of a RaceEntry, unset fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct RaceEntryUpdate {
    pub position: Option<DVec3>,
    pub progress: Option<f64>,
    pub place: Option<u32>,
    pub lap_count: Option<u32>,
    pub is_player: Option<bool>,
    pub history: Option<Vec<LapRecord>>,
}

/// RaceState owns the bookkeeping of one race: lap timer, completion latch, per-craft entries and
/// the finish order. All times are race clock milliseconds.
#[derive(Debug, Clone)]
pub struct RaceState {
    lap_time_ms: f64,
    total_time_ms: f64,
    race_completed: bool,
    player_id: Option<CraftId>,
    race_data: BTreeMap<CraftId, RaceEntry>,
    last_progresses: BTreeMap<CraftId, f64>,
    lap_start_time_ms: f64,
    finished_crafts: Vec<CraftId>,
    total_laps: u32,
    revision: u64,
}

impl RaceState {
    pub fn new(total_laps: u32, now_ms: f64) -> RaceState {
        RaceState {
            lap_time_ms: 0.0,
            total_time_ms: 0.0,
            race_completed: false,
            player_id: None,
            race_data: BTreeMap::new(),
            last_progresses: BTreeMap::new(),
            lap_start_time_ms: now_ms,
            finished_crafts: Vec::new(),
            total_laps,
            revision: 0,
        }
    }

    // ---------------------------------------------------------------------------------------------
    // GETTERS -------------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    pub fn lap_time_ms(&self) -> f64 {
        self.lap_time_ms
    }

    pub fn total_time_ms(&self) -> f64 {
        self.total_time_ms
    }

    pub fn race_completed(&self) -> bool {
        self.race_completed
    }

    pub fn player_id(&self) -> Option<CraftId> {
        self.player_id
    }

    pub fn race_data(&self) -> &BTreeMap<CraftId, RaceEntry> {
        &self.race_data
    }

    pub fn entry(&self, id: CraftId) -> Option<&RaceEntry> {
        self.race_data.get(&id)
    }

    pub fn last_progresses(&self) -> &BTreeMap<CraftId, f64> {
        &self.last_progresses
    }

    pub fn lap_start_time_ms(&self) -> f64 {
        self.lap_start_time_ms
    }

    pub fn finished_crafts(&self) -> &[CraftId] {
        &self.finished_crafts
    }

    pub fn total_laps(&self) -> u32 {
        self.total_laps
    }

    /// revision increases on every mutation and identifies a version of the state.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn standings(&self) -> Standings {
        compute_standings(&self.race_data, self.total_laps, self.player_id)
    }

    // ---------------------------------------------------------------------------------------------
    // ACTIONS -------------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    fn touch(&mut self) {
        self.revision += 1;
    }

    fn entry_mut(&mut self, id: CraftId) -> &mut RaceEntry {
        self.revision += 1;
        self.race_data.entry(id).or_default()
    }

    pub fn set_player_id(&mut self, id: CraftId) {
        self.player_id = Some(id);
        self.entry_mut(id).is_player = true;
    }

    pub fn set_lap_start_time(&mut self, now_ms: f64) {
        self.lap_start_time_ms = now_ms;
        self.touch();
    }

    /// update_lap_timer recomputes the running lap time of the player and the total time (completed
    /// laps capped at the total lap count plus the running lap). Frozen after race completion.
    pub fn update_lap_timer(&mut self, now_ms: f64) {
        if self.race_completed {
            return;
        }

        let player_entry = self.player_id.and_then(|id| self.race_data.get(&id));
        let (lap_start, completed) = match player_entry {
            Some(entry) => (
                entry
                    .history
                    .last()
                    .map_or(self.lap_start_time_ms, |lap| lap.timestamp_ms),
                entry.elapsed_ms(self.total_laps),
            ),
            None => (self.lap_start_time_ms, 0.0),
        };

        self.lap_time_ms = (now_ms - lap_start).max(0.0);
        self.total_time_ms = completed + self.lap_time_ms;
    }

    /// complete_lap appends a lap record for craft id. The entry is created if necessary. Returns
    /// None if the craft already completed all laps.
    pub fn complete_lap(&mut self, id: CraftId, now_ms: f64) -> Option<LapRecord> {
        let total_laps = self.total_laps;
        let lap_start_time_ms = self.lap_start_time_ms;

        if self
            .race_data
            .get(&id)
            .map_or(false, |entry| entry.history.len() >= total_laps as usize)
        {
            return None;
        }

        let entry = self.entry_mut(id);
        let lap_start = entry
            .history
            .last()
            .map_or(lap_start_time_ms, |lap| lap.timestamp_ms);
        let record = LapRecord {
            lap_number: entry.history.len() as u32 + 1,
            time_ms: now_ms - lap_start,
            timestamp_ms: now_ms,
        };
        entry.history.push(record);
        entry.lap_count = entry.history.len() as u32;

        debug!(
            craft = id,
            lap = record.lap_number,
            time_ms = record.time_ms,
            "lap completed"
        );
        Some(record)
    }

    /// complete_race latches the race as completed. Returns true only for the call that set the
    /// latch.
    pub fn complete_race(&mut self) -> bool {
        if self.race_completed {
            return false;
        }
        self.race_completed = true;
        self.touch();
        info!(total_time_ms = self.total_time_ms, "race completed");
        true
    }

    /// mark_finished records craft id in finish order and assigns its place. Returns the place if
    /// the craft was not recorded before.
    pub fn mark_finished(&mut self, id: CraftId) -> Option<u32> {
        if self.finished_crafts.contains(&id) {
            return None;
        }
        let place = self.finished_crafts.len() as u32 + 1;
        self.finished_crafts.push(id);
        self.entry_mut(id).place = place;
        debug!(craft = id, place, "craft finished");
        Some(place)
    }

    pub fn set_race_position(&mut self, id: CraftId, position: DVec3) {
        self.entry_mut(id).position = position;
    }

    pub fn set_race_progress(&mut self, id: CraftId, progress: f64) {
        self.entry_mut(id).progress = wrap_unit(progress);
    }

    /// update_race_positions applies a batch of positions. Ignored after race completion.
    pub fn update_race_positions(&mut self, positions: &[(CraftId, DVec3)]) {
        if self.race_completed {
            return;
        }
        for &(id, position) in positions {
            self.entry_mut(id).position = position;
        }
    }

    /// update_progresses snapshots the current progress of every entry into the last progresses
    /// and then applies the new batch.
    pub fn update_progresses(&mut self, progresses: &[(CraftId, f64)]) {
        self.last_progresses = self
            .race_data
            .iter()
            .map(|(&id, entry)| (id, entry.progress))
            .collect();

        for &(id, progress) in progresses {
            self.entry_mut(id).progress = wrap_unit(progress);
        }
        self.touch();
    }

    /// update_last_progresses merges explicit previous progress values. Ignored after race
    /// completion.
    pub fn update_last_progresses(&mut self, progresses: &[(CraftId, f64)]) {
        if self.race_completed {
            return;
        }
        for &(id, progress) in progresses {
            self.last_progresses.insert(id, progress);
        }
        self.touch();
    }

    pub fn update_race_data(&mut self, id: CraftId, update: RaceEntryUpdate) {
        let entry = self.entry_mut(id);

        if let Some(position) = update.position {
            entry.position = position;
        }
        if let Some(progress) = update.progress {
            entry.progress = wrap_unit(progress);
        }
        if let Some(place) = update.place {
            entry.place = place;
        }
        if let Some(lap_count) = update.lap_count {
            entry.lap_count = lap_count;
        }
        if let Some(is_player) = update.is_player {
            entry.is_player = is_player;
        }
        if let Some(history) = update.history {
            entry.history = history;
        }
    }

    /// apply_places writes the places of a standings computation back into the entries. Places are
    /// derived data and do not create a new revision.
    pub fn apply_places(&mut self, standings: &Standings) {
        for standing in standings.iter() {
            if let Some(entry) = self.race_data.get_mut(&standing.id) {
                entry.place = standing.place;
            }
        }
    }

    /// reset clears all race data for a new race. The player id is kept.
    pub fn reset(&mut self, now_ms: f64) {
        self.lap_time_ms = 0.0;
        self.total_time_ms = 0.0;
        self.race_completed = false;
        self.race_data.clear();
        self.last_progresses.clear();
        self.lap_start_time_ms = now_ms;
        self.finished_crafts.clear();
        self.touch();
        debug!("race state reset");
    }
}
