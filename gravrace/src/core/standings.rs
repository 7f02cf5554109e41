use crate::core::race_state::{CraftId, LapRecord, RaceEntry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// * `id` - Craft id
/// * `place` - Place in the standings (starts at 1)
/// * `finished` - True if the craft completed all laps
/// * `time_ms` - (ms) Elapsed race time over the completed laps (capped at the total lap count)
/// * `lap_count` - Number of completed laps
/// * `progress` - Progress on the current lap
/// * `is_player` - True for the player craft
/// * `history` - Lap records of the craft
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Standing {
    pub id: CraftId,
    pub place: u32,
    pub finished: bool,
    pub time_ms: f64,
    pub lap_count: u32,
    pub progress: f64,
    pub is_player: bool,
    pub history: Vec<LapRecord>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct Standings {
    pub finished: Vec<Standing>,
    pub in_progress: Vec<Standing>,
    pub race_over: bool,
}

impl Standings {
    /// iter walks all standings in place order.
    pub fn iter(&self) -> impl Iterator<Item = &Standing> {
        self.finished.iter().chain(self.in_progress.iter())
    }

    pub fn len(&self) -> usize {
        self.finished.len() + self.in_progress.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn place_of(&self, id: CraftId) -> Option<u32> {
        self.iter().find(|s| s.id == id).map(|s| s.place)
    }
}

struct Candidate<'a> {
    id: CraftId,
    entry: &'a RaceEntry,
    time_ms: f64,
}

/// compute_standings orders all racers (id >= 0) into finished crafts (by elapsed time, then finish
/// timestamp, then id) followed by crafts still racing (by lap count desc, progress desc, elapsed
/// time asc, then id).
pub fn compute_standings(
    race_data: &BTreeMap<CraftId, RaceEntry>,
    total_laps: u32,
    player_id: Option<CraftId>,
) -> Standings {
    let (mut finished, mut in_progress): (Vec<Candidate>, Vec<Candidate>) = race_data
        .iter()
        .filter(|(&id, _)| id >= 0)
        .map(|(&id, entry)| Candidate {
            id,
            entry,
            time_ms: entry.elapsed_ms(total_laps),
        })
        .partition(|c| c.entry.lap_count >= total_laps);

    finished.sort_by(|a, b| {
        a.time_ms
            .total_cmp(&b.time_ms)
            .then_with(|| {
                let ts_a = a.entry.finish_timestamp_ms(total_laps).unwrap_or(f64::INFINITY);
                let ts_b = b.entry.finish_timestamp_ms(total_laps).unwrap_or(f64::INFINITY);
                ts_a.total_cmp(&ts_b)
            })
            .then_with(|| a.id.cmp(&b.id))
    });

    in_progress.sort_by(|a, b| {
        b.entry
            .lap_count
            .cmp(&a.entry.lap_count)
            .then_with(|| b.entry.progress.total_cmp(&a.entry.progress))
            .then_with(|| a.time_ms.total_cmp(&b.time_ms))
            .then_with(|| a.id.cmp(&b.id))
    });

    let race_over = player_id
        .and_then(|id| race_data.get(&id))
        .map_or(false, |entry| entry.history.len() >= total_laps as usize);

    let no_finished = finished.len() as u32;
    Standings {
        finished: finished
            .into_iter()
            .enumerate()
            .map(|(idx, c)| to_standing(c, idx as u32 + 1, true))
            .collect(),
        in_progress: in_progress
            .into_iter()
            .enumerate()
            .map(|(idx, c)| to_standing(c, no_finished + idx as u32 + 1, false))
            .collect(),
        race_over,
    }
}

fn to_standing(c: Candidate, place: u32, finished: bool) -> Standing {
    Standing {
        id: c.id,
        place,
        finished,
        time_ms: c.time_ms,
        lap_count: c.entry.lap_count,
        progress: c.entry.progress,
        is_player: c.entry.is_player,
        history: c.entry.history.clone(),
    }
}

/// StandingsCache keeps the last computed standings together with the state revision they belong
/// to.
#[derive(Debug, Clone, Default)]
pub struct StandingsCache {
    revision: Option<u64>,
    standings: Standings,
}

impl StandingsCache {
    pub fn new() -> StandingsCache {
        StandingsCache::default()
    }

    /// get returns the cached standings if revision matches, otherwise recomputes them with
    /// compute.
    pub fn get<F>(&mut self, revision: u64, compute: F) -> &Standings
    where
        F: FnOnce() -> Standings,
    {
        if self.revision != Some(revision) {
            self.standings = compute();
            self.revision = Some(revision);
        }
        &self.standings
    }

    pub fn invalidate(&mut self) {
        self.revision = None;
    }
}
