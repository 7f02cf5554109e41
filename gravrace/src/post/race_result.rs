use crate::core::race_state::{CraftId, LapRecord};
use crate::core::standings::Standings;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::io::Write as IoWrite;
use std::path::Path;

/// CraftResult is used to store the final bookkeeping of one craft for post-processing.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CraftResult {
    pub id: CraftId,
    pub name: String,
    pub is_player: bool,
    pub place: u32,
    pub lap_count: u32,
    pub history: Vec<LapRecord>,
}

/// RaceResult contains all race information that is required for post-processing the results.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RaceResult {
    pub total_laps: u32,
    pub crafts: Vec<CraftResult>,
    pub standings: Standings,
    pub race_completed: bool,
    pub race_time_s: f64,
}

/// format_time formats a duration in milliseconds as mm:ss:cc (minutes, seconds, centiseconds).
pub fn format_time(ms: f64) -> String {
    if !ms.is_finite() || ms < 0.0 {
        return "--:--:--".to_owned();
    }
    let ms = ms.floor() as u64;
    format!(
        "{:02}:{:02}:{:02}",
        ms / 60000,
        (ms % 60000) / 1000,
        (ms % 1000) / 10
    )
}

impl RaceResult {
    /// crafts_by_place returns the crafts in standings order, unplaced crafts last.
    fn crafts_by_place(&self) -> Vec<&CraftResult> {
        let mut crafts: Vec<&CraftResult> = self.crafts.iter().collect();
        crafts.sort_by_key(|c| (c.place == 0, c.place, c.id));
        crafts
    }

    /// format_lap_and_race_times creates the lap time and race time tables (one row per lap, one
    /// column per craft) followed by the standings.
    pub fn format_lap_and_race_times(&self) -> Result<String, std::fmt::Error> {
        let crafts = self.crafts_by_place();
        let mut tmp_string_laptime = String::new();
        let mut tmp_string_racetime = String::new();

        for lap in 1..self.total_laps as usize + 1 {
            write!(&mut tmp_string_laptime, "{:3}", lap)?;
            write!(&mut tmp_string_racetime, "{:3}", lap)?;

            for craft in crafts.iter() {
                match craft.history.get(lap - 1) {
                    Some(record) => {
                        let racetime: f64 =
                            craft.history.iter().take(lap).map(|l| l.time_ms).sum();
                        write!(&mut tmp_string_laptime, ", {:>10}", format_time(record.time_ms))?;
                        write!(&mut tmp_string_racetime, ", {:>10}", format_time(racetime))?;
                    }
                    None => {
                        write!(&mut tmp_string_laptime, ", {:>10}", "-")?;
                        write!(&mut tmp_string_racetime, ", {:>10}", "-")?;
                    }
                }
            }
            writeln!(&mut tmp_string_laptime)?;
            writeln!(&mut tmp_string_racetime)?;
        }

        let mut tmp_string_craft_info = String::from("lap");
        for craft in crafts.iter() {
            write!(&mut tmp_string_craft_info, ", {:3} ({})", craft.id, craft.name)?;
        }

        let mut tmp_string_standings = String::new();
        for standing in self.standings.iter() {
            let name = self
                .crafts
                .iter()
                .find(|c| c.id == standing.id)
                .map_or("?", |c| c.name.as_str());
            if standing.finished {
                writeln!(
                    &mut tmp_string_standings,
                    "{:2}. {} ({}) {}",
                    standing.place,
                    name,
                    standing.id,
                    format_time(standing.time_ms)
                )?;
            } else {
                writeln!(
                    &mut tmp_string_standings,
                    "{:2}. {} ({}) lap {}/{} at {:.1}%",
                    standing.place,
                    name,
                    standing.id,
                    standing.lap_count,
                    self.total_laps,
                    standing.progress * 100.0
                )?;
            }
        }

        let mut content = String::new();
        writeln!(&mut content, "RESULT: Lap times")?;
        writeln!(&mut content, "{}", tmp_string_craft_info)?;
        writeln!(&mut content, "{}", tmp_string_laptime)?;
        writeln!(&mut content, "RESULT: Race times")?;
        writeln!(&mut content, "{}", tmp_string_craft_info)?;
        writeln!(&mut content, "{}", tmp_string_racetime)?;
        writeln!(&mut content, "RESULT: Standings")?;
        write!(&mut content, "{}", tmp_string_standings)?;
        Ok(content)
    }

    /// write_lap_and_race_times_to_file writes lap and race times to a text file (output/ if no
    /// path is given). Returns the path to the written file.
    pub fn write_lap_and_race_times_to_file(&self, path: Option<&Path>) -> anyhow::Result<String> {
        let content = self.format_lap_and_race_times()?;

        let out_path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let out_dir = Path::new("output");
                std::fs::create_dir_all(out_dir).context("Failed to create output directory!")?;
                out_dir.join("last_run.txt")
            }
        };

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&out_path)
            .context(format!("Failed to open result file {}!", out_path.display()))?;
        file.write_all(content.as_bytes())?;
        file.flush()?;

        Ok(out_path.to_string_lossy().into_owned())
    }

    /// write_json_to_file serialises the whole result to a JSON file.
    pub fn write_json_to_file(&self, path: &Path) -> anyhow::Result<()> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(path)
            .context(format!("Failed to open JSON result file {}!", path.display()))?;
        serde_json::to_writer_pretty(file, self).context("Failed to serialise race result!")?;
        Ok(())
    }

    /// print_lap_and_race_times prints the resulting lap and race times to the console output.
    pub fn print_lap_and_race_times(&self) {
        match self.format_lap_and_race_times() {
            Ok(content) => print!("{}", content),
            Err(e) => eprintln!("ERROR: Could not format race result: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::race_state::RaceEntry;
    use crate::core::standings::compute_standings;
    use std::collections::BTreeMap;

    fn lap(lap_number: u32, time_ms: f64, timestamp_ms: f64) -> LapRecord {
        LapRecord {
            lap_number,
            time_ms,
            timestamp_ms,
        }
    }

    fn result() -> RaceResult {
        let fast = vec![lap(1, 30000.0, 33000.0), lap(2, 29500.0, 62500.0)];
        let slow = vec![lap(1, 35000.0, 38000.0)];

        let mut race_data = BTreeMap::new();
        race_data.insert(
            0,
            RaceEntry {
                lap_count: 2,
                history: fast.clone(),
                is_player: true,
                ..RaceEntry::default()
            },
        );
        race_data.insert(
            1,
            RaceEntry {
                lap_count: 1,
                history: slow.clone(),
                progress: 0.5,
                ..RaceEntry::default()
            },
        );
        let standings = compute_standings(&race_data, 2, Some(0));

        RaceResult {
            total_laps: 2,
            crafts: vec![
                CraftResult {
                    id: 1,
                    name: "Bot".to_owned(),
                    is_player: false,
                    place: 2,
                    lap_count: 1,
                    history: slow,
                },
                CraftResult {
                    id: 0,
                    name: "Player".to_owned(),
                    is_player: true,
                    place: 1,
                    lap_count: 2,
                    history: fast,
                },
            ],
            standings,
            race_completed: true,
            race_time_s: 70.0,
        }
    }

    #[test]
    fn times_are_formatted_as_minutes_seconds_centiseconds() {
        assert_eq!(format_time(0.0), "00:00:00");
        assert_eq!(format_time(59500.0), "00:59:50");
        assert_eq!(format_time(61234.0), "01:01:23");
        assert_eq!(format_time(f64::NAN), "--:--:--");
    }

    #[test]
    fn table_lists_crafts_by_place() {
        let content = result().format_lap_and_race_times().unwrap();
        let header = content.lines().nth(1).unwrap();

        assert_eq!(header, "lap,   0 (Player),   1 (Bot)");
        assert!(content.contains("  1,   00:30:00,   00:35:00"));
        assert!(content.contains("  2,   00:59:50,          -"));
        assert!(content.contains(" 1. Player (0) 00:59:50"));
        assert!(content.contains(" 2. Bot (1) lap 1/2 at 50.0%"));
    }

    #[test]
    fn result_is_written_to_the_given_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.txt");

        let written = result()
            .write_lap_and_race_times_to_file(Some(&path))
            .unwrap();
        let content = std::fs::read_to_string(&path).unwrap();

        assert_eq!(written, path.to_string_lossy());
        assert!(content.starts_with("RESULT: Lap times"));
    }

    #[test]
    fn json_result_can_be_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.json");
        let written = result();

        written.write_json_to_file(&path).unwrap();
        let fh = std::fs::File::open(&path).unwrap();
        let parsed: RaceResult = serde_json::from_reader(fh).unwrap();

        assert_eq!(parsed, written);
    }
}
