use crate::core::bot::BotPars;
use crate::core::flight::FlightPars;
use crate::core::pilot::ChasePilot;
use crate::core::race::RacePars;
use crate::core::track::TrackPars;
use anyhow::Context;
use serde::Deserialize;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// SimPars is used to store all other parameter structs.
#[derive(Debug, Deserialize, Clone)]
pub struct SimPars {
    #[serde(default)]
    pub race_pars: RacePars,
    pub track_pars: TrackPars,
    #[serde(default)]
    pub flight_pars: FlightPars,
    #[serde(default)]
    pub pilot_pars: ChasePilot,
    #[serde(default)]
    pub bot_pars_all: Vec<BotPars>,
}

/// CsvControlPoint is one row of a control point file.
#[derive(Debug, Deserialize)]
struct CsvControlPoint {
    x_m: f64,
    y_m: f64,
    z_m: f64,
}

/// read_sim_pars reads the JSON file and decodes the JSON string into the simulation parameters
/// struct. If the track references a control point file, it is looked up in input/tracks/ and
/// its points replace the generated loop.
pub fn read_sim_pars(filepath: &Path) -> anyhow::Result<SimPars> {
    let fh = OpenOptions::new()
        .read(true)
        .open(filepath)
        .context(format!(
            "Failed to open parameter file {}!",
            filepath.display()
        ))?;
    let mut pars: SimPars = serde_json::from_reader(&fh).context(format!(
        "Failed to parse parameter file {}!",
        filepath.display()
    ))?;

    if let Some(filename) = pars.track_pars.control_points_file.to_owned() {
        let track_path: PathBuf = ["input", "tracks", &filename].iter().collect();
        pars.track_pars.control_points = read_control_points(&track_path)?;
    }

    Ok(pars)
}

/// read_control_points reads a CSV file with the columns x_m, y_m, z_m.
pub fn read_control_points(filepath: &Path) -> anyhow::Result<Vec<[f64; 3]>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_path(filepath)
        .context(format!(
            "Failed to open control point file {}!",
            filepath.display()
        ))?;

    let mut points = Vec::new();
    for (i, row) in reader.deserialize::<CsvControlPoint>().enumerate() {
        let row = row.context(format!(
            "Failed to parse row {} of control point file {}!",
            i + 1,
            filepath.display()
        ))?;
        points.push([row.x_m, row.y_m, row.z_m]);
    }

    Ok(points)
}
