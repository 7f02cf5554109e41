use crate::core::craft::{look_rotation, CraftPose};
use crate::core::race_state::CraftId;
use crate::core::track::TrackCurve;
use glam::DVec3;
use helpers::general::wrap_unit;
use serde::Deserialize;

/// (1/tick) Curve parameter advanced per tick at speed multiplier 1.0.
pub const BOT_SPEED: f64 = 0.0005;

/// * `id` - Craft id of the bot (must be unique and >= 0)
/// * `name` - Display name
/// * `speed_multiplier` - Multiplier on BOT_SPEED
/// * `noise_amplitude` - (m) Amplitude of the lateral weaving
/// * `noise_frequency` - (rad/s) Angular frequency of the lateral weaving
/// * `start_t` - Curve parameter the bot starts at
#[derive(Debug, Deserialize, Clone)]
pub struct BotPars {
    pub id: CraftId,
    pub name: String,
    #[serde(default = "default_speed_multiplier")]
    pub speed_multiplier: f64,
    #[serde(default = "default_noise_amplitude")]
    pub noise_amplitude: f64,
    #[serde(default = "default_noise_frequency")]
    pub noise_frequency: f64,
    #[serde(default)]
    pub start_t: f64,
}

fn default_speed_multiplier() -> f64 {
    1.0
}

fn default_noise_amplitude() -> f64 {
    5.0
}

fn default_noise_frequency() -> f64 {
    1.5
}

/// PathFollower moves a craft along the curve by advancing its parameter by a fixed amount per
/// tick and weaving sideways with a sinusoidal offset.
#[derive(Debug, Clone)]
pub struct PathFollower {
    t: f64,
    step: f64,
    noise_amplitude: f64,
    noise_frequency: f64,
    elapsed: f64,
}

impl PathFollower {
    pub fn new(start_t: f64, step: f64, noise_amplitude: f64, noise_frequency: f64) -> PathFollower {
        PathFollower {
            t: wrap_unit(start_t),
            step,
            noise_amplitude,
            noise_frequency,
            elapsed: 0.0,
        }
    }

    pub fn from_pars(bot_pars: &BotPars) -> PathFollower {
        PathFollower::new(
            bot_pars.start_t,
            BOT_SPEED * bot_pars.speed_multiplier,
            bot_pars.noise_amplitude,
            bot_pars.noise_frequency,
        )
    }

    /// t is the current curve parameter, which is also the exact progress of the craft.
    pub fn t(&self) -> f64 {
        self.t
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    /// advance moves the follower by one tick of timestep_size seconds and writes the new pose.
    pub fn advance(&mut self, curve: &TrackCurve, timestep_size: f64, pose: &mut CraftPose) {
        self.elapsed += timestep_size;
        self.t = wrap_unit(self.t + self.step);

        let on_curve = curve.point_at(self.t);
        let tangent = curve.tangent_at(self.t);
        let side = tangent.cross(DVec3::Y).normalize_or_zero();

        let offset = (self.elapsed * self.noise_frequency).sin() * self.noise_amplitude;
        let position = on_curve + side * offset;

        // velocity is derived from the displacement so followers and flown crafts look alike
        pose.velocity = position - pose.position;
        pose.angular_velocity = DVec3::ZERO;
        pose.position = position;
        pose.orientation = look_rotation(tangent, DVec3::Y);
    }
}
