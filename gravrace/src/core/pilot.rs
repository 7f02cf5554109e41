use crate::core::craft::CraftPose;
use crate::core::flight::ControlInput;
use crate::core::track::TrackCurve;
use glam::DVec3;
use serde::Deserialize;

/// * `lookahead` - Curve parameter distance of the chased point ahead of the craft
/// * `gain` - Stick deflection per radian of heading error
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct ChasePilot {
    pub lookahead: f64,
    pub gain: f64,
}

impl Default for ChasePilot {
    fn default() -> Self {
        ChasePilot {
            lookahead: 0.02,
            gain: 2.0,
        }
    }
}

impl ChasePilot {
    /// steer returns the input that chases a point ahead of the craft's progress on the curve.
    pub fn steer(&self, curve: &TrackCurve, progress: f64, pose: &CraftPose) -> ControlInput {
        self.steer_toward(curve.point_at(progress + self.lookahead), pose)
    }

    /// steer_toward returns the input that turns the craft toward target. The pilot only has roll,
    /// pitch and the throttle buttons, so it banks until the target lies in its pitch plane and
    /// pulls the nose toward it.
    pub fn steer_toward(&self, target: DVec3, pose: &CraftPose) -> ControlInput {
        let local = pose.orientation.inverse() * (target - pose.position);

        // nose is -z, so a target straight ahead has local.z < 0
        let pitch_error = local.y.atan2(-local.z);
        let bank_error = local.x.atan2(local.y.abs()) * local.y.signum();

        ControlInput {
            roll: (bank_error * self.gain).clamp(-1.0, 1.0),
            pitch: (pitch_error * self.gain).clamp(-1.0, 1.0),
            accelerate: true,
            brake: false,
            throttle: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::flight::{FlightPars, FlightState};
    use crate::core::progress::ProgressEstimator;
    use crate::core::track::generate_loop_points;

    #[test]
    fn target_above_pulls_the_nose_up() {
        let pose = CraftPose::default();
        let input = ChasePilot::default().steer_toward(DVec3::new(0.0, 10.0, -100.0), &pose);

        assert!(input.accelerate);
        assert!(input.pitch > 0.0);
        assert_eq!(input.roll, 0.0);
    }

    #[test]
    fn target_to_the_side_banks_toward_it() {
        let pilot = ChasePilot::default();
        let pose = CraftPose::default();

        let right = pilot.steer_toward(DVec3::new(10.0, 0.0, -100.0), &pose);
        assert_eq!(right.roll, 1.0);
        assert_eq!(right.pitch, 0.0);

        // below and right: bank the other way and push the nose down
        let below_right = pilot.steer_toward(DVec3::new(10.0, -10.0, -100.0), &pose);
        assert!(below_right.roll < 0.0);
        assert!(below_right.pitch < 0.0);
    }

    #[test]
    fn pilot_makes_progress_around_a_flat_loop() {
        let curve = TrackCurve::new(generate_loop_points(32, 400.0, 0.0, 0.0)).unwrap();
        let estimator = ProgressEstimator::new(&curve, 1000).unwrap();
        let pilot = ChasePilot::default();
        let pars = FlightPars::default();
        let mut state = FlightState::new();
        let mut pose = CraftPose::start_pose(&curve, 0.0);

        let mut max_progress: f64 = 0.0;
        for _ in 0..600 {
            let progress = estimator.estimate(pose.position);
            max_progress = max_progress.max(progress);
            let input = pilot.steer(&curve, progress, &pose);
            state.integrate(&mut pose, &input, &pars, None, &[]);
        }

        // ten seconds at full speed cover a good part of the lap
        assert!(max_progress > 0.1, "max progress {}", max_progress);
    }
}
