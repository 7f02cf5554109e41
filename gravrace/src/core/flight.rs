use crate::core::aabb::Aabb;
use crate::core::craft::CraftPose;
use crate::core::tunnel::Containment;
use glam::{DQuat, DVec3, EulerRot};
use serde::{Deserialize, Serialize};

/// * `max_speed` - (m/tick) Maximum forward speed
/// * `acceleration` - (m/tick^2) Speed gained per tick while accelerating
/// * `damping` - Multiplicative speed decay per tick while coasting
/// * `brake_multiplier` - Braking decelerates this many times faster than accelerating
/// * `min_speed` - (m/tick) Maximum reverse speed (negative)
/// * `roll_rate` - (rad/tick) Roll impulse per tick at full stick deflection
/// * `pitch_rate` - (rad/tick) Pitch impulse per tick at full stick deflection
/// * `angular_damping` - Multiplicative angular velocity decay per tick
/// * `speed_epsilon` - Speeds below this magnitude are snapped to zero
/// * `snap_tolerance` - (m) Distance outside the tunnel tolerated before the craft is reset
/// * `obstacle_bounce` - Velocity factor applied when hitting an obstacle
/// * `half_extents` - (m) Half size of the craft bounding box in its local frame
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct FlightPars {
    pub max_speed: f64,
    pub acceleration: f64,
    pub damping: f64,
    pub brake_multiplier: f64,
    pub min_speed: f64,
    pub roll_rate: f64,
    pub pitch_rate: f64,
    pub angular_damping: f64,
    pub speed_epsilon: f64,
    pub snap_tolerance: f64,
    pub obstacle_bounce: f64,
    pub half_extents: [f64; 3],
}

impl Default for FlightPars {
    fn default() -> Self {
        FlightPars {
            max_speed: 2.0,
            acceleration: 0.1,
            damping: 0.5,
            brake_multiplier: 2.0,
            min_speed: -1.0,
            roll_rate: 0.03,
            pitch_rate: 0.01,
            angular_damping: 0.5,
            speed_epsilon: 0.001,
            snap_tolerance: 10.0,
            obstacle_bounce: -3.0,
            half_extents: [2.0, 1.0, 3.0],
        }
    }
}

/// ControlInput is the per-tick input state of one craft. Axes are in [-1.0, 1.0], throttle is an
/// analog alternative to the accelerate/brake buttons (0.0 if unused).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControlInput {
    pub roll: f64,
    pub pitch: f64,
    pub accelerate: bool,
    pub brake: bool,
    pub throttle: f64,
}

impl ControlInput {
    fn clamped(&self) -> ControlInput {
        ControlInput {
            roll: clamp_axis(self.roll),
            pitch: clamp_axis(self.pitch),
            accelerate: self.accelerate,
            brake: self.brake,
            throttle: clamp_axis(self.throttle),
        }
    }
}

fn clamp_axis(x: f64) -> f64 {
    if x.is_finite() {
        x.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// FlightReport is the per-tick diff handed to the presentation layer instead of callbacks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FlightReport {
    pub speed: f64,
    pub accelerating: bool,
    pub braking: bool,
    pub accelerating_changed: bool,
    pub braking_changed: bool,
    pub snapped_to_tunnel: bool,
    pub hit_obstacle: bool,
}

/// FlightState holds the integrator state of a player-controlled craft besides its pose.
#[derive(Debug, Clone, Default)]
pub struct FlightState {
    speed: f64,
    accelerating: bool,
    braking: bool,
}

impl FlightState {
    pub fn new() -> FlightState {
        FlightState::default()
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn accelerating(&self) -> bool {
        self.accelerating
    }

    pub fn braking(&self) -> bool {
        self.braking
    }

    /// integrate advances pose by one tick. Containment against the tunnel is skipped if no tunnel
    /// is available.
    pub fn integrate(
        &mut self,
        pose: &mut CraftPose,
        input: &ControlInput,
        pars: &FlightPars,
        tunnel: Option<&dyn Containment>,
        obstacles: &[Aabb],
    ) -> FlightReport {
        let input = input.clamped();

        // angular impulses: pitch around local x, roll around local z
        pose.angular_velocity.z += input.roll * -pars.roll_rate;
        pose.angular_velocity.x += input.pitch * pars.pitch_rate;

        let accelerating = input.accelerate || input.throttle > 0.0;
        let braking = input.brake || input.throttle < 0.0;
        let accelerating_changed = accelerating != self.accelerating;
        let braking_changed = braking != self.braking;
        self.accelerating = accelerating;
        self.braking = braking;

        // analog throttle scales the speed change by its deflection
        let analog = input.throttle != 0.0;
        let scale = if analog { input.throttle.abs() } else { 1.0 };

        if accelerating {
            self.speed = (self.speed + pars.acceleration * scale).min(pars.max_speed);
        } else if !braking {
            self.speed *= pars.damping;
        }

        if braking {
            self.speed = (self.speed - pars.acceleration * pars.brake_multiplier * scale)
                .max(pars.min_speed);
        }

        if self.speed.abs() < pars.speed_epsilon {
            self.speed = 0.0;
            pose.velocity = DVec3::ZERO;
        }

        let av = pose.angular_velocity;
        let delta_rotation = DQuat::from_euler(EulerRot::XYZ, av.x, av.y, av.z);
        pose.orientation = (pose.orientation * delta_rotation).normalize();
        pose.angular_velocity *= pars.angular_damping;

        // low speed blends the velocity slowly toward the nose direction
        let desired_velocity = pose.forward() * self.speed;
        let blend = self.speed.abs().clamp(0.05, 1.0);
        pose.velocity = pose.velocity.lerp(desired_velocity, blend);
        pose.position += pose.velocity;

        let mut snapped_to_tunnel = false;
        if let Some(tunnel) = tunnel {
            if !tunnel.probe(pose.position) {
                let surface = tunnel.closest_surface_point(pose.position);
                if pose.position.distance(surface) > pars.snap_tolerance {
                    pose.position = surface;
                    pose.velocity *= -1.0;
                    self.speed = 0.0;
                    snapped_to_tunnel = true;
                }
            }
        }

        let craft_box = pose.bounding_box(DVec3::from_array(pars.half_extents));
        let hit_obstacle = obstacles.iter().any(|obstacle| craft_box.intersects(obstacle));
        if hit_obstacle {
            pose.velocity *= pars.obstacle_bounce;
            self.speed = 0.0;
        }

        FlightReport {
            speed: self.speed,
            accelerating,
            braking,
            accelerating_changed,
            braking_changed,
            snapped_to_tunnel,
            hit_obstacle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::track::{generate_loop_points, TrackCurve};
    use crate::core::tunnel::{TubeTunnel, TUNNEL_SEGMENTS};
    use approx::assert_abs_diff_eq;

    fn accelerate() -> ControlInput {
        ControlInput {
            accelerate: true,
            ..ControlInput::default()
        }
    }

    fn brake() -> ControlInput {
        ControlInput {
            brake: true,
            ..ControlInput::default()
        }
    }

    #[test]
    fn speed_saturates_at_max_speed() {
        let pars = FlightPars::default();
        let mut state = FlightState::new();
        let mut pose = CraftPose::default();

        for tick in 1..=50 {
            let report = state.integrate(&mut pose, &accelerate(), &pars, None, &[]);
            assert!(report.speed <= pars.max_speed);
            if tick == 20 {
                assert_abs_diff_eq!(report.speed, 2.0, epsilon = 1e-9);
            }
        }
        assert_eq!(state.speed(), 2.0);
    }

    #[test]
    fn braking_never_goes_below_reverse_limit() {
        let pars = FlightPars::default();
        let mut state = FlightState::new();
        let mut pose = CraftPose::default();

        for _ in 0..30 {
            let report = state.integrate(&mut pose, &brake(), &pars, None, &[]);
            assert!(report.speed >= -1.0);
        }
        assert_eq!(state.speed(), -1.0);
    }

    #[test]
    fn coasting_decays_to_exactly_zero() {
        let pars = FlightPars::default();
        let mut state = FlightState::new();
        let mut pose = CraftPose::default();

        for _ in 0..10 {
            state.integrate(&mut pose, &accelerate(), &pars, None, &[]);
        }
        for _ in 0..20 {
            state.integrate(&mut pose, &ControlInput::default(), &pars, None, &[]);
        }
        assert_eq!(state.speed(), 0.0);
        assert_eq!(pose.velocity, DVec3::ZERO);
    }

    #[test]
    fn craft_moves_along_its_nose() {
        let pars = FlightPars::default();
        let mut state = FlightState::new();
        let mut pose = CraftPose::default();

        for _ in 0..30 {
            state.integrate(&mut pose, &accelerate(), &pars, None, &[]);
        }
        assert!(pose.position.z < -10.0);
        assert_abs_diff_eq!(pose.position.x, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(pose.position.y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn pitch_input_rotates_the_nose_up() {
        let pars = FlightPars::default();
        let mut state = FlightState::new();
        let mut pose = CraftPose::default();
        let input = ControlInput {
            pitch: 1.0,
            ..ControlInput::default()
        };

        for _ in 0..10 {
            state.integrate(&mut pose, &input, &pars, None, &[]);
        }
        assert!(pose.forward().y > 0.0);
        assert_abs_diff_eq!(pose.orientation.length(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn input_edges_are_reported_once() {
        let pars = FlightPars::default();
        let mut state = FlightState::new();
        let mut pose = CraftPose::default();

        let first = state.integrate(&mut pose, &accelerate(), &pars, None, &[]);
        let second = state.integrate(&mut pose, &accelerate(), &pars, None, &[]);
        let third = state.integrate(&mut pose, &ControlInput::default(), &pars, None, &[]);

        assert!(first.accelerating && first.accelerating_changed);
        assert!(second.accelerating && !second.accelerating_changed);
        assert!(!third.accelerating && third.accelerating_changed);
        assert!(!first.braking_changed && !third.braking_changed);
    }

    #[test]
    fn analog_throttle_scales_acceleration() {
        let pars = FlightPars::default();
        let mut state = FlightState::new();
        let mut pose = CraftPose::default();
        let input = ControlInput {
            throttle: 0.5,
            ..ControlInput::default()
        };

        let report = state.integrate(&mut pose, &input, &pars, None, &[]);
        assert!(report.accelerating);
        assert_abs_diff_eq!(report.speed, 0.05, epsilon = 1e-12);
    }

    #[test]
    fn half_throttle_still_reaches_max_speed() {
        let pars = FlightPars::default();
        let mut state = FlightState::new();
        let mut pose = CraftPose::default();
        let input = ControlInput {
            throttle: 0.5,
            ..ControlInput::default()
        };

        for _ in 0..39 {
            state.integrate(&mut pose, &input, &pars, None, &[]);
        }
        assert_abs_diff_eq!(state.speed(), 1.95, epsilon = 1e-9);

        for _ in 0..5 {
            state.integrate(&mut pose, &input, &pars, None, &[]);
        }
        assert_eq!(state.speed(), pars.max_speed);
    }

    fn flat_loop_tunnel() -> TubeTunnel {
        let curve = TrackCurve::new(generate_loop_points(32, 400.0, 0.0, 0.0)).unwrap();
        TubeTunnel::new(&curve, 30.0, TUNNEL_SEGMENTS).unwrap()
    }

    #[test]
    fn leaving_the_tunnel_snaps_back_to_the_wall() {
        let pars = FlightPars::default();
        let tunnel = flat_loop_tunnel();
        let mut state = FlightState::new();
        // loop centre, far outside the tube
        let mut pose = CraftPose::default();

        let report = state.integrate(&mut pose, &accelerate(), &pars, Some(&tunnel), &[]);

        assert!(report.snapped_to_tunnel);
        assert_eq!(report.speed, 0.0);
        assert_eq!(state.speed(), 0.0);
        // inner wall of a tube of radius 30 around a loop of radius 400
        let horizontal = DVec3::new(pose.position.x, 0.0, pose.position.z).length();
        assert_abs_diff_eq!(horizontal, 370.0, epsilon = 0.5);
        assert_abs_diff_eq!(pose.position.y, 0.0, epsilon = 1e-9);
        // the craft was moving along -z before the snap
        assert!(pose.velocity.z > 0.0);
    }

    #[test]
    fn small_excursions_are_tolerated() {
        let pars = FlightPars::default();
        let tunnel = flat_loop_tunnel();
        let mut state = FlightState::new();
        // 5 outside the outer wall, inside the snap tolerance
        let start = DVec3::new(435.0, 0.0, 0.0);
        let mut pose = CraftPose {
            position: start,
            ..CraftPose::default()
        };
        assert!(!tunnel.probe(start));

        let report = state.integrate(&mut pose, &accelerate(), &pars, Some(&tunnel), &[]);

        assert!(!report.snapped_to_tunnel);
        assert_abs_diff_eq!(report.speed, 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(pose.position.x, 435.0, epsilon = 1e-9);
        assert!(pose.velocity.z < 0.0);
    }

    #[test]
    fn obstacle_hit_bounces_back_and_stops() {
        let pars = FlightPars::default();
        let mut state = FlightState::new();
        let mut pose = CraftPose::default();

        for _ in 0..5 {
            state.integrate(&mut pose, &accelerate(), &pars, None, &[]);
        }
        let v_before = pose.velocity;
        let obstacle = Aabb::from_center_half_extents(pose.position, DVec3::splat(20.0));

        let report = state.integrate(&mut pose, &accelerate(), &pars, None, &[obstacle]);
        assert!(report.hit_obstacle);
        assert_eq!(report.speed, 0.0);
        // velocity now points backwards
        assert!(pose.velocity.dot(v_before) < 0.0);
    }
}
