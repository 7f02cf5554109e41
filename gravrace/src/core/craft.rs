use crate::core::aabb::Aabb;
use crate::core::bot::PathFollower;
use crate::core::checkpoint::LapTracker;
use crate::core::flight::FlightState;
use crate::core::race_state::CraftId;
use crate::core::track::TrackCurve;
use glam::{DMat3, DQuat, DVec3};
use serde::Serialize;
use tracing::debug;

/// CraftPose is the kinematic state of one craft. The nose points along local -Z.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CraftPose {
    pub position: DVec3,
    pub orientation: DQuat,
    pub velocity: DVec3,
    pub angular_velocity: DVec3,
}

impl Default for CraftPose {
    fn default() -> Self {
        CraftPose {
            position: DVec3::ZERO,
            orientation: DQuat::IDENTITY,
            velocity: DVec3::ZERO,
            angular_velocity: DVec3::ZERO,
        }
    }
}

impl CraftPose {
    /// start_pose places a craft on the curve at parameter t with its nose along the tangent.
    pub fn start_pose(curve: &TrackCurve, t: f64) -> CraftPose {
        let tangent = curve.tangent_at(t);
        CraftPose {
            position: curve.point_at(t),
            orientation: DQuat::from_rotation_arc(DVec3::NEG_Z, tangent),
            ..CraftPose::default()
        }
    }

    pub fn forward(&self) -> DVec3 {
        (self.orientation * DVec3::NEG_Z).normalize_or_zero()
    }

    pub fn bounding_box(&self, half_extents: DVec3) -> Aabb {
        Aabb::from_oriented(self.position, half_extents, self.orientation)
    }
}

/// look_rotation returns the rotation that points the nose (-Z) along forward with local +Y as
/// close to up as possible.
pub fn look_rotation(forward: DVec3, up: DVec3) -> DQuat {
    let f = forward.normalize_or_zero();
    let right = f.cross(up).normalize_or_zero();

    if f == DVec3::ZERO {
        return DQuat::IDENTITY;
    }
    if right == DVec3::ZERO {
        // forward is parallel to up
        return DQuat::from_rotation_arc(DVec3::NEG_Z, f);
    }

    let true_up = right.cross(f);
    DQuat::from_mat3(&DMat3::from_cols(right, true_up, -f)).normalize()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CraftPhase {
    Idle,
    Racing,
    Finished,
}

/// Controller is what moves a craft each tick.
#[derive(Debug, Clone)]
pub enum Controller {
    /// Flight dynamics driven by control input (player).
    Flight(FlightState),
    /// Deterministic curve following (bots, and the player after the finish).
    Path(PathFollower),
}

#[derive(Debug, Clone)]
pub struct Craft {
    pub id: CraftId,
    pub name: String,
    pub is_player: bool,
    pub pose: CraftPose,
    pub controller: Controller,
    pub lap_tracker: LapTracker,
    phase: CraftPhase,
}

impl Craft {
    pub fn new_player(
        id: CraftId,
        name: &str,
        pose: CraftPose,
        lap_tracker: LapTracker,
    ) -> Craft {
        Craft {
            id,
            name: name.to_owned(),
            is_player: true,
            pose,
            controller: Controller::Flight(FlightState::new()),
            lap_tracker,
            phase: CraftPhase::Idle,
        }
    }

    pub fn new_bot(
        id: CraftId,
        name: &str,
        curve: &TrackCurve,
        follower: PathFollower,
        lap_tracker: LapTracker,
    ) -> Craft {
        let pose = CraftPose::start_pose(curve, follower.t());
        Craft {
            id,
            name: name.to_owned(),
            is_player: false,
            pose,
            controller: Controller::Path(follower),
            lap_tracker,
            phase: CraftPhase::Idle,
        }
    }

    pub fn phase(&self) -> CraftPhase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: CraftPhase) {
        if self.phase == phase {
            return;
        }
        debug!(craft = self.id, from = ?self.phase, to = ?phase, "craft phase change");
        self.phase = phase;
    }

    /// flight_state returns the integrator state while the craft is flown manually.
    pub fn flight_state(&self) -> Option<&FlightState> {
        match &self.controller {
            Controller::Flight(state) => Some(state),
            Controller::Path(_) => None,
        }
    }

    /// curve_progress returns the exact curve parameter for path-following crafts.
    pub fn curve_progress(&self) -> Option<f64> {
        match &self.controller {
            Controller::Flight(_) => None,
            Controller::Path(follower) => Some(follower.t()),
        }
    }

    /// engage_autopilot hands the craft over to a path follower, e.g. after the finish line.
    pub fn engage_autopilot(&mut self, follower: PathFollower) {
        debug!(craft = self.id, t = follower.t(), "autopilot engaged");
        self.controller = Controller::Path(follower);
    }
}
