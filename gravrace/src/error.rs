use thiserror::Error;

use crate::core::race_state::CraftId;

/// SimError is returned when the simulation is set up with parameters or geometry it cannot run
/// on. Steady-state ticks never produce it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("Track needs at least {min} control points, got {got}")]
    TooFewControlPoints { min: usize, got: usize },
    #[error("Track control point {index} is not finite")]
    NonFiniteControlPoint { index: usize },
    #[error("Track has zero length")]
    ZeroLengthTrack,
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("Craft id {0} is used more than once")]
    DuplicateCraftId(CraftId),
}
