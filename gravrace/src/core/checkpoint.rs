use serde::{Deserialize, Serialize};

/// Progress above this value counts as "just before the finish line".
pub const WRAP_HIGH: f64 = 0.9;
/// Progress below this value counts as "just after the finish line".
pub const WRAP_LOW: f64 = 0.1;

/// LapDetection selects how lap completions are detected.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LapDetection {
    /// Intersection with the start/finish volume, re-armed after exit and cooldown.
    Checkpoint,
    /// Progress wrapping from above WRAP_HIGH to below WRAP_LOW.
    ProgressWrap,
}

impl Default for LapDetection {
    fn default() -> Self {
        LapDetection::Checkpoint
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CheckpointState {
    NotPassed,
    Passed,
}

/// Checkpoint is the per-craft state machine of the start/finish volume.
///
/// NotPassed -> Passed when the craft intersects the volume and the cooldown has run out, which
/// fires a lap. Passed -> NotPassed only once the craft has left the volume and the cooldown has
/// run out again.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    state: CheckpointState,
    cooldown_remaining: f64,
    cooldown_time: f64,
}

impl Checkpoint {
    pub fn new(cooldown_time: f64) -> Checkpoint {
        Checkpoint {
            state: CheckpointState::NotPassed,
            cooldown_remaining: 0.0,
            cooldown_time,
        }
    }

    pub fn state(&self) -> CheckpointState {
        self.state
    }

    pub fn did_pass(&self) -> bool {
        self.state == CheckpointState::Passed
    }

    pub fn cooldown_remaining(&self) -> f64 {
        self.cooldown_remaining
    }

    /// update advances the cooldown by timestep_size seconds and returns true if the craft
    /// triggered the checkpoint on this tick.
    pub fn update(&mut self, timestep_size: f64, intersecting: bool) -> bool {
        self.cooldown_remaining = (self.cooldown_remaining - timestep_size).max(0.0);
        let armed = self.cooldown_remaining <= 0.0;

        match self.state {
            CheckpointState::NotPassed if intersecting && armed => {
                self.state = CheckpointState::Passed;
                self.cooldown_remaining = self.cooldown_time;
                true
            }
            CheckpointState::Passed if !intersecting && armed => {
                self.state = CheckpointState::NotPassed;
                false
            }
            _ => false,
        }
    }

    pub fn reset(&mut self) {
        self.state = CheckpointState::NotPassed;
        self.cooldown_remaining = 0.0;
    }
}

/// ProgressWrapGate detects finish line crossings from consecutive progress values. A backwards
/// crossing is owed: the next forward crossing only cancels it and does not count as a lap.
#[derive(Debug, Clone, Default)]
pub struct ProgressWrapGate {
    owed_crossings: u32,
}

impl ProgressWrapGate {
    pub fn new() -> ProgressWrapGate {
        ProgressWrapGate::default()
    }

    pub fn owed_crossings(&self) -> u32 {
        self.owed_crossings
    }

    /// update returns true if moving from last to current completed a lap.
    pub fn update(&mut self, last: f64, current: f64) -> bool {
        if last > WRAP_HIGH && current < WRAP_LOW {
            if self.owed_crossings > 0 {
                self.owed_crossings -= 1;
                return false;
            }
            return true;
        }

        if last < WRAP_LOW && current > WRAP_HIGH {
            self.owed_crossings += 1;
        }

        false
    }

    pub fn reset(&mut self) {
        self.owed_crossings = 0;
    }
}

/// LapTracker is the lap detector of one craft, one variant per detection strategy.
#[derive(Debug, Clone)]
pub enum LapTracker {
    Checkpoint(Checkpoint),
    ProgressWrap(ProgressWrapGate),
}

impl LapTracker {
    pub fn new(detection: LapDetection, cooldown_time: f64) -> LapTracker {
        match detection {
            LapDetection::Checkpoint => LapTracker::Checkpoint(Checkpoint::new(cooldown_time)),
            LapDetection::ProgressWrap => LapTracker::ProgressWrap(ProgressWrapGate::new()),
        }
    }

    /// on_tick feeds the per-tick volume test. None means the checkpoint volume is unavailable,
    /// in which case nothing changes.
    pub fn on_tick(&mut self, timestep_size: f64, intersecting: Option<bool>) -> bool {
        match (self, intersecting) {
            (LapTracker::Checkpoint(checkpoint), Some(intersecting)) => {
                checkpoint.update(timestep_size, intersecting)
            }
            _ => false,
        }
    }

    /// on_progress feeds a new progress sample together with the previous one.
    pub fn on_progress(&mut self, last: f64, current: f64) -> bool {
        match self {
            LapTracker::ProgressWrap(gate) => gate.update(last, current),
            LapTracker::Checkpoint(_) => false,
        }
    }

    pub fn reset(&mut self) {
        match self {
            LapTracker::Checkpoint(checkpoint) => checkpoint.reset(),
            LapTracker::ProgressWrap(gate) => gate.reset(),
        }
    }
}
