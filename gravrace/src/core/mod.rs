pub mod aabb;
pub mod bot;
pub mod checkpoint;
pub mod craft;
pub mod flight;
pub mod handle_race;
pub mod pilot;
pub mod progress;
pub mod race;
pub mod race_state;
pub mod standings;
pub mod track;
pub mod tunnel;
