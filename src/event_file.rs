pub mod bases;
pub mod box_score;
pub mod config;
pub mod error;
pub mod game_container;
pub mod game_state;
pub mod lineup;
pub mod pitch_sequence;
pub mod play;
pub mod schemas;
pub mod traits;
