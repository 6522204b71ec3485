use thiserror::Error;

use crate::event_file::traits::FieldingPosition;

/// Reasons a lineup fails validation.
#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum LineupProblem {
    #[error("{count} players in a lineup that allows at most {max}")]
    TooManyPlayers { count: usize, max: usize },
    #[error("no designated hitter and no pitcher")]
    NoPitcher,
    #[error("no designated hitter and the pitcher is not in the batting order")]
    PitcherNotBatting,
    #[error("batting order slot {0} is empty")]
    MissingOrder(u8),
    #[error("batting order slot {0} is held by more than one player")]
    DuplicateOrder(u8),
    #[error("no player at {0}")]
    MissingPosition(FieldingPosition),
    #[error("more than one player at {0}")]
    DuplicatePosition(FieldingPosition),
}

/// Typed failures raised by the engine. Validation variants are meant to be
/// caught while lineups are assembled; the rest abort the current game.
#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum GameError {
    #[error("invalid base number {0}")]
    InvalidBase(u8),
    #[error("unrecognized base {0:?}")]
    UnknownBase(String),
    #[error("invalid handedness code {0:?}")]
    InvalidHand(String),
    #[error("unknown fielding position {0:?}")]
    UnknownPosition(String),
    #[error("incomplete lineup: {0}")]
    IncompleteLineup(#[from] LineupProblem),
    #[error("player {0} is already listed")]
    DuplicatePlayer(String),
    #[error("conflicting data for player {name}: {detail}")]
    PlayerConflict { name: String, detail: String },
    #[error("no player found with {0}")]
    PlayerNotFound(String),
    #[error("{player} is not on base {base}")]
    RunnerNotOnBase { player: String, base: u8 },
    #[error("{player} cannot move from base {from} to base {to}")]
    BaseRegression { player: String, from: u8, to: u8 },
    #[error("a fourth out was recorded in inning {inning}")]
    TooManyOuts { inning: u8 },
    #[error("batting order mismatch: {0}")]
    BattingOrder(String),
    #[error("{name:?} matches {first} and {second} equally well")]
    AmbiguousName {
        name: String,
        first: String,
        second: String,
    },
    #[error("the game has already ended")]
    GameOver,
}

impl GameError {
    /// Validation errors are raised by malformed input rather than by an
    /// inconsistent play sequence.
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidBase(_)
                | Self::UnknownBase(_)
                | Self::InvalidHand(_)
                | Self::UnknownPosition(_)
                | Self::IncompleteLineup(_)
                | Self::DuplicatePlayer(_)
                | Self::PlayerConflict { .. }
        )
    }
}
