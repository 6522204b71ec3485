use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use tracing::warn;

use crate::event_file::traits::Base;

#[derive(Debug, Ord, PartialOrd, Eq, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub enum SequenceItemTypeGeneral {
    Ball,
    Strike,
    InPlay,
    NoPitch,
    Unknown,
}

#[derive(
    Debug,
    Ord,
    PartialOrd,
    Eq,
    PartialEq,
    EnumString,
    Display,
    Copy,
    Clone,
    Default,
    Serialize,
    Deserialize,
)]
pub enum PitchType {
    #[strum(serialize = "1")]
    PickoffAttemptFirst,
    #[strum(serialize = "2")]
    PickoffAttemptSecond,
    #[strum(serialize = "3")]
    PickoffAttemptThird,
    #[strum(serialize = ".")]
    PlayNotInvolvingBatter,
    #[strum(serialize = "B")]
    Ball,
    #[strum(serialize = "C")]
    CalledStrike,
    #[strum(serialize = "F")]
    Foul,
    #[strum(serialize = "H")]
    HitBatter,
    #[strum(serialize = "I")]
    IntentionalBall,
    #[strum(serialize = "K")]
    StrikeUnknownType,
    #[strum(serialize = "L")]
    FoulBunt,
    #[strum(serialize = "M")]
    MissedBunt,
    #[strum(serialize = "N")]
    NoPitch,
    #[strum(serialize = "O")]
    FoulTipBunt,
    #[strum(serialize = "P")]
    Pitchout,
    #[strum(serialize = "Q")]
    SwingingOnPitchout,
    #[strum(serialize = "R")]
    FoulOnPitchout,
    #[strum(serialize = "S")]
    SwingingStrike,
    #[strum(serialize = "T")]
    FoulTip,
    #[default]
    #[strum(serialize = "U")]
    Unknown,
    #[strum(serialize = "V")]
    AutomaticBall,
    #[strum(serialize = "X")]
    InPlay,
    #[strum(serialize = "Y")]
    InPlayOnPitchout,
}

impl PitchType {
    pub const fn get_sequence_general(self) -> SequenceItemTypeGeneral {
        match self {
            Self::PickoffAttemptFirst
            | Self::PickoffAttemptSecond
            | Self::PickoffAttemptThird
            | Self::PlayNotInvolvingBatter
            | Self::NoPitch => SequenceItemTypeGeneral::NoPitch,
            Self::Ball
            | Self::HitBatter
            | Self::IntentionalBall
            | Self::Pitchout
            | Self::AutomaticBall => SequenceItemTypeGeneral::Ball,
            Self::CalledStrike
            | Self::Foul
            | Self::StrikeUnknownType
            | Self::FoulBunt
            | Self::MissedBunt
            | Self::FoulTipBunt
            | Self::SwingingOnPitchout
            | Self::FoulOnPitchout
            | Self::SwingingStrike
            | Self::FoulTip => SequenceItemTypeGeneral::Strike,
            Self::Unknown => SequenceItemTypeGeneral::Unknown,
            Self::InPlay | Self::InPlayOnPitchout => SequenceItemTypeGeneral::InPlay,
        }
    }

    /// Fouls that leave a two-strike count unchanged.
    pub const fn is_uncounted_foul(self) -> bool {
        matches!(self, Self::Foul | Self::FoulOnPitchout)
    }

    pub const fn pickoff(base: Base) -> Self {
        match base {
            Base::First => Self::PickoffAttemptFirst,
            Base::Second => Self::PickoffAttemptSecond,
            _ => Self::PickoffAttemptThird,
        }
    }

    pub fn as_char(self) -> char {
        self.to_string().chars().next().unwrap_or('U')
    }
}

#[derive(Debug, Eq, PartialEq, Copy, Clone, Default, Serialize, Deserialize)]
pub struct Count {
    pub balls: u8,
    pub strikes: u8,
}

impl Count {
    pub fn update(&mut self, pitch: PitchType) {
        match pitch.get_sequence_general() {
            SequenceItemTypeGeneral::Ball if pitch != PitchType::HitBatter => {
                self.balls = (self.balls + 1).min(4);
            }
            SequenceItemTypeGeneral::Strike if pitch.is_uncounted_foul() && self.strikes >= 2 => {}
            SequenceItemTypeGeneral::Strike => self.strikes = (self.strikes + 1).min(3),
            _ => {}
        }
    }

    /// Counts at which a relieved pitcher keeps responsibility for a walk.
    pub const fn charges_walk_to_previous_pitcher(self) -> bool {
        matches!((self.balls, self.strikes), (2, 0 | 1) | (3, 0..=2))
    }

    /// A relieved batter is charged with a strikeout once he has two strikes.
    pub const fn charges_strikeout_to_previous_batter(self) -> bool {
        self.strikes >= 2
    }
}

impl fmt::Display for Count {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.balls, self.strikes)
    }
}

/// Per-type pitch tallies for one plate appearance, in the extended
/// Chadwick `PA_*_CT` layout.
#[derive(Debug, Eq, PartialEq, Copy, Clone, Default, Serialize, Deserialize)]
pub struct PitchCounts {
    pub balls: u8,
    pub called_balls: u8,
    pub intentional_balls: u8,
    pub pitchout_balls: u8,
    pub hit_batter_balls: u8,
    pub other_balls: u8,
    pub strikes: u8,
    pub called_strikes: u8,
    pub swinging_strikes: u8,
    pub foul_strikes: u8,
    pub in_play_strikes: u8,
    pub other_strikes: u8,
}

/// Pitch characters for the current plate appearance. Plays that interrupt
/// the plate appearance are marked with `.` the way Chadwick does.
#[derive(Debug, Eq, PartialEq, Clone, Default)]
pub struct PitchSequence(String);

impl PitchSequence {
    pub fn push(&mut self, pitch: PitchType) {
        self.0.push(pitch.as_char());
    }

    pub fn mark_interruption(&mut self) {
        self.push(PitchType::PlayNotInvolvingBatter);
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn pitches(&self) -> impl Iterator<Item = PitchType> + '_ {
        self.0.chars().filter_map(|c| {
            PitchType::from_str(&c.to_string())
                .map_err(|_| warn!("Unrecognized pitch character {}", c))
                .ok()
        })
    }

    pub fn pitch_counts(&self) -> PitchCounts {
        let mut counts = PitchCounts::default();
        for pitch in self.pitches() {
            match pitch.get_sequence_general() {
                SequenceItemTypeGeneral::Ball => {
                    counts.balls += 1;
                    match pitch {
                        PitchType::Ball => counts.called_balls += 1,
                        PitchType::IntentionalBall => counts.intentional_balls += 1,
                        PitchType::Pitchout => counts.pitchout_balls += 1,
                        PitchType::HitBatter => counts.hit_batter_balls += 1,
                        _ => counts.other_balls += 1,
                    }
                }
                SequenceItemTypeGeneral::Strike | SequenceItemTypeGeneral::InPlay => {
                    counts.strikes += 1;
                    match pitch {
                        PitchType::CalledStrike => counts.called_strikes += 1,
                        PitchType::SwingingStrike
                        | PitchType::SwingingOnPitchout
                        | PitchType::MissedBunt => counts.swinging_strikes += 1,
                        PitchType::Foul
                        | PitchType::FoulBunt
                        | PitchType::FoulOnPitchout
                        | PitchType::FoulTip
                        | PitchType::FoulTipBunt => counts.foul_strikes += 1,
                        PitchType::InPlay | PitchType::InPlayOnPitchout => {
                            counts.in_play_strikes += 1;
                        }
                        _ => counts.other_strikes += 1,
                    }
                }
                SequenceItemTypeGeneral::NoPitch | SequenceItemTypeGeneral::Unknown => {}
            }
        }
        counts
    }
}

impl fmt::Display for PitchSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
