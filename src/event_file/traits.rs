use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result};
use fixed_map::Key;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use strum_macros::{Display, EnumIter, EnumString};

use crate::event_file::error::GameError;

pub type Inning = u8;
pub type Player = String;
pub type Pitcher = Player;
pub type Fielder = Player;

/// 1-based position of an event within a game's event log.
pub type EventId = u16;

#[derive(
    Debug,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Copy,
    Clone,
    Hash,
    Default,
    Serialize_repr,
    Deserialize_repr,
    Display,
)]
#[repr(u8)]
pub enum Side {
    #[default]
    Away = 0,
    Home = 1,
}

impl Side {
    pub const fn flip(self) -> Self {
        match self {
            Self::Away => Self::Home,
            Self::Home => Self::Away,
        }
    }
}

#[derive(Debug, Eq, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct Matchup<T> {
    pub away: T,
    pub home: T,
}

impl<T> Matchup<T> {
    pub const fn new(away: T, home: T) -> Self {
        Self { away, home }
    }

    pub const fn get(&self, side: Side) -> &T {
        match side {
            Side::Away => &self.away,
            Side::Home => &self.home,
        }
    }

    pub fn get_mut(&mut self, side: Side) -> &mut T {
        match side {
            Side::Away => &mut self.away,
            Side::Home => &mut self.home,
        }
    }
}

#[derive(Debug, Eq, PartialEq, Copy, Clone, Default, Display, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum InningFrame {
    #[default]
    Top = 0,
    Bottom = 1,
}

impl InningFrame {
    pub const fn flip(self) -> Self {
        match self {
            Self::Top => Self::Bottom,
            Self::Bottom => Self::Top,
        }
    }
}

/// A base a runner can be sent to. The discriminants double as Chadwick
/// destination codes, which is why the three ways of crossing the plate
/// are kept apart.
#[derive(
    Debug,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Copy,
    Clone,
    Hash,
    TryFromPrimitive,
    IntoPrimitive,
    Serialize_repr,
    Deserialize_repr,
)]
#[repr(u8)]
pub enum Base {
    First = 1,
    Second,
    Third,
    Home,
    HomeUnearned,
    HomeTeamUnearned,
}

impl Base {
    /// Position around the diamond, with every way of scoring collapsed to 4.
    pub fn order(self) -> u8 {
        let code: u8 = self.into();
        code.min(4)
    }

    pub const fn is_home(self) -> bool {
        matches!(self, Self::Home | Self::HomeUnearned | Self::HomeTeamUnearned)
    }

    /// The base after this one, if it is still on the field.
    pub const fn next(self) -> Self {
        match self {
            Self::First => Self::Second,
            Self::Second => Self::Third,
            _ => Self::Home,
        }
    }

    pub const fn from_order(order: u8) -> Result<Self, GameError> {
        match order {
            1 => Ok(Self::First),
            2 => Ok(Self::Second),
            3 => Ok(Self::Third),
            4 => Ok(Self::Home),
            _ => Err(GameError::InvalidBase(order)),
        }
    }

    /// Single character used in Chadwick advance notation.
    pub const fn code(self) -> char {
        match self {
            Self::First => '1',
            Self::Second => '2',
            Self::Third => '3',
            _ => 'H',
        }
    }
}

impl TryFrom<i64> for Base {
    type Error = GameError;

    fn try_from(value: i64) -> Result<Self, GameError> {
        let code = u8::try_from(value.clamp(0, i64::from(u8::MAX))).unwrap_or(u8::MAX);
        Self::try_from_primitive(code).map_err(|_| GameError::InvalidBase(code))
    }
}

/// The four slots a participant can occupy at the start of a play.
#[derive(Debug, Eq, PartialEq, Ord, PartialOrd, Copy, Clone, Hash, Key, EnumIter, Display)]
pub enum BaseRunner {
    #[strum(serialize = "B")]
    Batter,
    #[strum(serialize = "1")]
    First,
    #[strum(serialize = "2")]
    Second,
    #[strum(serialize = "3")]
    Third,
}

impl BaseRunner {
    pub const fn from_base(base: Base) -> Option<Self> {
        match base {
            Base::First => Some(Self::First),
            Base::Second => Some(Self::Second),
            Base::Third => Some(Self::Third),
            _ => None,
        }
    }

    pub const fn base(self) -> Option<Base> {
        match self {
            Self::Batter => None,
            Self::First => Some(Base::First),
            Self::Second => Some(Base::Second),
            Self::Third => Some(Base::Third),
        }
    }

    pub const fn index(self) -> usize {
        match self {
            Self::Batter => 0,
            Self::First => 1,
            Self::Second => 2,
            Self::Third => 3,
        }
    }
}

#[derive(
    Debug,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    TryFromPrimitive,
    IntoPrimitive,
    Copy,
    Clone,
    Hash,
    Default,
    Serialize_repr,
    Deserialize_repr,
)]
#[repr(u8)]
pub enum LineupPosition {
    #[default]
    First = 1,
    Second,
    Third,
    Fourth,
    Fifth,
    Sixth,
    Seventh,
    Eighth,
    Ninth,
}

impl LineupPosition {
    pub fn next(self) -> Self {
        match self {
            Self::Ninth => Self::First,
            _ => {
                let as_u8: u8 = self.into();
                Self::try_from(as_u8 + 1).unwrap_or(Self::First)
            }
        }
    }

    pub fn all() -> impl Iterator<Item = Self> {
        (1_u8..=9).filter_map(|i| Self::try_from(i).ok())
    }
}

impl fmt::Display for LineupPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let as_u8: u8 = (*self).into();
        write!(f, "{as_u8}")
    }
}

impl TryFrom<&str> for LineupPosition {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::try_from(value.trim().parse::<u8>()?).context("Unable to convert to lineup position")
    }
}

#[derive(
    Debug,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    TryFromPrimitive,
    IntoPrimitive,
    Copy,
    Clone,
    Hash,
    Default,
    Key,
    EnumIter,
    EnumString,
    Display,
    Serialize_repr,
    Deserialize_repr,
)]
#[repr(u8)]
pub enum FieldingPosition {
    #[default]
    #[strum(serialize = "?")]
    Unknown = 0,
    #[strum(serialize = "P")]
    Pitcher,
    #[strum(serialize = "C")]
    Catcher,
    #[strum(serialize = "1B")]
    FirstBaseman,
    #[strum(serialize = "2B")]
    SecondBaseman,
    #[strum(serialize = "3B")]
    ThirdBaseman,
    #[strum(serialize = "SS")]
    Shortstop,
    #[strum(serialize = "LF")]
    LeftFielder,
    #[strum(serialize = "CF")]
    CenterFielder,
    #[strum(serialize = "RF")]
    RightFielder,
    #[strum(serialize = "DH")]
    DesignatedHitter,
    #[strum(serialize = "PH")]
    PinchHitter,
    #[strum(serialize = "PR")]
    PinchRunner,
}

impl FieldingPosition {
    /// The nine positions that have to be filled on defense.
    pub const DEFENSE: [Self; 9] = [
        Self::Pitcher,
        Self::Catcher,
        Self::FirstBaseman,
        Self::SecondBaseman,
        Self::ThirdBaseman,
        Self::Shortstop,
        Self::LeftFielder,
        Self::CenterFielder,
        Self::RightFielder,
    ];

    pub const fn is_true_position(self) -> bool {
        !matches!(
            self,
            Self::Unknown | Self::DesignatedHitter | Self::PinchHitter | Self::PinchRunner
        )
    }

    pub fn code(self) -> u8 {
        self.into()
    }
}

#[derive(Debug, Eq, PartialEq, Copy, Clone, Hash, EnumString, Display, Serialize, Deserialize)]
pub enum Hand {
    #[strum(serialize = "L")]
    #[serde(rename = "L")]
    Left,
    #[strum(serialize = "R")]
    #[serde(rename = "R")]
    Right,
    #[strum(serialize = "S")]
    #[serde(rename = "S")]
    Switch,
    #[strum(serialize = "B")]
    #[serde(rename = "B")]
    Both,
}

impl Hand {
    pub fn parse(code: &str) -> Result<Self, GameError> {
        Self::from_str(code.trim()).map_err(|_| GameError::InvalidHand(code.to_string()))
    }

    /// Switch hitters bat from the side opposite the pitcher's arm.
    pub const fn batting_against(self, pitcher: Option<Self>) -> Self {
        match (self, pitcher) {
            (Self::Switch | Self::Both, Some(Self::Left)) => Self::Right,
            (Self::Switch | Self::Both, _) => Self::Left,
            (h, _) => h,
        }
    }
}
