use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use strum_macros::Display;

use crate::event_file::pitch_sequence::PitchType;
use crate::event_file::traits::Base;

/// Chadwick `EVENT_CD` values the engine can produce.
#[derive(Debug, Eq, PartialEq, Copy, Clone, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum EventType {
    GenericOut = 2,
    StrikeOut = 3,
    StolenBase = 4,
    DefensiveIndifference = 5,
    CaughtStealing = 6,
    Pickoff = 8,
    WildPitch = 9,
    PassedBall = 10,
    Balk = 11,
    OtherAdvance = 12,
    FoulError = 13,
    Walk = 14,
    IntentionalWalk = 15,
    HitByPitch = 16,
    Interference = 17,
    Error = 18,
    FieldersChoice = 19,
    Single = 20,
    Double = 21,
    Triple = 22,
    HomeRun = 23,
}

impl EventType {
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn hit_value(self) -> u8 {
        match self {
            Self::Single => 1,
            Self::Double => 2,
            Self::Triple => 3,
            Self::HomeRun => 4,
            _ => 0,
        }
    }

    /// Plate appearances that do not count as at-bats, before sacrifices are considered.
    pub const fn is_free_pass(self) -> bool {
        matches!(
            self,
            Self::Walk | Self::IntentionalWalk | Self::HitByPitch | Self::Interference
        )
    }
}

#[derive(Debug, Eq, PartialEq, Copy, Clone, Display, Serialize, Deserialize)]
pub enum BattedBall {
    #[strum(serialize = "G")]
    #[serde(rename = "G")]
    Ground,
    #[strum(serialize = "L")]
    #[serde(rename = "L")]
    Line,
    #[strum(serialize = "F")]
    #[serde(rename = "F")]
    Fly,
    #[strum(serialize = "P")]
    #[serde(rename = "P")]
    Popup,
}

#[derive(Debug, Eq, PartialEq, Copy, Clone, Display, Serialize, Deserialize)]
pub enum ErrorType {
    #[strum(serialize = "F")]
    #[serde(rename = "F")]
    Fielding,
    #[strum(serialize = "T")]
    #[serde(rename = "T")]
    Throwing,
    #[strum(serialize = "D")]
    #[serde(rename = "D")]
    DroppedFoul,
}

#[derive(Debug, Eq, PartialEq, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PitchKind {
    Ball,
    IntentionalBall,
    CalledStrike,
    SwingingStrike,
    Foul,
    FoulTip,
    FoulBunt,
    MissedBunt,
    Pitchout,
    Unknown,
}

impl PitchKind {
    pub const fn pitch_type(self) -> PitchType {
        match self {
            Self::Ball => PitchType::Ball,
            Self::IntentionalBall => PitchType::IntentionalBall,
            Self::CalledStrike => PitchType::CalledStrike,
            Self::SwingingStrike => PitchType::SwingingStrike,
            Self::Foul => PitchType::Foul,
            Self::FoulTip => PitchType::FoulTip,
            Self::FoulBunt => PitchType::FoulBunt,
            Self::MissedBunt => PitchType::MissedBunt,
            Self::Pitchout => PitchType::Pitchout,
            Self::Unknown => PitchType::Unknown,
        }
    }
}

#[derive(Debug, Eq, PartialEq, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutKind {
    ThrownOut,
    CaughtStealing,
    PickedOff,
    FlyOut,
    LineOut,
    Popup,
    StrikeOut,
    Unassisted,
    DroppedThirdStrike,
}

impl OutKind {
    pub const fn batted_ball(self) -> Option<BattedBall> {
        match self {
            Self::ThrownOut | Self::Unassisted => Some(BattedBall::Ground),
            Self::FlyOut => Some(BattedBall::Fly),
            Self::LineOut => Some(BattedBall::Line),
            Self::Popup => Some(BattedBall::Popup),
            _ => None,
        }
    }

    /// Outs that can happen while the plate appearance is still going on.
    pub const fn is_runner_only(self) -> bool {
        matches!(self, Self::CaughtStealing | Self::PickedOff)
    }

    pub const fn is_strikeout(self) -> bool {
        matches!(self, Self::StrikeOut | Self::DroppedThirdStrike)
    }
}

#[derive(Debug, Eq, PartialEq, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitKind {
    Single,
    Double,
    GroundRuleDouble,
    Triple,
    HomeRun,
}

impl HitKind {
    pub const fn event_type(self) -> EventType {
        match self {
            Self::Single => EventType::Single,
            Self::Double | Self::GroundRuleDouble => EventType::Double,
            Self::Triple => EventType::Triple,
            Self::HomeRun => EventType::HomeRun,
        }
    }

    pub const fn base(self) -> Base {
        match self {
            Self::Single => Base::First,
            Self::Double | Self::GroundRuleDouble => Base::Second,
            Self::Triple => Base::Third,
            Self::HomeRun => Base::Home,
        }
    }

    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Single => "S",
            Self::Double => "D",
            Self::GroundRuleDouble => "DGR",
            Self::Triple => "T",
            Self::HomeRun => "HR",
        }
    }
}

#[derive(Debug, Eq, PartialEq, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvanceReason {
    /// Moved up on the batter's play.
    OnPlay,
    Throw,
    Error,
    ThrowingError,
    FieldersChoice,
    GroundRule,
    Walk,
    IntentionalWalk,
    HitByPitch,
    Interference,
    DroppedThirdStrike,
    WildPitch,
    PassedBall,
    StolenBase,
    Balk,
    DefensiveIndifference,
}

impl AdvanceReason {
    /// Advances that make their own event when no batting result is on the play yet.
    pub const fn is_runner_only(self) -> bool {
        matches!(
            self,
            Self::WildPitch
                | Self::PassedBall
                | Self::StolenBase
                | Self::Balk
                | Self::DefensiveIndifference
                | Self::Error
                | Self::ThrowingError
        )
    }

    pub const fn blocks_rbi(self) -> bool {
        matches!(
            self,
            Self::Error
                | Self::ThrowingError
                | Self::WildPitch
                | Self::PassedBall
                | Self::Balk
                | Self::StolenBase
                | Self::DefensiveIndifference
        )
    }

    pub const fn error_type(self) -> Option<ErrorType> {
        match self {
            Self::Error => Some(ErrorType::Fielding),
            Self::ThrowingError => Some(ErrorType::Throwing),
            _ => None,
        }
    }

    /// Event type when this advance stands alone.
    pub const fn runner_event_type(self) -> EventType {
        match self {
            Self::WildPitch => EventType::WildPitch,
            Self::PassedBall => EventType::PassedBall,
            Self::StolenBase => EventType::StolenBase,
            Self::Balk => EventType::Balk,
            Self::DefensiveIndifference => EventType::DefensiveIndifference,
            _ => EventType::OtherAdvance,
        }
    }

    /// Result for the batter when the batter is the one advancing.
    pub const fn batter_event_type(self) -> Option<EventType> {
        match self {
            Self::Walk => Some(EventType::Walk),
            Self::IntentionalWalk => Some(EventType::IntentionalWalk),
            Self::HitByPitch => Some(EventType::HitByPitch),
            Self::Interference => Some(EventType::Interference),
            Self::DroppedThirdStrike => Some(EventType::StrikeOut),
            Self::Error | Self::ThrowingError => Some(EventType::Error),
            Self::FieldersChoice => Some(EventType::FieldersChoice),
            _ => None,
        }
    }
}

/// Modifiers the grammar layer attaches to an out.
#[derive(Debug, Eq, PartialEq, Copy, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutModifiers {
    pub double_play: bool,
    pub triple_play: bool,
    pub sacrifice: bool,
    pub bunt: bool,
    pub foul: bool,
}

const fn earned_by_default() -> bool {
    true
}

/// One classified action from the grammar layer. Base and position fields
/// carry the scraped wording and are resolved through the game's vocabulary.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlayAction {
    Pitch {
        pitch: PitchKind,
    },
    PickoffAttempt {
        base: String,
    },
    DroppedFoul {
        fielder: String,
    },
    Out {
        how: OutKind,
        /// `None` when the batter is out.
        #[serde(default)]
        runner: Option<String>,
        #[serde(default)]
        fielders: Vec<String>,
        #[serde(default)]
        base: Option<String>,
        #[serde(default)]
        modifiers: OutModifiers,
    },
    Hit {
        hit: HitKind,
        #[serde(default)]
        fielder: Option<String>,
    },
    Advance {
        /// `None` when the batter is the one advancing.
        #[serde(default)]
        runner: Option<String>,
        to: String,
        reason: AdvanceReason,
        #[serde(default)]
        fielder: Option<String>,
    },
    Score {
        runner: String,
        #[serde(default = "earned_by_default")]
        earned: bool,
    },
    DefensiveSub {
        player: String,
        #[serde(default)]
        replacing: Option<String>,
        #[serde(default)]
        position: Option<String>,
    },
    OffensiveSub {
        player: String,
        replacing: String,
        #[serde(default)]
        pinch_runner: bool,
        #[serde(default)]
        base: Option<String>,
    },
}
