use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::event_file::error::GameError;
use crate::event_file::traits::{Base, FieldingPosition};
use crate::util::normalize_key;

lazy_static! {
    static ref DEFAULT_BASES: HashMap<&'static str, Base> = {
        let mut m = HashMap::new();
        for key in ["1", "1b", "1st", "1st base", "first", "first base"] {
            m.insert(key, Base::First);
        }
        for key in ["2", "2b", "2nd", "2nd base", "second", "second base"] {
            m.insert(key, Base::Second);
        }
        for key in ["3", "3b", "3rd", "3rd base", "third", "third base"] {
            m.insert(key, Base::Third);
        }
        for key in ["4", "h", "home", "home plate", "plate", "scores", "scored"] {
            m.insert(key, Base::Home);
        }
        m
    };
    static ref DEFAULT_POSITIONS: HashMap<&'static str, FieldingPosition> = {
        let mut m = HashMap::new();
        let table: [(FieldingPosition, &[&'static str]); 12] = [
            (FieldingPosition::Pitcher, &["p", "pitcher", "pitching"]),
            (FieldingPosition::Catcher, &["c", "catcher", "catching"]),
            (
                FieldingPosition::FirstBaseman,
                &["1b", "first base", "1st base", "1st", "first baseman"],
            ),
            (
                FieldingPosition::SecondBaseman,
                &["2b", "second base", "2nd base", "2nd", "second baseman"],
            ),
            (
                FieldingPosition::ThirdBaseman,
                &["3b", "third base", "3rd base", "3rd", "third baseman"],
            ),
            (FieldingPosition::Shortstop, &["ss", "short stop", "shortstop", "short"]),
            (FieldingPosition::LeftFielder, &["lf", "left field", "left", "left fielder"]),
            (
                FieldingPosition::CenterFielder,
                &["cf", "center field", "center", "center fielder"],
            ),
            (
                FieldingPosition::RightFielder,
                &["rf", "right field", "right", "right fielder"],
            ),
            (FieldingPosition::DesignatedHitter, &["dh", "designated hitter"]),
            (FieldingPosition::PinchHitter, &["ph", "pinch hitter"]),
            (FieldingPosition::PinchRunner, &["pr", "pinch runner"]),
        ];
        for (position, keys) in table {
            for key in keys {
                m.insert(*key, position);
            }
        }
        m
    };
}

/// Extra textual synonyms layered over the built-in base and position tables.
/// Keys are matched case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vocabulary {
    /// Synonym to base number (1-4).
    pub bases: HashMap<String, u8>,
    /// Synonym to canonical position abbreviation ("SS", "LF", ...).
    pub positions: HashMap<String, String>,
}

impl Vocabulary {
    fn custom_base(&self, key: &str) -> Option<u8> {
        self.bases
            .iter()
            .find_map(|(k, v)| (normalize_key(k) == key).then_some(*v))
    }

    fn custom_position(&self, key: &str) -> Option<&str> {
        self.positions
            .iter()
            .find_map(|(k, v)| (normalize_key(k) == key).then_some(v.as_str()))
    }

    pub fn base(&self, text: &str) -> Result<Base, GameError> {
        let key = normalize_key(text);
        if let Some(order) = self.custom_base(&key) {
            return Base::from_order(order);
        }
        if let Some(base) = DEFAULT_BASES.get(key.as_str()) {
            return Ok(*base);
        }
        key.parse::<u8>()
            .map_err(|_| GameError::UnknownBase(text.to_string()))
            .and_then(Base::from_order)
    }

    pub fn position(&self, text: &str) -> Result<FieldingPosition, GameError> {
        let key = normalize_key(text);
        let unknown = || GameError::UnknownPosition(text.to_string());
        if let Some(canonical) = self.custom_position(&key) {
            return FieldingPosition::from_str(&canonical.to_ascii_uppercase())
                .map_err(|_| unknown());
        }
        if let Some(pos) = DEFAULT_POSITIONS.get(key.as_str()) {
            return Ok(*pos);
        }
        match key.parse::<u8>() {
            Ok(code) => FieldingPosition::try_from(code)
                .ok()
                .filter(|p| *p != FieldingPosition::Unknown)
                .ok_or_else(unknown),
            Err(_) => Err(unknown()),
        }
    }
}

const fn default_threshold() -> f64 {
    0.85
}

const fn default_true() -> bool {
    true
}

/// Engine settings, loaded once and shared by every game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Minimum normalized Levenshtein similarity for a fuzzy name match.
    #[serde(default = "default_threshold")]
    pub name_match_threshold: f64,
    /// Pull a missing batter from the roster into the expected batting slot.
    #[serde(default = "default_true")]
    pub auto_substitute_from_roster: bool,
    /// Swap batting order numbers when the wrong batter appears and neither has batted.
    #[serde(default = "default_true")]
    pub auto_swap_batting_order: bool,
    pub vocabulary: Vocabulary,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            name_match_threshold: default_threshold(),
            auto_substitute_from_roster: true,
            auto_swap_batting_order: true,
            vocabulary: Vocabulary::default(),
        }
    }
}

impl GameConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open config file {}", path.display()))?;
        let config: Self = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.name_match_threshold > 0.0 && self.name_match_threshold <= 1.0) {
            bail!(
                "name_match_threshold must be in (0, 1], got {}",
                self.name_match_threshold
            )
        }
        for (synonym, order) in &self.vocabulary.bases {
            Base::from_order(*order).with_context(|| format!("Bad base synonym {synonym:?}"))?;
        }
        for (synonym, canonical) in &self.vocabulary.positions {
            FieldingPosition::from_str(&canonical.to_ascii_uppercase())
                .map_err(|_| GameError::UnknownPosition(canonical.clone()))
                .with_context(|| format!("Bad position synonym {synonym:?}"))?;
        }
        Ok(())
    }
}
