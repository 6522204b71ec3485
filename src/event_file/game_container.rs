use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::event_file::config::{GameConfig, Vocabulary};
use crate::event_file::game_state::GameState;
use crate::event_file::lineup::{Lineup, Player, PlayerList};
use crate::event_file::play::PlayAction;
use crate::event_file::traits::{FieldingPosition, Hand};
use crate::util::split_jersey_number;

/// A player as listed on a scraped lineup or roster page.
#[derive(Debug, Eq, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerEntry {
    pub name: String,
    pub number: Option<u8>,
    pub order: Option<u8>,
    /// Position wording, resolved through the vocabulary. Empty when unknown.
    pub position: String,
    pub bats: Option<String>,
    pub throws: Option<String>,
}

impl PlayerEntry {
    fn to_player(&self, vocabulary: &Vocabulary) -> Result<Player> {
        let position = if self.position.trim().is_empty() {
            FieldingPosition::Unknown
        } else {
            vocabulary.position(&self.position)?
        };
        let hand = |code: &Option<String>| code.as_deref().map(Hand::parse).transpose();
        let (scraped_number, name) = split_jersey_number(&self.name);
        Ok(Player::new(
            &name,
            self.number.or(scraped_number),
            self.order,
            position,
            hand(&self.bats)?,
        )
        .with_throws(hand(&self.throws)?))
    }
}

/// One block of play-by-play text with the actions the grammar layer
/// classified out of it.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayRecord {
    pub title: String,
    pub text: String,
    /// Set when the record opens a new plate appearance.
    pub batter_name: Option<String>,
    pub batter_number: Option<u8>,
    pub actions: Vec<PlayAction>,
}

/// A whole game as saved by the scraper: teams, lineups, rosters and the
/// play records of every half-inning in order.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameContainer {
    pub game_id: String,
    pub date: Option<NaiveDate>,
    pub away_team: String,
    pub home_team: String,
    pub away_lineup: Vec<PlayerEntry>,
    pub home_lineup: Vec<PlayerEntry>,
    /// Bench players. Lineup players need not be repeated here.
    pub away_roster: Vec<PlayerEntry>,
    pub home_roster: Vec<PlayerEntry>,
    pub halves: Vec<Vec<PlayRecord>>,
}

impl GameContainer {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open game file {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse game file {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create game file {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .with_context(|| format!("Failed to write game file {}", path.display()))
    }

    /// The explicit date, or the one embedded in a Retrosheet-style id
    /// such as `BOS198607040`.
    pub fn game_date(&self) -> Option<NaiveDate> {
        self.date.or_else(|| {
            self.game_id
                .get(3..11)
                .and_then(|digits| NaiveDate::parse_from_str(digits, "%Y%m%d").ok())
        })
    }

    fn lineup(entries: &[PlayerEntry], vocabulary: &Vocabulary) -> Result<Lineup> {
        let mut lineup = Lineup::new();
        for entry in entries {
            let player = entry
                .to_player(vocabulary)
                .with_context(|| format!("Bad lineup entry {:?}", entry.name))?;
            lineup.add_player(player)?;
        }
        Ok(lineup)
    }

    /// Lineup players come first so a bench player can be matched by number
    /// without shadowing a starter.
    fn roster(
        lineup: &[PlayerEntry],
        bench: &[PlayerEntry],
        vocabulary: &Vocabulary,
    ) -> Result<PlayerList> {
        let mut roster = PlayerList::new();
        for entry in lineup.iter().chain(bench) {
            let mut player = entry
                .to_player(vocabulary)
                .with_context(|| format!("Bad roster entry {:?}", entry.name))?;
            player.order = None;
            roster.update_player(player)?;
        }
        Ok(roster)
    }

    /// Replays every play record and returns the finished game.
    pub fn play(&self, config: Arc<GameConfig>) -> Result<GameState> {
        let vocabulary = &config.vocabulary;
        let mut state = GameState::new(&self.game_id, Arc::clone(&config))?;
        state.set_teams(&self.away_team, &self.home_team);
        state.set_date(self.game_date());
        state.set_away_lineup(Self::lineup(&self.away_lineup, vocabulary)?)?;
        state.set_home_lineup(Self::lineup(&self.home_lineup, vocabulary)?)?;
        state.set_away_roster(Self::roster(&self.away_lineup, &self.away_roster, vocabulary)?);
        state.set_home_roster(Self::roster(&self.home_lineup, &self.home_roster, vocabulary)?);

        for (half_index, half) in self.halves.iter().enumerate() {
            state.new_half()?;
            debug!("Game {} half {} has {} records", self.game_id, half_index + 1, half.len());
            for (record_index, record) in half.iter().enumerate() {
                Self::play_record(&mut state, record).with_context(|| {
                    format!(
                        "Failed on record {} of half {} ({:?})",
                        record_index + 1,
                        half_index + 1,
                        record.title
                    )
                })?;
            }
        }
        state.set_previous_event_as_game_end()?;
        Ok(state)
    }

    fn play_record(state: &mut GameState, record: &PlayRecord) -> Result<()> {
        state.describe(Some(&record.text));
        if let Some(batter) = &record.batter_name {
            let (scraped_number, name) = split_jersey_number(batter);
            state.new_batter(&name, record.batter_number.or(scraped_number))?;
        }
        for action in &record.actions {
            state.apply(action)?;
        }
        Ok(())
    }
}
