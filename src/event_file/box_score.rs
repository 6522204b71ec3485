use chrono::NaiveDate;
use serde::Serialize;

use crate::event_file::lineup::{BattingCounters, Player};
use crate::event_file::traits::{FieldingPosition, LineupPosition, Side};

/// Box score batting line for one player, built from the counters the
/// engine keeps while it replays the game.
#[derive(Debug, Eq, PartialEq, Clone, Serialize)]
pub struct BattingLine {
    pub game_id: String,
    pub date: Option<NaiveDate>,
    pub side: Side,
    pub team_id: String,
    pub player_id: String,
    pub lineup_position: Option<LineupPosition>,
    pub fielding_position: FieldingPosition,
    pub pa: u8,
    pub ab: u8,
    pub r: u8,
    pub h: u8,
    pub doubles: u8,
    pub triples: u8,
    pub hr: u8,
    pub rbi: u8,
    pub bb: u8,
    pub ibb: u8,
    pub so: u8,
    pub hbp: u8,
    pub sh: u8,
    pub sf: u8,
    pub reached_on_error: u8,
    pub sb: u8,
    pub cs: u8,
}

impl BattingLine {
    pub fn new(
        game_id: &str,
        date: Option<NaiveDate>,
        side: Side,
        team_id: &str,
        player: &Player,
    ) -> Self {
        let BattingCounters {
            pa,
            ab,
            r,
            h,
            doubles,
            triples,
            hr,
            rbi,
            bb,
            ibb,
            so,
            hbp,
            sh,
            sf,
            reached_on_error,
            sb,
            cs,
        } = player.stats;
        Self {
            game_id: game_id.to_string(),
            date,
            side,
            team_id: team_id.to_string(),
            player_id: player.name.clone(),
            lineup_position: player.order,
            fielding_position: player.position,
            pa,
            ab,
            r,
            h,
            doubles,
            triples,
            hr,
            rbi,
            bb,
            ibb,
            so,
            hbp,
            sh,
            sf,
            reached_on_error,
            sb,
            cs,
        }
    }

    /// Total bases, for quick sanity checks against published box scores.
    pub fn total_bases(&self) -> u16 {
        let singles = self.h.saturating_sub(self.doubles + self.triples + self.hr);
        u16::from(singles)
            + 2 * u16::from(self.doubles)
            + 3 * u16::from(self.triples)
            + 4 * u16::from(self.hr)
    }
}
