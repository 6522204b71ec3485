use std::mem;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrayvec::ArrayVec;
use bounded_integer::BoundedU8;
use chrono::NaiveDate;
use fixed_map::Map;
use itertools::Itertools;
use tracing::{debug, warn};

use crate::event_file::bases::{Bases, FateId, RunnerOrigin};
use crate::event_file::box_score::BattingLine;
use crate::event_file::config::GameConfig;
use crate::event_file::error::GameError;
use crate::event_file::lineup::{Lineup, Player, PlayerList};
use crate::event_file::pitch_sequence::{Count, PitchSequence, PitchType};
use crate::event_file::play::{
    AdvanceReason, BattedBall, ErrorType, EventType, HitKind, OutKind, OutModifiers, PitchKind,
    PlayAction,
};
use crate::event_file::schemas::Event;
use crate::event_file::traits::{
    Base, BaseRunner, EventId, FieldingPosition, Inning, InningFrame, LineupPosition, Matchup,
    Player as PlayerName, Side,
};
use crate::util::name_similarity;

pub type Outs = BoundedU8<0, 3>;

const ON_BASE: [BaseRunner; 3] = [BaseRunner::First, BaseRunner::Second, BaseRunner::Third];

fn fielder_digits(fielders: &[FieldingPosition]) -> String {
    fielders.iter().map(|f| f.code().to_string()).join("")
}

fn fate_code(bases: &Bases, fate: Option<FateId>) -> u8 {
    fate.and_then(|id| bases.fate_for(id)).map_or(0, Base::order)
}

/// Who was on the field when a play began.
#[derive(Debug, Eq, PartialEq, Clone, Default)]
pub(crate) struct Personnel {
    pub batter: Option<Player>,
    pub pitcher: Option<Player>,
    pub fielders: Map<FieldingPosition, PlayerName>,
}

#[derive(Debug, Eq, PartialEq, Clone)]
pub(crate) struct Movement {
    pub end: Base,
    pub out: bool,
    /// Fielding sequence on a play against this runner, e.g. "64".
    pub play_text: String,
    pub notes: String,
    /// Already expressed by the primary event text.
    pub implied: bool,
}

#[derive(Debug, Eq, PartialEq, Clone)]
pub(crate) struct RunScored {
    pub runner: PlayerName,
    pub rbi_eligible: bool,
}

/// Everything that happens on one event while it is being assembled.
#[derive(Debug, Eq, PartialEq, Clone, Default)]
pub(crate) struct PlayBuffer {
    pub event_type: Option<EventType>,
    /// Primary text for the batter's result ("S8", "63", "W").
    pub outcome: Option<String>,
    pub runner_texts: Vec<String>,
    pub implied_batter: Option<Base>,
    pub moves: [Option<Movement>; 4],
    pub batter_fate: Option<FateId>,
    pub outs_on_play: u8,
    pub runs: Vec<RunScored>,
    pub rbi: u8,
    pub rbi_blocked: bool,
    pub sacrifice_hit: bool,
    pub sacrifice_fly: bool,
    pub double_play: bool,
    pub triple_play: bool,
    pub wild_pitch: bool,
    pub passed_ball: bool,
    pub bunt: bool,
    pub foul: bool,
    pub fielded_by: FieldingPosition,
    pub batted_ball: Option<BattedBall>,
    pub hit_location: Option<String>,
    pub putouts: ArrayVec<FieldingPosition, 3>,
    pub assists: ArrayVec<FieldingPosition, 10>,
    pub errors: ArrayVec<(FieldingPosition, ErrorType), 3>,
    pub stolen: [bool; 4],
    pub caught: [bool; 4],
    pub picked_off: [bool; 4],
    pub batter_safe_on_error: bool,
    pub terminal_pitch: Option<PitchType>,
    pub unknown_fielding: bool,
    pub personnel: Option<Personnel>,
    pub descriptions: Vec<String>,
}

impl PlayBuffer {
    fn with_personnel(personnel: Personnel) -> Self {
        Self {
            personnel: Some(personnel),
            ..Self::default()
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.event_type.is_none()
            && self.outs_on_play == 0
            && self.runner_texts.is_empty()
            && self.errors.is_empty()
            && self.moves.iter().all(Option::is_none)
    }

    pub(crate) const fn has_outcome(&self) -> bool {
        self.outcome.is_some()
    }

    pub(crate) fn event_type(&self) -> EventType {
        self.event_type.unwrap_or(if self.outs_on_play > 0 {
            EventType::GenericOut
        } else {
            EventType::OtherAdvance
        })
    }

    pub(crate) fn is_at_bat(&self) -> bool {
        !self.event_type().is_free_pass() && !self.sacrifice_hit && !self.sacrifice_fly
    }

    pub(crate) fn movement(&self, baserunner: BaseRunner) -> Option<&Movement> {
        self.moves[baserunner.index()].as_ref()
    }

    fn move_runner(
        &mut self,
        baserunner: BaseRunner,
        end: Base,
        out: bool,
        play_text: &str,
        note: &str,
        implied: bool,
    ) {
        match &mut self.moves[baserunner.index()] {
            Some(m) => {
                m.end = end;
                m.out = out;
                m.notes.push_str(note);
                if !play_text.is_empty() {
                    m.play_text = play_text.to_string();
                }
                m.implied &= implied;
            }
            slot @ None => {
                *slot = Some(Movement {
                    end,
                    out,
                    play_text: play_text.to_string(),
                    notes: note.to_string(),
                    implied,
                });
            }
        }
    }

    fn set_event_type(&mut self, event_type: EventType) {
        if self.event_type.is_none() {
            self.event_type = Some(event_type);
        }
    }

    fn push_runner_text(&mut self, text: String) {
        if !self.runner_texts.contains(&text) {
            self.runner_texts.push(text);
        }
    }

    /// Putout to the last fielder in the sequence, assists to the others.
    fn credit_out(&mut self, fielders: &[FieldingPosition]) {
        let Some((putout, assists)) = fielders.split_last() else {
            self.unknown_fielding = true;
            return;
        };
        if self.putouts.try_push(*putout).is_err() {
            warn!("More than three putouts on one play, dropping {}", putout);
        }
        for assist in assists.iter().filter(|a| *a != putout).unique() {
            if !self.assists.contains(assist) && self.assists.try_push(*assist).is_err() {
                warn!("More than ten assists on one play, dropping {}", assist);
            }
        }
    }

    /// One misplay is charged once, however many runners advance on it.
    fn add_error(&mut self, fielder: FieldingPosition, kind: ErrorType) {
        if self.errors.contains(&(fielder, kind)) {
            return;
        }
        if self.errors.try_push((fielder, kind)).is_err() {
            warn!("More than three errors on one play, dropping E{}", fielder.code());
        }
    }

    fn describe(&mut self, text: Option<&str>) {
        if let Some(text) = text {
            if self.descriptions.last().map(String::as_str) != Some(text) {
                self.descriptions.push(text.to_string());
            }
        }
    }

    fn finalize(&mut self, batting: bool) {
        if batting {
            match self.outs_on_play {
                2 => self.double_play = true,
                3 => self.triple_play = true,
                _ => {}
            }
        }
        let eligible = batting && !self.double_play && !self.triple_play && !self.rbi_blocked;
        self.rbi = if eligible {
            u8::try_from(self.runs.iter().filter(|r| r.rbi_eligible).count()).unwrap_or(u8::MAX)
        } else {
            0
        };
    }

    /// Chadwick style event text, e.g. `S8.2-H;1-3`.
    pub(crate) fn text(&self) -> String {
        let mut text = match (&self.outcome, self.runner_texts.is_empty()) {
            (Some(outcome), true) => outcome.clone(),
            (Some(outcome), false) => format!("{}+{}", outcome, self.runner_texts.join(";")),
            (None, false) => self.runner_texts.join(";"),
            (None, true) => "OA".to_string(),
        };
        let modifiers = [
            (self.sacrifice_hit, "/SH"),
            (self.sacrifice_fly, "/SF"),
            (self.double_play, "/DP"),
            (self.triple_play, "/TP"),
        ];
        for (flag, modifier) in modifiers {
            if flag {
                text.push_str(modifier);
            }
        }
        if let Some(batted_ball) = self.batted_ball {
            text.push('/');
            text.push_str(&batted_ball.to_string());
        }
        let advances = [
            BaseRunner::Third,
            BaseRunner::Second,
            BaseRunner::First,
            BaseRunner::Batter,
        ]
        .into_iter()
        .filter_map(|br| self.movement(br).map(|m| (br, m)))
        .filter(|(br, m)| {
            let implied_batter = *br == BaseRunner::Batter
                && !m.out
                && Some(m.end) == self.implied_batter
                && m.notes.is_empty();
            !m.implied && !implied_batter
        })
        .map(|(br, m)| {
            let sep = if m.out { 'X' } else { '-' };
            format!("{}{}{}{}", br, sep, m.end.code(), m.notes)
        })
        .join(";");
        if !advances.is_empty() {
            text.push('.');
            text.push_str(&advances);
        }
        text
    }
}

#[derive(Debug, Eq, PartialEq, Clone)]
pub(crate) struct PinchHit {
    pub batter: PlayerName,
    pub replaced: PlayerName,
    pub replaced_position: FieldingPosition,
}

/// State that only matters for the current plate appearance.
#[derive(Debug, Eq, PartialEq, Clone, Default)]
pub(crate) struct RareAttributes {
    pub strikeout_responsible_batter: Option<PlayerName>,
    pub walk_responsible_pitcher: Option<PlayerName>,
    pub pinch_hit: Option<PinchHit>,
}

#[derive(Debug, Eq, PartialEq, Clone)]
pub(crate) struct StartRunner {
    pub name: PlayerName,
    pub fate: FateId,
    pub pinch_runner: bool,
    pub replaced: Option<PlayerName>,
}

/// Situation at the start of the play being assembled.
#[derive(Debug, Eq, PartialEq, Clone, Default)]
pub(crate) struct PlayStart {
    pub outs: u8,
    pub score: Matchup<u16>,
    pub runners: [Option<StartRunner>; 3],
    pub bases_cd: u8,
    pub half_runs: u8,
}

impl PlayStart {
    pub(crate) fn runner(&self, baserunner: BaseRunner) -> Option<&StartRunner> {
        baserunner
            .index()
            .checked_sub(1)
            .and_then(|i| self.runners[i].as_ref())
    }
}

#[derive(Debug, PartialEq, Clone)]
struct HeldEvent {
    event: Event,
    batter_fate: Option<FateId>,
    runner_fates: [Option<FateId>; 3],
    runs_through: u8,
}

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
enum Target {
    Batting,
    Runner,
}

/// Rebuilds a game from classified play actions and emits one Chadwick
/// event per play.
#[derive(Debug, Clone)]
pub struct GameState {
    config: Arc<GameConfig>,
    pub(crate) game_id: String,
    pub(crate) date: Option<NaiveDate>,
    pub(crate) teams: Matchup<String>,
    pub(crate) lineups: Matchup<Lineup>,
    pub(crate) rosters: Matchup<PlayerList>,
    pub(crate) starters: Matchup<Vec<PlayerName>>,
    pub(crate) starting_pitchers: Matchup<Option<PlayerName>>,
    pub(crate) uses_dh: bool,
    pub(crate) left_on_base: Matchup<u16>,
    pub(crate) inning: Inning,
    pub(crate) frame: InningFrame,
    pub(crate) batting_side: Side,
    pub(crate) outs: Outs,
    pub(crate) score: Matchup<u16>,
    pub(crate) count: Count,
    pub(crate) pitches: PitchSequence,
    pub(crate) bases: Bases,
    pub(crate) batter: Option<PlayerName>,
    pub(crate) at_bat: Matchup<LineupPosition>,
    pub(crate) rare: RareAttributes,
    pub(crate) start: PlayStart,
    pub(crate) event_id: EventId,
    pub(crate) half_runs: u8,
    pub(crate) plate_appearances: Matchup<u16>,
    pub(crate) half_plate_appearances: u8,
    pub(crate) leadoff: bool,
    pub(crate) new_plate_appearance: bool,
    plate_appearance_open: bool,
    first_batter_of_half: bool,
    game_over: bool,
    play: PlayBuffer,
    pending_runner: Option<PlayBuffer>,
    half_events: Vec<HeldEvent>,
    events: Vec<Event>,
    current_text: Option<String>,
}

impl GameState {
    pub fn new(game_id: &str, config: Arc<GameConfig>) -> Result<Self> {
        Ok(Self {
            config,
            game_id: game_id.to_string(),
            date: None,
            teams: Matchup::default(),
            lineups: Matchup::default(),
            rosters: Matchup::default(),
            starters: Matchup::default(),
            starting_pitchers: Matchup::default(),
            uses_dh: false,
            left_on_base: Matchup::default(),
            inning: 0,
            frame: InningFrame::Top,
            batting_side: Side::Away,
            outs: Outs::new(0).context("Unexpected outs bound error")?,
            score: Matchup::default(),
            count: Count::default(),
            pitches: PitchSequence::default(),
            bases: Bases::new(),
            batter: None,
            at_bat: Matchup::default(),
            rare: RareAttributes::default(),
            start: PlayStart::default(),
            event_id: 1,
            half_runs: 0,
            plate_appearances: Matchup::default(),
            half_plate_appearances: 0,
            leadoff: false,
            new_plate_appearance: false,
            plate_appearance_open: false,
            first_batter_of_half: false,
            game_over: false,
            play: PlayBuffer::default(),
            pending_runner: None,
            half_events: Vec::with_capacity(20),
            events: Vec::with_capacity(100),
            current_text: None,
        })
    }

    pub fn set_date(&mut self, date: Option<NaiveDate>) {
        self.date = date;
    }

    pub fn set_teams(&mut self, away: &str, home: &str) {
        self.teams = Matchup::new(away.to_string(), home.to_string());
    }

    fn set_lineup(&mut self, side: Side, lineup: Lineup) -> Result<()> {
        lineup
            .validate()
            .with_context(|| format!("Invalid {side} lineup for {}", self.game_id))?;
        *self.starters.get_mut(side) = lineup.players().iter().map(|p| p.name.clone()).collect();
        *self.starting_pitchers.get_mut(side) = lineup
            .find_player_by_position(FieldingPosition::Pitcher)
            .ok()
            .map(|p| p.name.clone());
        self.uses_dh |= lineup.has_position(FieldingPosition::DesignatedHitter);
        *self.lineups.get_mut(side) = lineup;
        Ok(())
    }

    pub fn set_away_lineup(&mut self, lineup: Lineup) -> Result<()> {
        self.set_lineup(Side::Away, lineup)
    }

    pub fn set_home_lineup(&mut self, lineup: Lineup) -> Result<()> {
        self.set_lineup(Side::Home, lineup)
    }

    pub fn set_away_roster(&mut self, roster: PlayerList) {
        self.rosters.away = roster;
    }

    pub fn set_home_roster(&mut self, roster: PlayerList) {
        self.rosters.home = roster;
    }

    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    pub const fn inning(&self) -> Inning {
        self.inning
    }

    pub const fn frame(&self) -> InningFrame {
        self.frame
    }

    pub const fn batting_side(&self) -> Side {
        self.batting_side
    }

    pub fn outs(&self) -> u8 {
        self.outs.get()
    }

    pub const fn score(&self) -> &Matchup<u16> {
        &self.score
    }

    pub const fn count(&self) -> Count {
        self.count
    }

    pub fn pitch_sequence(&self) -> &str {
        self.pitches.as_str()
    }

    pub const fn bases(&self) -> &Bases {
        &self.bases
    }

    pub fn batter(&self) -> Option<&str> {
        self.batter.as_deref()
    }

    pub const fn lineup(&self, side: Side) -> &Lineup {
        self.lineups.get(side)
    }

    pub const fn is_over(&self) -> bool {
        self.game_over
    }

    /// Events of every half-inning that has been closed.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    pub fn batting_lines(&self) -> Vec<BattingLine> {
        [Side::Away, Side::Home]
            .into_iter()
            .flat_map(|side| {
                self.lineups
                    .get(side)
                    .all_players()
                    .map(move |p| {
                        BattingLine::new(&self.game_id, self.date, side, self.teams.get(side), p)
                    })
            })
            .collect()
    }

    /// Source text attached to the events touched by the following actions.
    pub fn describe(&mut self, text: Option<&str>) {
        self.current_text = text.map(str::to_string);
    }

    fn location(&self) -> String {
        format!(
            "Failed in {} of inning {} at event {} (batter {})",
            self.frame,
            self.inning,
            self.event_id,
            self.batter.as_deref().unwrap_or("none")
        )
    }

    const fn ensure_active(&self) -> Result<(), GameError> {
        if self.game_over {
            Err(GameError::GameOver)
        } else {
            Ok(())
        }
    }

    pub(crate) fn is_first_event_of_half(&self) -> bool {
        self.half_events.is_empty()
    }

    pub(crate) fn find_participant(&self, side: Side, name: &str) -> Option<&Player> {
        self.lineups.get(side).all_players().find(|p| p.name == name)
    }

    fn current_pitcher(&self) -> Option<&Player> {
        self.lineups
            .get(self.batting_side.flip())
            .find_player_by_position(FieldingPosition::Pitcher)
            .ok()
    }

    fn personnel(&self) -> Personnel {
        let batter = self
            .batter
            .as_deref()
            .and_then(|b| self.lineups.get(self.batting_side).find_player_by_name(b).ok())
            .cloned();
        Personnel {
            batter,
            pitcher: self.current_pitcher().cloned(),
            fielders: self.lineups.get(self.batting_side.flip()).position_map(),
        }
    }

    fn batting_play(&mut self) -> &mut PlayBuffer {
        if self.play.personnel.is_none() {
            self.play.personnel = Some(self.personnel());
        }
        self.play.describe(self.current_text.as_deref());
        &mut self.play
    }

    fn runner_play(&mut self) -> &mut PlayBuffer {
        if self.pending_runner.is_none() {
            self.pending_runner = Some(PlayBuffer::with_personnel(self.personnel()));
        }
        let text = self.current_text.as_deref();
        let play = self.pending_runner.get_or_insert_with(PlayBuffer::default);
        play.describe(text);
        play
    }

    fn play_mut(&mut self, target: Target) -> &mut PlayBuffer {
        match target {
            Target::Batting => self.batting_play(),
            Target::Runner => self.runner_play(),
        }
    }

    /// Runner-only actions start their own event unless the batting play is
    /// already under way. Anything else closes a pending runner event first.
    fn target_for(&mut self, runner_only: bool) -> Target {
        if runner_only && self.play.is_empty() {
            Target::Runner
        } else {
            self.flush_pending_runner();
            Target::Batting
        }
    }

    fn flush_pending_runner(&mut self) {
        if let Some(play) = self.pending_runner.take() {
            self.record(play, false);
            self.pitches.mark_interruption();
        }
    }

    /// Start slot of a runner on the play being assembled.
    fn slot_of(&self, target: Target, fate: FateId) -> Option<BaseRunner> {
        let batter_fate = match target {
            Target::Batting => self.play.batter_fate,
            Target::Runner => self.pending_runner.as_ref().and_then(|p| p.batter_fate),
        };
        if batter_fate == Some(fate) {
            return Some(BaseRunner::Batter);
        }
        ON_BASE
            .into_iter()
            .find(|br| self.start.runner(*br).map_or(false, |r| r.fate == fate))
    }

    fn refresh_start(&mut self) {
        let runners = ON_BASE.map(|br| {
            self.bases
                .occupant(br)
                .zip(self.bases.occupant_id(br))
                .map(|(o, fate)| StartRunner {
                    name: o.runner.clone(),
                    fate,
                    pinch_runner: o.replaced.is_some(),
                    replaced: o.replaced.clone(),
                })
        });
        self.start = PlayStart {
            outs: self.outs.get(),
            score: self.score.clone(),
            runners,
            bases_cd: self.bases.code(),
            half_runs: self.half_runs,
        };
    }

    fn credit_run(&mut self, runner: &str) {
        let side = self.batting_side;
        *self.score.get_mut(side) += 1;
        self.half_runs += 1;
        match self.lineups.get_mut(side).counters_mut(runner) {
            Some(counters) => counters.r += 1,
            None => warn!("Run scored by {} who is not in the lineup", runner),
        }
    }

    fn credit_batter(&mut self, play: &PlayBuffer) {
        let Some(batter) = play
            .personnel
            .as_ref()
            .and_then(|p| p.batter.as_ref())
            .map(|b| b.name.clone())
            .or_else(|| self.batter.clone())
        else {
            return;
        };
        let event_type = play.event_type();
        let Some(c) = self.lineups.get_mut(self.batting_side).counters_mut(&batter) else {
            warn!("No counters for batter {}", batter);
            return;
        };
        c.pa += 1;
        if play.is_at_bat() {
            c.ab += 1;
        }
        match event_type {
            EventType::Single => c.h += 1,
            EventType::Double => {
                c.h += 1;
                c.doubles += 1;
            }
            EventType::Triple => {
                c.h += 1;
                c.triples += 1;
            }
            EventType::HomeRun => {
                c.h += 1;
                c.hr += 1;
            }
            EventType::Walk => c.bb += 1,
            EventType::IntentionalWalk => {
                c.bb += 1;
                c.ibb += 1;
            }
            EventType::HitByPitch => c.hbp += 1,
            EventType::StrikeOut => c.so += 1,
            _ => {}
        }
        c.sh += u8::from(play.sacrifice_hit);
        c.sf += u8::from(play.sacrifice_fly);
        c.reached_on_error += u8::from(play.batter_safe_on_error);
        c.rbi += play.rbi;
    }

    /// Finalizes a play into an event held until the half-inning closes.
    fn record(&mut self, mut play: PlayBuffer, batting: bool) {
        for forced in self.bases.resolve_forced() {
            let slot = if play.batter_fate == Some(forced.fate) {
                BaseRunner::Batter
            } else {
                ON_BASE
                    .into_iter()
                    .find(|br| self.start.runner(*br).map_or(false, |r| r.fate == forced.fate))
                    .unwrap_or(forced.start)
            };
            play.move_runner(slot, forced.end, false, "", "", false);
            if forced.scored() {
                if let Some(runner) = self.bases.record(forced.fate).map(|r| r.runner.clone()) {
                    play.runs.push(RunScored {
                        runner: runner.clone(),
                        rbi_eligible: true,
                    });
                    self.credit_run(&runner);
                }
            }
        }
        play.finalize(batting);
        if batting {
            if let Some(pitch) = play.terminal_pitch {
                self.pitches.push(pitch);
            }
        }
        if play.personnel.is_none() {
            play.personnel = Some(self.personnel());
        }
        let event = Event::snapshot(self, &play, batting);
        let runner_fates = [0, 1, 2].map(|i| self.start.runners[i].as_ref().map(|r| r.fate));
        self.half_events.push(HeldEvent {
            event,
            batter_fate: play.batter_fate,
            runner_fates,
            runs_through: self.half_runs,
        });
        if batting {
            self.credit_batter(&play);
            let side = self.batting_side;
            if let Some(slot) = play
                .personnel
                .as_ref()
                .and_then(|p| p.batter.as_ref())
                .and_then(|b| b.order)
            {
                *self.at_bat.get_mut(side) = slot.next();
            }
            *self.plate_appearances.get_mut(side) += 1;
            self.half_plate_appearances += 1;
            self.plate_appearance_open = false;
        }
        debug!("Event {}: {}", self.event_id, play.text());
        self.event_id += 1;
        self.new_plate_appearance = false;
        self.refresh_start();
    }

    /// Records whatever is still open, fills in fates and moves the half's
    /// events to the log.
    fn close_half(&mut self, ending_game: bool) {
        self.flush_pending_runner();
        if !self.play.is_empty() {
            let play = mem::take(&mut self.play);
            let batting = play.has_outcome();
            self.record(play, batting);
        }
        if self.plate_appearance_open {
            if let Some(last) = self.half_events.last_mut() {
                if last.event.batter_id.as_deref() == self.batter.as_deref() {
                    last.event.pa_truncated = true;
                }
            }
            self.plate_appearance_open = false;
        }
        if self.outs.get() < 3 && !ending_game && !self.half_events.is_empty() {
            warn!(
                "{} of inning {} closed with {} outs",
                self.frame,
                self.inning,
                self.outs.get()
            );
        }
        let stranded = u16::try_from(self.bases.runner_count()).unwrap_or(u16::MAX);
        *self.left_on_base.get_mut(self.batting_side) += stranded;
        let total = self.half_runs;
        for held in &mut self.half_events {
            let event = &mut held.event;
            event.bat_fate = fate_code(&self.bases, held.batter_fate);
            event.run1_fate = fate_code(&self.bases, held.runner_fates[0]);
            event.run2_fate = fate_code(&self.bases, held.runner_fates[1]);
            event.run3_fate = fate_code(&self.bases, held.runner_fates[2]);
            event.fate_runs = total.saturating_sub(held.runs_through);
        }
        if let Some(last) = self.half_events.last_mut() {
            last.event.inning_end = true;
        }
        self.events.extend(self.half_events.drain(..).map(|h| h.event));
    }

    fn start_half(&mut self) -> Result<()> {
        self.ensure_active()?;
        if self.inning > 0 {
            self.close_half(false);
        }
        self.bases.clear();
        self.outs = Outs::new(0).context("Unexpected outs bound error")?;
        self.count = Count::default();
        self.pitches.clear();
        self.batter = None;
        self.rare = RareAttributes::default();
        self.play = PlayBuffer::default();
        self.half_runs = 0;
        self.half_plate_appearances = 0;
        if self.inning == 0 {
            self.inning = 1;
            self.frame = InningFrame::Top;
            self.batting_side = Side::Away;
        } else {
            self.frame = self.frame.flip();
            self.batting_side = self.batting_side.flip();
            if self.frame == InningFrame::Top {
                self.inning += 1;
            }
        }
        self.first_batter_of_half = true;
        self.refresh_start();
        debug!(
            "New half: {} of inning {}, {} batting",
            self.frame,
            self.inning,
            self.teams.get(self.batting_side)
        );
        Ok(())
    }

    /// Closes the current half-inning and starts the next one. The first call
    /// starts the top of the first.
    pub fn new_half(&mut self) -> Result<()> {
        self.start_half().with_context(|| self.location())
    }

    /// Closes the last half-inning and flags its final event as the end of
    /// the game. Nothing can be recorded afterwards.
    pub fn set_previous_event_as_game_end(&mut self) -> Result<()> {
        self.ensure_active().with_context(|| self.location())?;
        self.close_half(true);
        match self.events.last_mut() {
            Some(last) => last.game_end = true,
            None => warn!("Game {} ended without any events", self.game_id),
        }
        self.game_over = true;
        Ok(())
    }

    fn resolve_batter(&mut self, name: &str, number: Option<u8>) -> Result<PlayerName, GameError> {
        let side = self.batting_side;
        let threshold = self.config.name_match_threshold;
        let lineup = self.lineups.get(side);
        match lineup.find_closest_name(name, threshold) {
            Ok(p) => return Ok(p.name.clone()),
            Err(e @ GameError::AmbiguousName { .. }) => return Err(e),
            Err(_) => {}
        }
        if let Some(p) = number.and_then(|n| lineup.find_player_by_number(n).ok()) {
            warn!("Batter {} matched to {} by jersey number", name, p.name);
            return Ok(p.name.clone());
        }
        if !self.config.auto_substitute_from_roster {
            return Err(GameError::PlayerNotFound(format!("batter {name}")));
        }
        let roster = self.rosters.get(side);
        let entry = roster
            .find_closest_name(name, threshold)
            .or_else(|e| number.map_or(Err(e), |n| roster.find_player_by_number(n)))?;
        let expected = *self.at_bat.get(side);
        let incumbent = lineup.find_player_at(expected)?.clone();
        let mut incoming = Player::new(
            &entry.name,
            entry.number,
            None,
            FieldingPosition::PinchHitter,
            entry.bats,
        )
        .with_throws(entry.throws);
        incoming.is_pinch_hitter = true;
        incoming.is_pending_sub = true;
        let incoming_name = incoming.name.clone();
        warn!(
            "{} is not in the lineup, substituting from the roster for {} in slot {}",
            incoming_name, incumbent.name, expected
        );
        self.lineups.get_mut(side).substitute(incoming, &incumbent.name)?;
        self.rare.pinch_hit = Some(PinchHit {
            batter: incoming_name.clone(),
            replaced: incumbent.name,
            replaced_position: incumbent.position,
        });
        Ok(incoming_name)
    }

    fn repair_order(
        &mut self,
        batter: &str,
        slot: LineupPosition,
        expected: LineupPosition,
    ) -> Result<(), GameError> {
        let lineup = self.lineups.get(self.batting_side);
        let due = lineup.find_player_at(expected)?;
        let has_batted = lineup.find_player_by_name(batter)?.has_batted() || due.has_batted();
        if !self.config.auto_swap_batting_order || has_batted {
            return Err(GameError::BattingOrder(format!(
                "{batter} bats in slot {slot} but {} is due in slot {expected}",
                due.name
            )));
        }
        let due = due.name.clone();
        self.lineups.get_mut(self.batting_side).swap_orders(batter, &due)
    }

    fn on_new_batter(&mut self, name: &str, number: Option<u8>) -> Result<(), GameError> {
        self.ensure_active()?;
        if self.inning == 0 {
            return Err(GameError::BattingOrder(format!(
                "{name} came to bat before the first half-inning"
            )));
        }
        let side = self.batting_side;
        let previous = self.batter.clone();
        let previous_slot = previous
            .as_deref()
            .and_then(|p| self.lineups.get(side).find_player_by_name(p).ok())
            .and_then(|p| p.order);
        let completed = self.play.has_outcome();
        self.flush_pending_runner();
        if !self.play.is_empty() {
            let play = mem::take(&mut self.play);
            self.record(play, completed);
        }

        let batter = self.resolve_batter(name, number)?;
        let slot = self
            .lineups
            .get(side)
            .find_player_by_name(&batter)?
            .order
            .ok_or_else(|| GameError::BattingOrder(format!("{batter} has no batting order slot")))?;
        let expected = *self.at_bat.get(side);
        if slot != expected {
            self.repair_order(&batter, slot, expected)?;
        }

        let continuing =
            self.plate_appearance_open && !completed && previous_slot == Some(expected);
        if continuing {
            if previous.as_deref() != Some(batter.as_str())
                && self.count.charges_strikeout_to_previous_batter()
                && self.rare.strikeout_responsible_batter.is_none()
            {
                self.rare.strikeout_responsible_batter = previous;
            }
        } else {
            self.count = Count::default();
            self.pitches.clear();
            let pinch_hit = self.rare.pinch_hit.take().filter(|ph| ph.batter == batter);
            self.rare = RareAttributes {
                pinch_hit,
                ..RareAttributes::default()
            };
            self.new_plate_appearance = true;
            self.plate_appearance_open = true;
            self.leadoff = mem::take(&mut self.first_batter_of_half);
        }
        debug!("{} batting in slot {} ({})", batter, expected, self.count);
        self.batter = Some(batter);
        Ok(())
    }

    /// Starts a plate appearance, repairing the lineup when the announced
    /// batter is not the one due up.
    pub fn new_batter(&mut self, name: &str, number: Option<u8>) -> Result<()> {
        self.on_new_batter(name, number)
            .with_context(|| format!("Failed to start plate appearance for {name}"))
            .with_context(|| self.location())
    }

    fn on_pitch(&mut self, pitch: PitchType) -> Result<(), GameError> {
        self.ensure_active()?;
        self.flush_pending_runner();
        self.count.update(pitch);
        self.pitches.push(pitch);
        Ok(())
    }

    pub fn pitch(&mut self, kind: PitchKind) -> Result<()> {
        self.on_pitch(kind.pitch_type()).with_context(|| self.location())
    }

    pub fn pitch_ball(&mut self) -> Result<()> {
        self.pitch(PitchKind::Ball)
    }

    pub fn pitch_intentional_ball(&mut self) -> Result<()> {
        self.pitch(PitchKind::IntentionalBall)
    }

    pub fn pitch_called_strike(&mut self) -> Result<()> {
        self.pitch(PitchKind::CalledStrike)
    }

    pub fn pitch_swinging_strike(&mut self) -> Result<()> {
        self.pitch(PitchKind::SwingingStrike)
    }

    pub fn pitch_foul(&mut self) -> Result<()> {
        self.pitch(PitchKind::Foul)
    }

    pub fn pitch_pickoff_attempt(&mut self, base: Base) -> Result<()> {
        self.on_pitch(PitchType::pickoff(base))
            .with_context(|| self.location())
    }

    fn on_dropped_foul(&mut self, fielder: FieldingPosition) -> Result<(), GameError> {
        self.on_pitch(PitchType::Foul)?;
        let play = self.runner_play();
        play.set_event_type(EventType::FoulError);
        play.push_runner_text(format!("FLE{}", fielder.code()));
        play.add_error(fielder, ErrorType::DroppedFoul);
        Ok(())
    }

    /// An error on a foul fly. Recorded as its own event.
    pub fn pitch_dropped_foul(&mut self, fielder: FieldingPosition) -> Result<()> {
        self.on_dropped_foul(fielder)
            .with_context(|| self.location())
    }

    /// Resolves a runner name against the current runners and batter.
    fn resolve_runner(&self, name: &str) -> Result<PlayerName, GameError> {
        let unresolved = self.bases.unresolved();
        let candidates = ON_BASE
            .into_iter()
            .filter_map(|br| br.base().and_then(|b| self.bases.on_base(b)))
            .chain(unresolved.iter().map(|(n, _)| *n))
            .chain(self.batter.as_deref())
            .unique()
            .collect_vec();
        if candidates.contains(&name) {
            return Ok(name.to_string());
        }
        let ranked = candidates
            .iter()
            .map(|c| (name_similarity(name, c), *c))
            .sorted_by(|(a, _), (b, _)| b.total_cmp(a))
            .collect_vec();
        match ranked.as_slice() {
            [(best, runner), rest @ ..] if *best >= self.config.name_match_threshold => {
                if let Some((second, other)) = rest.first() {
                    if (best - second).abs() < f64::EPSILON {
                        return Err(GameError::AmbiguousName {
                            name: name.to_string(),
                            first: (*runner).to_string(),
                            second: (*other).to_string(),
                        });
                    }
                }
                debug!("Matched runner {} to {}", name, runner);
                Ok((*runner).to_string())
            }
            _ => Err(GameError::RunnerNotOnBase {
                player: name.to_string(),
                base: 0,
            }),
        }
    }

    fn set_batter_origin(&mut self, fate: FateId, reason: Option<AdvanceReason>) {
        let Some(batter) = self
            .batter
            .as_deref()
            .and_then(|b| self.lineups.get(self.batting_side).find_player_by_name(b).ok())
        else {
            return;
        };
        let defense = self.lineups.get(self.batting_side.flip());
        let current_pitcher = self.current_pitcher().map(|p| p.name.clone());
        let responsible_pitcher = match reason {
            Some(AdvanceReason::Walk | AdvanceReason::IntentionalWalk) => self
                .rare
                .walk_responsible_pitcher
                .clone()
                .or(current_pitcher),
            _ => current_pitcher,
        };
        let origin = RunnerOrigin {
            event_id: self.event_id,
            lineup_position: batter.order,
            fielding_position: batter.position,
            responsible_pitcher,
            responsible_catcher: defense
                .find_player_by_position(FieldingPosition::Catcher)
                .ok()
                .map(|c| c.name.clone()),
        };
        self.bases.set_origin(fate, origin);
    }

    fn on_out(
        &mut self,
        how: OutKind,
        runner: Option<&str>,
        fielders: &[FieldingPosition],
        base: Option<Base>,
        modifiers: OutModifiers,
    ) -> Result<(), GameError> {
        self.ensure_active()?;
        let outs = Outs::new(self.outs.get() + 1).ok_or(GameError::TooManyOuts {
            inning: self.inning,
        })?;
        let runner = runner.map(|r| self.resolve_runner(r)).transpose()?;
        let runner = runner.filter(|r| self.bases.fate_id_of(r).is_some());
        let digits = fielder_digits(fielders);
        let note = if digits.is_empty() {
            String::new()
        } else {
            format!("({digits})")
        };

        let Some(runner) = runner else {
            if self.batter.is_none() {
                return Err(GameError::PlayerNotFound("current batter".to_string()));
            }
            self.flush_pending_runner();
            self.outs = outs;
            let strikeout = how.is_strikeout();
            let credited = if fielders.is_empty() && strikeout {
                vec![FieldingPosition::Catcher]
            } else {
                fielders.to_vec()
            };
            let play = self.batting_play();
            play.outs_on_play += 1;
            play.credit_out(&credited);
            play.outcome = Some(match how {
                OutKind::StrikeOut => "K".to_string(),
                OutKind::DroppedThirdStrike => format!("K{digits}"),
                _ if digits.is_empty() => "99".to_string(),
                _ => digits.clone(),
            });
            play.set_event_type(if strikeout {
                EventType::StrikeOut
            } else {
                EventType::GenericOut
            });
            play.move_runner(
                BaseRunner::Batter,
                base.unwrap_or(Base::First),
                true,
                &digits,
                "",
                true,
            );
            if !strikeout {
                play.batted_ball = how.batted_ball();
                play.fielded_by = fielders.first().copied().unwrap_or_default();
                play.terminal_pitch = Some(PitchType::InPlay);
            }
            if modifiers.sacrifice {
                match how.batted_ball() {
                    Some(BattedBall::Fly | BattedBall::Line | BattedBall::Popup) => {
                        play.sacrifice_fly = true;
                    }
                    _ => play.sacrifice_hit = true,
                }
            }
            play.bunt |= modifiers.bunt;
            play.foul |= modifiers.foul;
            play.double_play |= modifiers.double_play;
            play.triple_play |= modifiers.triple_play;
            return Ok(());
        };

        let target = self.target_for(how.is_runner_only());
        let from = self.bases.base_of(&runner);
        let at = if how == OutKind::PickedOff { base.or(from) } else { base };
        let transition = self.bases.put_out(&runner, at)?;
        self.outs = outs;
        let slot = self
            .slot_of(target, transition.fate)
            .unwrap_or(transition.start);
        let play = self.play_mut(target);
        play.outs_on_play += 1;
        play.credit_out(fielders);
        let mut implied = false;
        match how {
            OutKind::CaughtStealing => {
                play.caught[slot.index()] = true;
                play.push_runner_text(format!("CS{}{}", transition.end.code(), note));
                play.set_event_type(EventType::CaughtStealing);
                implied = true;
            }
            OutKind::PickedOff => {
                play.picked_off[slot.index()] = true;
                let from = from.unwrap_or(transition.end);
                play.push_runner_text(format!("PO{}{}", from.code(), note));
                play.set_event_type(EventType::Pickoff);
                implied = true;
            }
            _ => {}
        }
        play.move_runner(slot, transition.end, true, &digits, &note, implied);
        play.double_play |= modifiers.double_play;
        play.triple_play |= modifiers.triple_play;
        if how == OutKind::CaughtStealing {
            if let Some(c) = self.lineups.get_mut(self.batting_side).counters_mut(&runner) {
                c.cs += 1;
            }
        }
        Ok(())
    }

    /// Records an out on the batter (`runner` is `None` or the batter) or on
    /// a runner. The putout goes to the last fielder listed.
    pub fn out(
        &mut self,
        how: OutKind,
        runner: Option<&str>,
        fielders: &[FieldingPosition],
        base: Option<Base>,
        modifiers: OutModifiers,
    ) -> Result<()> {
        self.on_out(how, runner, fielders, base, modifiers)
            .with_context(|| self.location())
    }

    pub fn out_thrown_out(
        &mut self,
        runner: Option<&str>,
        fielders: &[FieldingPosition],
        base: Option<Base>,
        modifiers: OutModifiers,
    ) -> Result<()> {
        self.out(OutKind::ThrownOut, runner, fielders, base, modifiers)
    }

    pub fn out_caught_stealing(
        &mut self,
        runner: &str,
        fielders: &[FieldingPosition],
        base: Option<Base>,
    ) -> Result<()> {
        self.out(OutKind::CaughtStealing, Some(runner), fielders, base, OutModifiers::default())
    }

    pub fn out_picked_off(
        &mut self,
        runner: &str,
        fielders: &[FieldingPosition],
        base: Option<Base>,
    ) -> Result<()> {
        self.out(OutKind::PickedOff, Some(runner), fielders, base, OutModifiers::default())
    }

    pub fn out_fly_out(
        &mut self,
        fielder: FieldingPosition,
        modifiers: OutModifiers,
    ) -> Result<()> {
        self.out(OutKind::FlyOut, None, &[fielder], None, modifiers)
    }

    pub fn out_line_out(
        &mut self,
        fielder: FieldingPosition,
        modifiers: OutModifiers,
    ) -> Result<()> {
        self.out(OutKind::LineOut, None, &[fielder], None, modifiers)
    }

    pub fn out_popup(&mut self, fielder: FieldingPosition, modifiers: OutModifiers) -> Result<()> {
        self.out(OutKind::Popup, None, &[fielder], None, modifiers)
    }

    pub fn out_strike_out(&mut self) -> Result<()> {
        self.out(OutKind::StrikeOut, None, &[], None, OutModifiers::default())
    }

    pub fn out_unassisted(
        &mut self,
        runner: Option<&str>,
        fielder: FieldingPosition,
        base: Option<Base>,
        modifiers: OutModifiers,
    ) -> Result<()> {
        self.out(OutKind::Unassisted, runner, &[fielder], base, modifiers)
    }

    /// Strikeout where the catcher had to make a play to retire the batter.
    pub fn out_dropped_third_strike(&mut self, fielders: &[FieldingPosition]) -> Result<()> {
        self.out(
            OutKind::DroppedThirdStrike,
            None,
            fielders,
            None,
            OutModifiers::default(),
        )
    }

    fn on_hit(
        &mut self,
        kind: HitKind,
        fielder: Option<FieldingPosition>,
    ) -> Result<(), GameError> {
        self.ensure_active()?;
        let batter = self
            .batter
            .clone()
            .ok_or_else(|| GameError::PlayerNotFound("current batter".to_string()))?;
        self.flush_pending_runner();
        let transition = self.bases.advance(&batter, kind.base())?;
        self.set_batter_origin(transition.fate, None);
        let digit = fielder.map(|f| f.code().to_string()).unwrap_or_default();
        let play = self.batting_play();
        play.batter_fate = Some(transition.fate);
        play.event_type = Some(kind.event_type());
        play.outcome = Some(match kind {
            HitKind::GroundRuleDouble => kind.prefix().to_string(),
            _ => format!("{}{}", kind.prefix(), digit),
        });
        play.implied_batter = Some(kind.base());
        play.fielded_by = fielder.unwrap_or_default();
        play.hit_location = (!digit.is_empty()).then_some(digit);
        play.terminal_pitch = Some(PitchType::InPlay);
        play.move_runner(BaseRunner::Batter, kind.base(), false, "", "", false);
        if transition.scored() {
            play.runs.push(RunScored {
                runner: batter.clone(),
                rbi_eligible: true,
            });
            self.credit_run(&batter);
        }
        Ok(())
    }

    pub fn hit(&mut self, kind: HitKind, fielder: Option<FieldingPosition>) -> Result<()> {
        self.on_hit(kind, fielder).with_context(|| self.location())
    }

    pub fn hit_single(&mut self, fielder: Option<FieldingPosition>) -> Result<()> {
        self.hit(HitKind::Single, fielder)
    }

    pub fn hit_double(&mut self, fielder: Option<FieldingPosition>) -> Result<()> {
        self.hit(HitKind::Double, fielder)
    }

    pub fn hit_ground_rule_double(&mut self) -> Result<()> {
        self.hit(HitKind::GroundRuleDouble, None)
    }

    pub fn hit_triple(&mut self, fielder: Option<FieldingPosition>) -> Result<()> {
        self.hit(HitKind::Triple, fielder)
    }

    pub fn hit_home_run(&mut self, fielder: Option<FieldingPosition>) -> Result<()> {
        self.hit(HitKind::HomeRun, fielder)
    }

    fn batter_outcome(
        play: &mut PlayBuffer,
        reason: AdvanceReason,
        to: Base,
        fielder: Option<FieldingPosition>,
    ) {
        let Some(event_type) = reason.batter_event_type() else {
            return;
        };
        if play.has_outcome() {
            return;
        }
        let digit = fielder.map(|f| f.code().to_string()).unwrap_or_default();
        play.event_type = Some(event_type);
        play.implied_batter = Some(to);
        play.outcome = Some(match reason {
            AdvanceReason::Walk => "W".to_string(),
            AdvanceReason::IntentionalWalk => "IW".to_string(),
            AdvanceReason::HitByPitch => "HP".to_string(),
            AdvanceReason::Interference => {
                format!("C/E{}", fielder.unwrap_or(FieldingPosition::Catcher).code())
            }
            AdvanceReason::DroppedThirdStrike => "K".to_string(),
            AdvanceReason::FieldersChoice => format!("FC{digit}"),
            _ => format!("E{digit}"),
        });
        match reason {
            AdvanceReason::HitByPitch => play.terminal_pitch = Some(PitchType::HitBatter),
            AdvanceReason::Error | AdvanceReason::ThrowingError => {
                play.batter_safe_on_error = true;
                play.rbi_blocked = true;
                play.fielded_by = fielder.unwrap_or_default();
                play.terminal_pitch = Some(PitchType::InPlay);
            }
            AdvanceReason::FieldersChoice => {
                play.fielded_by = fielder.unwrap_or_default();
                play.terminal_pitch = Some(PitchType::InPlay);
            }
            AdvanceReason::DroppedThirdStrike => play.rbi_blocked = true,
            _ => {}
        }
    }

    fn runner_outcome(play: &mut PlayBuffer, reason: AdvanceReason, slot: BaseRunner, to: Base) {
        let text = match reason {
            AdvanceReason::StolenBase => {
                play.stolen[slot.index()] = true;
                format!("SB{}", to.code())
            }
            AdvanceReason::WildPitch => {
                play.wild_pitch = true;
                "WP".to_string()
            }
            AdvanceReason::PassedBall => {
                play.passed_ball = true;
                "PB".to_string()
            }
            AdvanceReason::Balk => "BK".to_string(),
            AdvanceReason::DefensiveIndifference => "DI".to_string(),
            _ => return,
        };
        play.push_runner_text(text);
        play.set_event_type(reason.runner_event_type());
    }

    fn on_advance(
        &mut self,
        runner: Option<&str>,
        to: Base,
        reason: AdvanceReason,
        fielder: Option<FieldingPosition>,
    ) -> Result<(), GameError> {
        self.ensure_active()?;
        let name = match runner {
            Some(r) => self.resolve_runner(r)?,
            None => self
                .batter
                .clone()
                .ok_or_else(|| GameError::PlayerNotFound("current batter".to_string()))?,
        };
        let on_base = self.bases.fate_id_of(&name).is_some();
        let is_batter = !on_base && self.batter.as_deref() == Some(name.as_str());
        if !on_base && !is_batter {
            return Err(GameError::RunnerNotOnBase {
                player: name,
                base: 0,
            });
        }
        let target = self.target_for(reason.is_runner_only() && !is_batter);
        let transition = self.bases.advance(&name, to)?;
        let slot = if is_batter {
            self.set_batter_origin(transition.fate, Some(reason));
            BaseRunner::Batter
        } else {
            self.slot_of(target, transition.fate)
                .unwrap_or(transition.start)
        };
        let rbi_eligible = target == Target::Batting && !reason.blocks_rbi();
        let digit = fielder.map(|f| f.code().to_string()).unwrap_or_default();
        let mut note = match reason {
            AdvanceReason::Error | AdvanceReason::ThrowingError if !is_batter => {
                format!("(E{digit})")
            }
            AdvanceReason::Throw => "(TH)".to_string(),
            _ => String::new(),
        };
        if matches!(to, Base::HomeUnearned | Base::HomeTeamUnearned) {
            note.push_str("(UR)");
        }
        let play = self.play_mut(target);
        if let (Some(kind), Some(f)) = (reason.error_type(), fielder) {
            play.add_error(f, kind);
        }
        if is_batter {
            play.batter_fate = Some(transition.fate);
            Self::batter_outcome(play, reason, to, fielder);
        } else {
            Self::runner_outcome(play, reason, slot, to);
            if reason.is_runner_only() && !play.has_outcome() && play.runner_texts.is_empty() {
                play.push_runner_text("OA".to_string());
                play.set_event_type(EventType::OtherAdvance);
            }
        }
        let implied = reason == AdvanceReason::StolenBase && !is_batter;
        play.move_runner(slot, to, false, "", &note, implied);
        if transition.scored() {
            play.runs.push(RunScored {
                runner: name.clone(),
                rbi_eligible,
            });
            self.credit_run(&name);
        }
        if reason == AdvanceReason::StolenBase {
            if let Some(c) = self.lineups.get_mut(self.batting_side).counters_mut(&name) {
                c.sb += 1;
            }
        }
        Ok(())
    }

    /// Moves a runner, or the batter when `runner` is `None`, to `to`.
    pub fn advance(
        &mut self,
        runner: Option<&str>,
        to: Base,
        reason: AdvanceReason,
        fielder: Option<FieldingPosition>,
    ) -> Result<()> {
        self.on_advance(runner, to, reason, fielder)
            .with_context(|| self.location())
    }

    pub fn advance_on_wild_pitch(&mut self, runner: Option<&str>, to: Base) -> Result<()> {
        self.advance(runner, to, AdvanceReason::WildPitch, None)
    }

    pub fn advance_on_passed_ball(&mut self, runner: Option<&str>, to: Base) -> Result<()> {
        self.advance(runner, to, AdvanceReason::PassedBall, None)
    }

    pub fn advance_on_stolen_base(&mut self, runner: &str, to: Base) -> Result<()> {
        self.advance(Some(runner), to, AdvanceReason::StolenBase, None)
    }

    pub fn advance_on_throw(&mut self, runner: Option<&str>, to: Base) -> Result<()> {
        self.advance(runner, to, AdvanceReason::Throw, None)
    }

    pub fn advance_on_error(
        &mut self,
        runner: Option<&str>,
        to: Base,
        fielder: Option<FieldingPosition>,
    ) -> Result<()> {
        self.advance(runner, to, AdvanceReason::Error, fielder)
    }

    pub fn advance_on_fielders_choice(
        &mut self,
        runner: Option<&str>,
        to: Base,
        fielder: Option<FieldingPosition>,
    ) -> Result<()> {
        self.advance(runner, to, AdvanceReason::FieldersChoice, fielder)
    }

    pub fn advance_on_ground_rule(&mut self, runner: Option<&str>, to: Base) -> Result<()> {
        self.advance(runner, to, AdvanceReason::GroundRule, None)
    }

    pub fn advance_on_hit_by_pitch(&mut self, runner: Option<&str>, to: Base) -> Result<()> {
        self.advance(runner, to, AdvanceReason::HitByPitch, None)
    }

    pub fn advance_on_walk(&mut self, runner: Option<&str>, to: Base) -> Result<()> {
        self.advance(runner, to, AdvanceReason::Walk, None)
    }

    pub fn advance_on_intentional_walk(&mut self, runner: Option<&str>, to: Base) -> Result<()> {
        self.advance(runner, to, AdvanceReason::IntentionalWalk, None)
    }

    pub fn advance_on_dropped_third_strike(&mut self, to: Base) -> Result<()> {
        self.advance(None, to, AdvanceReason::DroppedThirdStrike, None)
    }

    pub fn advance_on_interference(
        &mut self,
        runner: Option<&str>,
        to: Base,
        fielder: Option<FieldingPosition>,
    ) -> Result<()> {
        self.advance(runner, to, AdvanceReason::Interference, fielder)
    }

    pub fn advance_on_balk(&mut self, runner: &str, to: Base) -> Result<()> {
        self.advance(Some(runner), to, AdvanceReason::Balk, None)
    }

    pub fn advance_on_defensive_indifference(&mut self, runner: &str, to: Base) -> Result<()> {
        self.advance(Some(runner), to, AdvanceReason::DefensiveIndifference, None)
    }

    pub fn advance_from_batter(&mut self, to: Base) -> Result<()> {
        self.advance(None, to, AdvanceReason::OnPlay, None)
    }

    pub fn score_run(&mut self, runner: &str, earned: bool) -> Result<()> {
        let home = if earned { Base::Home } else { Base::HomeUnearned };
        self.advance(Some(runner), home, AdvanceReason::OnPlay, None)
    }

    fn on_place_runner(&mut self, runner: &str, base: Base) -> Result<(), GameError> {
        self.ensure_active()?;
        let player = self
            .lineups
            .get(self.batting_side)
            .find_closest_name(runner, self.config.name_match_threshold)?
            .clone();
        let fate = self.bases.place_runner(&player.name, base)?;
        let origin = RunnerOrigin {
            event_id: self.event_id,
            lineup_position: player.order,
            fielding_position: player.position,
            responsible_pitcher: self.current_pitcher().map(|p| p.name.clone()),
            responsible_catcher: None,
        };
        self.bases.set_origin(fate, origin);
        self.refresh_start();
        Ok(())
    }

    /// Puts the automatic runner on base at the start of an extra inning.
    pub fn place_runner(&mut self, runner: &str, base: Base) -> Result<()> {
        self.on_place_runner(runner, base)
            .with_context(|| self.location())
    }

    /// Team a substitution belongs to, defaulting to `default` when neither
    /// name is known to either side.
    fn side_of(&self, player: &str, replacing: Option<&str>, default: Side) -> Side {
        let threshold = self.config.name_match_threshold;
        let known = |side: Side| {
            let lineup = self.lineups.get(side);
            lineup.find_closest_name(player, threshold).is_ok()
                || replacing.map_or(false, |r| lineup.find_closest_name(r, threshold).is_ok())
        };
        if known(default) || !known(default.flip()) {
            default
        } else {
            default.flip()
        }
    }

    fn incoming_player(&self, side: Side, name: &str, position: FieldingPosition) -> Player {
        self.rosters
            .get(side)
            .find_closest_name(name, self.config.name_match_threshold)
            .map_or_else(
                |_| Player::new(name, None, None, position, None),
                |p| Player::new(&p.name, p.number, None, position, p.bats).with_throws(p.throws),
            )
    }

    fn on_defensive_sub(
        &mut self,
        player: &str,
        replacing: Option<&str>,
        position: Option<FieldingPosition>,
    ) -> Result<(), GameError> {
        self.ensure_active()?;
        let threshold = self.config.name_match_threshold;
        let side = self.side_of(player, replacing, self.batting_side.flip());
        let pitcher_before = self
            .lineups
            .get(side)
            .find_player_by_position(FieldingPosition::Pitcher)
            .ok()
            .map(|p| p.name.clone());
        let lineup = self.lineups.get(side);

        let existing = lineup
            .find_closest_name(player, threshold)
            .ok()
            .map(|p| p.name.clone());
        if let Some(name) = existing {
            let position = position.ok_or_else(|| {
                GameError::UnknownPosition(format!("no new position given for {name}"))
            })?;
            let displaced = replacing
                .and_then(|r| lineup.find_closest_name(r, threshold).ok())
                .filter(|p| p.name != name)
                .cloned();
            if let Some(displaced) = displaced {
                if let Some(slot) = displaced.order {
                    debug!(
                        "{} moved to {} for {}, leaving slot {} open",
                        name, position, displaced.name, slot
                    );
                }
                self.lineups.get_mut(side).remove_player(&displaced.name)?;
            }
            self.lineups.get_mut(side).move_player(&name, position)?;
        } else {
            let replaced = match replacing {
                Some(r) => Some(lineup.find_closest_name(r, threshold)?.name.clone()),
                None => {
                    let pending =
                        lineup.players().iter().filter(|p| p.is_pending_sub).collect_vec();
                    match pending.as_slice() {
                        [one] => Some(one.name.clone()),
                        [] if !lineup.vacant_slots().is_empty() => None,
                        [] => {
                            let position = position.ok_or_else(|| {
                                GameError::UnknownPosition(format!(
                                    "no position given for {player}"
                                ))
                            })?;
                            Some(lineup.find_player_by_position(position)?.name.clone())
                        }
                        [first, second, ..] => {
                            return Err(GameError::AmbiguousName {
                                name: player.to_string(),
                                first: first.name.clone(),
                                second: second.name.clone(),
                            })
                        }
                    }
                }
            };
            if let Some(replaced) = replaced {
                let incoming = self.incoming_player(side, player, position.unwrap_or_default());
                self.lineups.get_mut(side).substitute(incoming, &replaced)?;
            } else {
                let position = position.ok_or_else(|| {
                    GameError::UnknownPosition(format!("no position given for {player}"))
                })?;
                let incoming = self.incoming_player(side, player, position);
                self.lineups.get_mut(side).fill_vacancy(incoming)?;
            }
        }

        let pitcher_after = self
            .lineups
            .get(side)
            .find_player_by_position(FieldingPosition::Pitcher)
            .ok()
            .map(|p| p.name.clone());
        if side != self.batting_side
            && pitcher_before != pitcher_after
            && self.plate_appearance_open
            && !self.play.has_outcome()
            && self.count.charges_walk_to_previous_pitcher()
            && self.rare.walk_responsible_pitcher.is_none()
        {
            self.rare.walk_responsible_pitcher = pitcher_before;
        }
        Ok(())
    }

    /// Handles a fielder switching positions, a bench player taking a vacant
    /// position, and a bench player replacing a named fielder.
    pub fn defensive_sub(
        &mut self,
        player: &str,
        replacing: Option<&str>,
        position: Option<FieldingPosition>,
    ) -> Result<()> {
        self.on_defensive_sub(player, replacing, position)
            .with_context(|| format!("Failed defensive substitution of {player}"))
            .with_context(|| self.location())
    }

    fn on_offensive_sub(
        &mut self,
        player: &str,
        replacing: &str,
        pinch_runner: bool,
        base: Option<Base>,
    ) -> Result<(), GameError> {
        self.ensure_active()?;
        let side = self.side_of(player, Some(replacing), self.batting_side);
        let old = self
            .lineups
            .get(side)
            .find_closest_name(replacing, self.config.name_match_threshold)?
            .clone();
        let position = if pinch_runner {
            FieldingPosition::PinchRunner
        } else {
            FieldingPosition::PinchHitter
        };
        let mut incoming = self.incoming_player(side, player, position);
        incoming.is_pending_sub = true;
        incoming.is_pinch_hitter = !pinch_runner;
        let new_name = incoming.name.clone();
        if self.lineups.get(side).has_played(&new_name) {
            return Err(GameError::DuplicatePlayer(new_name));
        }

        if pinch_runner {
            let fate = self.bases.replace_runner(&new_name, &old.name, base)?;
            self.lineups.get_mut(side).substitute(incoming, &old.name)?;
            for runner in self.start.runners.iter_mut().flatten() {
                if runner.fate == fate {
                    runner.name = new_name.clone();
                    runner.pinch_runner = true;
                    runner.replaced = Some(old.name.clone());
                }
            }
            if let Some(origin) = self.bases.origin(fate).cloned() {
                self.bases.set_origin(
                    fate,
                    RunnerOrigin {
                        fielding_position: FieldingPosition::PinchRunner,
                        ..origin
                    },
                );
            }
            debug!("{} pinch runs for {}", new_name, old.name);
        } else {
            self.lineups.get_mut(side).substitute(incoming, &old.name)?;
            if self.batter.as_deref() == Some(old.name.as_str()) {
                if !self.play.has_outcome() && self.count.charges_strikeout_to_previous_batter() {
                    self.rare.strikeout_responsible_batter = Some(old.name.clone());
                }
                self.batter = Some(new_name.clone());
            }
            debug!("{} pinch hits for {}", new_name, old.name);
            self.rare.pinch_hit = Some(PinchHit {
                batter: new_name,
                replaced: old.name,
                replaced_position: old.position,
            });
        }
        Ok(())
    }

    /// Pinch hitters take the batting slot; pinch runners also take over the
    /// runner's occupancy record and fate.
    pub fn offensive_sub(
        &mut self,
        player: &str,
        replacing: &str,
        pinch_runner: bool,
        base: Option<Base>,
    ) -> Result<()> {
        self.on_offensive_sub(player, replacing, pinch_runner, base)
            .with_context(|| format!("Failed offensive substitution of {player}"))
            .with_context(|| self.location())
    }

    /// Applies one classified action, resolving its wording through the
    /// configured vocabulary.
    pub fn apply(&mut self, action: &PlayAction) -> Result<()> {
        let config = Arc::clone(&self.config);
        let vocab = &config.vocabulary;
        let position =
            |text: &Option<String>| text.as_deref().map(|t| vocab.position(t)).transpose();
        let base = |text: &Option<String>| text.as_deref().map(|t| vocab.base(t)).transpose();
        let result = match action {
            PlayAction::Pitch { pitch } => self.pitch(*pitch),
            PlayAction::PickoffAttempt { base } => vocab
                .base(base)
                .map_err(anyhow::Error::from)
                .and_then(|b| self.pitch_pickoff_attempt(b)),
            PlayAction::DroppedFoul { fielder } => vocab
                .position(fielder)
                .map_err(anyhow::Error::from)
                .and_then(|f| self.pitch_dropped_foul(f)),
            PlayAction::Out {
                how,
                runner,
                fielders,
                base: out_base,
                modifiers,
            } => fielders
                .iter()
                .map(|f| vocab.position(f))
                .collect::<Result<Vec<_>, _>>()
                .and_then(|f| base(out_base).map(|b| (f, b)))
                .map_err(anyhow::Error::from)
                .and_then(|(f, b)| self.out(*how, runner.as_deref(), &f, b, *modifiers)),
            PlayAction::Hit { hit, fielder } => position(fielder)
                .map_err(anyhow::Error::from)
                .and_then(|f| self.hit(*hit, f)),
            PlayAction::Advance {
                runner,
                to,
                reason,
                fielder,
            } => vocab
                .base(to)
                .and_then(|b| position(fielder).map(|f| (b, f)))
                .map_err(anyhow::Error::from)
                .and_then(|(b, f)| self.advance(runner.as_deref(), b, *reason, f)),
            PlayAction::Score { runner, earned } => self.score_run(runner, *earned),
            PlayAction::DefensiveSub {
                player,
                replacing,
                position: sub_position,
            } => position(sub_position)
                .map_err(anyhow::Error::from)
                .and_then(|p| self.defensive_sub(player, replacing.as_deref(), p)),
            PlayAction::OffensiveSub {
                player,
                replacing,
                pinch_runner,
                base: sub_base,
            } => base(sub_base)
                .map_err(anyhow::Error::from)
                .and_then(|b| self.offensive_sub(player, replacing, *pinch_runner, b)),
        };
        result.with_context(|| format!("Failed to apply {action:?}"))
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::event_file::error::LineupProblem;
    use crate::event_file::traits::FieldingPosition::*;
    use crate::event_file::traits::Hand;

    const YANKEES: [(&str, u8, FieldingPosition); 9] = [
        ("Rickey Henderson", 24, LeftFielder),
        ("Willie Randolph", 30, SecondBaseman),
        ("Don Mattingly", 23, FirstBaseman),
        ("Dave Winfield", 31, RightFielder),
        ("Mike Pagliarulo", 13, ThirdBaseman),
        ("Claudell Washington", 15, CenterFielder),
        ("Ron Hassey", 27, Catcher),
        ("Bobby Meacham", 20, Shortstop),
        ("Ron Guidry", 49, Pitcher),
    ];

    const RED_SOX: [(&str, u8, FieldingPosition); 9] = [
        ("Wade Boggs", 26, ThirdBaseman),
        ("Marty Barrett", 17, SecondBaseman),
        ("Jim Rice", 14, LeftFielder),
        ("Bill Buckner", 6, FirstBaseman),
        ("Dwight Evans", 24, RightFielder),
        ("Tony Armas", 20, CenterFielder),
        ("Rich Gedman", 10, Catcher),
        ("Jackie Gutierrez", 41, Shortstop),
        ("Oil Can Boyd", 23, Pitcher),
    ];

    fn lineup(players: &[(&str, u8, FieldingPosition)]) -> Lineup {
        let mut lineup = Lineup::new();
        for (order, (name, number, position)) in (1_u8..).zip(players) {
            lineup
                .add_player(Player::new(
                    name,
                    Some(*number),
                    Some(order),
                    *position,
                    Some(Hand::Right),
                ))
                .unwrap();
        }
        lineup
    }

    fn roster(players: &[(&str, u8, FieldingPosition)]) -> PlayerList {
        let mut roster = PlayerList::new();
        for (name, number, position) in players {
            roster
                .add_player(Player::new(name, Some(*number), None, *position, Some(Hand::Left)))
                .unwrap();
        }
        roster
    }

    fn game_with(config: GameConfig) -> GameState {
        let mut state = GameState::new("BOS198607040", Arc::new(config)).unwrap();
        state.set_teams("NYA", "BOS");
        state.set_away_lineup(lineup(&YANKEES)).unwrap();
        state.set_home_lineup(lineup(&RED_SOX)).unwrap();
        state.set_away_roster(roster(&[
            ("Dan Pasqua", 21, LeftFielder),
            ("Dave Righetti", 19, Pitcher),
        ]));
        state.set_home_roster(roster(&[
            ("Reid Nichols", 11, CenterFielder),
            ("Bob Stanley", 46, Pitcher),
            ("Ed Romero", 11, Shortstop),
        ]));
        state
    }

    fn game() -> GameState {
        game_with(GameConfig::default())
    }

    fn close(mut state: GameState) -> Vec<Event> {
        state.set_previous_event_as_game_end().unwrap();
        state.into_events()
    }

    fn game_error(err: &anyhow::Error) -> Option<&GameError> {
        err.downcast_ref::<GameError>()
    }

    #[test]
    fn new_half_alternates_from_inning_zero() {
        let mut state = game();
        assert_eq!(state.inning(), 0);
        state.new_half().unwrap();
        assert_eq!((state.inning(), state.frame()), (1, InningFrame::Top));
        assert_eq!(state.batting_side(), Side::Away);
        state.new_half().unwrap();
        assert_eq!((state.inning(), state.frame()), (1, InningFrame::Bottom));
        assert_eq!(state.batting_side(), Side::Home);
        state.new_half().unwrap();
        assert_eq!((state.inning(), state.frame()), (2, InningFrame::Top));
    }

    #[test]
    fn new_half_resets_outs_and_bases() {
        let mut state = game();
        state.new_half().unwrap();
        state.new_batter("Rickey Henderson", None).unwrap();
        state.hit_single(Some(CenterFielder)).unwrap();
        state.new_batter("Willie Randolph", None).unwrap();
        state.out_fly_out(RightFielder, OutModifiers::default()).unwrap();
        assert_eq!(state.outs(), 1);
        assert_eq!(state.bases().runner_names(), (Some("Rickey Henderson"), None, None));
        state.new_half().unwrap();
        assert_eq!(state.outs(), 0);
        assert_eq!(state.bases().runner_names(), (None, None, None));
    }

    #[test]
    fn fourth_out_is_rejected() {
        let mut state = game();
        state.new_half().unwrap();
        for batter in ["Rickey Henderson", "Willie Randolph", "Don Mattingly"] {
            state.new_batter(batter, None).unwrap();
            state.out_strike_out().unwrap();
        }
        state.new_batter("Dave Winfield", None).unwrap();
        let err = state.out_strike_out().unwrap_err();
        assert_eq!(game_error(&err), Some(&GameError::TooManyOuts { inning: 1 }));
        assert_eq!(state.outs(), 3);
    }

    #[test]
    fn single_with_runner_scoring() {
        let mut state = game();
        state.new_half().unwrap();
        state.new_batter("Rickey Henderson", None).unwrap();
        state.hit_double(Some(LeftFielder)).unwrap();
        state.new_batter("Willie Randolph", None).unwrap();
        state.pitch_ball().unwrap();
        state.pitch_called_strike().unwrap();
        state.hit_single(Some(CenterFielder)).unwrap();
        state.score_run("Rickey Henderson", true).unwrap();
        state.new_batter("Don Mattingly", None).unwrap();
        assert_eq!(state.score().away, 1);
        let events = close(state);
        assert_eq!(events.len(), 2);
        let single = &events[1];
        assert_eq!(single.event_text, "S8.2-H");
        assert_eq!(single.event_type, EventType::Single);
        assert_eq!(single.rbi, 1);
        assert_eq!(single.pitch_sequence, "BCX");
        assert_eq!((single.balls, single.strikes), (1, 1));
        assert_eq!(single.run2_dest, 4);
        assert_eq!(single.bat_dest, 1);
        assert_eq!(single.base2_runner.as_deref(), Some("Rickey Henderson"));
        assert_eq!(events[0].run2_fate, 0);
        assert_eq!(events[0].bat_fate, 4);
        assert_eq!(events[0].fate_runs, 1);
        assert_eq!(single.fate_runs, 0);
    }

    #[test]
    fn stolen_base_is_its_own_event() {
        let mut state = game();
        state.new_half().unwrap();
        state.new_batter("Rickey Henderson", None).unwrap();
        state.advance_on_walk(None, Base::First).unwrap();
        state.new_batter("Willie Randolph", None).unwrap();
        state.pitch_ball().unwrap();
        state.advance_on_stolen_base("Rickey Henderson", Base::Second).unwrap();
        state.pitch_called_strike().unwrap();
        state
            .out_thrown_out(None, &[Shortstop, FirstBaseman], None, OutModifiers::default())
            .unwrap();
        state.new_batter("Don Mattingly", None).unwrap();
        let events = close(state);
        let steal = &events[1];
        assert_eq!(steal.event_type, EventType::StolenBase);
        assert!(!steal.bat_event);
        assert_eq!(steal.event_text, "SB2");
        assert!(steal.run1_sb);
        assert_eq!(steal.pitch_sequence, "B");
        assert_eq!(steal.rbi, 0);
        let out = &events[2];
        assert_eq!(out.pitch_sequence, "B.CX");
        assert_eq!(out.event_text, "63/G");
        assert_eq!(out.base2_runner.as_deref(), Some("Rickey Henderson"));
        assert_eq!(out.putout1, FirstBaseman);
        assert_eq!(out.assist1, Shortstop);
        assert!(!out.pa_new);
        assert!(steal.pa_new);
    }

    #[test]
    fn forced_runners_score_on_a_bases_loaded_walk() {
        let mut state = game();
        state.new_half().unwrap();
        for batter in ["Rickey Henderson", "Willie Randolph", "Don Mattingly"] {
            state.new_batter(batter, None).unwrap();
            state.advance_on_walk(None, Base::First).unwrap();
        }
        state.new_batter("Dave Winfield", None).unwrap();
        state.advance_on_walk(None, Base::First).unwrap();
        state.new_batter("Mike Pagliarulo", None).unwrap();
        assert_eq!(state.score().away, 1);
        assert_eq!(state.bases().code(), 7);
        let events = close(state);
        let walk = &events[3];
        assert_eq!(walk.event_text, "W.3-H;2-3;1-2");
        assert_eq!(walk.rbi, 1);
        assert_eq!(walk.start_bases_cd, 7);
        assert_eq!(walk.end_bases_cd, 7);
        assert!(walk.base4_force);
    }

    #[test]
    fn double_play_erases_rbi() {
        let mut state = game();
        state.new_half().unwrap();
        state.new_batter("Rickey Henderson", None).unwrap();
        state.hit_triple(Some(RightFielder)).unwrap();
        state.new_batter("Willie Randolph", None).unwrap();
        state.hit_single(None).unwrap();
        state.score_run("Rickey Henderson", true).unwrap();
        state.new_batter("Don Mattingly", None).unwrap();
        state
            .out_thrown_out(
                Some("Willie Randolph"),
                &[Shortstop, SecondBaseman],
                Some(Base::Second),
                OutModifiers::default(),
            )
            .unwrap();
        state
            .out_thrown_out(None, &[SecondBaseman, FirstBaseman], None, OutModifiers::default())
            .unwrap();
        state.new_batter("Dave Winfield", None).unwrap();
        let events = close(state);
        let dp = &events[2];
        assert!(dp.double_play);
        assert_eq!(dp.outs_on_play, 2);
        assert_eq!(dp.event_text, "43/DP/G.1X2(64)");
        assert_eq!(dp.run1_dest, 0);
        assert_eq!(dp.run1_play, "64");
        assert_eq!(events[1].rbi, 1);
    }

    #[test]
    fn pinch_runner_takes_over_fate() {
        let mut state = game();
        state.new_half().unwrap();
        state.new_batter("Rickey Henderson", None).unwrap();
        state.hit_single(Some(LeftFielder)).unwrap();
        state.offensive_sub("Dan Pasqua", "Rickey Henderson", true, Some(Base::First)).unwrap();
        state.new_batter("Willie Randolph", None).unwrap();
        state.hit_home_run(None).unwrap();
        state.score_run("Dan Pasqua", true).unwrap();
        state.new_batter("Don Mattingly", None).unwrap();
        assert_eq!(state.score().away, 2);
        assert!(state.lineup(Side::Away).contains("Dan Pasqua"));
        let events = close(state);
        let homer = &events[1];
        assert_eq!(homer.base1_runner.as_deref(), Some("Dan Pasqua"));
        assert!(homer.pr_run1);
        assert_eq!(homer.removed_for_pr_run1.as_deref(), Some("Rickey Henderson"));
        assert_eq!(homer.run1_fld_cd, PinchRunner);
        assert_eq!(homer.rbi, 2);
        assert_eq!(events[0].bat_fate, 4);
        assert_eq!(homer.event_text, "HR.1-H");
    }

    #[test]
    fn batting_order_swaps_when_nobody_has_batted() {
        let mut state = game();
        state.new_half().unwrap();
        state.new_batter("Willie Randolph", None).unwrap();
        assert_eq!(
            state.lineup(Side::Away).find_player_by_order(1).unwrap().name,
            "Willie Randolph"
        );
        state.out_strike_out().unwrap();
        state.new_batter("Rickey Henderson", None).unwrap();
        state.out_strike_out().unwrap();
        state.new_batter("Dave Winfield", None).unwrap();
        state.out_strike_out().unwrap();
        state.new_half().unwrap();
        state.new_half().unwrap();
        let err = state.new_batter("Rickey Henderson", None).unwrap_err();
        assert!(matches!(game_error(&err), Some(GameError::BattingOrder(_))));
    }

    #[test]
    fn swap_can_be_disabled() {
        let mut state = game_with(GameConfig {
            auto_swap_batting_order: false,
            ..GameConfig::default()
        });
        state.new_half().unwrap();
        let err = state.new_batter("Willie Randolph", None).unwrap_err();
        assert!(matches!(game_error(&err), Some(GameError::BattingOrder(_))));
    }

    #[test]
    fn unknown_batter_comes_off_the_roster() {
        let mut state = game();
        state.new_half().unwrap();
        state.new_batter("Dan Pasqua", Some(21)).unwrap();
        state.hit_single(None).unwrap();
        state.new_batter("Willie Randolph", None).unwrap();
        let lineup = state.lineup(Side::Away);
        let pasqua = lineup.find_player_by_name("Dan Pasqua").unwrap();
        assert_eq!(pasqua.order, Some(LineupPosition::First));
        assert!(pasqua.is_pending_sub);
        let events = close(state);
        assert!(events[0].pinch_hit);
        assert_eq!(events[0].removed_for_ph_bat.as_deref(), Some("Rickey Henderson"));
        assert_eq!(events[0].removed_for_ph_bat_fld, LeftFielder);
    }

    #[test]
    fn unknown_batter_without_roster_entry_fails() {
        let mut state = game();
        state.new_half().unwrap();
        let err = state.new_batter("Babe Ruth", None).unwrap_err();
        assert!(matches!(game_error(&err), Some(GameError::PlayerNotFound(_))));
    }

    #[test]
    fn fuzzy_batter_names_match() {
        let mut state = game();
        state.new_half().unwrap();
        state.new_batter("Ricky Henderson", None).unwrap();
        assert_eq!(state.batter(), Some("Rickey Henderson"));
    }

    #[test]
    fn reliever_is_charged_with_the_walk() {
        let mut state = game();
        state.new_half().unwrap();
        state.new_half().unwrap();
        state.new_batter("Wade Boggs", None).unwrap();
        for _ in 0..3 {
            state.pitch_ball().unwrap();
        }
        state.pitch_called_strike().unwrap();
        state.defensive_sub("Dave Righetti", Some("Ron Guidry"), Some(Pitcher)).unwrap();
        state.pitch_ball().unwrap();
        state.advance_on_walk(None, Base::First).unwrap();
        state.new_batter("Marty Barrett", None).unwrap();
        let events = close(state);
        let walk = &events[0];
        assert_eq!(walk.pitcher_id.as_deref(), Some("Dave Righetti"));
        assert_eq!(walk.resp_pitcher_id.as_deref(), Some("Ron Guidry"));
        assert_eq!(walk.run1_resp_pitcher, None);
        assert_eq!(walk.pitch_sequence, "BBBCB");
        assert_eq!((walk.balls, walk.strikes), (3, 1));
    }

    #[test]
    fn pinch_hitter_with_two_strikes_leaves_the_strikeout_behind() {
        let mut state = game();
        state.new_half().unwrap();
        state.new_batter("Rickey Henderson", None).unwrap();
        state.pitch_called_strike().unwrap();
        state.pitch_swinging_strike().unwrap();
        state.offensive_sub("Dan Pasqua", "Rickey Henderson", false, None).unwrap();
        state.pitch_swinging_strike().unwrap();
        state.out_strike_out().unwrap();
        state.new_batter("Willie Randolph", None).unwrap();
        let events = close(state);
        let k = &events[0];
        assert_eq!(k.batter_id.as_deref(), Some("Dan Pasqua"));
        assert_eq!(k.resp_batter_id.as_deref(), Some("Rickey Henderson"));
        assert!(k.pinch_hit);
        assert_eq!(k.putout1, Catcher);
    }

    #[test]
    fn caught_stealing_ends_the_inning_and_truncates_the_plate_appearance() {
        let mut state = game();
        state.new_half().unwrap();
        state.new_batter("Rickey Henderson", None).unwrap();
        state.hit_single(None).unwrap();
        state.new_batter("Willie Randolph", None).unwrap();
        state.out_strike_out().unwrap();
        state.new_batter("Don Mattingly", None).unwrap();
        state.out_popup(Shortstop, OutModifiers::default()).unwrap();
        state.new_batter("Dave Winfield", None).unwrap();
        state.pitch_ball().unwrap();
        state
            .out_caught_stealing("Rickey Henderson", &[Catcher, Shortstop], Some(Base::Second))
            .unwrap();
        state.new_half().unwrap();
        state.new_half().unwrap();
        state.new_batter("Dave Winfield", None).unwrap();
        let events = close(state);
        let cs = &events[3];
        assert_eq!(cs.event_type, EventType::CaughtStealing);
        assert_eq!(cs.event_text, "CS2(26)");
        assert!(cs.run1_cs);
        assert!(cs.pa_truncated);
        assert!(cs.inning_end);
        assert_eq!(cs.assist1, Catcher);
        assert_eq!(cs.putout1, Shortstop);
    }

    #[test]
    fn game_end_blocks_further_play() {
        let mut state = game();
        state.new_half().unwrap();
        state.new_batter("Rickey Henderson", None).unwrap();
        state.hit_home_run(Some(LeftFielder)).unwrap();
        state.set_previous_event_as_game_end().unwrap();
        assert!(state.is_over());
        let err = state.new_half().unwrap_err();
        assert_eq!(game_error(&err), Some(&GameError::GameOver));
        let events = state.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].game_new);
        assert!(events[0].game_end);
        assert!(events[0].inning_end);
        assert_eq!(events[0].event_text, "HR7");
    }

    #[test]
    fn batting_lines_count_the_game() {
        let mut state = game();
        state.new_half().unwrap();
        state.new_batter("Rickey Henderson", None).unwrap();
        state.hit_home_run(None).unwrap();
        state.new_batter("Willie Randolph", None).unwrap();
        state.advance_on_walk(None, Base::First).unwrap();
        state.new_batter("Don Mattingly", None).unwrap();
        let sacrifice = OutModifiers {
            sacrifice: true,
            ..OutModifiers::default()
        };
        state.out_fly_out(CenterFielder, sacrifice).unwrap();
        state.set_previous_event_as_game_end().unwrap();
        let lines = state.batting_lines();
        let rickey = lines.iter().find(|l| l.player_id == "Rickey Henderson").unwrap();
        assert_eq!(
            (rickey.pa, rickey.ab, rickey.h, rickey.hr, rickey.r, rickey.rbi),
            (1, 1, 1, 1, 1, 1)
        );
        let willie = lines.iter().find(|l| l.player_id == "Willie Randolph").unwrap();
        assert_eq!((willie.pa, willie.ab, willie.bb), (1, 0, 1));
        let donnie = lines.iter().find(|l| l.player_id == "Don Mattingly").unwrap();
        assert_eq!((donnie.pa, donnie.ab, donnie.sf), (1, 0, 1));
        assert_eq!(lines.len(), 18);
    }

    #[test]
    fn runner_must_be_on_base() {
        let mut state = game();
        state.new_half().unwrap();
        state.new_batter("Rickey Henderson", None).unwrap();
        let err = state.advance_on_stolen_base("Don Mattingly", Base::Second).unwrap_err();
        assert!(matches!(game_error(&err), Some(GameError::RunnerNotOnBase { .. })));
    }

    #[test]
    fn actions_resolve_through_the_vocabulary() {
        let mut state = game();
        state.new_half().unwrap();
        state.new_batter("Rickey Henderson", None).unwrap();
        let actions: Vec<PlayAction> = serde_json::from_str(
            r#"[
                {"kind": "pitch", "pitch": "ball"},
                {"kind": "hit", "hit": "double", "fielder": "left field"},
                {"kind": "advance", "to": "third base", "reason": "throw"}
            ]"#,
        )
        .unwrap();
        for action in &actions {
            state.apply(action).unwrap();
        }
        assert_eq!(state.bases().on_base(Base::Third), Some("Rickey Henderson"));
        let bad = PlayAction::Advance {
            runner: None,
            to: "dugout".to_string(),
            reason: AdvanceReason::OnPlay,
            fielder: None,
        };
        let err = state.apply(&bad).unwrap_err();
        assert_eq!(game_error(&err), Some(&GameError::UnknownBase("dugout".into())));
        state.new_batter("Willie Randolph", None).unwrap();
        let events = close(state);
        assert_eq!(events[0].event_text, "D7.B-3(TH)");
    }

    #[test]
    fn extra_inning_runner_starts_on_second() {
        let mut state = game();
        state.new_half().unwrap();
        state.place_runner("Bobby Meacham", Base::Second).unwrap();
        state.new_batter("Rickey Henderson", None).unwrap();
        state.hit_single(None).unwrap();
        state.score_run("Bobby Meacham", false).unwrap();
        state.new_batter("Willie Randolph", None).unwrap();
        let events = close(state);
        assert_eq!(events[0].base2_runner.as_deref(), Some("Bobby Meacham"));
        assert_eq!(events[0].run2_dest, 5);
        assert_eq!(events[0].event_text, "S.2-H(UR)");
        assert_eq!(events[0].run2_origin_event_id, Some(1));
    }

    const RBI_REASONS: [AdvanceReason; 7] = [
        AdvanceReason::OnPlay,
        AdvanceReason::Throw,
        AdvanceReason::WildPitch,
        AdvanceReason::PassedBall,
        AdvanceReason::Error,
        AdvanceReason::Balk,
        AdvanceReason::FieldersChoice,
    ];

    #[test]
    fn home_team_run_counts_for_the_home_side() {
        let mut state = game();
        state.new_half().unwrap();
        state.new_half().unwrap();
        state.new_batter("Wade Boggs", None).unwrap();
        state.hit_home_run(Some(LeftFielder)).unwrap();
        state.new_batter("Marty Barrett", None).unwrap();
        assert_eq!((state.score().away, state.score().home), (0, 1));

        let boggs = state.lineup(Side::Home).find_player_by_name("Wade Boggs").unwrap();
        assert_eq!((boggs.stats.h, boggs.stats.hr, boggs.stats.r, boggs.stats.rbi), (1, 1, 1, 1));
        let events = close(state);
        let homer = &events[0];
        assert_eq!(homer.batting_side, Side::Home);
        assert_eq!(homer.event_text, "HR7");
        assert_eq!(homer.event_type, EventType::HomeRun);
        assert_eq!((homer.away_score, homer.home_score), (0, 0));
        assert_eq!(homer.pitcher_id.as_deref(), Some("Ron Guidry"));
        assert_eq!(homer.bat_dest, 4);
        assert_eq!((homer.event_runs, homer.rbi), (1, 1));
    }

    #[test]
    fn pickoff_attempts_enter_the_sequence_and_a_pickoff_is_its_own_event() {
        let mut state = game();
        state.new_half().unwrap();
        state.new_batter("Rickey Henderson", None).unwrap();
        state.hit_single(Some(CenterFielder)).unwrap();
        state.new_batter("Willie Randolph", None).unwrap();
        state.pitch_pickoff_attempt(Base::First).unwrap();
        state.pitch_ball().unwrap();
        state
            .out_picked_off("Rickey Henderson", &[Pitcher, FirstBaseman], None)
            .unwrap();
        assert_eq!(state.outs(), 1);
        assert_eq!(state.bases().runner_names(), (None, None, None));
        state.pitch_called_strike().unwrap();
        assert_eq!(state.pitch_sequence(), "1B.C");

        let events = close(state);
        let pickoff = &events[1];
        assert_eq!(pickoff.event_type, EventType::Pickoff);
        assert_eq!(pickoff.event_text, "PO1(13)");
        assert_eq!(pickoff.pitch_sequence, "1B");
        assert!(pickoff.run1_pk);
        assert!(!pickoff.bat_event);
        assert_eq!(pickoff.outs_on_play, 1);
        assert_eq!(pickoff.assist1, Pitcher);
        assert_eq!(pickoff.putout1, FirstBaseman);
    }

    #[test]
    fn balk_and_error_advances_are_separate_runner_events() {
        let mut state = game();
        state.new_half().unwrap();
        state.new_batter("Rickey Henderson", None).unwrap();
        state.hit_single(Some(CenterFielder)).unwrap();
        state.new_batter("Willie Randolph", None).unwrap();
        state.advance_on_balk("Rickey Henderson", Base::Second).unwrap();
        state.pitch_ball().unwrap();
        state
            .advance_on_error(Some("Rickey Henderson"), Base::Third, Some(Catcher))
            .unwrap();
        state.pitch_ball().unwrap();
        assert_eq!(state.bases().runner_names(), (None, None, Some("Rickey Henderson")));

        let events = close(state);
        let balk = &events[1];
        assert_eq!(balk.event_type, EventType::Balk);
        assert_eq!(balk.event_text, "BK.1-2");
        assert_eq!((balk.run1_dest, balk.error_count), (2, 0));
        let error = &events[2];
        assert_eq!(error.event_type, EventType::OtherAdvance);
        assert_eq!(error.event_text, "OA.2-3(E2)");
        assert_eq!(error.error_count, 1);
        assert_eq!(error.error1_fielder, Catcher);
        assert_eq!(error.error1_type, Some(ErrorType::Fielding));
        assert_eq!(error.pitch_sequence, ".B");
        assert!(!error.bat_event);
    }

    #[test]
    fn one_error_is_charged_once_however_many_runners_advance() {
        let mut state = game();
        state.new_half().unwrap();
        state.new_batter("Rickey Henderson", None).unwrap();
        state.hit_single(Some(CenterFielder)).unwrap();
        state.new_batter("Willie Randolph", None).unwrap();
        state.advance_on_error(None, Base::First, Some(Shortstop)).unwrap();
        state
            .advance_on_error(Some("Rickey Henderson"), Base::Third, Some(Shortstop))
            .unwrap();
        state.new_half().unwrap();

        let randolph = state
            .lineup(Side::Away)
            .find_player_by_name("Willie Randolph")
            .unwrap();
        assert_eq!((randolph.stats.ab, randolph.stats.reached_on_error), (1, 1));

        state.new_batter("Wade Boggs", None).unwrap();
        state.advance_on_error(None, Base::First, Some(Shortstop)).unwrap();
        state
            .advance(
                Some("Wade Boggs"),
                Base::Second,
                AdvanceReason::ThrowingError,
                Some(FirstBaseman),
            )
            .unwrap();

        let events = close(state);
        let one_misplay = &events[1];
        assert_eq!(one_misplay.event_type, EventType::Error);
        assert_eq!(one_misplay.event_text, "E6.1-3(E6)");
        assert_eq!(one_misplay.error_count, 1);
        assert!(one_misplay.batter_safe_on_error);
        let two_misplays = &events[2];
        assert_eq!(two_misplays.event_text, "E6.B-2(E3)");
        assert_eq!(two_misplays.error_count, 2);
        assert_eq!(two_misplays.error1_fielder, Shortstop);
        assert_eq!(two_misplays.error2_fielder, FirstBaseman);
        assert_eq!(two_misplays.error2_type, Some(ErrorType::Throwing));
    }

    #[test]
    fn dropped_foul_is_a_runner_event_before_a_dropped_third_strike() {
        let mut state = game();
        state.new_half().unwrap();
        state.new_batter("Rickey Henderson", None).unwrap();
        state.pitch_ball().unwrap();
        state.pitch_dropped_foul(FirstBaseman).unwrap();
        state.pitch_swinging_strike().unwrap();
        state.pitch_swinging_strike().unwrap();
        state.out_dropped_third_strike(&[Catcher, FirstBaseman]).unwrap();
        state.new_batter("Willie Randolph", None).unwrap();
        assert_eq!(state.outs(), 1);

        let henderson = state
            .lineup(Side::Away)
            .find_player_by_name("Rickey Henderson")
            .unwrap();
        assert_eq!((henderson.stats.pa, henderson.stats.ab, henderson.stats.so), (1, 1, 1));
        let events = close(state);
        assert_eq!(events.len(), 2);
        let foul = &events[0];
        assert_eq!(foul.event_type, EventType::FoulError);
        assert_eq!(foul.event_text, "FLE3");
        assert_eq!(foul.pitch_sequence, "BF");
        assert_eq!(foul.error_count, 1);
        assert_eq!(foul.error1_fielder, FirstBaseman);
        assert_eq!(foul.error1_type, Some(ErrorType::DroppedFoul));
        assert!(!foul.bat_event);
        let strikeout = &events[1];
        assert_eq!(strikeout.event_type, EventType::StrikeOut);
        assert_eq!(strikeout.event_text, "K23");
        assert_eq!(strikeout.pitch_sequence, "BF.SS");
        assert_eq!(strikeout.outs_on_play, 1);
        assert_eq!(strikeout.assist1, Catcher);
        assert_eq!(strikeout.putout1, FirstBaseman);
        assert!(strikeout.at_bat);
    }

    #[test]
    fn unearned_run_is_marked_and_still_counts() {
        let mut state = game();
        state.new_half().unwrap();
        state.new_batter("Rickey Henderson", None).unwrap();
        state.hit_double(Some(LeftFielder)).unwrap();
        state.new_batter("Willie Randolph", None).unwrap();
        state.hit_single(Some(CenterFielder)).unwrap();
        state.score_run("Rickey Henderson", false).unwrap();
        state.new_batter("Don Mattingly", None).unwrap();
        assert_eq!(state.score().away, 1);

        let events = close(state);
        let single = &events[1];
        assert_eq!(single.event_text, "S8.2-H(UR)");
        assert_eq!(single.run2_dest, 5);
        assert_eq!((single.event_runs, single.rbi), (1, 1));
    }

    #[test]
    fn fielders_can_trade_positions() {
        let mut state = game();
        state.new_half().unwrap();
        state.defensive_sub("Jim Rice", None, Some(CenterFielder)).unwrap();
        state.defensive_sub("Tony Armas", None, Some(LeftFielder)).unwrap();
        let red_sox = state.lineup(Side::Home);
        assert_eq!(red_sox.validate(), Ok(()));
        let rice = red_sox.find_player_by_name("Jim Rice").unwrap();
        assert_eq!(rice.order, Some(LineupPosition::Third));

        state.new_batter("Rickey Henderson", None).unwrap();
        state.hit_single(Some(CenterFielder)).unwrap();
        let events = close(state);
        assert_eq!(events[0].pos8_fielder.as_deref(), Some("Jim Rice"));
        assert_eq!(events[0].pos7_fielder.as_deref(), Some("Tony Armas"));
    }

    #[test]
    fn bench_player_takes_the_named_position() {
        let mut state = game();
        state.new_half().unwrap();
        state.defensive_sub("Bob Stanley", None, Some(Pitcher)).unwrap();
        let red_sox = state.lineup(Side::Home);
        let stanley = red_sox.find_player_by_name("Bob Stanley").unwrap();
        assert_eq!((stanley.order, stanley.number), (Some(LineupPosition::Ninth), Some(46)));
        assert!(red_sox.departed().iter().any(|p| p.name == "Oil Can Boyd"));
        assert_eq!(red_sox.validate(), Ok(()));

        state.new_batter("Rickey Henderson", None).unwrap();
        state.out_strike_out().unwrap();
        let events = close(state);
        assert_eq!(events[0].pitcher_id.as_deref(), Some("Bob Stanley"));
        assert_eq!(events[0].event_text, "K");
    }

    #[test]
    fn double_switch_leaves_a_slot_for_the_next_sub() {
        let mut state = game();
        state.new_half().unwrap();
        state
            .defensive_sub("Jackie Gutierrez", Some("Wade Boggs"), Some(ThirdBaseman))
            .unwrap();
        let red_sox = state.lineup(Side::Home);
        assert_eq!(red_sox.vacant_slots(), [LineupPosition::First]);
        assert_eq!(
            red_sox.validate(),
            Err(GameError::IncompleteLineup(LineupProblem::MissingOrder(1)))
        );

        state.defensive_sub("Ed Romero", None, Some(Shortstop)).unwrap();
        let red_sox = state.lineup(Side::Home);
        assert_eq!(red_sox.validate(), Ok(()));
        assert!(red_sox.vacant_slots().is_empty());
        let romero = red_sox.find_player_by_name("Ed Romero").unwrap();
        assert_eq!((romero.order, romero.position), (Some(LineupPosition::First), Shortstop));
        let gutierrez = red_sox.find_player_by_name("Jackie Gutierrez").unwrap();
        assert_eq!(
            (gutierrez.order, gutierrez.position),
            (Some(LineupPosition::Eighth), ThirdBaseman)
        );

        state.new_half().unwrap();
        state.new_batter("Ed Romero", None).unwrap();
        state.hit_single(Some(RightFielder)).unwrap();
        let events = close(state);
        let single = &events[0];
        assert_eq!(single.batter_id.as_deref(), Some("Ed Romero"));
        assert_eq!(single.batter_lineup, Some(LineupPosition::First));
        assert_eq!(single.batter_fld_cd, Shortstop);
    }

    #[test]
    fn entering_without_a_position_or_vacancy_fails() {
        let mut state = game();
        state.new_half().unwrap();
        let err = state.defensive_sub("Reid Nichols", None, None).unwrap_err();
        assert!(matches!(game_error(&err), Some(GameError::UnknownPosition(_))));
    }

    proptest! {
        #[test]
        fn rbi_credit_follows_the_play(reason_index in 0_usize..7, double_play in any::<bool>()) {
            let reason = RBI_REASONS[reason_index];
            let mut state = game();
            state.new_half().unwrap();
            state.new_batter("Rickey Henderson", None).unwrap();
            state.hit_triple(None).unwrap();
            state.new_batter("Willie Randolph", None).unwrap();
            let modifiers = OutModifiers { double_play, ..OutModifiers::default() };
            state.out_thrown_out(None, &[Shortstop, FirstBaseman], None, modifiers).unwrap();
            state.advance(Some("Rickey Henderson"), Base::Home, reason, Some(Shortstop)).unwrap();
            state.new_batter("Don Mattingly", None).unwrap();
            let events = close(state);
            let play = &events[1];
            let expected = u8::from(!reason.blocks_rbi() && !double_play);
            prop_assert_eq!(play.rbi, expected);
            prop_assert_eq!(play.event_runs, 1);
            prop_assert!(play.bat_event);
        }

        #[test]
        fn runs_in_runner_only_events_never_earn_rbi(reason_index in 0_usize..3) {
            let reasons =
                [AdvanceReason::WildPitch, AdvanceReason::PassedBall, AdvanceReason::Balk];
            let reason = reasons[reason_index];
            let mut state = game();
            state.new_half().unwrap();
            state.new_batter("Rickey Henderson", None).unwrap();
            state.hit_triple(None).unwrap();
            state.new_batter("Willie Randolph", None).unwrap();
            state.advance(Some("Rickey Henderson"), Base::Home, reason, None).unwrap();
            state.pitch_ball().unwrap();
            let score = state.score().away;
            prop_assert_eq!(score, 1);
            let events = close(state);
            prop_assert_eq!(events[1].rbi, 0);
            prop_assert!(!events[1].bat_event);
            prop_assert_eq!(events[1].event_type, reason.runner_event_type());
        }

        #[test]
        fn new_half_parity(calls in 1_usize..12) {
            let mut state = game();
            for _ in 0..calls {
                state.new_half().unwrap();
            }
            let expected_inning = u8::try_from((calls + 1) / 2).unwrap();
            prop_assert_eq!(state.inning(), expected_inning);
            let expected_frame =
                if calls % 2 == 1 { InningFrame::Top } else { InningFrame::Bottom };
            prop_assert_eq!(state.frame(), expected_frame);
            prop_assert_eq!(state.outs(), 0);
        }
    }
}
