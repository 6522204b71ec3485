use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::Serialize;

use crate::event_file::game_state::{GameState, PlayBuffer};
use crate::event_file::lineup::Player;
use crate::event_file::play::{BattedBall, ErrorType, EventType};
use crate::event_file::traits::{
    BaseRunner, EventId, FieldingPosition, Hand, Inning, InningFrame, LineupPosition, Matchup,
    Side,
};
use crate::util::serialize_flag;

/// One row of Chadwick `cwevent` output: the 97 standard fields followed by
/// the extended fields this engine can fill in.
#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct Event {
    #[serde(rename = "GAME_ID")]
    pub game_id: String,
    #[serde(rename = "AWAY_TEAM_ID")]
    pub away_team_id: String,
    #[serde(rename = "INN_CT")]
    pub inning: Inning,
    #[serde(rename = "BAT_HOME_ID")]
    pub batting_side: Side,
    #[serde(rename = "OUTS_CT")]
    pub outs: u8,
    #[serde(rename = "BALLS_CT")]
    pub balls: u8,
    #[serde(rename = "STRIKES_CT")]
    pub strikes: u8,
    #[serde(rename = "PITCH_SEQ_TX")]
    pub pitch_sequence: String,
    #[serde(rename = "AWAY_SCORE_CT")]
    pub away_score: u16,
    #[serde(rename = "HOME_SCORE_CT")]
    pub home_score: u16,
    #[serde(rename = "BAT_ID")]
    pub batter_id: Option<String>,
    #[serde(rename = "BAT_HAND_CD")]
    pub batter_hand: Option<Hand>,
    #[serde(rename = "RESP_BAT_ID")]
    pub resp_batter_id: Option<String>,
    #[serde(rename = "RESP_BAT_HAND_CD")]
    pub resp_batter_hand: Option<Hand>,
    #[serde(rename = "PIT_ID")]
    pub pitcher_id: Option<String>,
    #[serde(rename = "PIT_HAND_CD")]
    pub pitcher_hand: Option<Hand>,
    #[serde(rename = "RES_PIT_ID")]
    pub resp_pitcher_id: Option<String>,
    #[serde(rename = "RES_PIT_HAND_CD")]
    pub resp_pitcher_hand: Option<Hand>,
    #[serde(rename = "POS2_FLD_ID")]
    pub pos2_fielder: Option<String>,
    #[serde(rename = "POS3_FLD_ID")]
    pub pos3_fielder: Option<String>,
    #[serde(rename = "POS4_FLD_ID")]
    pub pos4_fielder: Option<String>,
    #[serde(rename = "POS5_FLD_ID")]
    pub pos5_fielder: Option<String>,
    #[serde(rename = "POS6_FLD_ID")]
    pub pos6_fielder: Option<String>,
    #[serde(rename = "POS7_FLD_ID")]
    pub pos7_fielder: Option<String>,
    #[serde(rename = "POS8_FLD_ID")]
    pub pos8_fielder: Option<String>,
    #[serde(rename = "POS9_FLD_ID")]
    pub pos9_fielder: Option<String>,
    #[serde(rename = "BASE1_RUN_ID")]
    pub base1_runner: Option<String>,
    #[serde(rename = "BASE2_RUN_ID")]
    pub base2_runner: Option<String>,
    #[serde(rename = "BASE3_RUN_ID")]
    pub base3_runner: Option<String>,
    #[serde(rename = "EVENT_TX")]
    pub event_text: String,
    #[serde(rename = "LEADOFF_FL", serialize_with = "serialize_flag")]
    pub leadoff: bool,
    #[serde(rename = "PH_FL", serialize_with = "serialize_flag")]
    pub pinch_hit: bool,
    #[serde(rename = "BAT_FLD_CD")]
    pub batter_fld_cd: FieldingPosition,
    #[serde(rename = "BAT_LINEUP_ID")]
    pub batter_lineup: Option<LineupPosition>,
    #[serde(rename = "EVENT_CD")]
    pub event_type: EventType,
    #[serde(rename = "BAT_EVENT_FL", serialize_with = "serialize_flag")]
    pub bat_event: bool,
    #[serde(rename = "AB_FL", serialize_with = "serialize_flag")]
    pub at_bat: bool,
    #[serde(rename = "H_CD")]
    pub hit_value: u8,
    #[serde(rename = "SH_FL", serialize_with = "serialize_flag")]
    pub sacrifice_hit: bool,
    #[serde(rename = "SF_FL", serialize_with = "serialize_flag")]
    pub sacrifice_fly: bool,
    #[serde(rename = "EVENT_OUTS_CT")]
    pub outs_on_play: u8,
    #[serde(rename = "DP_FL", serialize_with = "serialize_flag")]
    pub double_play: bool,
    #[serde(rename = "TP_FL", serialize_with = "serialize_flag")]
    pub triple_play: bool,
    #[serde(rename = "RBI_CT")]
    pub rbi: u8,
    #[serde(rename = "WP_FL", serialize_with = "serialize_flag")]
    pub wild_pitch: bool,
    #[serde(rename = "PB_FL", serialize_with = "serialize_flag")]
    pub passed_ball: bool,
    #[serde(rename = "FLD_CD")]
    pub fielded_by: FieldingPosition,
    #[serde(rename = "BATTEDBALL_CD")]
    pub batted_ball: Option<BattedBall>,
    #[serde(rename = "BUNT_FL", serialize_with = "serialize_flag")]
    pub bunt: bool,
    #[serde(rename = "FOUL_FL", serialize_with = "serialize_flag")]
    pub foul: bool,
    #[serde(rename = "BATTEDBALL_LOC_TX")]
    pub hit_location: Option<String>,
    #[serde(rename = "ERR_CT")]
    pub error_count: u8,
    #[serde(rename = "ERR1_FLD_CD")]
    pub error1_fielder: FieldingPosition,
    #[serde(rename = "ERR1_CD")]
    pub error1_type: Option<ErrorType>,
    #[serde(rename = "ERR2_FLD_CD")]
    pub error2_fielder: FieldingPosition,
    #[serde(rename = "ERR2_CD")]
    pub error2_type: Option<ErrorType>,
    #[serde(rename = "ERR3_FLD_CD")]
    pub error3_fielder: FieldingPosition,
    #[serde(rename = "ERR3_CD")]
    pub error3_type: Option<ErrorType>,
    #[serde(rename = "BAT_DEST_ID")]
    pub bat_dest: u8,
    #[serde(rename = "RUN1_DEST_ID")]
    pub run1_dest: u8,
    #[serde(rename = "RUN2_DEST_ID")]
    pub run2_dest: u8,
    #[serde(rename = "RUN3_DEST_ID")]
    pub run3_dest: u8,
    #[serde(rename = "BAT_PLAY_TX")]
    pub bat_play: String,
    #[serde(rename = "RUN1_PLAY_TX")]
    pub run1_play: String,
    #[serde(rename = "RUN2_PLAY_TX")]
    pub run2_play: String,
    #[serde(rename = "RUN3_PLAY_TX")]
    pub run3_play: String,
    #[serde(rename = "RUN1_SB_FL", serialize_with = "serialize_flag")]
    pub run1_sb: bool,
    #[serde(rename = "RUN2_SB_FL", serialize_with = "serialize_flag")]
    pub run2_sb: bool,
    #[serde(rename = "RUN3_SB_FL", serialize_with = "serialize_flag")]
    pub run3_sb: bool,
    #[serde(rename = "RUN1_CS_FL", serialize_with = "serialize_flag")]
    pub run1_cs: bool,
    #[serde(rename = "RUN2_CS_FL", serialize_with = "serialize_flag")]
    pub run2_cs: bool,
    #[serde(rename = "RUN3_CS_FL", serialize_with = "serialize_flag")]
    pub run3_cs: bool,
    #[serde(rename = "RUN1_PK_FL", serialize_with = "serialize_flag")]
    pub run1_pk: bool,
    #[serde(rename = "RUN2_PK_FL", serialize_with = "serialize_flag")]
    pub run2_pk: bool,
    #[serde(rename = "RUN3_PK_FL", serialize_with = "serialize_flag")]
    pub run3_pk: bool,
    #[serde(rename = "RUN1_RESP_PIT_ID")]
    pub run1_resp_pitcher: Option<String>,
    #[serde(rename = "RUN2_RESP_PIT_ID")]
    pub run2_resp_pitcher: Option<String>,
    #[serde(rename = "RUN3_RESP_PIT_ID")]
    pub run3_resp_pitcher: Option<String>,
    #[serde(rename = "GAME_NEW_FL", serialize_with = "serialize_flag")]
    pub game_new: bool,
    #[serde(rename = "GAME_END_FL", serialize_with = "serialize_flag")]
    pub game_end: bool,
    #[serde(rename = "PR_RUN1_FL", serialize_with = "serialize_flag")]
    pub pr_run1: bool,
    #[serde(rename = "PR_RUN2_FL", serialize_with = "serialize_flag")]
    pub pr_run2: bool,
    #[serde(rename = "PR_RUN3_FL", serialize_with = "serialize_flag")]
    pub pr_run3: bool,
    #[serde(rename = "REMOVED_FOR_PR_RUN1_ID")]
    pub removed_for_pr_run1: Option<String>,
    #[serde(rename = "REMOVED_FOR_PR_RUN2_ID")]
    pub removed_for_pr_run2: Option<String>,
    #[serde(rename = "REMOVED_FOR_PR_RUN3_ID")]
    pub removed_for_pr_run3: Option<String>,
    #[serde(rename = "REMOVED_FOR_PH_BAT_ID")]
    pub removed_for_ph_bat: Option<String>,
    #[serde(rename = "REMOVED_FOR_PH_BAT_FLD_CD")]
    pub removed_for_ph_bat_fld: FieldingPosition,
    #[serde(rename = "PO1_FLD_CD")]
    pub putout1: FieldingPosition,
    #[serde(rename = "PO2_FLD_CD")]
    pub putout2: FieldingPosition,
    #[serde(rename = "PO3_FLD_CD")]
    pub putout3: FieldingPosition,
    #[serde(rename = "ASS1_FLD_CD")]
    pub assist1: FieldingPosition,
    #[serde(rename = "ASS2_FLD_CD")]
    pub assist2: FieldingPosition,
    #[serde(rename = "ASS3_FLD_CD")]
    pub assist3: FieldingPosition,
    #[serde(rename = "ASS4_FLD_CD")]
    pub assist4: FieldingPosition,
    #[serde(rename = "ASS5_FLD_CD")]
    pub assist5: FieldingPosition,
    #[serde(rename = "EVENT_ID")]
    pub event_id: EventId,

    #[serde(rename = "HOME_TEAM_ID")]
    pub home_team_id: String,
    #[serde(rename = "BAT_TEAM_ID")]
    pub bat_team_id: String,
    #[serde(rename = "FLD_TEAM_ID")]
    pub fld_team_id: String,
    #[serde(rename = "BAT_LAST_ID")]
    pub bat_last: u8,
    #[serde(rename = "INN_NEW_FL", serialize_with = "serialize_flag")]
    pub inning_new: bool,
    #[serde(rename = "INN_END_FL", serialize_with = "serialize_flag")]
    pub inning_end: bool,
    #[serde(rename = "START_BAT_SCORE_CT")]
    pub start_bat_score: u16,
    #[serde(rename = "START_FLD_SCORE_CT")]
    pub start_fld_score: u16,
    #[serde(rename = "INN_RUNS_CT")]
    pub inning_runs: u8,
    #[serde(rename = "GAME_PA_CT")]
    pub game_pa: u16,
    #[serde(rename = "INN_PA_CT")]
    pub inning_pa: u8,
    #[serde(rename = "PA_NEW_FL", serialize_with = "serialize_flag")]
    pub pa_new: bool,
    #[serde(rename = "PA_TRUNC_FL", serialize_with = "serialize_flag")]
    pub pa_truncated: bool,
    #[serde(rename = "START_BASES_CD")]
    pub start_bases_cd: u8,
    #[serde(rename = "END_BASES_CD")]
    pub end_bases_cd: u8,
    #[serde(rename = "BAT_START_FL", serialize_with = "serialize_flag")]
    pub batter_starter: bool,
    #[serde(rename = "RESP_BAT_START_FL", serialize_with = "serialize_flag")]
    pub resp_batter_starter: bool,
    #[serde(rename = "BAT_ON_DECK_ID")]
    pub on_deck: Option<String>,
    #[serde(rename = "BAT_IN_HOLD_ID")]
    pub in_hold: Option<String>,
    #[serde(rename = "PIT_START_FL", serialize_with = "serialize_flag")]
    pub pitcher_starter: bool,
    #[serde(rename = "RESP_PIT_START_FL", serialize_with = "serialize_flag")]
    pub resp_pitcher_starter: bool,
    #[serde(rename = "RUN1_FLD_CD")]
    pub run1_fld_cd: FieldingPosition,
    #[serde(rename = "RUN1_LINEUP_CD")]
    pub run1_lineup: Option<LineupPosition>,
    #[serde(rename = "RUN1_ORIGIN_EVENT_ID")]
    pub run1_origin_event_id: Option<EventId>,
    #[serde(rename = "RUN2_FLD_CD")]
    pub run2_fld_cd: FieldingPosition,
    #[serde(rename = "RUN2_LINEUP_CD")]
    pub run2_lineup: Option<LineupPosition>,
    #[serde(rename = "RUN2_ORIGIN_EVENT_ID")]
    pub run2_origin_event_id: Option<EventId>,
    #[serde(rename = "RUN3_FLD_CD")]
    pub run3_fld_cd: FieldingPosition,
    #[serde(rename = "RUN3_LINEUP_CD")]
    pub run3_lineup: Option<LineupPosition>,
    #[serde(rename = "RUN3_ORIGIN_EVENT_ID")]
    pub run3_origin_event_id: Option<EventId>,
    #[serde(rename = "RUN1_RESP_CAT_ID")]
    pub run1_resp_catcher: Option<String>,
    #[serde(rename = "RUN2_RESP_CAT_ID")]
    pub run2_resp_catcher: Option<String>,
    #[serde(rename = "RUN3_RESP_CAT_ID")]
    pub run3_resp_catcher: Option<String>,
    #[serde(rename = "PA_BALL_CT")]
    pub pa_balls: u8,
    #[serde(rename = "PA_CALLED_BALL_CT")]
    pub pa_called_balls: u8,
    #[serde(rename = "PA_INTENT_BALL_CT")]
    pub pa_intentional_balls: u8,
    #[serde(rename = "PA_PITCHOUT_BALL_CT")]
    pub pa_pitchout_balls: u8,
    #[serde(rename = "PA_HITBATTER_BALL_CT")]
    pub pa_hit_batter_balls: u8,
    #[serde(rename = "PA_OTHER_BALL_CT")]
    pub pa_other_balls: u8,
    #[serde(rename = "PA_STRIKE_CT")]
    pub pa_strikes: u8,
    #[serde(rename = "PA_CALLED_STRIKE_CT")]
    pub pa_called_strikes: u8,
    #[serde(rename = "PA_SWINGMISS_STRIKE_CT")]
    pub pa_swinging_strikes: u8,
    #[serde(rename = "PA_FOUL_STRIKE_CT")]
    pub pa_foul_strikes: u8,
    #[serde(rename = "PA_INPLAY_STRIKE_CT")]
    pub pa_in_play_strikes: u8,
    #[serde(rename = "PA_OTHER_STRIKE_CT")]
    pub pa_other_strikes: u8,
    #[serde(rename = "EVENT_RUNS_CT")]
    pub event_runs: u8,
    #[serde(rename = "FLD_ID")]
    pub fielder_id: Option<String>,
    #[serde(rename = "BASE2_FORCE_FL", serialize_with = "serialize_flag")]
    pub base2_force: bool,
    #[serde(rename = "BASE3_FORCE_FL", serialize_with = "serialize_flag")]
    pub base3_force: bool,
    #[serde(rename = "BASE4_FORCE_FL", serialize_with = "serialize_flag")]
    pub base4_force: bool,
    #[serde(rename = "BAT_SAFE_ERR_FL", serialize_with = "serialize_flag")]
    pub batter_safe_on_error: bool,
    #[serde(rename = "BAT_FATE_ID")]
    pub bat_fate: u8,
    #[serde(rename = "RUN1_FATE_ID")]
    pub run1_fate: u8,
    #[serde(rename = "RUN2_FATE_ID")]
    pub run2_fate: u8,
    #[serde(rename = "RUN3_FATE_ID")]
    pub run3_fate: u8,
    #[serde(rename = "FATE_RUNS_CT")]
    pub fate_runs: u8,
    #[serde(rename = "ASS6_FLD_CD")]
    pub assist6: FieldingPosition,
    #[serde(rename = "ASS7_FLD_CD")]
    pub assist7: FieldingPosition,
    #[serde(rename = "ASS8_FLD_CD")]
    pub assist8: FieldingPosition,
    #[serde(rename = "ASS9_FLD_CD")]
    pub assist9: FieldingPosition,
    #[serde(rename = "ASS10_FLD_CD")]
    pub assist10: FieldingPosition,
    #[serde(rename = "UNKNOWN_OUT_EXC_FL", serialize_with = "serialize_flag")]
    pub unknown_out: bool,
    #[serde(rename = "UNCERTAIN_PLAY_EXC_FL", serialize_with = "serialize_flag")]
    pub uncertain_play: bool,
    #[serde(rename = "DESCRIPTION")]
    pub description: String,
}

/// Per-slot values for the three runners on base at the start of a play.
struct RunnerColumns<T> {
    first: T,
    second: T,
    third: T,
}

impl<T> RunnerColumns<T> {
    fn build(f: impl Fn(BaseRunner) -> T) -> Self {
        Self {
            first: f(BaseRunner::First),
            second: f(BaseRunner::Second),
            third: f(BaseRunner::Third),
        }
    }
}

impl Event {
    /// Captures the game as it stands when `play` is recorded. Fates are
    /// filled in later, when the half-inning closes.
    #[allow(clippy::too_many_lines)]
    pub(crate) fn snapshot(state: &GameState, play: &PlayBuffer, batting: bool) -> Self {
        let side = state.batting_side;
        let fielding = side.flip();
        let start = &state.start;
        let personnel = play.personnel.clone().unwrap_or_default();
        let batter = personnel.batter.as_ref();
        let pitcher = personnel.pitcher.as_ref();
        let pitcher_hand = pitcher.and_then(|p| p.throws);
        let event_type = play.event_type();

        let batter_name = batter.map(|b| b.name.clone());
        let resp_batter_name = match event_type {
            EventType::StrikeOut => state.rare.strikeout_responsible_batter.clone(),
            _ => None,
        }
        .or_else(|| batter_name.clone());
        let resp_batter = resp_batter_name
            .as_deref()
            .and_then(|n| state.find_participant(side, n));
        let pitcher_name = pitcher.map(|p| p.name.clone());
        let resp_pitcher_name = match event_type {
            EventType::Walk | EventType::IntentionalWalk => {
                state.rare.walk_responsible_pitcher.clone()
            }
            _ => None,
        }
        .or_else(|| pitcher_name.clone());
        let resp_pitcher = resp_pitcher_name
            .as_deref()
            .and_then(|n| state.find_participant(fielding, n));
        let hand_against = |player: Option<&Player>| {
            player
                .and_then(|p| p.bats)
                .map(|h| h.batting_against(pitcher_hand))
        };
        let is_starter = |side: Side, name: Option<&String>| {
            name.map_or(false, |n| state.starters.get(side).contains(n))
        };

        let fielder = |position: FieldingPosition| personnel.fielders.get(position).cloned();
        let destination = |br: BaseRunner| -> u8 {
            match play.movement(br) {
                Some(m) if m.out => 0,
                Some(m) => m.end.into(),
                None => start
                    .runner(br)
                    .and(br.base())
                    .map_or(0, u8::from),
            }
        };
        let play_text = |br: BaseRunner| {
            play.movement(br)
                .map(|m| m.play_text.clone())
                .unwrap_or_default()
        };
        let runner_name = RunnerColumns::build(|br| start.runner(br).map(|r| r.name.clone()));
        let origin = RunnerColumns::build(|br| {
            start
                .runner(br)
                .and_then(|r| state.bases.origin(r.fate))
                .cloned()
        });
        let removed_for_pr =
            RunnerColumns::build(|br| start.runner(br).and_then(|r| r.replaced.clone()));

        let pinch_hit = state
            .rare
            .pinch_hit
            .as_ref()
            .filter(|ph| Some(&ph.batter) == batter_name.as_ref());
        let batting_lineup = state.lineups.get(side);
        let upcoming = |steps: usize| {
            let mut slot = batter.and_then(|b| b.order)?;
            for _ in 0..steps {
                slot = slot.next();
            }
            batting_lineup.find_player_at(slot).ok().map(|p| p.name.clone())
        };

        let error = |i: usize| play.errors.get(i).copied();
        let putout = |i: usize| play.putouts.get(i).copied().unwrap_or_default();
        let assist = |i: usize| play.assists.get(i).copied().unwrap_or_default();
        let counts = state.pitches.pitch_counts();
        let bases_cd = start.bases_cd;
        let is_batting_force = |mask: u8| batting && bases_cd & mask == mask;

        Self {
            game_id: state.game_id.clone(),
            away_team_id: state.teams.away.clone(),
            inning: state.inning,
            batting_side: side,
            outs: start.outs,
            balls: state.count.balls.min(3),
            strikes: state.count.strikes.min(2),
            pitch_sequence: state.pitches.to_string(),
            away_score: start.score.away,
            home_score: start.score.home,
            batter_hand: hand_against(batter),
            resp_batter_hand: hand_against(resp_batter),
            resp_batter_starter: is_starter(side, resp_batter_name.as_ref()),
            batter_starter: is_starter(side, batter_name.as_ref()),
            batter_id: batter_name,
            resp_batter_id: resp_batter_name,
            pitcher_hand,
            resp_pitcher_hand: resp_pitcher.and_then(|p| p.throws),
            pitcher_starter: is_starter(fielding, pitcher_name.as_ref()),
            resp_pitcher_starter: is_starter(fielding, resp_pitcher_name.as_ref()),
            pitcher_id: pitcher_name,
            resp_pitcher_id: resp_pitcher_name,
            pos2_fielder: fielder(FieldingPosition::Catcher),
            pos3_fielder: fielder(FieldingPosition::FirstBaseman),
            pos4_fielder: fielder(FieldingPosition::SecondBaseman),
            pos5_fielder: fielder(FieldingPosition::ThirdBaseman),
            pos6_fielder: fielder(FieldingPosition::Shortstop),
            pos7_fielder: fielder(FieldingPosition::LeftFielder),
            pos8_fielder: fielder(FieldingPosition::CenterFielder),
            pos9_fielder: fielder(FieldingPosition::RightFielder),
            base1_runner: runner_name.first,
            base2_runner: runner_name.second,
            base3_runner: runner_name.third,
            event_text: play.text(),
            leadoff: state.leadoff,
            pinch_hit: pinch_hit.is_some(),
            batter_fld_cd: batter.map(|b| b.position).unwrap_or_default(),
            batter_lineup: batter.and_then(|b| b.order),
            event_type,
            bat_event: batting,
            at_bat: batting && play.is_at_bat(),
            hit_value: event_type.hit_value(),
            sacrifice_hit: play.sacrifice_hit,
            sacrifice_fly: play.sacrifice_fly,
            outs_on_play: play.outs_on_play,
            double_play: play.double_play,
            triple_play: play.triple_play,
            rbi: play.rbi,
            wild_pitch: play.wild_pitch,
            passed_ball: play.passed_ball,
            fielded_by: play.fielded_by,
            batted_ball: play.batted_ball,
            bunt: play.bunt,
            foul: play.foul,
            hit_location: play.hit_location.clone(),
            error_count: u8::try_from(play.errors.len()).unwrap_or(u8::MAX),
            error1_fielder: error(0).map(|e| e.0).unwrap_or_default(),
            error1_type: error(0).map(|e| e.1),
            error2_fielder: error(1).map(|e| e.0).unwrap_or_default(),
            error2_type: error(1).map(|e| e.1),
            error3_fielder: error(2).map(|e| e.0).unwrap_or_default(),
            error3_type: error(2).map(|e| e.1),
            bat_dest: destination(BaseRunner::Batter),
            run1_dest: destination(BaseRunner::First),
            run2_dest: destination(BaseRunner::Second),
            run3_dest: destination(BaseRunner::Third),
            bat_play: play_text(BaseRunner::Batter),
            run1_play: play_text(BaseRunner::First),
            run2_play: play_text(BaseRunner::Second),
            run3_play: play_text(BaseRunner::Third),
            run1_sb: play.stolen[1],
            run2_sb: play.stolen[2],
            run3_sb: play.stolen[3],
            run1_cs: play.caught[1],
            run2_cs: play.caught[2],
            run3_cs: play.caught[3],
            run1_pk: play.picked_off[1],
            run2_pk: play.picked_off[2],
            run3_pk: play.picked_off[3],
            run1_resp_pitcher: origin.first.as_ref().and_then(|o| o.responsible_pitcher.clone()),
            run2_resp_pitcher: origin.second.as_ref().and_then(|o| o.responsible_pitcher.clone()),
            run3_resp_pitcher: origin.third.as_ref().and_then(|o| o.responsible_pitcher.clone()),
            game_new: state.event_id == 1,
            game_end: false,
            pr_run1: start.runner(BaseRunner::First).map_or(false, |r| r.pinch_runner),
            pr_run2: start.runner(BaseRunner::Second).map_or(false, |r| r.pinch_runner),
            pr_run3: start.runner(BaseRunner::Third).map_or(false, |r| r.pinch_runner),
            removed_for_pr_run1: removed_for_pr.first,
            removed_for_pr_run2: removed_for_pr.second,
            removed_for_pr_run3: removed_for_pr.third,
            removed_for_ph_bat: pinch_hit.map(|ph| ph.replaced.clone()),
            removed_for_ph_bat_fld: pinch_hit.map(|ph| ph.replaced_position).unwrap_or_default(),
            putout1: putout(0),
            putout2: putout(1),
            putout3: putout(2),
            assist1: assist(0),
            assist2: assist(1),
            assist3: assist(2),
            assist4: assist(3),
            assist5: assist(4),
            event_id: state.event_id,
            home_team_id: state.teams.home.clone(),
            bat_team_id: state.teams.get(side).clone(),
            fld_team_id: state.teams.get(fielding).clone(),
            bat_last: u8::from(state.frame == InningFrame::Bottom),
            inning_new: state.is_first_event_of_half(),
            inning_end: false,
            start_bat_score: *start.score.get(side),
            start_fld_score: *start.score.get(fielding),
            inning_runs: start.half_runs,
            game_pa: *state.plate_appearances.get(side),
            inning_pa: state.half_plate_appearances,
            pa_new: state.new_plate_appearance,
            pa_truncated: false,
            start_bases_cd: bases_cd,
            end_bases_cd: if state.outs.get() >= 3 { 0 } else { state.bases.code() },
            on_deck: upcoming(1),
            in_hold: upcoming(2),
            run1_fld_cd: origin.first.as_ref().map(|o| o.fielding_position).unwrap_or_default(),
            run1_lineup: origin.first.as_ref().and_then(|o| o.lineup_position),
            run1_origin_event_id: origin.first.as_ref().map(|o| o.event_id),
            run2_fld_cd: origin.second.as_ref().map(|o| o.fielding_position).unwrap_or_default(),
            run2_lineup: origin.second.as_ref().and_then(|o| o.lineup_position),
            run2_origin_event_id: origin.second.as_ref().map(|o| o.event_id),
            run3_fld_cd: origin.third.as_ref().map(|o| o.fielding_position).unwrap_or_default(),
            run3_lineup: origin.third.as_ref().and_then(|o| o.lineup_position),
            run3_origin_event_id: origin.third.as_ref().map(|o| o.event_id),
            run1_resp_catcher: origin.first.as_ref().and_then(|o| o.responsible_catcher.clone()),
            run2_resp_catcher: origin.second.as_ref().and_then(|o| o.responsible_catcher.clone()),
            run3_resp_catcher: origin.third.as_ref().and_then(|o| o.responsible_catcher.clone()),
            pa_balls: counts.balls,
            pa_called_balls: counts.called_balls,
            pa_intentional_balls: counts.intentional_balls,
            pa_pitchout_balls: counts.pitchout_balls,
            pa_hit_batter_balls: counts.hit_batter_balls,
            pa_other_balls: counts.other_balls,
            pa_strikes: counts.strikes,
            pa_called_strikes: counts.called_strikes,
            pa_swinging_strikes: counts.swinging_strikes,
            pa_foul_strikes: counts.foul_strikes,
            pa_in_play_strikes: counts.in_play_strikes,
            pa_other_strikes: counts.other_strikes,
            event_runs: u8::try_from(play.runs.len()).unwrap_or(u8::MAX),
            fielder_id: (play.fielded_by != FieldingPosition::Unknown)
                .then(|| fielder(play.fielded_by))
                .flatten(),
            base2_force: is_batting_force(0b001),
            base3_force: is_batting_force(0b011),
            base4_force: is_batting_force(0b111),
            batter_safe_on_error: play.batter_safe_on_error,
            bat_fate: 0,
            run1_fate: 0,
            run2_fate: 0,
            run3_fate: 0,
            fate_runs: 0,
            assist6: assist(5),
            assist7: assist(6),
            assist8: assist(7),
            assist9: assist(8),
            assist10: assist(9),
            unknown_out: play.unknown_fielding,
            uncertain_play: play.event_type.is_none(),
            description: play.descriptions.join(" "),
        }
    }
}

/// One row per game, after Chadwick `cwgame`: who started and finished on
/// the mound, the line score totals and the pitching decisions.
#[derive(Debug, PartialEq, Eq, Clone, Serialize)]
pub struct Game {
    #[serde(rename = "GAME_ID")]
    pub game_id: String,
    #[serde(rename = "GAME_DT")]
    pub date: Option<NaiveDate>,
    #[serde(rename = "AWAY_TEAM_ID")]
    pub away_team_id: String,
    #[serde(rename = "HOME_TEAM_ID")]
    pub home_team_id: String,
    #[serde(rename = "DH_FL", serialize_with = "serialize_flag")]
    pub uses_dh: bool,
    #[serde(rename = "AWAY_START_PIT_ID")]
    pub away_starting_pitcher: Option<String>,
    #[serde(rename = "HOME_START_PIT_ID")]
    pub home_starting_pitcher: Option<String>,
    #[serde(rename = "INN_CT")]
    pub innings: Inning,
    #[serde(rename = "AWAY_SCORE_CT")]
    pub away_runs: u16,
    #[serde(rename = "HOME_SCORE_CT")]
    pub home_runs: u16,
    #[serde(rename = "AWAY_HITS_CT")]
    pub away_hits: u16,
    #[serde(rename = "HOME_HITS_CT")]
    pub home_hits: u16,
    #[serde(rename = "AWAY_ERR_CT")]
    pub away_errors: u16,
    #[serde(rename = "HOME_ERR_CT")]
    pub home_errors: u16,
    #[serde(rename = "AWAY_LOB_CT")]
    pub away_left_on_base: u16,
    #[serde(rename = "HOME_LOB_CT")]
    pub home_left_on_base: u16,
    #[serde(rename = "WIN_PIT_ID")]
    pub winning_pitcher: Option<String>,
    #[serde(rename = "LOSE_PIT_ID")]
    pub losing_pitcher: Option<String>,
    #[serde(rename = "AWAY_FINISH_PIT_ID")]
    pub away_finishing_pitcher: Option<String>,
    #[serde(rename = "HOME_FINISH_PIT_ID")]
    pub home_finishing_pitcher: Option<String>,
}

impl From<&GameState> for Game {
    fn from(state: &GameState) -> Self {
        let events = state.events();
        let hits = |side: Side| {
            let count = events
                .iter()
                .filter(|e| e.batting_side == side && e.hit_value > 0)
                .count();
            u16::try_from(count).unwrap_or(u16::MAX)
        };
        // Errors are charged to the fielding team.
        let errors = |side: Side| {
            events
                .iter()
                .filter(|e| e.batting_side != side)
                .map(|e| u16::from(e.error_count))
                .sum::<u16>()
        };
        let finisher = |side: Side| {
            state
                .lineups
                .get(side)
                .find_player_by_position(FieldingPosition::Pitcher)
                .ok()
                .map(|p| p.name.clone())
        };
        let (winning_pitcher, losing_pitcher) = decisions(state);

        Self {
            game_id: state.game_id.clone(),
            date: state.date,
            away_team_id: state.teams.away.clone(),
            home_team_id: state.teams.home.clone(),
            uses_dh: state.uses_dh,
            away_starting_pitcher: state.starting_pitchers.away.clone(),
            home_starting_pitcher: state.starting_pitchers.home.clone(),
            innings: state.inning,
            away_runs: state.score.away,
            home_runs: state.score.home,
            away_hits: hits(Side::Away),
            home_hits: hits(Side::Home),
            away_errors: errors(Side::Away),
            home_errors: errors(Side::Home),
            away_left_on_base: state.left_on_base.away,
            home_left_on_base: state.left_on_base.home,
            winning_pitcher,
            losing_pitcher,
            away_finishing_pitcher: finisher(Side::Away),
            home_finishing_pitcher: finisher(Side::Home),
        }
    }
}

/// Runners who crossed the plate on `event`, in the order they scored,
/// each with the pitcher charged with putting them on base.
fn scorers(event: &Event) -> impl Iterator<Item = Option<&String>> {
    [
        (event.run3_dest, event.run3_resp_pitcher.as_ref()),
        (event.run2_dest, event.run2_resp_pitcher.as_ref()),
        (event.run1_dest, event.run1_resp_pitcher.as_ref()),
        (event.bat_dest, event.resp_pitcher_id.as_ref()),
    ]
    .into_iter()
    .filter(|(dest, _)| *dest >= 4)
    .map(|(_, pitcher)| pitcher)
}

/// Winning and losing pitchers. The loser is charged with the run that put
/// the winners ahead for good. The winner is the winners' pitcher of record
/// at that moment. A starter short of five innings (four in a game under
/// six) gives way to the reliever with the most outs.
fn decisions(state: &GameState) -> (Option<String>, Option<String>) {
    let winners = match state.score.away.cmp(&state.score.home) {
        Ordering::Greater => Side::Away,
        Ordering::Less => Side::Home,
        Ordering::Equal => return (None, None),
    };
    let losers = winners.flip();
    let losing_total = *state.score.get(losers);
    let events = state.events();

    let decisive = events
        .iter()
        .enumerate()
        .filter(|(_, e)| e.batting_side == winners)
        .find_map(|(index, e)| {
            let before = *Matchup::new(e.away_score, e.home_score).get(winners);
            scorers(e)
                .zip(before + 1..)
                .find(|(_, runs)| *runs == losing_total + 1)
                .map(|(pitcher, _)| (index, pitcher.cloned()))
        });
    let Some((index, losing_pitcher)) = decisive else {
        return (None, None);
    };

    // Events where the winners were in the field carry their pitcher.
    let pitched = |e: &&Event| e.batting_side == losers;
    let of_record = events[..index]
        .iter()
        .rev()
        .find(pitched)
        .or_else(|| events[index..].iter().find(pitched))
        .and_then(|e| e.pitcher_id.clone());

    let mut outs: Vec<(String, u16)> = Vec::new();
    for event in events.iter().filter(pitched) {
        let Some(pitcher) = &event.pitcher_id else { continue };
        match outs.iter_mut().find(|(name, _)| name == pitcher) {
            Some((_, total)) => *total += u16::from(event.outs_on_play),
            None => outs.push((pitcher.clone(), u16::from(event.outs_on_play))),
        }
    }
    let starter = state.starting_pitchers.get(winners).as_ref();
    let required = if state.inning >= 6 { 15 } else { 12 };
    let starter_outs = outs
        .iter()
        .find(|(name, _)| Some(name) == starter)
        .map_or(0, |(_, total)| *total);
    let short_start =
        starter.is_some() && of_record.as_ref() == starter && starter_outs < required;
    let winning_pitcher = if short_start {
        // Ties go to the reliever who pitched first.
        outs.iter()
            .filter(|(name, _)| Some(name) != starter)
            .rev()
            .max_by_key(|(_, total)| *total)
            .map(|(name, _)| name.clone())
            .or(of_record)
    } else {
        of_record
    };
    (winning_pitcher, losing_pitcher)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::Game;
    use crate::event_file::config::GameConfig;
    use crate::event_file::game_state::GameState;
    use crate::event_file::lineup::{Lineup, Player};
    use crate::event_file::play::OutModifiers;
    use crate::event_file::traits::{Base, FieldingPosition, Hand};

    fn lineup(prefix: &str) -> Lineup {
        let mut lineup = Lineup::new();
        for (order, position) in (1_u8..).zip(FieldingPosition::DEFENSE) {
            let player = Player::new(
                &format!("{prefix} {position}"),
                None,
                Some(order),
                position,
                Some(Hand::Switch),
            )
            .with_throws(Some(Hand::Left));
            lineup.add_player(player).unwrap();
        }
        lineup
    }

    #[test]
    fn csv_row_uses_chadwick_headers_and_flags() {
        let mut state = GameState::new("CHA202304010", Arc::new(GameConfig::default())).unwrap();
        state.set_teams("DET", "CHA");
        state.set_away_lineup(lineup("Tigers")).unwrap();
        state.set_home_lineup(lineup("Sox")).unwrap();
        state.new_half().unwrap();
        state.new_batter("Tigers P", None).unwrap();
        state.describe(Some("Tigers P walks."));
        state.advance_on_walk(None, Base::First).unwrap();
        state.set_previous_event_as_game_end().unwrap();

        let event = &state.events()[0];
        assert_eq!(event.batter_hand, Some(Hand::Right));
        assert_eq!(event.pitcher_id.as_deref(), Some("Sox P"));
        assert_eq!(event.pos6_fielder.as_deref(), Some("Sox SS"));
        assert!(event.leadoff);
        assert!(event.inning_new);
        assert!(event.batter_starter);
        assert_eq!(event.on_deck.as_deref(), Some("Tigers C"));
        assert_eq!(event.in_hold.as_deref(), Some("Tigers 1B"));
        assert_eq!(event.description, "Tigers P walks.");
        assert_eq!(event.bat_fate, 1);

        let mut writer = csv::Writer::from_writer(vec![]);
        writer.serialize(event).unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("GAME_ID,AWAY_TEAM_ID,INN_CT,BAT_HOME_ID,OUTS_CT"));
        assert!(header.ends_with("UNKNOWN_OUT_EXC_FL,UNCERTAIN_PLAY_EXC_FL,DESCRIPTION"));
        let row = lines.next().unwrap();
        assert!(row.starts_with("CHA202304010,DET,1,0,0,"));
        assert!(row.contains(",W,T,F,1,1,14,T,F,0,"));
    }

    fn fly_outs(state: &mut GameState, batters: &[&str]) {
        for batter in batters {
            state.new_batter(batter, None).unwrap();
            state
                .out_fly_out(FieldingPosition::CenterFielder, OutModifiers::default())
                .unwrap();
        }
    }

    #[test]
    fn game_row_totals_the_line_score_and_decisions() {
        let mut state = GameState::new("CHA202304010", Arc::new(GameConfig::default())).unwrap();
        state.set_teams("DET", "CHA");
        state.set_away_lineup(lineup("Tigers")).unwrap();
        state.set_home_lineup(lineup("Sox")).unwrap();

        state.new_half().unwrap();
        state.new_batter("Tigers P", None).unwrap();
        state.advance_on_walk(None, Base::First).unwrap();
        fly_outs(&mut state, &["Tigers C", "Tigers 1B", "Tigers 2B"]);

        state.new_half().unwrap();
        state.new_batter("Sox P", None).unwrap();
        state.hit_home_run(Some(FieldingPosition::LeftFielder)).unwrap();
        state.new_batter("Sox C", None).unwrap();
        state
            .advance_on_error(None, Base::First, Some(FieldingPosition::Shortstop))
            .unwrap();
        fly_outs(&mut state, &["Sox 1B", "Sox 2B", "Sox 3B"]);

        state.new_half().unwrap();
        state
            .defensive_sub("Sox Reliever", Some("Sox P"), Some(FieldingPosition::Pitcher))
            .unwrap();
        fly_outs(&mut state, &["Tigers 3B", "Tigers SS", "Tigers LF"]);
        state.set_previous_event_as_game_end().unwrap();

        let game = Game::from(&state);
        assert_eq!(game.innings, 2);
        assert_eq!((game.away_runs, game.home_runs), (0, 1));
        assert_eq!((game.away_hits, game.home_hits), (0, 1));
        assert_eq!((game.away_errors, game.home_errors), (1, 0));
        assert_eq!((game.away_left_on_base, game.home_left_on_base), (1, 1));
        assert_eq!(game.away_starting_pitcher.as_deref(), Some("Tigers P"));
        assert_eq!(game.home_starting_pitcher.as_deref(), Some("Sox P"));
        assert_eq!(game.home_finishing_pitcher.as_deref(), Some("Sox Reliever"));
        assert_eq!(game.losing_pitcher.as_deref(), Some("Tigers P"));
        // The starter left after one inning, so the win goes to the reliever.
        assert_eq!(game.winning_pitcher.as_deref(), Some("Sox Reliever"));
        assert!(!game.uses_dh);

        let mut writer = csv::Writer::from_writer(vec![]);
        writer.serialize(&game).unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let mut lines = text.lines();
        assert!(lines
            .next()
            .unwrap()
            .starts_with("GAME_ID,GAME_DT,AWAY_TEAM_ID,HOME_TEAM_ID,DH_FL,AWAY_START_PIT_ID"));
        assert!(lines.next().unwrap().starts_with("CHA202304010,,DET,CHA,F,Tigers P,Sox P,2,0,1,"));
    }

    #[test]
    fn tied_games_have_no_decisions() {
        let mut state = GameState::new("CHA202304010", Arc::new(GameConfig::default())).unwrap();
        state.set_away_lineup(lineup("Tigers")).unwrap();
        state.set_home_lineup(lineup("Sox")).unwrap();
        state.new_half().unwrap();
        fly_outs(&mut state, &["Tigers P", "Tigers C", "Tigers 1B"]);
        state.set_previous_event_as_game_end().unwrap();

        let game = Game::from(&state);
        assert_eq!(game.winning_pitcher, None);
        assert_eq!(game.losing_pitcher, None);
        assert_eq!(game.away_finishing_pitcher.as_deref(), Some("Tigers P"));
    }
}
