use std::fmt;

use fixed_map::Map;
use itertools::Itertools;
use serde::Serialize;
use tracing::{debug, warn};

use crate::event_file::error::{GameError, LineupProblem};
use crate::event_file::traits::{FieldingPosition, Hand, LineupPosition, Player as PlayerName};
use crate::util::name_similarity;

/// Per-game batting totals for one player.
#[derive(Debug, Default, Eq, PartialEq, Copy, Clone, Serialize)]
pub struct BattingCounters {
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

impl BattingCounters {
    pub const fn has_batted(&self) -> bool {
        self.pa > 0
    }
}

#[derive(Debug, Eq, PartialEq, Clone)]
pub struct Player {
    pub name: PlayerName,
    pub number: Option<u8>,
    pub order: Option<LineupPosition>,
    pub position: FieldingPosition,
    pub bats: Option<Hand>,
    pub throws: Option<Hand>,
    pub stats: BattingCounters,
    /// Entered the game and still needs a defensive position assigned.
    pub is_pending_sub: bool,
    pub is_pinch_hitter: bool,
}

impl Player {
    /// Batting order numbers outside 1-9 (a pitcher listed as "10" under the
    /// DH rule, for instance) leave the player out of the order.
    pub fn new(
        name: &str,
        number: Option<u8>,
        order: Option<u8>,
        position: FieldingPosition,
        bats: Option<Hand>,
    ) -> Self {
        Self {
            name: name.to_string(),
            number,
            order: order.and_then(|o| LineupPosition::try_from(o).ok()),
            position,
            bats,
            throws: None,
            stats: BattingCounters::default(),
            is_pending_sub: false,
            is_pinch_hitter: false,
        }
    }

    #[must_use]
    pub fn with_throws(mut self, throws: Option<Hand>) -> Self {
        self.throws = throws;
        self
    }

    pub const fn has_batted(&self) -> bool {
        self.stats.has_batted()
    }

    /// Merges what another page says about the same player into a new value.
    /// Fields known on `other` win; counters and game flags stay with `self`.
    pub fn reconcile(&self, other: &Self) -> Result<Self, GameError> {
        let conflict = |detail: String| GameError::PlayerConflict {
            name: self.name.clone(),
            detail,
        };
        if self.name != other.name {
            return Err(conflict(format!("cannot merge with {}", other.name)));
        }
        if let (Some(a), Some(b)) = (self.number, other.number) {
            if a != b {
                return Err(conflict(format!("jersey number {a} vs {b}")));
            }
        }
        Ok(Self {
            name: self.name.clone(),
            number: other.number.or(self.number),
            order: other.order.or(self.order),
            position: if other.position == FieldingPosition::Unknown {
                self.position
            } else {
                other.position
            },
            bats: other.bats.or(self.bats),
            throws: other.throws.or(self.throws),
            stats: self.stats,
            is_pending_sub: self.is_pending_sub,
            is_pinch_hitter: self.is_pinch_hitter,
        })
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let order = self.order.map_or_else(|| "-".to_string(), |o| o.to_string());
        let number = self.number.map_or_else(|| "-".to_string(), |n| n.to_string());
        let bats = self.bats.map_or_else(|| "?".to_string(), |h| h.to_string());
        write!(
            f,
            "{order:>2} {number:>3} {:<18} {:>3} {bats:>2}",
            self.name, self.position
        )
    }
}

/// Players unique by name, in insertion order. Rosters are plain lists;
/// lineups wrap one.
#[derive(Debug, Default, Eq, PartialEq, Clone)]
pub struct PlayerList {
    players: Vec<Player>,
}

impl PlayerList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_player(&mut self, player: Player) -> Result<(), GameError> {
        if self.contains(&player.name) {
            return Err(GameError::DuplicatePlayer(player.name));
        }
        self.players.push(player);
        Ok(())
    }

    /// Inserts, or merges into an existing entry with the same name.
    pub fn update_player(&mut self, player: Player) -> Result<(), GameError> {
        match self.players.iter_mut().find(|p| p.name == player.name) {
            Some(existing) => {
                *existing = existing.reconcile(&player)?;
                Ok(())
            }
            None => self.add_player(player),
        }
    }

    pub fn remove_player(&mut self, name: &str) -> Result<Player, GameError> {
        let index = self
            .players
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| GameError::PlayerNotFound(format!("name {name}")))?;
        Ok(self.players.remove(index))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.players.iter().any(|p| p.name == name)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.iter_mut()
    }

    pub fn find_player_by_name(&self, name: &str) -> Result<&Player, GameError> {
        self.players
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| GameError::PlayerNotFound(format!("name {name}")))
    }

    pub fn find_player_by_name_mut(&mut self, name: &str) -> Result<&mut Player, GameError> {
        self.players
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| GameError::PlayerNotFound(format!("name {name}")))
    }

    pub fn find_player_by_number(&self, number: u8) -> Result<&Player, GameError> {
        self.players
            .iter()
            .find(|p| p.number == Some(number))
            .ok_or_else(|| GameError::PlayerNotFound(format!("number {number}")))
    }

    /// Fuzzy lookup for spelling variants between independently scraped pages.
    /// The best match has to clear `threshold` and beat the runner-up outright.
    pub fn find_closest_name(&self, name: &str, threshold: f64) -> Result<&Player, GameError> {
        if let Ok(exact) = self.find_player_by_name(name) {
            return Ok(exact);
        }
        let ranked = self
            .players
            .iter()
            .map(|p| (name_similarity(name, &p.name), p))
            .sorted_by(|(a, _), (b, _)| b.total_cmp(a))
            .collect_vec();
        match ranked.as_slice() {
            [(best, player), rest @ ..] if *best >= threshold => {
                if let Some((second, other)) = rest.first() {
                    if (best - second).abs() < f64::EPSILON {
                        return Err(GameError::AmbiguousName {
                            name: name.to_string(),
                            first: player.name.clone(),
                            second: other.name.clone(),
                        });
                    }
                }
                warn!("Fuzzy matched {} to {} ({:.2})", name, player.name, best);
                Ok(*player)
            }
            _ => Err(GameError::PlayerNotFound(format!("name like {name}"))),
        }
    }
}

/// One team's active lineup. Players who leave the game move to `departed`
/// so their counters still reach the box score.
#[derive(Debug, Default, Eq, PartialEq, Clone)]
pub struct Lineup {
    players: PlayerList,
    departed: Vec<Player>,
}

impl Lineup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_player(&mut self, player: Player) -> Result<(), GameError> {
        if self.departed.iter().any(|p| p.name == player.name) {
            return Err(GameError::DuplicatePlayer(player.name));
        }
        self.players.add_player(player)
    }

    pub fn update_player(&mut self, player: Player) -> Result<(), GameError> {
        self.players.update_player(player)
    }

    pub fn players(&self) -> &PlayerList {
        &self.players
    }

    pub fn departed(&self) -> &[Player] {
        &self.departed
    }

    /// Active players followed by everyone who has left the game.
    pub fn all_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().chain(self.departed.iter())
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.players.contains(name)
    }

    pub fn has_played(&self, name: &str) -> bool {
        self.all_players().any(|p| p.name == name)
    }

    pub fn find_player_by_name(&self, name: &str) -> Result<&Player, GameError> {
        self.players.find_player_by_name(name)
    }

    pub fn find_player_by_name_mut(&mut self, name: &str) -> Result<&mut Player, GameError> {
        self.players.find_player_by_name_mut(name)
    }

    pub fn find_player_by_number(&self, number: u8) -> Result<&Player, GameError> {
        self.players.find_player_by_number(number)
    }

    pub fn find_closest_name(&self, name: &str, threshold: f64) -> Result<&Player, GameError> {
        self.players.find_closest_name(name, threshold)
    }

    pub fn find_player_by_order(&self, order: u8) -> Result<&Player, GameError> {
        let position = LineupPosition::try_from(order)
            .map_err(|_| GameError::PlayerNotFound(format!("batting order {order}")))?;
        self.find_player_at(position)
    }

    pub fn find_player_at(&self, order: LineupPosition) -> Result<&Player, GameError> {
        self.players
            .iter()
            .find(|p| p.order == Some(order))
            .ok_or_else(|| GameError::PlayerNotFound(format!("batting order {order}")))
    }

    pub fn find_player_by_position(
        &self,
        position: FieldingPosition,
    ) -> Result<&Player, GameError> {
        self.players
            .iter()
            .find(|p| p.position == position)
            .ok_or_else(|| GameError::PlayerNotFound(format!("position {position}")))
    }

    pub fn has_position(&self, position: FieldingPosition) -> bool {
        self.find_player_by_position(position).is_ok()
    }

    /// Counters for anyone who appeared, including departed players.
    pub fn counters_mut(&mut self, name: &str) -> Option<&mut BattingCounters> {
        self.players
            .iter_mut()
            .chain(self.departed.iter_mut())
            .find(|p| p.name == name)
            .map(|p| &mut p.stats)
    }

    pub fn move_player(&mut self, name: &str, position: FieldingPosition) -> Result<(), GameError> {
        let player = self.players.find_player_by_name_mut(name)?;
        debug!("{} moves from {} to {}", name, player.position, position);
        player.position = position;
        player.is_pending_sub = false;
        Ok(())
    }

    /// `new` takes over the batting slot of `replacing`, and their position
    /// too unless `new` already has one. The replaced player departs.
    pub fn substitute(&mut self, mut new: Player, replacing: &str) -> Result<(), GameError> {
        if self.has_played(&new.name) {
            return Err(GameError::DuplicatePlayer(new.name));
        }
        let old = self.players.remove_player(replacing)?;
        new.order = old.order;
        if new.position == FieldingPosition::Unknown {
            new.position = old.position;
        }
        debug!("{} replaces {} ({})", new.name, old.name, new.position);
        self.departed.push(old);
        self.players.add_player(new)
    }

    pub fn swap_orders(&mut self, a: &str, b: &str) -> Result<(), GameError> {
        let order_a = self.players.find_player_by_name(a)?.order;
        let order_b = self.players.find_player_by_name(b)?.order;
        self.players.find_player_by_name_mut(a)?.order = order_b;
        self.players.find_player_by_name_mut(b)?.order = order_a;
        warn!("Swapped batting order of {} and {}", a, b);
        Ok(())
    }

    /// Takes a player out of the active lineup without a replacement.
    pub fn remove_player(&mut self, name: &str) -> Result<(), GameError> {
        let player = self.players.remove_player(name)?;
        self.departed.push(player);
        Ok(())
    }

    /// Batting slots left open by a departed player, as after the first half
    /// of a double switch.
    pub fn vacant_slots(&self) -> Vec<LineupPosition> {
        LineupPosition::all()
            .filter(|slot| self.find_player_at(*slot).is_err())
            .filter(|slot| self.departed.iter().any(|p| p.order == Some(*slot)))
            .collect()
    }

    /// Puts `new` into the first vacant batting slot.
    pub fn fill_vacancy(&mut self, mut new: Player) -> Result<LineupPosition, GameError> {
        if self.has_played(&new.name) {
            return Err(GameError::DuplicatePlayer(new.name));
        }
        let slot = *self
            .vacant_slots()
            .first()
            .ok_or_else(|| GameError::PlayerNotFound("vacant batting slot".to_string()))?;
        debug!("{} enters in vacant slot {} ({})", new.name, slot, new.position);
        new.order = Some(slot);
        self.players.add_player(new)?;
        Ok(slot)
    }

    pub fn position_map(&self) -> Map<FieldingPosition, PlayerName> {
        let mut map = Map::new();
        for p in self.players.iter() {
            map.insert(p.position, p.name.clone());
        }
        map
    }

    /// Checks the DH and pitcher rules, then that every batting slot and
    /// defensive position is filled exactly once.
    pub fn validate(&self) -> Result<(), GameError> {
        let count = self.players.len();
        if self.has_position(FieldingPosition::DesignatedHitter) {
            if count > 10 {
                return Err(LineupProblem::TooManyPlayers { count, max: 10 }.into());
            }
        } else {
            let pitcher = self
                .find_player_by_position(FieldingPosition::Pitcher)
                .map_err(|_| LineupProblem::NoPitcher)?;
            if pitcher.order.is_none() {
                return Err(LineupProblem::PitcherNotBatting.into());
            }
            if count > 9 {
                return Err(LineupProblem::TooManyPlayers { count, max: 9 }.into());
            }
        }
        for order in LineupPosition::all() {
            match self.players.iter().filter(|p| p.order == Some(order)).count() {
                0 => return Err(LineupProblem::MissingOrder(order.into()).into()),
                1 => {}
                _ => return Err(LineupProblem::DuplicateOrder(order.into()).into()),
            }
        }
        for position in FieldingPosition::DEFENSE {
            match self.players.iter().filter(|p| p.position == position).count() {
                0 => return Err(LineupProblem::MissingPosition(position).into()),
                1 => {}
                _ => return Err(LineupProblem::DuplicatePosition(position).into()),
            }
        }
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.validate().is_ok()
    }
}

impl fmt::Display for Lineup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines = self
            .players
            .iter()
            .sorted_by_key(|p| p.order.map_or(u8::MAX, u8::from))
            .map(ToString::to_string)
            .join("\n");
        f.write_str(&lines)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::event_file::traits::FieldingPosition::*;

    fn player(name: &str, number: u8, order: u8, position: FieldingPosition, hand: Hand) -> Player {
        Player::new(name, Some(number), Some(order), position, Some(hand))
    }

    fn red_sox() -> Lineup {
        let mut lineup = Lineup::new();
        for p in [
            player("Wade Boggs", 26, 1, ThirdBaseman, Hand::Left),
            player("Dwight Evans", 24, 2, RightFielder, Hand::Right),
            player("Jim Rice", 14, 3, LeftFielder, Hand::Right),
            player("Mike Easler", 7, 4, DesignatedHitter, Hand::Left),
            player("Tony Armas", 20, 5, CenterFielder, Hand::Right),
            player("Bill Buckner", 6, 6, FirstBaseman, Hand::Left),
            player("Rich Gedman", 10, 7, Catcher, Hand::Left),
            player("Marty Barret", 17, 8, SecondBaseman, Hand::Right),
            player("Jackie Gutierrez", 41, 9, Shortstop, Hand::Right),
            player("Oil Can Boyd", 41, 10, Pitcher, Hand::Right),
        ] {
            lineup.add_player(p).unwrap();
        }
        lineup
    }

    #[test]
    fn complete_lineup() {
        assert_eq!(red_sox().validate(), Ok(()));
    }

    #[test]
    fn lookups() {
        let lineup = red_sox();
        assert_eq!(lineup.find_player_by_order(8).unwrap().name, "Marty Barret");
        assert_eq!(lineup.find_player_by_position(SecondBaseman).unwrap().name, "Marty Barret");
        assert_eq!(lineup.find_player_by_name("Marty Barret").unwrap().position, SecondBaseman);
        assert_eq!(
            lineup.find_player_by_position(SecondBaseman).unwrap().order,
            Some(LineupPosition::Eighth)
        );
        assert_eq!(lineup.find_player_by_number(14).unwrap().name, "Jim Rice");
    }

    #[test]
    fn moving_to_dh_leaves_left_field_empty() {
        let mut lineup = red_sox();
        lineup.move_player("Jim Rice", DesignatedHitter).unwrap();
        assert!(!lineup.is_complete());
        assert!(lineup.find_player_by_position(LeftFielder).is_err());
        assert_eq!(
            lineup.validate(),
            Err(GameError::IncompleteLineup(LineupProblem::MissingPosition(LeftFielder)))
        );
    }

    #[test]
    fn bad_order_number() {
        assert!(matches!(
            red_sox().find_player_by_order(12),
            Err(GameError::PlayerNotFound(_))
        ));
    }

    #[test]
    fn double_add_is_rejected() {
        let mut lineup = red_sox();
        assert_eq!(
            lineup.add_player(player("Oil Can Boyd", 41, 10, Pitcher, Hand::Right)),
            Err(GameError::DuplicatePlayer("Oil Can Boyd".into()))
        );
    }

    #[test]
    fn partial_lineup_is_incomplete() {
        let mut lineup = Lineup::new();
        lineup.add_player(player("Wade Boggs", 26, 1, ThirdBaseman, Hand::Left)).unwrap();
        assert!(!lineup.is_complete());
        let mut lineup = red_sox();
        lineup.remove_player("Oil Can Boyd").unwrap();
        assert_eq!(
            lineup.validate(),
            Err(GameError::IncompleteLineup(LineupProblem::MissingPosition(Pitcher)))
        );
        assert_eq!(lineup.departed().len(), 1);
    }

    #[test]
    fn pitcher_must_bat_without_dh() {
        let mut lineup = red_sox();
        lineup.remove_player("Mike Easler").unwrap();
        assert_eq!(
            lineup.validate(),
            Err(GameError::IncompleteLineup(LineupProblem::PitcherNotBatting))
        );
        lineup
            .update_player(player("Oil Can Boyd", 41, 4, Pitcher, Hand::Right))
            .unwrap();
        assert_eq!(lineup.validate(), Ok(()));
    }

    #[test]
    fn update_merges_into_new_value() {
        let mut lineup = Lineup::new();
        lineup.add_player(player("Wade Boggs", 26, 1, Pitcher, Hand::Left)).unwrap();
        lineup.update_player(player("Wade Boggs", 26, 1, ThirdBaseman, Hand::Left)).unwrap();
        assert_eq!(lineup.find_player_by_position(ThirdBaseman).unwrap().name, "Wade Boggs");
        lineup
            .update_player(Player::new("Wade Boggs", None, None, FieldingPosition::Unknown, None))
            .unwrap();
        let boggs = lineup.find_player_by_name("Wade Boggs").unwrap();
        assert_eq!((boggs.number, boggs.position), (Some(26), ThirdBaseman));
        assert!(matches!(
            lineup.update_player(player("Wade Boggs", 12, 1, ThirdBaseman, Hand::Left)),
            Err(GameError::PlayerConflict { .. })
        ));
    }

    #[test]
    fn substitution_takes_slot_and_keeps_departed_counters() {
        let mut lineup = red_sox();
        lineup.counters_mut("Jim Rice").unwrap().pa = 2;
        let new = Player::new("Reid Nichols", Some(21), None, FieldingPosition::Unknown, None);
        lineup.substitute(new, "Jim Rice").unwrap();
        let nichols = lineup.find_player_by_name("Reid Nichols").unwrap();
        assert_eq!((nichols.order, nichols.position), (Some(LineupPosition::Third), LeftFielder));
        assert!(lineup.is_complete());
        assert_eq!(lineup.counters_mut("Jim Rice").map(|c| c.pa), Some(2));
        let again = Player::new("Jim Rice", Some(14), None, LeftFielder, None);
        assert!(lineup.substitute(again, "Reid Nichols").is_err());
    }

    #[test]
    fn swap_orders() {
        let mut lineup = red_sox();
        lineup.swap_orders("Wade Boggs", "Jim Rice").unwrap();
        assert_eq!(lineup.find_player_by_order(1).unwrap().name, "Jim Rice");
        assert_eq!(lineup.find_player_by_order(3).unwrap().name, "Wade Boggs");
    }

    #[test]
    fn position_map_covers_defense() {
        let map = red_sox().position_map();
        assert_eq!(map.get(Catcher).map(String::as_str), Some("Rich Gedman"));
        assert_eq!(map.len(), 10);
    }

    #[test]
    fn closest_name() {
        let lineup = red_sox();
        assert_eq!(
            lineup.find_closest_name("Marty Barrett", 0.85).unwrap().name,
            "Marty Barret"
        );
        assert!(lineup.find_closest_name("Dwight Gooden", 0.85).is_err());
    }

    #[test]
    fn closest_name_must_be_unique() {
        let mut roster = PlayerList::new();
        roster.add_player(Player::new("Jon Smith", None, None, Pitcher, None)).unwrap();
        roster.add_player(Player::new("Jan Smith", None, None, Catcher, None)).unwrap();
        assert!(matches!(
            roster.find_closest_name("Jen Smith", 0.8),
            Err(GameError::AmbiguousName { .. })
        ));
    }

    #[test]
    fn display_sorts_by_order() {
        let text = red_sox().to_string();
        assert!(text.starts_with(" 1  26 Wade Boggs"));
        assert!(text.lines().last().unwrap().contains("Oil Can Boyd"));
    }

    fn lineup_from(orders: &[u8], with_dh: bool) -> Lineup {
        let mut lineup = Lineup::new();
        let mut positions = FieldingPosition::DEFENSE.to_vec();
        if with_dh {
            positions[0] = DesignatedHitter;
            lineup.add_player(Player::new("pitcher", None, None, Pitcher, None)).unwrap();
        }
        for (i, (order, position)) in orders.iter().zip(positions).enumerate() {
            let name = format!("player{i}");
            lineup.add_player(Player::new(&name, None, Some(*order), position, None)).unwrap();
        }
        lineup
    }

    proptest! {
        #[test]
        fn any_batting_order_permutation_is_complete(
            orders in Just((1_u8..=9).collect::<Vec<_>>()).prop_shuffle(),
            with_dh in any::<bool>(),
        ) {
            let lineup = lineup_from(&orders, with_dh);
            prop_assert_eq!(lineup.len(), if with_dh { 10 } else { 9 });
            prop_assert!(lineup.is_complete());
        }

        #[test]
        fn extra_player_breaks_the_size_rule(with_dh in any::<bool>()) {
            let orders: Vec<u8> = (1..=9).collect();
            let mut lineup = lineup_from(&orders, with_dh);
            let extra = Player::new("extra", None, None, FieldingPosition::PinchRunner, None);
            lineup.add_player(extra).unwrap();
            let max = if with_dh { 10 } else { 9 };
            prop_assert_eq!(
                lineup.validate(),
                Err(GameError::IncompleteLineup(LineupProblem::TooManyPlayers {
                    count: max + 1,
                    max
                }))
            );
        }

        #[test]
        fn every_defensive_position_is_required(missing in 1_usize..9) {
            let orders: Vec<u8> = (1..=9).collect();
            let mut lineup = lineup_from(&orders, true);
            let name = format!("player{missing}");
            lineup.move_player(&name, DesignatedHitter).unwrap();
            prop_assert!(!lineup.is_complete());
        }
    }
}
