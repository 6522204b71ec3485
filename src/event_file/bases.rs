use std::fmt;

use fixed_map::Map;
use serde::{Deserialize, Serialize};

use crate::event_file::error::GameError;
use crate::event_file::traits::{
    Base, BaseRunner, EventId, FieldingPosition, Fielder, LineupPosition, Pitcher, Player,
};

/// Handle into the per-half-inning arena of occupancy records. Only unique
/// within one half-inning.
pub type FateId = usize;

/// Where and how a runner first reached base, attached by the engine so that
/// later events can report the runner's origin.
#[derive(Debug, Eq, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct RunnerOrigin {
    pub event_id: EventId,
    pub lineup_position: Option<LineupPosition>,
    pub fielding_position: FieldingPosition,
    pub responsible_pitcher: Option<Pitcher>,
    pub responsible_catcher: Option<Fielder>,
}

#[derive(Debug, Eq, PartialEq, Clone)]
pub struct Occupancy {
    pub runner: Player,
    /// Slot the runner held when first placed, `Batter` for a new arrival.
    pub start: BaseRunner,
    /// Most recent known destination. `None` once the runner is put out.
    pub fate: Option<Base>,
    pub origin: Option<RunnerOrigin>,
    /// Runner this one came in to run for.
    pub replaced: Option<Player>,
}

/// One movement of a runner, rendered in Chadwick advance notation.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub struct Transition {
    pub start: BaseRunner,
    pub end: Base,
    pub fate: FateId,
    pub out: bool,
}

impl Transition {
    pub const fn scored(&self) -> bool {
        !self.out && self.end.is_home()
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = if self.out { 'X' } else { '-' };
        write!(f, "{}{}{}", self.start, sep, self.end.code())
    }
}

/// Base occupancy for the current half-inning.
///
/// A runner sent to an occupied base pushes the occupant off the bag into an
/// unresolved state at the base it was holding. Unresolved runners are
/// forced ahead by [`Bases::resolve_forced`] unless a later instruction
/// moves them explicitly first.
#[derive(Debug, Eq, PartialEq, Clone, Default)]
pub struct Bases {
    occupants: Map<BaseRunner, FateId>,
    arena: Vec<Occupancy>,
    unresolved: Vec<(FateId, Base)>,
}

impl Bases {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.occupants.clear();
        self.arena.clear();
        self.unresolved.clear();
    }

    fn occupied_base(&self, player: &str) -> Option<(Base, FateId)> {
        self.occupants.iter().find_map(|(br, id)| {
            (self.arena[*id].runner == player)
                .then(|| br.base().map(|b| (b, *id)))
                .flatten()
        })
    }

    fn unresolved_position(&self, player: &str) -> Option<(usize, Base, FateId)> {
        self.unresolved
            .iter()
            .enumerate()
            .find_map(|(i, (id, base))| {
                (self.arena[*id].runner == player).then_some((i, *base, *id))
            })
    }

    /// Takes the player off whatever base they hold, returning where they were.
    fn lift(&mut self, player: &str) -> Option<(Base, FateId)> {
        if let Some((base, id)) = self.occupied_base(player) {
            if let Some(br) = BaseRunner::from_base(base) {
                self.occupants.remove(br);
            }
            return Some((base, id));
        }
        self.unresolved_position(player).map(|(i, base, id)| {
            self.unresolved.remove(i);
            (base, id)
        })
    }

    fn mint(&mut self, player: &str) -> FateId {
        self.arena.push(Occupancy {
            runner: player.to_string(),
            start: BaseRunner::Batter,
            fate: None,
            origin: None,
            replaced: None,
        });
        self.arena.len() - 1
    }

    fn place(&mut self, id: FateId, base: Base) {
        let Some(br) = BaseRunner::from_base(base) else {
            return;
        };
        if let Some(displaced) = self.occupants.insert(br, id) {
            if displaced != id {
                self.unresolved.push((displaced, base));
            }
        }
    }

    /// Sends a player to `destination`. A player not yet on base is treated as
    /// arriving from the batter's box and gets a fresh fate id.
    pub fn advance(&mut self, player: &str, destination: Base) -> Result<Transition, GameError> {
        if let Some((current, _)) = self
            .occupied_base(player)
            .or_else(|| self.unresolved_position(player).map(|(_, b, id)| (b, id)))
        {
            if destination.order() <= current.order() {
                return Err(GameError::BaseRegression {
                    player: player.to_string(),
                    from: current.order(),
                    to: destination.order(),
                });
            }
        }
        let (start, id) = match self.lift(player) {
            Some((base, id)) => (BaseRunner::from_base(base).unwrap_or(BaseRunner::Batter), id),
            None => (BaseRunner::Batter, self.mint(player)),
        };
        self.arena[id].fate = Some(destination);
        self.place(id, destination);
        Ok(Transition {
            start,
            end: destination,
            fate: id,
            out: false,
        })
    }

    /// Puts a runner on base without a batting play, as with the automatic
    /// runner that starts an extra inning on second.
    pub fn place_runner(&mut self, player: &str, base: Base) -> Result<FateId, GameError> {
        let br = BaseRunner::from_base(base).ok_or(GameError::InvalidBase(base.into()))?;
        if let Some(current) = self.base_of(player) {
            return Err(GameError::BaseRegression {
                player: player.to_string(),
                from: current.order(),
                to: base.order(),
            });
        }
        let id = self.mint(player);
        self.arena[id].start = br;
        self.arena[id].fate = Some(base);
        self.place(id, base);
        Ok(id)
    }

    /// Pushes every unresolved runner ahead one base, highest base first.
    /// Runners pushed off in turn are resolved in the same pass.
    pub fn resolve_forced(&mut self) -> Vec<Transition> {
        let mut transitions = Vec::with_capacity(self.unresolved.len());
        while let Some(i) = self
            .unresolved
            .iter()
            .enumerate()
            .max_by_key(|(_, (_, base))| *base)
            .map(|(i, _)| i)
        {
            let (id, base) = self.unresolved.remove(i);
            let destination = base.next();
            self.arena[id].fate = Some(destination);
            self.place(id, destination);
            transitions.push(Transition {
                start: BaseRunner::from_base(base).unwrap_or(BaseRunner::Batter),
                end: destination,
                fate: id,
                out: false,
            });
        }
        transitions
    }

    /// Deletes the player's occupancy and marks their fate as out.
    pub fn remove(&mut self, player: &str) -> Result<(Base, FateId), GameError> {
        let (base, id) = self.lift(player).ok_or_else(|| GameError::RunnerNotOnBase {
            player: player.to_string(),
            base: 0,
        })?;
        self.arena[id].fate = None;
        Ok((base, id))
    }

    /// Removes a runner put out on the bases. Without an explicit base the out
    /// is recorded at the next base.
    pub fn put_out(&mut self, player: &str, at: Option<Base>) -> Result<Transition, GameError> {
        let (base, id) = self.remove(player)?;
        Ok(Transition {
            start: BaseRunner::from_base(base).unwrap_or(BaseRunner::Batter),
            end: at.unwrap_or_else(|| base.next()),
            fate: id,
            out: true,
        })
    }

    /// Puts `new` in place of `old`, keeping the occupancy record and its fate id.
    pub fn replace_runner(
        &mut self,
        new: &str,
        old: &str,
        base: Option<Base>,
    ) -> Result<FateId, GameError> {
        let (current, id) = self
            .occupied_base(old)
            .filter(|(b, _)| base.map_or(true, |expected| expected == *b))
            .ok_or_else(|| GameError::RunnerNotOnBase {
                player: old.to_string(),
                base: base.map_or(0, Base::order),
            })?;
        if let Some((other, _)) = self.occupied_base(new) {
            return Err(GameError::BaseRegression {
                player: new.to_string(),
                from: other.order(),
                to: current.order(),
            });
        }
        let record = &mut self.arena[id];
        record.replaced = Some(std::mem::replace(&mut record.runner, new.to_string()));
        Ok(id)
    }

    pub fn on_base(&self, base: Base) -> Option<&str> {
        BaseRunner::from_base(base)
            .and_then(|br| self.occupants.get(br))
            .map(|id| self.arena[*id].runner.as_str())
    }

    pub fn occupant(&self, baserunner: BaseRunner) -> Option<&Occupancy> {
        self.occupants.get(baserunner).map(|id| &self.arena[*id])
    }

    pub fn occupant_id(&self, baserunner: BaseRunner) -> Option<FateId> {
        self.occupants.get(baserunner).copied()
    }

    /// Runners on (first, second, third).
    pub fn runner_names(&self) -> (Option<&str>, Option<&str>, Option<&str>) {
        (
            self.on_base(Base::First),
            self.on_base(Base::Second),
            self.on_base(Base::Third),
        )
    }

    /// 3-bit occupancy code with first base in the low bit.
    pub fn code(&self) -> u8 {
        u8::from(self.occupants.contains_key(BaseRunner::First))
            | u8::from(self.occupants.contains_key(BaseRunner::Second)) << 1
            | u8::from(self.occupants.contains_key(BaseRunner::Third)) << 2
    }

    /// No player holds two bases and no base holds an unresolved runner's name twice.
    pub fn is_valid(&self) -> bool {
        let mut names: Vec<&str> = self
            .occupants
            .values()
            .chain(self.unresolved.iter().map(|(id, _)| id))
            .map(|id| self.arena[*id].runner.as_str())
            .collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        names.len() == total && self.occupants.keys().all(|br| br != BaseRunner::Batter)
    }

    /// Runners still on the field, counting those pushed off a bag but not yet resolved.
    pub fn runner_count(&self) -> usize {
        self.occupants.len() + self.unresolved.len()
    }

    pub fn base_of(&self, player: &str) -> Option<Base> {
        self.occupied_base(player).map(|(b, _)| b)
    }

    pub fn fate_id_of(&self, player: &str) -> Option<FateId> {
        self.occupied_base(player)
            .map(|(_, id)| id)
            .or_else(|| self.unresolved_position(player).map(|(_, _, id)| id))
    }

    /// Latest known destination for a fate id; `None` if put out or unknown.
    pub fn fate_for(&self, id: FateId) -> Option<Base> {
        self.arena.get(id).and_then(|r| r.fate)
    }

    pub fn record(&self, id: FateId) -> Option<&Occupancy> {
        self.arena.get(id)
    }

    pub fn fates(&self) -> impl Iterator<Item = (FateId, &Occupancy)> {
        self.arena.iter().enumerate()
    }

    pub fn unresolved(&self) -> Vec<(&str, Base)> {
        self.unresolved
            .iter()
            .map(|(id, base)| (self.arena[*id].runner.as_str(), *base))
            .collect()
    }

    pub fn set_origin(&mut self, id: FateId, origin: RunnerOrigin) {
        if let Some(record) = self.arena.get_mut(id) {
            record.origin = Some(origin);
        }
    }

    pub fn origin(&self, id: FateId) -> Option<&RunnerOrigin> {
        self.arena.get(id).and_then(|r| r.origin.as_ref())
    }
}
