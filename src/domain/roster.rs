//! Roster policy: whether a set of players forms a legal squad.
//!
//! Pure counting over positions. Team creation checks the full policy; trades
//! only re-check the size bounds.

use crate::domain::player::{Player, Position};

pub const MIN_SQUAD_SIZE: usize = 15;
pub const MAX_SQUAD_SIZE: usize = 25;

/// Advisory only; exceeding it never blocks an operation.
pub const GOALKEEPER_CEILING: usize = 3;

pub fn minimum_for(position: Position) -> usize {
    match position {
        Position::Goalkeeper => 2,
        Position::Defender => 5,
        Position::Midfielder => 5,
        Position::Attacker => 3,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RosterViolation {
    #[error("squad has {count} players, at least {} required", MIN_SQUAD_SIZE)]
    TooFew { count: usize },

    #[error("squad has {count} players, at most {} allowed", MAX_SQUAD_SIZE)]
    TooMany { count: usize },

    #[error("squad has {count} {position} players, at least {minimum} required")]
    PositionShort {
        position: Position,
        count: usize,
        minimum: usize,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RosterCounts {
    pub goalkeepers: usize,
    pub defenders: usize,
    pub midfielders: usize,
    pub attackers: usize,
}

impl RosterCounts {
    pub fn from_positions<I>(positions: I) -> Self
    where
        I: IntoIterator<Item = Position>,
    {
        let mut counts = Self::default();
        for position in positions {
            match position {
                Position::Goalkeeper => counts.goalkeepers += 1,
                Position::Defender => counts.defenders += 1,
                Position::Midfielder => counts.midfielders += 1,
                Position::Attacker => counts.attackers += 1,
            }
        }
        counts
    }

    pub fn count(&self, position: Position) -> usize {
        match position {
            Position::Goalkeeper => self.goalkeepers,
            Position::Defender => self.defenders,
            Position::Midfielder => self.midfielders,
            Position::Attacker => self.attackers,
        }
    }

    pub fn total(&self) -> usize {
        self.goalkeepers + self.defenders + self.midfielders + self.attackers
    }

    /// First rule broken, checking size before positions.
    pub fn check(&self) -> Result<(), RosterViolation> {
        let count = self.total();
        if count < MIN_SQUAD_SIZE {
            return Err(RosterViolation::TooFew { count });
        }
        if count > MAX_SQUAD_SIZE {
            return Err(RosterViolation::TooMany { count });
        }
        for position in Position::ALL {
            let have = self.count(position);
            let minimum = minimum_for(position);
            if have < minimum {
                return Err(RosterViolation::PositionShort {
                    position,
                    count: have,
                    minimum,
                });
            }
        }
        Ok(())
    }

    pub fn exceeds_goalkeeper_ceiling(&self) -> bool {
        self.goalkeepers > GOALKEEPER_CEILING
    }
}

pub fn check_roster(players: &[Player]) -> Result<(), RosterViolation> {
    RosterCounts::from_positions(players.iter().map(|p| p.position)).check()
}

pub fn is_legal_roster(players: &[Player]) -> bool {
    check_roster(players).is_ok()
}
