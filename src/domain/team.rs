//! Teams and the squad view handed to presentation.

use std::fmt;

use crate::domain::player::{Money, Player};
use crate::domain::user::UserId;

/// Budget every newly created team starts with.
pub const STARTING_BUDGET: Money = 5_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TeamId(pub i64);

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    pub id: TeamId,
    pub user_id: UserId,
    pub name: String,
    pub budget: Money,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTeam {
    pub user_id: UserId,
    pub name: String,
    pub budget: Money,
}

/// A team together with every player it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Squad {
    pub team: Team,
    pub players: Vec<Player>,
}

impl Squad {
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Sum of the intrinsic prices of all players.
    pub fn squad_value(&self) -> Money {
        self.players.iter().map(|p| p.price).sum()
    }
}
