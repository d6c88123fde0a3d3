//! Random squads, pool players and team names.

use rand::Rng;
use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;

use crate::domain::player::{Money, Position};

/// Players per position in an auto-generated squad.
pub const DEFAULT_QUOTA: [(Position, usize); 4] = [
    (Position::Goalkeeper, 3),
    (Position::Defender, 6),
    (Position::Midfielder, 6),
    (Position::Attacker, 5),
];

const FIRST_NAMES: &[&str] = &[
    "James", "John", "Robert", "Michael", "William", "David", "Carlos", "Juan", "Luis", "Marco",
    "Paolo", "Giuseppe", "Hans", "Franz", "Mohamed", "Ahmed", "Yuki", "Kai", "Lee", "Kim",
    "Oliver", "Harry", "Jack", "Lucas",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Martinez", "Rodriguez", "Rossi",
    "Ferrari", "Mueller", "Schmidt", "Silva", "Santos", "Kim", "Lee", "Wang", "Chen", "Taylor",
    "Davies", "Wilson", "Evans",
];

/// A player that exists only as generated data so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prospect {
    pub name: String,
    pub position: Position,
    pub price: Money,
}

/// Half-open price range for squad players, by position.
pub fn squad_price_range(position: Position) -> (Money, Money) {
    match position {
        Position::Goalkeeper => (500_000, 2_000_000),
        Position::Defender => (1_000_000, 3_000_000),
        Position::Midfielder => (1_500_000, 4_000_000),
        Position::Attacker => (2_000_000, 5_000_000),
    }
}

/// Base price of a pool player; actual prices add up to 50% on top.
pub fn pool_base_price(position: Position) -> Money {
    match position {
        Position::Goalkeeper => 500_000,
        Position::Defender => 1_000_000,
        Position::Midfielder => 1_500_000,
        Position::Attacker => 2_000_000,
    }
}

pub fn player_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    let first = FIRST_NAMES.choose(rng).copied().unwrap_or("John");
    let last = LAST_NAMES.choose(rng).copied().unwrap_or("Smith");
    format!("{first} {last}")
}

pub fn team_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    let suffix: String = (0..5)
        .map(|_| char::from(rng.sample(Alphanumeric)).to_ascii_lowercase())
        .collect();
    format!("Team {suffix}")
}

/// A squad following [`DEFAULT_QUOTA`], priced by [`squad_price_range`].
pub fn default_squad<R: Rng + ?Sized>(rng: &mut R) -> Vec<Prospect> {
    let mut squad = Vec::new();
    for (position, count) in DEFAULT_QUOTA {
        let (low, high) = squad_price_range(position);
        for _ in 0..count {
            squad.push(Prospect {
                name: player_name(rng),
                position,
                price: rng.gen_range(low..high),
            });
        }
    }
    squad
}

pub fn pool_player<R: Rng + ?Sized>(rng: &mut R) -> Prospect {
    let position = Position::ALL[rng.gen_range(0..Position::ALL.len())];
    let base = pool_base_price(position);
    let variation = rng.gen_range(0.0..0.5);
    Prospect {
        name: player_name(rng),
        position,
        price: (base as f64 * (1.0 + variation)).round() as Money,
    }
}
