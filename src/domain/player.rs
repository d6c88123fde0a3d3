//! Players, positions and the ownership/listing state a trade moves around.

use std::fmt;
use std::str::FromStr;

use crate::domain::error::MarketError;
use crate::domain::team::TeamId;

/// Monetary amount in whole currency units.
pub type Money = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(pub i64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Playing position. Declaration order is the catalog sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Position {
    Goalkeeper,
    Defender,
    Midfielder,
    Attacker,
}

impl Position {
    pub const ALL: [Position; 4] = [
        Position::Goalkeeper,
        Position::Defender,
        Position::Midfielder,
        Position::Attacker,
    ];

    /// Short code used in storage and on the wire.
    pub fn code(self) -> &'static str {
        match self {
            Position::Goalkeeper => "GK",
            Position::Defender => "DEF",
            Position::Midfielder => "MID",
            Position::Attacker => "ATT",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.code())
    }
}

impl FromStr for Position {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "GK" | "GOALKEEPER" => Ok(Position::Goalkeeper),
            "DEF" | "DEFENDER" => Ok(Position::Defender),
            "MID" | "MIDFIELDER" => Ok(Position::Midfielder),
            "ATT" | "ATTACKER" => Ok(Position::Attacker),
            other => Err(MarketError::invalid_argument(format!(
                "unknown position '{other}'"
            ))),
        }
    }
}

/// Who holds a player's registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Unassigned pool.
    Pool,
    Team(TeamId),
}

impl Ownership {
    pub fn team_id(self) -> Option<TeamId> {
        match self {
            Ownership::Pool => None,
            Ownership::Team(id) => Some(id),
        }
    }

    pub fn from_team_id(team_id: Option<TeamId>) -> Self {
        team_id.map_or(Ownership::Pool, Ownership::Team)
    }
}

/// Transfer-list state. An asking price exists exactly when listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listing {
    Unlisted,
    Listed { asking_price: Money },
}

impl Listing {
    /// Decode the `(is_listed, asking_price)` column pair used by the stores.
    pub fn from_columns(is_listed: bool, asking_price: Option<Money>) -> Result<Self, MarketError> {
        match (is_listed, asking_price) {
            (false, None) => Ok(Listing::Unlisted),
            (true, Some(price)) if price > 0 => Ok(Listing::Listed {
                asking_price: price,
            }),
            (listed, price) => Err(MarketError::Database {
                reason: format!(
                    "inconsistent listing columns: is_listed={listed}, asking_price={price:?}"
                ),
            }),
        }
    }

    pub fn is_listed(self) -> bool {
        matches!(self, Listing::Listed { .. })
    }

    pub fn asking_price(self) -> Option<Money> {
        match self {
            Listing::Unlisted => None,
            Listing::Listed { asking_price } => Some(asking_price),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub position: Position,
    /// Intrinsic valuation; never touched by market operations.
    pub price: Money,
    pub owner: Ownership,
    pub listing: Listing,
}

impl Player {
    pub fn is_listed(&self) -> bool {
        self.listing.is_listed()
    }

    pub fn asking_price(&self) -> Option<Money> {
        self.listing.asking_price()
    }

    pub fn team_id(&self) -> Option<TeamId> {
        self.owner.team_id()
    }
}

/// A player row that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPlayer {
    pub name: String,
    pub position: Position,
    pub price: Money,
    pub owner: Ownership,
}
