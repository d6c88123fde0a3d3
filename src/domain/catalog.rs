//! Read-only views over players for presentation.
//!
//! These reads are not transactional and may be slightly stale.

use std::cmp::Ordering;
use std::str::FromStr;

use crate::domain::error::MarketError;
use crate::domain::player::{Money, Player};
use crate::domain::team::{Squad, TeamId};
use crate::domain::user::UserId;
use crate::ports::store_port::StorePort;

/// A listed player together with the team selling it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketListing {
    pub player: Player,
    pub team_id: TeamId,
    pub team_name: String,
}

impl MarketListing {
    pub fn asking_price(&self) -> Money {
        self.player.asking_price().unwrap_or_default()
    }
}

/// Market search criteria. Blank strings mean "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarketFilter {
    /// Case-insensitive prefix of the player name.
    pub name_prefix: Option<String>,
    /// Case-insensitive substring of the selling team's name.
    pub team_name_contains: Option<String>,
    /// Inclusive upper bound on the asking price.
    pub max_price: Option<Money>,
}

impl MarketFilter {
    pub fn normalized(&self) -> Self {
        fn clean(value: &Option<String>) -> Option<String> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        }
        Self {
            name_prefix: clean(&self.name_prefix),
            team_name_contains: clean(&self.team_name_contains),
            max_price: self.max_price,
        }
    }

    pub fn matches(&self, listing: &MarketListing) -> bool {
        if let Some(prefix) = &self.name_prefix {
            if !starts_with_ignore_case(&listing.player.name, prefix) {
                return false;
            }
        }
        if let Some(fragment) = &self.team_name_contains {
            if !contains_ignore_case(&listing.team_name, fragment) {
                return false;
            }
        }
        if let Some(max) = self.max_price {
            match listing.player.asking_price() {
                Some(price) if price <= max => {}
                _ => return false,
            }
        }
        true
    }
}

/// Unicode case-insensitive prefix test used by every store.
pub fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.to_lowercase().starts_with(&prefix.to_lowercase())
}

/// Unicode case-insensitive substring test used by every store.
pub fn contains_ignore_case(text: &str, fragment: &str) -> bool {
    text.to_lowercase().contains(&fragment.to_lowercase())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    Name,
    Position,
    AskingPrice,
    TeamName,
}

impl FromStr for SortField {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "name" => Ok(SortField::Name),
            "position" => Ok(SortField::Position),
            "price" | "askingprice" | "asking_price" => Ok(SortField::AskingPrice),
            "team" | "teamname" | "team_name" => Ok(SortField::TeamName),
            other => Err(MarketError::invalid_argument(format!(
                "unknown sort field '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortOrder {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(MarketError::invalid_argument(format!(
                "unknown sort order '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarketQuery {
    pub filter: MarketFilter,
    pub sort: SortField,
    pub order: SortOrder,
}

pub fn sort_by_position(players: &mut [Player]) {
    players.sort_by(|a, b| {
        a.position
            .cmp(&b.position)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Sort listings; ties always fall back to ascending player id.
pub fn sort_listings(listings: &mut [MarketListing], field: SortField, order: SortOrder) {
    listings.sort_by(|a, b| {
        let primary = match field {
            SortField::Name => a.player.name.cmp(&b.player.name),
            SortField::Position => a.player.position.cmp(&b.player.position),
            SortField::AskingPrice => a.asking_price().cmp(&b.asking_price()),
            SortField::TeamName => a.team_name.cmp(&b.team_name),
        };
        let primary = match order {
            SortOrder::Asc => primary,
            SortOrder::Desc => primary.reverse(),
        };
        match primary {
            Ordering::Equal => a.player.id.cmp(&b.player.id),
            other => other,
        }
    });
}

/// The unassigned pool, ordered GK, DEF, MID, ATT.
pub fn list_unassigned_players(store: &dyn StorePort) -> Result<Vec<Player>, MarketError> {
    let mut players = store.unassigned_players()?;
    sort_by_position(&mut players);
    Ok(players)
}

pub fn list_market_players(
    store: &dyn StorePort,
    query: &MarketQuery,
) -> Result<Vec<MarketListing>, MarketError> {
    let mut listings = store.market_listings(&query.filter.normalized())?;
    sort_listings(&mut listings, query.sort, query.order);
    Ok(listings)
}

pub fn get_team_for_user(
    store: &dyn StorePort,
    user_id: UserId,
) -> Result<Option<Squad>, MarketError> {
    let mut squad = store.squad_for_user(user_id)?;
    if let Some(squad) = squad.as_mut() {
        sort_by_position(&mut squad.players);
    }
    Ok(squad)
}
