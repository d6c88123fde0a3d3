//! Request and response bodies of the JSON API.

use serde::{Deserialize, Serialize};

use crate::domain::catalog::{MarketFilter, MarketListing, MarketQuery, SortField, SortOrder};
use crate::domain::error::MarketError;
use crate::domain::market::Purchase;
use crate::domain::player::{Money, Player};
use crate::domain::team::Squad;
use crate::domain::user::Principal;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct PrincipalDto {
    pub user_id: i64,
    pub email: String,
    pub has_team: bool,
}

impl From<Principal> for PrincipalDto {
    fn from(p: Principal) -> Self {
        Self {
            user_id: p.user_id.0,
            email: p.email,
            has_team: p.has_team,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDto {
    pub id: i64,
    pub name: String,
    pub position: &'static str,
    pub price: Money,
    pub team_id: Option<i64>,
    pub is_listed: bool,
    pub asking_price: Option<Money>,
}

impl From<&Player> for PlayerDto {
    fn from(p: &Player) -> Self {
        Self {
            id: p.id.0,
            name: p.name.clone(),
            position: p.position.code(),
            price: p.price,
            team_id: p.team_id().map(|t| t.0),
            is_listed: p.is_listed(),
            asking_price: p.asking_price(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamDto {
    pub id: i64,
    pub name: String,
    pub budget: Money,
    pub player_count: usize,
    pub squad_value: Money,
    pub players: Vec<PlayerDto>,
}

impl From<&Squad> for TeamDto {
    fn from(squad: &Squad) -> Self {
        Self {
            id: squad.team.id.0,
            name: squad.team.name.clone(),
            budget: squad.team.budget,
            player_count: squad.player_count(),
            squad_value: squad.squad_value(),
            players: squad.players.iter().map(PlayerDto::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingDto {
    #[serde(flatten)]
    pub player: PlayerDto,
    pub team_name: String,
}

impl From<&MarketListing> for ListingDto {
    fn from(listing: &MarketListing) -> Self {
        Self {
            player: PlayerDto::from(&listing.player),
            team_name: listing.team_name.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseDto {
    pub player: PlayerDto,
    pub buyer_team_id: i64,
    pub seller_team_id: i64,
    pub settlement: Money,
    pub buyer_budget: Money,
    pub seller_budget: Money,
}

impl From<&Purchase> for PurchaseDto {
    fn from(p: &Purchase) -> Self {
        Self {
            player: PlayerDto::from(&p.player),
            buyer_team_id: p.buyer_team.0,
            seller_team_id: p.seller_team.0,
            settlement: p.settlement,
            buyer_budget: p.buyer_budget,
            seller_budget: p.seller_budget,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTeamRequest {
    pub players: Vec<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRequest {
    pub player_id: i64,
    pub asking_price: Money,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRequest {
    pub player_id: i64,
}

/// Query string of `GET /api/transfers`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferQuery {
    pub player_name: Option<String>,
    pub team_name: Option<String>,
    pub max_price: Option<Money>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

impl TransferQuery {
    pub fn into_market_query(self) -> Result<MarketQuery, MarketError> {
        Ok(MarketQuery {
            filter: MarketFilter {
                name_prefix: self.player_name,
                team_name_contains: self.team_name,
                max_price: self.max_price,
            },
            sort: self.sort.as_deref().map(str::parse::<SortField>).transpose()?.unwrap_or_default(),
            order: self.order.as_deref().map(str::parse::<SortOrder>).transpose()?.unwrap_or_default(),
        })
    }
}
