//! Persistent store port: catalog reads, user records and transactions.

use crate::domain::catalog::{MarketFilter, MarketListing};
use crate::domain::error::MarketError;
use crate::domain::player::{Money, NewPlayer, Player, PlayerId};
use crate::domain::team::{NewTeam, Squad, Team, TeamId};
use crate::domain::user::{NewUser, User, UserId};

/// One open transaction against the store.
///
/// `lock_*` reads hold the row until the transaction ends, so a concurrent
/// transaction touching the same player or team observes this one's result.
/// Dropping a unit of work without calling [`UnitOfWork::commit`] rolls it back.
pub trait UnitOfWork {
    fn lock_player(&mut self, id: PlayerId) -> Result<Option<Player>, MarketError>;

    fn lock_team(&mut self, id: TeamId) -> Result<Option<Team>, MarketError>;

    fn team_id_for_user(&mut self, user_id: UserId) -> Result<Option<TeamId>, MarketError>;

    fn count_players(&mut self, team_id: TeamId) -> Result<usize, MarketError>;

    /// Persist ownership and listing state. Name, position and price are immutable.
    fn save_player(&mut self, player: &Player) -> Result<(), MarketError>;

    fn set_budget(&mut self, team_id: TeamId, budget: Money) -> Result<(), MarketError>;

    fn insert_team(&mut self, team: &NewTeam) -> Result<Team, MarketError>;

    fn insert_player(&mut self, player: &NewPlayer) -> Result<Player, MarketError>;

    /// Release every player of the team to the pool (unlisted) and delete the
    /// team row. Returns the number of players released.
    fn dissolve_team(&mut self, team_id: TeamId) -> Result<usize, MarketError>;

    fn commit(self: Box<Self>) -> Result<(), MarketError>;
}

pub trait StorePort {
    fn initialize_schema(&self) -> Result<(), MarketError>;

    fn begin(&self) -> Result<Box<dyn UnitOfWork + '_>, MarketError>;

    /// Players with no owning team, in no particular order.
    fn unassigned_players(&self) -> Result<Vec<Player>, MarketError>;

    /// Listed players matching `filter`, in no particular order.
    fn market_listings(&self, filter: &MarketFilter) -> Result<Vec<MarketListing>, MarketError>;

    fn squad_for_user(&self, user_id: UserId) -> Result<Option<Squad>, MarketError>;

    fn find_player(&self, id: PlayerId) -> Result<Option<Player>, MarketError>;

    fn find_user(&self, id: UserId) -> Result<Option<User>, MarketError>;

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, MarketError>;

    /// Fails with `InvalidState` when the email is already registered.
    fn insert_user(&self, user: &NewUser) -> Result<User, MarketError>;
}
