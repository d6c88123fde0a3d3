//! In-process store.
//!
//! A transaction holds the store mutex for its whole life and works on a copy
//! of the state, so transactions are fully serialised and a rollback is just
//! discarding the copy.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::domain::catalog::{MarketFilter, MarketListing};
use crate::domain::error::MarketError;
use crate::domain::player::{Listing, Money, NewPlayer, Ownership, Player, PlayerId};
use crate::domain::team::{NewTeam, Squad, Team, TeamId};
use crate::domain::user::{NewUser, User, UserId};
use crate::ports::store_port::{StorePort, UnitOfWork};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: BTreeMap<UserId, User>,
    teams: BTreeMap<TeamId, Team>,
    players: BTreeMap<PlayerId, Player>,
    next_id: i64,
}

impl MemoryState {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn team_of(&self, user_id: UserId) -> Option<&Team> {
        self.teams.values().find(|t| t.user_id == user_id)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, MarketError> {
        self.state.lock().map_err(|e| MarketError::Internal {
            reason: format!("memory store poisoned: {e}"),
        })
    }
}

impl StorePort for MemoryStore {
    fn initialize_schema(&self) -> Result<(), MarketError> {
        Ok(())
    }

    fn begin(&self) -> Result<Box<dyn UnitOfWork + '_>, MarketError> {
        let guard = self.lock()?;
        let working = guard.clone();
        Ok(Box::new(MemoryUnitOfWork { guard, working }))
    }

    fn unassigned_players(&self) -> Result<Vec<Player>, MarketError> {
        let state = self.lock()?;
        Ok(state
            .players
            .values()
            .filter(|p| p.owner == Ownership::Pool)
            .cloned()
            .collect())
    }

    fn market_listings(&self, filter: &MarketFilter) -> Result<Vec<MarketListing>, MarketError> {
        let state = self.lock()?;
        let listings = state
            .players
            .values()
            .filter(|p| p.is_listed())
            .filter_map(|p| {
                let team = state.teams.get(&p.team_id()?)?;
                Some(MarketListing {
                    player: p.clone(),
                    team_id: team.id,
                    team_name: team.name.clone(),
                })
            })
            .filter(|l| filter.matches(l))
            .collect();
        Ok(listings)
    }

    fn squad_for_user(&self, user_id: UserId) -> Result<Option<Squad>, MarketError> {
        let state = self.lock()?;
        let Some(team) = state.team_of(user_id) else {
            return Ok(None);
        };
        let players = state
            .players
            .values()
            .filter(|p| p.owner == Ownership::Team(team.id))
            .cloned()
            .collect();
        Ok(Some(Squad {
            team: team.clone(),
            players,
        }))
    }

    fn find_player(&self, id: PlayerId) -> Result<Option<Player>, MarketError> {
        Ok(self.lock()?.players.get(&id).cloned())
    }

    fn find_user(&self, id: UserId) -> Result<Option<User>, MarketError> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, MarketError> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    fn insert_user(&self, user: &NewUser) -> Result<User, MarketError> {
        let mut state = self.lock()?;
        if state.users.values().any(|u| u.email == user.email) {
            return Err(MarketError::invalid_state("email already registered"));
        }
        let id = UserId(state.allocate_id());
        let user = User {
            id,
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
        };
        state.users.insert(id, user.clone());
        Ok(user)
    }
}

struct MemoryUnitOfWork<'a> {
    guard: MutexGuard<'a, MemoryState>,
    working: MemoryState,
}

impl UnitOfWork for MemoryUnitOfWork<'_> {
    fn lock_player(&mut self, id: PlayerId) -> Result<Option<Player>, MarketError> {
        Ok(self.working.players.get(&id).cloned())
    }

    fn lock_team(&mut self, id: TeamId) -> Result<Option<Team>, MarketError> {
        Ok(self.working.teams.get(&id).cloned())
    }

    fn team_id_for_user(&mut self, user_id: UserId) -> Result<Option<TeamId>, MarketError> {
        Ok(self.working.team_of(user_id).map(|t| t.id))
    }

    fn count_players(&mut self, team_id: TeamId) -> Result<usize, MarketError> {
        Ok(self
            .working
            .players
            .values()
            .filter(|p| p.owner == Ownership::Team(team_id))
            .count())
    }

    fn save_player(&mut self, player: &Player) -> Result<(), MarketError> {
        if let Ownership::Team(team_id) = player.owner {
            if !self.working.teams.contains_key(&team_id) {
                return Err(MarketError::DatabaseQuery {
                    reason: format!("team {team_id} does not exist"),
                });
            }
        }
        let stored = self
            .working
            .players
            .get_mut(&player.id)
            .ok_or_else(|| MarketError::DatabaseQuery {
                reason: format!("player {} does not exist", player.id),
            })?;
        stored.owner = player.owner;
        stored.listing = player.listing;
        Ok(())
    }

    fn set_budget(&mut self, team_id: TeamId, budget: Money) -> Result<(), MarketError> {
        if budget < 0 {
            return Err(MarketError::DatabaseQuery {
                reason: format!("budget of team {team_id} would be negative"),
            });
        }
        let team = self
            .working
            .teams
            .get_mut(&team_id)
            .ok_or_else(|| MarketError::DatabaseQuery {
                reason: format!("team {team_id} does not exist"),
            })?;
        team.budget = budget;
        Ok(())
    }

    fn insert_team(&mut self, team: &NewTeam) -> Result<Team, MarketError> {
        if self.working.team_of(team.user_id).is_some() {
            return Err(MarketError::DatabaseQuery {
                reason: format!("user {} already has a team", team.user_id),
            });
        }
        let id = TeamId(self.working.allocate_id());
        let team = Team {
            id,
            user_id: team.user_id,
            name: team.name.clone(),
            budget: team.budget,
        };
        self.working.teams.insert(id, team.clone());
        Ok(team)
    }

    fn insert_player(&mut self, player: &NewPlayer) -> Result<Player, MarketError> {
        let id = PlayerId(self.working.allocate_id());
        let player = Player {
            id,
            name: player.name.clone(),
            position: player.position,
            price: player.price,
            owner: player.owner,
            listing: Listing::Unlisted,
        };
        self.working.players.insert(id, player.clone());
        Ok(player)
    }

    fn dissolve_team(&mut self, team_id: TeamId) -> Result<usize, MarketError> {
        let mut released = 0;
        for player in self.working.players.values_mut() {
            if player.owner == Ownership::Team(team_id) {
                player.owner = Ownership::Pool;
                player.listing = Listing::Unlisted;
                released += 1;
            }
        }
        self.working.teams.remove(&team_id);
        Ok(released)
    }

    fn commit(self: Box<Self>) -> Result<(), MarketError> {
        let MemoryUnitOfWork { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
