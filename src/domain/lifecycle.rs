//! Team lifecycle: creating a user's team, replacing any previous one.
//!
//! A replaced team's players go back to the unassigned pool, unlisted. They are
//! never deleted.

use std::collections::HashSet;

use rand::Rng;

use crate::domain::error::MarketError;
use crate::domain::generator::{self, Prospect};
use crate::domain::operation::{self, Operation};
use crate::domain::player::{Listing, NewPlayer, Ownership, Player, PlayerId};
use crate::domain::roster::RosterCounts;
use crate::domain::team::{NewTeam, STARTING_BUDGET, Squad, TeamId};
use crate::domain::user::UserId;
use crate::ports::store_port::{StorePort, UnitOfWork};

/// Auto-generated squad for a user without a team.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateDefaultTeam {
    pub user_id: UserId,
    pub team_name: String,
    pub squad: Vec<Prospect>,
}

impl CreateDefaultTeam {
    pub fn generate<R: Rng + ?Sized>(user_id: UserId, rng: &mut R) -> Self {
        Self {
            user_id,
            team_name: generator::team_name(rng),
            squad: generator::default_squad(rng),
        }
    }
}

impl Operation for CreateDefaultTeam {
    type Output = Squad;

    const NAME: &'static str = "create_default_team";

    fn execute(&self, tx: &mut dyn UnitOfWork) -> Result<Squad, MarketError> {
        RosterCounts::from_positions(self.squad.iter().map(|p| p.position))
            .check()
            .map_err(|v| MarketError::invalid_argument(v.to_string()))?;

        replace_existing(tx, self.user_id)?;
        let team = tx.insert_team(&NewTeam {
            user_id: self.user_id,
            name: self.team_name.clone(),
            budget: STARTING_BUDGET,
        })?;

        let mut players = Vec::with_capacity(self.squad.len());
        for prospect in &self.squad {
            players.push(tx.insert_player(&NewPlayer {
                name: prospect.name.clone(),
                position: prospect.position,
                price: prospect.price,
                owner: Ownership::Team(team.id),
            })?);
        }
        Ok(Squad { team, players })
    }
}

/// A team built from players picked out of the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTeamFromSelection {
    pub user_id: UserId,
    pub team_name: String,
    pub player_ids: Vec<PlayerId>,
}

impl CreateTeamFromSelection {
    pub fn new<R: Rng + ?Sized>(user_id: UserId, player_ids: Vec<PlayerId>, rng: &mut R) -> Self {
        Self {
            user_id,
            team_name: generator::team_name(rng),
            player_ids,
        }
    }
}

impl Operation for CreateTeamFromSelection {
    type Output = Squad;

    const NAME: &'static str = "create_team_from_selection";

    fn execute(&self, tx: &mut dyn UnitOfWork) -> Result<Squad, MarketError> {
        let mut seen = HashSet::new();
        for id in &self.player_ids {
            if !seen.insert(*id) {
                return Err(MarketError::invalid_argument(format!(
                    "player {id} selected more than once"
                )));
            }
        }

        let mut selection = Vec::with_capacity(self.player_ids.len());
        for id in &self.player_ids {
            let player = tx
                .lock_player(*id)?
                .ok_or_else(|| MarketError::not_found(format!("player {id}")))?;
            selection.push(player);
        }

        RosterCounts::from_positions(selection.iter().map(|p| p.position))
            .check()
            .map_err(|v| MarketError::invalid_argument(v.to_string()))?;

        // The user's own current players count as available: they are
        // released when the old team goes.
        let previous = tx.team_id_for_user(self.user_id)?;
        for player in &selection {
            let available = match player.owner {
                Ownership::Pool => true,
                Ownership::Team(team_id) => Some(team_id) == previous,
            };
            if !available {
                return Err(MarketError::invalid_state(format!(
                    "player {} is already on another team",
                    player.id
                )));
            }
        }

        replace_existing(tx, self.user_id)?;
        let team = tx.insert_team(&NewTeam {
            user_id: self.user_id,
            name: self.team_name.clone(),
            budget: STARTING_BUDGET,
        })?;

        let players = attach(tx, selection, team.id)?;
        Ok(Squad { team, players })
    }
}

fn replace_existing(tx: &mut dyn UnitOfWork, user_id: UserId) -> Result<(), MarketError> {
    if let Some(previous) = tx.team_id_for_user(user_id)? {
        let released = tx.dissolve_team(previous)?;
        tracing::debug!(team_id = %previous, released, "previous team dissolved");
    }
    Ok(())
}

fn attach(
    tx: &mut dyn UnitOfWork,
    selection: Vec<Player>,
    team_id: TeamId,
) -> Result<Vec<Player>, MarketError> {
    let mut players = Vec::with_capacity(selection.len());
    for mut player in selection {
        player.owner = Ownership::Team(team_id);
        player.listing = Listing::Unlisted;
        tx.save_player(&player)?;
        players.push(player);
    }
    Ok(players)
}

pub fn create_default_team<R: Rng + ?Sized>(
    store: &dyn StorePort,
    user_id: UserId,
    rng: &mut R,
) -> Result<Squad, MarketError> {
    let squad = operation::run(store, &CreateDefaultTeam::generate(user_id, rng))?;
    tracing::info!(
        user_id = %user_id,
        team_id = %squad.team.id,
        players = squad.players.len(),
        "default team created"
    );
    Ok(squad)
}

pub fn create_team_from_selection<R: Rng + ?Sized>(
    store: &dyn StorePort,
    user_id: UserId,
    player_ids: Vec<PlayerId>,
    rng: &mut R,
) -> Result<Squad, MarketError> {
    let squad = operation::run(
        store,
        &CreateTeamFromSelection::new(user_id, player_ids, rng),
    )?;
    tracing::info!(
        user_id = %user_id,
        team_id = %squad.team.id,
        players = squad.players.len(),
        "team created from selection"
    );
    Ok(squad)
}

/// Default team for a user who has none. The existence check runs inside the
/// transaction, so a concurrent first login cannot replace a fresh team.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsureDefaultTeam {
    pub team: CreateDefaultTeam,
}

impl Operation for EnsureDefaultTeam {
    type Output = Option<Squad>;

    const NAME: &'static str = "ensure_default_team";

    fn execute(&self, tx: &mut dyn UnitOfWork) -> Result<Option<Squad>, MarketError> {
        if tx.team_id_for_user(self.team.user_id)?.is_some() {
            return Ok(None);
        }
        self.team.execute(tx).map(Some)
    }
}

/// Create a default team unless the user already has one.
/// Returns the new squad, or `None` when nothing was created.
pub fn ensure_team<R: Rng + ?Sized>(
    store: &dyn StorePort,
    user_id: UserId,
    rng: &mut R,
) -> Result<Option<Squad>, MarketError> {
    if store.squad_for_user(user_id)?.is_some() {
        return Ok(None);
    }
    let op = EnsureDefaultTeam {
        team: CreateDefaultTeam::generate(user_id, rng),
    };
    match operation::run(store, &op) {
        Ok(Some(squad)) => {
            tracing::info!(
                user_id = %user_id,
                team_id = %squad.team.id,
                players = squad.players.len(),
                "default team created"
            );
            Ok(Some(squad))
        }
        Ok(None) => Ok(None),
        // Lost a race on the unique user_id under READ COMMITTED.
        Err(MarketError::InvalidState { .. }) if store.squad_for_user(user_id)?.is_some() => {
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
